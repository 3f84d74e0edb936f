use super::supervisor::PlaybackSupervisor;
use std::process::{Child, ExitStatus};

/// Collects exited children without blocking.
///
/// Holds every child the daemon no longer tracks but has not reaped yet (killed
/// players, static noise) and checks the tracked player leader on each pass.
#[derive(Default)]
pub struct ChildReaper {
    orphans: Vec<Child>,
}

impl ChildReaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adopt(&mut self, child: Child) {
        tracing::debug!("Reaper adopted child {}", child.id());
        self.orphans.push(child);
    }

    pub fn pending(&self) -> usize {
        self.orphans.len()
    }

    /// Reap every exited child. Returns the exit status of the tracked player
    /// leader when it died on its own; the supervisor has dropped it by then.
    pub fn reap(&mut self, supervisor: &mut PlaybackSupervisor) -> Option<ExitStatus> {
        self.orphans.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!("Reaped child {}: {}", child.id(), status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::debug!("Dropping child {}: {}", child.id(), e);
                false
            }
        });

        supervisor.reap_leader()
    }
}
