use crate::hardware::SwitchProvider;
use crate::messages::SwitchEdge;
use std::time::Duration;
use tokio::time::Instant;

/// Rate-limited poll of the power switch, reporting only level changes.
///
/// A failed query reads as OFF. The query is awaited inline, so its latency adds
/// to the controller tick in which it runs.
pub struct SwitchMonitor {
    provider: Box<dyn SwitchProvider>,
    interval: Duration,
    last_poll: Option<Instant>,
    level: bool,
    failing: bool,
}

impl SwitchMonitor {
    pub fn new(provider: Box<dyn SwitchProvider>, interval: Duration) -> Self {
        Self {
            provider,
            interval,
            last_poll: None,
            level: false,
            failing: false,
        }
    }

    /// Prepare the line and seed the previous level with a first reading
    pub async fn init(&mut self) -> bool {
        self.provider.init().await;
        self.level = self.read().await;
        self.last_poll = Some(Instant::now());
        self.level
    }

    pub async fn read(&mut self) -> bool {
        match self.provider.is_on().await {
            Ok(on) => {
                if self.failing {
                    tracing::info!("Switch readable again");
                    self.failing = false;
                }
                on
            }
            Err(e) => {
                if !self.failing {
                    tracing::warn!("{}; treating switch as off", e);
                    self.failing = true;
                }
                false
            }
        }
    }

    /// Read the switch if the poll interval has elapsed and report any edge
    pub async fn poll(&mut self, now: Instant) -> Option<SwitchEdge> {
        if self
            .last_poll
            .is_some_and(|last| now.saturating_duration_since(last) < self.interval)
        {
            return None;
        }
        self.last_poll = Some(now);

        let on = self.read().await;
        let previous = std::mem::replace(&mut self.level, on);
        match (previous, on) {
            (false, true) => Some(SwitchEdge::BecameOn),
            (true, false) => Some(SwitchEdge::BecameOff),
            _ => None,
        }
    }
}
