use crate::error::{TvError, TvResult};
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};

/// A child process spawned as the leader of its own process group.
///
/// Every signal goes to the whole group, so a player made of several cooperating
/// processes (demuxer, decoders, renderer) freezes, continues and dies as a unit,
/// and signals aimed at it never reach the daemon itself.
pub struct ProcessGroup {
    child: Child,
    pgid: i32,
}

impl ProcessGroup {
    /// Spawn `program` with stdio detached, as leader of a new group (pgid == pid)
    pub fn spawn(program: &str, args: &[String]) -> TvResult<Self> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| TvError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let pgid = child.id() as i32;
        tracing::debug!("Spawned {} as process group {}", program, pgid);
        Ok(Self { child, pgid })
    }

    pub fn id(&self) -> i32 {
        self.pgid
    }

    /// Suspend scheduling of every group member
    pub fn pause(&self) -> TvResult<()> {
        self.signal(libc::SIGSTOP, "SIGSTOP")
    }

    pub fn resume(&self) -> TvResult<()> {
        self.signal(libc::SIGCONT, "SIGCONT")
    }

    pub fn terminate(&self) -> TvResult<()> {
        self.signal(libc::SIGTERM, "SIGTERM")
    }

    pub fn kill(&self) -> TvResult<()> {
        self.signal(libc::SIGKILL, "SIGKILL")
    }

    fn signal(&self, sig: libc::c_int, name: &'static str) -> TvResult<()> {
        let rc = unsafe { libc::kill(-self.pgid, sig) };
        if rc == 0 {
            return Ok(());
        }

        let source = io::Error::last_os_error();
        if source.raw_os_error() == Some(libc::ESRCH) {
            // Group already gone.
            return Ok(());
        }
        Err(TvError::Signal {
            pgid: self.pgid,
            signal: name,
            source,
        })
    }

    /// Whether the leader is still running. A stopped leader counts as alive, an
    /// exited-but-unreaped one does not. Never reaps.
    pub fn is_alive(&self) -> bool {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                self.pgid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
            )
        };
        if rc != 0 {
            // ECHILD: already reaped.
            return false;
        }
        unsafe { info.si_pid() == 0 }
    }

    /// Non-blocking reap of the leader
    pub fn try_reap(&mut self) -> Option<ExitStatus> {
        match self.child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!("Failed to reap process group {}: {}", self.pgid, e);
                None
            }
        }
    }

    pub fn into_child(self) -> Child {
        self.child
    }
}
