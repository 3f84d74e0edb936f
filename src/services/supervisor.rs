use super::process_group::ProcessGroup;
use super::reaper::ChildReaper;
use crate::config::{CommandTemplate, Config};
use crate::error::{TvError, TvResult};
use crate::library::MediaLibrary;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

/// The one tracked playback engine
struct Playback {
    group: ProcessGroup,
    input: PathBuf,
    paused: bool,
}

/// Owns the lifecycle of at most one external playback process group.
///
/// `start` always stops the previous group first, so two players never run at the
/// same time. `stop` escalates from SIGTERM to SIGKILL after a bounded number of
/// liveness polls and may therefore hold the caller for the whole budget.
pub struct PlaybackSupervisor {
    library: MediaLibrary,
    player: CommandTemplate,
    vars: Vec<(String, String)>,
    stop_attempts: u32,
    stop_interval: Duration,
    current: Option<Playback>,
}

impl PlaybackSupervisor {
    pub fn new(config: &Config) -> Self {
        let vars = vec![
            ("fb".to_string(), config.fb_device.display().to_string()),
            ("audio".to_string(), config.audio_device.clone()),
            ("width".to_string(), config.fb_width.to_string()),
            ("height".to_string(), config.fb_height.to_string()),
        ];

        Self {
            library: MediaLibrary::new(&config.video_dir, &config.extensions),
            player: config.player.clone(),
            vars,
            stop_attempts: config.stop_poll_attempts,
            stop_interval: config.stop_poll_interval(),
            current: None,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.current.as_ref().is_some_and(|p| p.group.is_alive())
    }

    #[cfg(test)]
    pub fn is_paused(&self) -> bool {
        self.current.as_ref().is_some_and(|p| p.paused)
    }

    #[cfg(test)]
    pub fn leader_id(&self) -> Option<i32> {
        self.current.as_ref().map(|p| p.group.id())
    }

    pub fn current_input(&self) -> Option<&Path> {
        self.current.as_ref().map(|p| p.input.as_path())
    }

    /// Stop whatever plays, pick a random library item and launch the player on it
    pub async fn start(&mut self, reaper: &mut ChildReaper) -> TvResult<PathBuf> {
        self.stop(reaper).await;

        let input = self.library.choose().ok_or_else(|| TvError::NoMedia {
            dir: self.library.dir().to_path_buf(),
        })?;

        let input_arg = input.display().to_string();
        let mut vars: Vec<(&str, &str)> = self
            .vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        vars.push(("input", input_arg.as_str()));

        let args = self.player.render(&vars);
        let group = ProcessGroup::spawn(&self.player.program, &args)?;

        tracing::info!("play: {} (pgid {})", input.display(), group.id());
        self.current = Some(Playback {
            group,
            input: input.clone(),
            paused: false,
        });

        Ok(input)
    }

    /// Terminate the tracked group: SIGTERM, bounded wait on the leader, then
    /// SIGKILL to the whole group so no member outlives it. A leader that has
    /// not been reaped yet is handed to `reaper`.
    pub async fn stop(&mut self, reaper: &mut ChildReaper) {
        let Some(playback) = self.current.take() else {
            return;
        };
        let mut group = playback.group;

        if let Err(e) = group.terminate() {
            tracing::warn!("{}", e);
        }
        if playback.paused {
            // A stopped group only acts on SIGTERM once continued.
            if let Err(e) = group.resume() {
                tracing::warn!("{}", e);
            }
        }

        for _ in 0..self.stop_attempts {
            if !group.is_alive() {
                break;
            }
            tokio::time::sleep(self.stop_interval).await;
        }

        if group.is_alive() {
            tracing::warn!(
                "Player group {} ignored SIGTERM, sending SIGKILL",
                group.id()
            );
        }
        // Members other than the leader may still be running.
        if let Err(e) = group.kill() {
            tracing::warn!("{}", e);
        }

        match group.try_reap() {
            Some(status) => tracing::debug!("Player group {} exited: {}", group.id(), status),
            None => reaper.adopt(group.into_child()),
        }
    }

    /// Freeze the whole group. Returns whether a live player was frozen.
    pub fn pause(&mut self) -> bool {
        let Some(playback) = self.current.as_mut() else {
            return false;
        };
        if !playback.group.is_alive() {
            return false;
        }

        match playback.group.pause() {
            Ok(()) => {
                playback.paused = true;
                true
            }
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    /// Continue a frozen group. Returns whether a frozen live player was continued.
    pub fn resume(&mut self) -> bool {
        let Some(playback) = self.current.as_mut() else {
            return false;
        };
        if !playback.paused || !playback.group.is_alive() {
            return false;
        }

        match playback.group.resume() {
            Ok(()) => {
                playback.paused = false;
                true
            }
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    /// Reap the tracked leader if it has exited, dropping the tracking
    pub fn reap_leader(&mut self) -> Option<ExitStatus> {
        let status = self.current.as_mut()?.group.try_reap()?;
        self.current = None;
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn player_config(dir: &Path) -> Config {
        script_player_config(dir, "exec sleep 30")
    }

    fn script_player_config(dir: &Path, script: &str) -> Config {
        let mut config = Config::default();
        config.video_dir = dir.to_path_buf();
        config.stop_poll_interval_ms = 10;
        config.player = CommandTemplate {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                script.to_string(),
                "tvd-player".to_string(),
                "{input}".to_string(),
            ],
        };
        config
    }

    fn library_with(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in files {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_start_picks_library_item() {
        let dir = library_with(&["ep1.mp4"]);
        let mut supervisor = PlaybackSupervisor::new(&player_config(dir.path()));
        let mut reaper = ChildReaper::new();

        let input = supervisor.start(&mut reaper).await.unwrap();
        assert_eq!(input, dir.path().join("ep1.mp4"));
        assert_eq!(supervisor.current_input(), Some(input.as_path()));
        assert!(supervisor.is_alive());

        supervisor.stop(&mut reaper).await;
        assert!(!supervisor.is_tracked());
    }

    #[tokio::test]
    async fn test_start_replaces_running_player() {
        let dir = library_with(&["ep1.mp4", "ep2.mkv"]);
        let mut supervisor = PlaybackSupervisor::new(&player_config(dir.path()));
        let mut reaper = ChildReaper::new();

        supervisor.start(&mut reaper).await.unwrap();
        let first = supervisor.leader_id().unwrap();
        supervisor.start(&mut reaper).await.unwrap();
        let second = supervisor.leader_id().unwrap();

        assert_ne!(first, second);
        // The first group received SIGTERM and is gone.
        assert_ne!(unsafe { libc::kill(-first, 0) }, 0);

        supervisor.stop(&mut reaper).await;
    }

    #[tokio::test]
    async fn test_empty_library_tracks_nothing() {
        let dir = library_with(&["readme.txt"]);
        let mut supervisor = PlaybackSupervisor::new(&player_config(dir.path()));
        let mut reaper = ChildReaper::new();

        let result = supervisor.start(&mut reaper).await;
        assert!(matches!(result, Err(TvError::NoMedia { .. })));
        assert!(!supervisor.is_tracked());
    }

    #[tokio::test]
    async fn test_pause_and_resume_flags() {
        let dir = library_with(&["ep1.mp4"]);
        let mut supervisor = PlaybackSupervisor::new(&player_config(dir.path()));
        let mut reaper = ChildReaper::new();

        assert!(!supervisor.pause());
        assert!(!supervisor.resume());

        supervisor.start(&mut reaper).await.unwrap();
        assert!(!supervisor.resume());
        assert!(supervisor.pause());
        assert!(supervisor.is_paused());
        assert!(supervisor.is_alive());
        assert!(supervisor.resume());
        assert!(!supervisor.is_paused());

        supervisor.stop(&mut reaper).await;
    }

    #[tokio::test]
    async fn test_stop_terminates_frozen_group_within_budget() {
        let dir = library_with(&["ep1.mp4"]);
        let mut supervisor = PlaybackSupervisor::new(&player_config(dir.path()));
        let mut reaper = ChildReaper::new();

        supervisor.start(&mut reaper).await.unwrap();
        let pgid = supervisor.leader_id().unwrap();
        assert!(supervisor.pause());

        supervisor.stop(&mut reaper).await;
        assert!(!supervisor.is_tracked());
        assert!(!supervisor.is_paused());

        assert_group_gone(&mut supervisor, &mut reaper, pgid).await;
    }

    async fn assert_group_gone(
        supervisor: &mut PlaybackSupervisor,
        reaper: &mut ChildReaper,
        pgid: i32,
    ) {
        for _ in 0..200 {
            reaper.reap(supervisor);
            if unsafe { libc::kill(-pgid, 0) } != 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("process group {} survived stop", pgid);
    }

    #[tokio::test]
    async fn test_stop_kills_leader_that_ignores_sigterm() {
        let dir = library_with(&["ep1.mp4"]);
        let config = script_player_config(dir.path(), "trap '' TERM; while :; do sleep 0.1; done");
        let budget = config.stop_poll_interval() * config.stop_poll_attempts;
        let mut supervisor = PlaybackSupervisor::new(&config);
        let mut reaper = ChildReaper::new();

        supervisor.start(&mut reaper).await.unwrap();
        let pgid = supervisor.leader_id().unwrap();
        // Let the shell install its trap before signalling it.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        supervisor.stop(&mut reaper).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= budget, "escalated after {:?}", elapsed);
        assert!(
            elapsed < budget + Duration::from_secs(1),
            "stop took {:?}",
            elapsed
        );
        assert!(!supervisor.is_tracked());
        assert_group_gone(&mut supervisor, &mut reaper, pgid).await;
    }

    #[tokio::test]
    async fn test_stop_kills_group_member_that_ignores_sigterm() {
        let dir = library_with(&["ep1.mp4"]);
        let config = script_player_config(
            dir.path(),
            r#"sh -c 'trap "" TERM; while :; do sleep 0.1; done' & exec sleep 30"#,
        );
        let mut supervisor = PlaybackSupervisor::new(&config);
        let mut reaper = ChildReaper::new();

        supervisor.start(&mut reaper).await.unwrap();
        let pgid = supervisor.leader_id().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // The leader obeys SIGTERM at once; the background member does not.
        supervisor.stop(&mut reaper).await;
        assert!(!supervisor.is_tracked());
        assert_group_gone(&mut supervisor, &mut reaper, pgid).await;
    }

    #[tokio::test]
    async fn test_stop_without_player_is_noop() {
        let dir = library_with(&[]);
        let mut supervisor = PlaybackSupervisor::new(&player_config(dir.path()));
        let mut reaper = ChildReaper::new();

        supervisor.stop(&mut reaper).await;
        supervisor.stop(&mut reaper).await;
        assert!(!supervisor.is_tracked());
        assert_eq!(reaper.pending(), 0);
    }
}
