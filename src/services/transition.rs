use super::process_group::ProcessGroup;
use super::reaper::ChildReaper;
use crate::config::{CommandTemplate, Config};
use crate::hardware::Framebuffer;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// Channel-change "static": white noise on the audio device in the background and
/// a few random frames on the display, bounded by a fixed total duration.
pub struct TransitionEffect {
    noise: CommandTemplate,
    audio_device: String,
    noise_source: PathBuf,
    frames: u32,
    frame_interval: Duration,
    duration: Duration,
}

impl TransitionEffect {
    pub fn new(config: &Config) -> Self {
        Self {
            noise: config.noise.clone(),
            audio_device: config.audio_device.clone(),
            noise_source: config.noise_source.clone(),
            frames: config.static_frames,
            frame_interval: config.static_frame_interval(),
            duration: config.static_duration(),
        }
    }

    pub async fn run(&self, framebuffer: &Framebuffer, reaper: &mut ChildReaper) {
        let started = Instant::now();
        let audio = self.spawn_noise();

        if let Err(e) = self.draw_static(framebuffer).await {
            tracing::debug!("Static frames abandoned: {:#}", e);
        }

        tokio::time::sleep_until(started + self.duration).await;

        if let Some(mut audio) = audio {
            match audio.try_reap() {
                Some(status) => tracing::debug!("Static noise exited: {}", status),
                None => reaper.adopt(audio.into_child()),
            }
        }
    }

    fn spawn_noise(&self) -> Option<ProcessGroup> {
        let duration = format!("{:.3}", self.duration.as_secs_f64());
        let args = self
            .noise
            .render(&[("duration", duration.as_str()), ("audio", self.audio_device.as_str())]);

        match ProcessGroup::spawn(&self.noise.program, &args) {
            Ok(group) => Some(group),
            Err(e) => {
                tracing::debug!("Static noise unavailable: {}", e);
                None
            }
        }
    }

    async fn draw_static(&self, framebuffer: &Framebuffer) -> Result<()> {
        let mut source = File::open(&self.noise_source)
            .with_context(|| format!("Failed to open noise source {:?}", self.noise_source))?;
        let mut surface = framebuffer.open()?;
        let mut frame = vec![0u8; framebuffer.frame_len()];

        for _ in 0..self.frames {
            let len = fill(&mut source, &mut frame).context("Failed to read noise source")?;
            if len == 0 {
                break;
            }
            framebuffer.write_frame(&mut surface, &frame[..len])?;
            tokio::time::sleep(self.frame_interval).await;
        }

        Ok(())
    }
}

/// Read until `buf` is full or the source is exhausted
fn fill(source: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
