use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "TVD_";

/// External program invocation with `{name}` placeholders in its arguments
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Substitute every `{name}` placeholder found in `vars`
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{}}}", name), value)
                })
            })
            .collect()
    }

    fn mentions(&self, placeholder: &str) -> bool {
        let token = format!("{{{}}}", placeholder);
        self.args.iter().any(|arg| arg.contains(&token))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchSource {
    RaspiGpio,
    Sysfs,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_video_dir")]
    pub video_dir: PathBuf,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_fb_device")]
    pub fb_device: PathBuf,

    #[serde(default = "default_fb_stride")]
    pub fb_stride: usize,

    #[serde(default = "default_fb_width")]
    pub fb_width: usize,

    #[serde(default = "default_fb_height")]
    pub fb_height: usize,

    #[serde(default = "default_audio_device")]
    pub audio_device: String,

    #[serde(default = "default_touch_device")]
    pub touch_device: PathBuf,

    #[serde(default = "default_console")]
    pub console: PathBuf,

    #[serde(default = "default_switch_source")]
    pub switch_source: SwitchSource,

    #[serde(default = "default_switch_pin")]
    pub switch_pin: u32,

    #[serde(default = "default_backlight_pin")]
    pub backlight_pin: u32,

    #[serde(default = "default_gpio_command")]
    pub gpio_command: String,

    #[serde(default = "default_switch_poll_ms")]
    pub switch_poll_ms: u64,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_double_tap_window_ms")]
    pub double_tap_window_ms: u64,

    #[serde(default = "default_stop_poll_attempts")]
    pub stop_poll_attempts: u32,

    #[serde(default = "default_stop_poll_interval_ms")]
    pub stop_poll_interval_ms: u64,

    #[serde(default = "default_static_ms")]
    pub static_ms: u64,

    #[serde(default = "default_static_frames")]
    pub static_frames: u32,

    #[serde(default = "default_static_frame_interval_ms")]
    pub static_frame_interval_ms: u64,

    #[serde(default = "default_noise_source")]
    pub noise_source: PathBuf,

    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,

    #[serde(default = "default_player")]
    pub player: CommandTemplate,

    #[serde(default = "default_noise")]
    pub noise: CommandTemplate,
}

fn default_video_dir() -> PathBuf {
    PathBuf::from("/mnt/videos")
}

fn default_extensions() -> Vec<String> {
    vec!["mkv".to_string(), "mp4".to_string()]
}

fn default_fb_device() -> PathBuf {
    PathBuf::from("/dev/fb0")
}

fn default_fb_stride() -> usize {
    2560
}

fn default_fb_width() -> usize {
    640
}

fn default_fb_height() -> usize {
    480
}

fn default_audio_device() -> String {
    "hw:0,0".to_string()
}

fn default_touch_device() -> PathBuf {
    PathBuf::from("/dev/input/event0")
}

fn default_console() -> PathBuf {
    PathBuf::from("/dev/console")
}

fn default_switch_source() -> SwitchSource {
    SwitchSource::RaspiGpio
}

fn default_switch_pin() -> u32 {
    26
}

fn default_backlight_pin() -> u32 {
    18
}

fn default_gpio_command() -> String {
    "raspi-gpio".to_string()
}

fn default_switch_poll_ms() -> u64 {
    40
}

fn default_tick_ms() -> u64 {
    10
}

fn default_double_tap_window_ms() -> u64 {
    320
}

fn default_stop_poll_attempts() -> u32 {
    25
}

fn default_stop_poll_interval_ms() -> u64 {
    30
}

fn default_static_ms() -> u64 {
    250
}

fn default_static_frames() -> u32 {
    3
}

fn default_static_frame_interval_ms() -> u64 {
    20
}

fn default_noise_source() -> PathBuf {
    PathBuf::from("/dev/urandom")
}

fn default_restart_backoff_ms() -> u64 {
    2000
}

fn default_player() -> CommandTemplate {
    CommandTemplate {
        program: "ffmpeg".to_string(),
        args: [
            "-nostdin",
            "-hide_banner",
            "-loglevel",
            "quiet",
            "-re",
            "-fflags",
            "+genpts",
            "-i",
            "{input}",
            "-vf",
            "scale={width}:{height},format=bgra",
            "-pix_fmt",
            "bgra",
            "-vsync",
            "0",
            "-map",
            "0:v:0",
            "-f",
            "fbdev",
            "{fb}",
            "-map",
            "0:a:0?",
            "-f",
            "alsa",
            "{audio}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    }
}

fn default_noise() -> CommandTemplate {
    CommandTemplate {
        program: "ffmpeg".to_string(),
        args: [
            "-nostdin",
            "-hide_banner",
            "-loglevel",
            "quiet",
            "-t",
            "{duration}",
            "-f",
            "s16le",
            "-ar",
            "48000",
            "-ac",
            "2",
            "-i",
            "/dev/urandom",
            "-af",
            "volume=0.18",
            "-f",
            "alsa",
            "{audio}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video_dir: default_video_dir(),
            extensions: default_extensions(),
            fb_device: default_fb_device(),
            fb_stride: default_fb_stride(),
            fb_width: default_fb_width(),
            fb_height: default_fb_height(),
            audio_device: default_audio_device(),
            touch_device: default_touch_device(),
            console: default_console(),
            switch_source: default_switch_source(),
            switch_pin: default_switch_pin(),
            backlight_pin: default_backlight_pin(),
            gpio_command: default_gpio_command(),
            switch_poll_ms: default_switch_poll_ms(),
            tick_ms: default_tick_ms(),
            double_tap_window_ms: default_double_tap_window_ms(),
            stop_poll_attempts: default_stop_poll_attempts(),
            stop_poll_interval_ms: default_stop_poll_interval_ms(),
            static_ms: default_static_ms(),
            static_frames: default_static_frames(),
            static_frame_interval_ms: default_static_frame_interval_ms(),
            noise_source: default_noise_source(),
            restart_backoff_ms: default_restart_backoff_ms(),
            player: default_player(),
            noise: default_noise(),
        }
    }
}

impl Config {
    /// Load configuration from `TVD_*` environment variables, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Single-line JSON rendering for the startup log
    pub fn summary(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize config")
    }

    /// Build a config from `(name, value)` pairs.
    ///
    /// `TVD_FB_STRIDE=2560` sets `fb_stride`. Values are read as JSON when they parse
    /// (numbers, arrays, objects, quoted strings) and as plain strings otherwise.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut fields = Map::new();
        for (name, raw) in vars {
            let Some(field) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
            fields.insert(field.to_ascii_lowercase(), value);
        }

        serde_json::from_value(Value::Object(fields))
            .context("Failed to parse TVD_* environment configuration")
    }

    pub fn validate(&self) -> Result<()> {
        if self.fb_stride == 0 || self.fb_height == 0 {
            return Err(anyhow::anyhow!("framebuffer stride and height must be non-zero"));
        }

        if self.fb_width * 4 > self.fb_stride {
            return Err(anyhow::anyhow!(
                "fb_width {} does not fit a stride of {} bytes",
                self.fb_width,
                self.fb_stride
            ));
        }

        if self.extensions.is_empty() {
            return Err(anyhow::anyhow!("extensions cannot be empty"));
        }

        if self.tick_ms == 0 || self.double_tap_window_ms == 0 {
            return Err(anyhow::anyhow!("tick_ms and double_tap_window_ms must be non-zero"));
        }

        if self.player.program.is_empty() {
            return Err(anyhow::anyhow!("player program cannot be empty"));
        }

        if !self.player.mentions("input") {
            return Err(anyhow::anyhow!("player args must contain an {{input}} placeholder"));
        }

        Ok(())
    }

    pub fn frame_len(&self) -> usize {
        self.fb_stride * self.fb_height
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn switch_poll(&self) -> Duration {
        Duration::from_millis(self.switch_poll_ms)
    }

    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    pub fn static_duration(&self) -> Duration {
        Duration::from_millis(self.static_ms)
    }

    pub fn static_frame_interval(&self) -> Duration {
        Duration::from_millis(self.static_frame_interval_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }
}
