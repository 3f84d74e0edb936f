use crate::error::{TvError, TvResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Source of the power switch level
#[async_trait]
pub trait SwitchProvider: Send {
    /// Prepare the input line. Failures are logged, never fatal.
    async fn init(&mut self) {}

    async fn is_on(&mut self) -> TvResult<bool>;
}

/// Display illumination, fire-and-forget
#[async_trait]
pub trait Backlight: Send {
    async fn set(&mut self, on: bool);
}

/// GPIO access through the `raspi-gpio` command line tool
pub struct RaspiGpio {
    command: String,
    pin: u32,
}

impl RaspiGpio {
    pub fn new(command: impl Into<String>, pin: u32) -> Self {
        Self {
            command: command.into(),
            pin,
        }
    }

    async fn run_quiet(&self, args: &[&str]) {
        let pin = self.pin.to_string();
        let result = Command::new(&self.command)
            .arg(args[0])
            .arg(&pin)
            .args(&args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match result {
            Ok(status) if !status.success() => {
                tracing::debug!("{} {:?} on pin {} exited with {}", self.command, args, pin, status)
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Failed to run {}: {}", self.command, e),
        }
    }
}

/// `raspi-gpio get` prints e.g. `GPIO 26: level=1 fsel=0 func=INPUT pull=UP`
fn parse_level(output: &str) -> bool {
    output.lines().next().is_some_and(|line| line.contains("level=1"))
}

#[async_trait]
impl SwitchProvider for RaspiGpio {
    async fn init(&mut self) {
        self.run_quiet(&["set", "ip", "pu"]).await;
    }

    async fn is_on(&mut self) -> TvResult<bool> {
        let output = Command::new(&self.command)
            .arg("get")
            .arg(self.pin.to_string())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| TvError::Switch(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(TvError::Switch(format!(
                "{} get {} exited with {}",
                self.command, self.pin, output.status
            )));
        }

        Ok(parse_level(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl Backlight for RaspiGpio {
    async fn set(&mut self, on: bool) {
        let level = if on { "dh" } else { "dl" };
        self.run_quiet(&["set", "op", level]).await;
    }
}

/// Switch read from the kernel sysfs GPIO value file, no process spawn per poll
pub struct SysfsGpio {
    value_path: PathBuf,
}

impl SysfsGpio {
    pub fn new(pin: u32) -> Self {
        Self::with_path(format!("/sys/class/gpio/gpio{}/value", pin))
    }

    pub fn with_path(value_path: impl Into<PathBuf>) -> Self {
        Self {
            value_path: value_path.into(),
        }
    }
}

#[async_trait]
impl SwitchProvider for SysfsGpio {
    async fn init(&mut self) {
        if !self.value_path.exists() {
            tracing::warn!(
                "GPIO value file {:?} does not exist; the line must be exported",
                self.value_path
            );
        }
    }

    async fn is_on(&mut self) -> TvResult<bool> {
        let contents = tokio::fs::read_to_string(&self.value_path)
            .await
            .map_err(|e| TvError::Switch(format!("{:?}: {}", self.value_path, e)))?;
        Ok(contents.trim() == "1")
    }
}
