use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

const PREFIX: &[u8] = b"[tv] ";

/// Best-effort console sink
///
/// Every log line reopens the console device, so a console that appears late or
/// disappears never affects the daemon. Failures are swallowed.
pub struct ConsoleWriter {
    path: PathBuf,
}

impl ConsoleWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleLine;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleLine {
            file: OpenOptions::new().write(true).open(&self.path).ok(),
        }
    }
}

pub struct ConsoleLine {
    file: Option<File>,
}

impl Write for ConsoleLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = self.file.as_mut() {
            let mut line = Vec::with_capacity(PREFIX.len() + buf.len());
            line.extend_from_slice(PREFIX);
            line.extend_from_slice(buf);
            if file.write_all(&line).is_err() {
                self.file = None;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Install the global subscriber. A console path of `-` logs to stderr.
pub fn init(console: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    if console == Path::new("-") {
        builder.with_writer(io::stderr).init();
    } else {
        builder.with_writer(ConsoleWriter::new(console)).init();
    }
}
