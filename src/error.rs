use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TvError {
    #[error("no media files found in {dir}")]
    NoMedia { dir: PathBuf },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to send {signal} to process group {pgid}: {source}")]
    Signal {
        pgid: i32,
        signal: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("switch query failed: {0}")]
    Switch(String),

    #[error("framebuffer {path}: {source}")]
    Framebuffer {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type TvResult<T> = std::result::Result<T, TvError>;
