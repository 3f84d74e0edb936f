use crate::error::{TvError, TvResult};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

const CLEAR_CHUNK: usize = 4096;

/// Fixed-size display surface (`stride * height` bytes per frame).
///
/// Writes always start at offset 0. A failed write is abandoned and the frame is
/// left partially drawn, which the next full write overwrites anyway.
pub struct Framebuffer {
    path: PathBuf,
    frame_len: usize,
}

impl Framebuffer {
    pub fn new(path: impl Into<PathBuf>, frame_len: usize) -> Self {
        Self {
            path: path.into(),
            frame_len,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Open the surface positioned at offset 0
    pub fn open(&self) -> TvResult<File> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|source| self.error(source))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|source| self.error(source))?;
        Ok(file)
    }

    /// Blank the whole visible frame
    pub fn clear(&self) {
        if let Err(e) = self.try_clear() {
            tracing::debug!("Failed to clear framebuffer: {}", e);
        }
    }

    fn try_clear(&self) -> TvResult<()> {
        let mut file = self.open()?;
        let zeros = [0u8; CLEAR_CHUNK];
        let mut remaining = self.frame_len;
        while remaining > 0 {
            let chunk = remaining.min(CLEAR_CHUNK);
            file.write_all(&zeros[..chunk])
                .map_err(|source| self.error(source))?;
            remaining -= chunk;
        }
        Ok(())
    }

    /// Overwrite the visible frame from offset 0 with `frame`
    pub fn write_frame(&self, file: &mut File, frame: &[u8]) -> TvResult<()> {
        file.seek(SeekFrom::Start(0))
            .map_err(|source| self.error(source))?;
        let len = frame.len().min(self.frame_len);
        file.write_all(&frame[..len])
            .map_err(|source| self.error(source))
    }

    fn error(&self, source: std::io::Error) -> TvError {
        TvError::Framebuffer {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_zeroes_one_frame() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![0xffu8; 10_000]).unwrap();

        let fb = Framebuffer::new(file.path(), 100 * 50);
        fb.clear();

        let contents = std::fs::read(file.path()).unwrap();
        assert_eq!(contents.len(), 10_000);
        assert!(contents[..5_000].iter().all(|&b| b == 0));
        assert!(contents[5_000..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_write_frame_starts_at_offset_zero() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let fb = Framebuffer::new(file.path(), 4 * 2);

        let mut handle = fb.open().unwrap();
        fb.write_frame(&mut handle, &[1u8; 8]).unwrap();
        fb.write_frame(&mut handle, &[2u8; 8]).unwrap();
        drop(handle);

        assert_eq!(std::fs::read(file.path()).unwrap(), vec![2u8; 8]);
    }

    #[test]
    fn test_missing_device_is_tolerated() {
        let fb = Framebuffer::new("/nonexistent/fb0", 4 * 2);
        fb.clear();
        assert!(fb.open().is_err());
    }
}
