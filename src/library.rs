use rand::rng;
use rand::seq::IndexedRandom;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Flat directory of playable files
pub struct MediaLibrary {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl MediaLibrary {
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Regular files directly inside the library directory with a known extension.
    /// A missing or unreadable directory yields an empty list.
    pub fn list(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.matches(p))
            .collect()
    }

    /// Uniformly random pick, re-enumerated on every call
    pub fn choose(&self) -> Option<PathBuf> {
        let files = self.list();
        files.choose(&mut rng()).cloned()
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }
}
