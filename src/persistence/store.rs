use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::snapshot::{decode, encode, now_millis, SaveError, SaveMetadata, SaveSnapshot};

pub const SAVE_EXTENSION: &str = "wmsave";

/// Maps a user-supplied name to a safe file stem: anything outside
/// `[A-Za-z0-9_-]` becomes `_`, and an empty name gets a timestamped default.
pub fn sanitize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return format!("save_{}", now_millis());
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A directory of named saves, one file per name.
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

impl SaveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SaveStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_name(name), SAVE_EXTENSION))
    }

    /// Writes the snapshot under its metadata name. The file is written to a
    /// temporary name and renamed into place, so an existing save is never
    /// left half-overwritten.
    pub fn save(&self, snapshot: &SaveSnapshot) -> Result<PathBuf, SaveError> {
        fs::create_dir_all(&self.dir)?;

        let target = self.path_for(&snapshot.metadata.name);
        let filename = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self.dir.join(format!(".{}.tmp", filename));

        let encoded = encode(snapshot)?;

        if let Err(e) = fs::write(&tmp, &encoded) {
            let _ = fs::remove_file(&tmp);
            return Err(SaveError::Io(e));
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(SaveError::Io(e));
        }

        debug!(path = %target.display(), bytes = encoded.len(), "Saved game");
        Ok(target)
    }

    pub fn load(&self, name: &str) -> Result<SaveSnapshot, SaveError> {
        let path = self.path_for(name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SaveError::NotFound(name.to_string()));
            }
            Err(e) => return Err(SaveError::Io(e)),
        };
        decode(&data)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    pub fn delete(&self, name: &str) -> Result<(), SaveError> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SaveError::NotFound(name.to_string()))
            }
            Err(e) => Err(SaveError::Io(e)),
        }
    }

    /// Save names in the directory, sorted. A missing directory is simply
    /// empty; temp files and foreign files are skipped.
    pub fn list(&self) -> Result<Vec<String>, SaveError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if filename.starts_with('.') {
                continue;
            }
            if let Some(stem) = filename
                .strip_suffix(SAVE_EXTENSION)
                .and_then(|s| s.strip_suffix('.'))
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Metadata of every readable save. Unreadable files are logged and left out.
    pub fn list_metadata(&self) -> Result<Vec<SaveMetadata>, SaveError> {
        let mut found = Vec::new();
        for name in self.list()? {
            match self.load(&name) {
                Ok(snapshot) => found.push(snapshot.metadata),
                Err(e) => warn!(
                    path = %self.path_for(&name).display(),
                    error = %e,
                    "Skipping unreadable save"
                ),
            }
        }
        Ok(found)
    }
}
