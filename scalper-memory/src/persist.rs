use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, warn};

/// Version written into every memory document. Documents of any other version are discarded.
pub const MEMORY_VERSION: u32 = 1;

pub const TRADE_HISTORY_FILE: &str = "trade_history.json";
pub const PATTERNS_FILE: &str = "patterns.json";
pub const REGIMES_FILE: &str = "regimes.json";
pub const SYMBOLS_FILE: &str = "symbols.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialise {path}: {source}")]
    Serialise {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk document: the store's fields alongside `lastSaved` (epoch ms) and `version`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    #[serde(flatten)]
    data: T,
    last_saved: i64,
    version: u32,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: Option<u32>,
}

/// Directory of versioned JSON memory documents.
///
/// Assumes a single writer per directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonStore {
    dir: PathBuf,
    version: u32,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_version(dir, MEMORY_VERSION)
    }

    pub fn with_version(dir: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            dir: dir.into(),
            version,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Write `data` to `name` atomically: serialise to a temp file, then rename over the target.
    pub fn save<T>(&self, name: &str, data: &T) -> Result<(), PersistError>
    where
        T: Serialize,
    {
        let path = self.path(name);
        let envelope = Envelope {
            data,
            last_saved: Utc::now().timestamp_millis(),
            version: self.version,
        };
        let bytes = serde_json::to_vec_pretty(&envelope).map_err(|source| PersistError::Serialise {
            path: path.clone(),
            source,
        })?;

        fs::create_dir_all(&self.dir).map_err(|source| PersistError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes).map_err(|source| PersistError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            PersistError::Io {
                path: path.clone(),
                source,
            }
        })?;

        debug!(path = %path.display(), "memory document saved");
        Ok(())
    }

    /// Load `name`, or `None` when it is missing, unreadable, of another version, or corrupt.
    pub fn load<T>(&self, name: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let path = self.path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no memory document, starting empty");
                return None;
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read memory document, starting empty");
                return None;
            }
        };

        match serde_json::from_slice::<VersionProbe>(&bytes) {
            Ok(VersionProbe {
                version: Some(version),
            }) if version == self.version => {}
            Ok(probe) => {
                warn!(
                    path = %path.display(),
                    found = ?probe.version,
                    expected = self.version,
                    "memory document version mismatch, discarding"
                );
                return None;
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "corrupt memory document, discarding");
                return None;
            }
        }

        serde_json::from_slice::<Envelope<T>>(&bytes)
            .map(|envelope| envelope.data)
            .inspect_err(|error| {
                warn!(path = %path.display(), %error, "invalid memory document, discarding");
            })
            .ok()
    }
}
