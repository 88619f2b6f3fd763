//! Model artifact persistence
//!
//! An artifact is a single file:
//!
//! ```text
//! +----------+----------------------+-------------------------+
//! | RENTMDL1 | SHA-256 of payload   | bincode(TrainedModel)   |
//! | 8 bytes  | 32 bytes             | rest of file            |
//! +----------+----------------------+-------------------------+
//! ```
//!
//! Writes go to a temp file in the same directory, are fsynced, then renamed
//! over the final path, so readers see either the old or the new artifact.

use crate::error::{PipelineError, Result};
use crate::pipeline::preparation::SCHEMA_VERSION;
use crate::pipeline::{ModelSummary, TrainedModel};
use crate::settings::Settings;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const ARTIFACT_MAGIC: &[u8; 8] = b"RENTMDL1";
const CHECKSUM_LEN: usize = 32;
const HEADER_LEN: usize = ARTIFACT_MAGIC.len() + CHECKSUM_LEN;

/// How often a blocked lock acquisition retries
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Metadata about a stored artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Hex SHA-256 of the payload
    pub checksum: String,
    pub summary: ModelSummary,
}

/// Location of one named model artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    dir: PathBuf,
    name: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.model_path, &settings.model_name)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.lock", self.name))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir
            .join(format!(".{}.tmp-{}", self.name, std::process::id()))
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Serialize and atomically replace the artifact, creating the directory if needed
    pub fn save(&self, model: &TrainedModel) -> Result<ArtifactInfo> {
        fs::create_dir_all(&self.dir)?;

        let payload = bincode::serialize(model).map_err(|e| PipelineError::InvalidValue {
            column: "model".to_string(),
            reason: format!("failed to encode model: {}", e),
        })?;
        let digest = Sha256::digest(&payload);

        let temp_path = self.temp_path();
        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(ARTIFACT_MAGIC)?;
            file.write_all(&digest)?;
            file.write_all(&payload)?;
            file.sync_all()?;
            fs::rename(&temp_path, self.path())
        })();
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(path = %temp_path.display(), error = %cleanup, "Temp artifact not removed");
            }
            return Err(e.into());
        }

        let info = ArtifactInfo {
            path: self.path(),
            size_bytes: (HEADER_LEN + payload.len()) as u64,
            checksum: hex::encode(digest),
            summary: model.summary(),
        };
        info!(
            path = %info.path.display(),
            size = info.size_bytes,
            checksum = %info.checksum,
            "Model artifact saved"
        );
        Ok(info)
    }

    /// Read and verify the artifact
    pub fn load(&self) -> Result<TrainedModel> {
        self.read().map(|(model, _)| model)
    }

    /// Verify the artifact and describe it without keeping the model
    pub fn inspect(&self) -> Result<ArtifactInfo> {
        let (model, checksum) = self.read()?;
        let size_bytes = fs::metadata(self.path())?.len();
        Ok(ArtifactInfo {
            path: self.path(),
            size_bytes,
            checksum,
            summary: model.summary(),
        })
    }

    fn read(&self) -> Result<(TrainedModel, String)> {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::ArtifactNotFound { path });
            }
            Err(e) => return Err(e.into()),
        };
        let corrupt = |reason: String| PipelineError::ArtifactCorrupt {
            path: path.clone(),
            reason,
        };

        if bytes.len() < HEADER_LEN {
            return Err(corrupt(format!("truncated to {} bytes", bytes.len())));
        }
        let (magic, rest) = bytes.split_at(ARTIFACT_MAGIC.len());
        if magic != ARTIFACT_MAGIC {
            return Err(corrupt("unrecognized file header".to_string()));
        }
        let (stored, payload) = rest.split_at(CHECKSUM_LEN);
        let digest = Sha256::digest(payload);
        if digest.as_slice() != stored {
            return Err(corrupt(format!(
                "checksum mismatch: header {}, payload {}",
                hex::encode(stored),
                hex::encode(digest)
            )));
        }

        let model: TrainedModel = bincode::deserialize(payload)
            .map_err(|e| corrupt(format!("failed to decode model: {}", e)))?;
        if model.schema.version != SCHEMA_VERSION {
            return Err(corrupt(format!(
                "feature schema version {} is not supported",
                model.schema.version
            )));
        }
        debug!(path = %path.display(), "Model artifact verified");
        Ok((model, hex::encode(digest)))
    }

    /// Take the exclusive training lock, polling until `timeout` elapses
    pub async fn lock(&self, timeout: Duration) -> Result<ArtifactLock> {
        fs::create_dir_all(&self.dir)?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        let started = Instant::now();
        let mut logged = false;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if started.elapsed() >= timeout {
                        return Err(PipelineError::LockTimeout {
                            path: lock_path,
                            waited_secs: started.elapsed().as_secs(),
                        });
                    }
                    if !logged {
                        info!(path = %lock_path.display(), "Waiting for another training run to finish");
                        logged = true;
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Err(e) = file.set_len(0).and_then(|_| {
            writeln!(&file, "pid={};locked_at={}", std::process::id(), chrono::Utc::now().to_rfc3339())
        }) {
            warn!(path = %lock_path.display(), error = %e, "Failed to record lock owner");
        }
        debug!(path = %lock_path.display(), "Training lock acquired");
        Ok(ArtifactLock {
            path: lock_path,
            file,
        })
    }
}

/// Held while training and writing an artifact; released on drop
///
/// The lock file itself stays in place so every process locks the same inode.
#[derive(Debug)]
pub struct ArtifactLock {
    path: PathBuf,
    file: File,
}

impl ArtifactLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtifactLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "Failed to release training lock");
        }
    }
}

/// Save `model` as `dir/name`
pub fn save(model: &TrainedModel, dir: impl Into<PathBuf>, name: &str) -> Result<ArtifactInfo> {
    ArtifactStore::new(dir, name).save(model)
}

/// Load the model stored as `dir/name`
pub fn load(dir: impl Into<PathBuf>, name: &str) -> Result<TrainedModel> {
    ArtifactStore::new(dir, name).load()
}
