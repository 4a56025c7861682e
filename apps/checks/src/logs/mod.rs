//! Append-only probe logs and their compressed archives.
//!
//! Live logs are `<check id>.log`, one JSON record per line. Rotation turns a
//! live log into `<check id>-<millis>.gz.b64` (gzip, base64 encoded) and
//! empties it. Archives are written once and never reopened for writing.

pub mod outcome;

pub use outcome::{LogRecord, OutcomeLogger};

use std::collections::HashMap;
use std::future::Future;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const LIVE_SUFFIX: &str = ".log";
const ARCHIVE_SUFFIX: &str = ".gz.b64";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log {0} is empty")]
    Empty(String),

    #[error("Archive {archive_id} already exists")]
    ArchiveExists { archive_id: String },

    #[error("Invalid log name: {0:?}")]
    InvalidName(String),

    #[error("Archive is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Directory of live logs and archives
pub struct LogStore {
    dir: PathBuf,
    /// Serializes appends and rotation of the same log
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn validate_name(name: &str) -> Result<(), LogError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0']);
    if valid { Ok(()) } else { Err(LogError::InvalidName(name.to_string())) }
}

impl LogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), locks: Mutex::new(HashMap::new()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn live_path(&self, log_id: &str) -> Result<PathBuf, LogError> {
        validate_name(log_id)?;
        Ok(self.dir.join(format!("{log_id}{LIVE_SUFFIX}")))
    }

    fn archive_path(&self, archive_id: &str) -> Result<PathBuf, LogError> {
        validate_name(archive_id)?;
        Ok(self.dir.join(format!("{archive_id}{ARCHIVE_SUFFIX}")))
    }

    /// Run `op` holding the log's lock, dropping the lock once unused
    async fn with_lock<T>(&self, log_id: &str, op: impl Future<Output = T>) -> T {
        let lock = Arc::clone(self.locks.lock().await.entry(log_id.to_string()).or_default());

        let result = {
            let _guard = lock.lock().await;
            op.await
        };

        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(log_id);
        }
        result
    }

    /// Append one line to a live log, creating it if absent
    pub async fn append(&self, log_id: &str, line: &str) -> Result<(), LogError> {
        let path = self.live_path(log_id)?;
        self.with_lock(log_id, append_line(&self.dir, &path, line)).await
    }

    /// Names of live logs and, optionally, archives (without suffixes), sorted
    pub async fn list(&self, include_archives: bool) -> Result<Vec<String>, LogError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else { continue };

            if let Some(name) = file_name.strip_suffix(LIVE_SUFFIX) {
                names.push(name.to_string());
            } else if let Some(name) = file_name.strip_suffix(ARCHIVE_SUFFIX) {
                if include_archives {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Full contents of a live log
    pub async fn read_live(&self, log_id: &str) -> Result<String, LogError> {
        Ok(fs::read_to_string(self.live_path(log_id)?).await?)
    }

    /// Compress a live log into a new archive and empty it.
    ///
    /// The live log is only truncated once the archive is fully written; any
    /// failure before that leaves it untouched. Appends to the same log wait
    /// for the rotation to finish.
    pub async fn rotate(&self, log_id: &str, archive_id: &str) -> Result<(), LogError> {
        self.with_lock(log_id, self.archive_and_truncate(log_id, archive_id)).await
    }

    async fn archive_and_truncate(&self, log_id: &str, archive_id: &str) -> Result<(), LogError> {
        self.compress(log_id, archive_id).await?;
        self.truncate(log_id).await
    }

    /// Write the compressed contents of a live log to a new archive
    pub async fn compress(&self, log_id: &str, archive_id: &str) -> Result<(), LogError> {
        let source = self.live_path(log_id)?;
        let destination = self.archive_path(archive_id)?;

        let contents = fs::read(&source).await?;
        if contents.is_empty() {
            return Err(LogError::Empty(log_id.to_string()));
        }

        let encoded = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&contents)?;
            Ok(STANDARD.encode(encoder.finish()?))
        })
        .await??;

        let mut file =
            match fs::OpenOptions::new().write(true).create_new(true).open(&destination).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(LogError::ArchiveExists { archive_id: archive_id.to_string() });
                }
                Err(e) => return Err(e.into()),
            };

        if let Err(e) = write_archive(&mut file, encoded.as_bytes()).await {
            // A partial archive must not block a later attempt.
            drop(file);
            let _ = fs::remove_file(&destination).await;
            return Err(e);
        }
        Ok(())
    }

    /// Empty a live log
    pub async fn truncate(&self, log_id: &str) -> Result<(), LogError> {
        let path = self.live_path(log_id)?;
        let file = fs::OpenOptions::new().write(true).open(&path).await?;
        file.set_len(0).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Text stored in an archive
    pub async fn decompress(&self, archive_id: &str) -> Result<String, LogError> {
        let encoded = fs::read(self.archive_path(archive_id)?).await?;

        let text = tokio::task::spawn_blocking(move || -> Result<String, LogError> {
            let compressed = STANDARD.decode(encoded.trim_ascii())?;
            let mut text = String::new();
            GzDecoder::new(compressed.as_slice()).read_to_string(&mut text)?;
            Ok(text)
        })
        .await??;

        Ok(text)
    }
}

async fn append_line(dir: &Path, path: &Path, line: &str) -> Result<(), LogError> {
    fs::create_dir_all(dir).await?;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path).await?;

    let mut record = String::with_capacity(line.len() + 1);
    record.push_str(line);
    record.push('\n');
    file.write_all(record.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

async fn write_archive(file: &mut fs::File, bytes: &[u8]) -> Result<(), LogError> {
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}
