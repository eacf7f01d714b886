//! Queue lifecycle directories.
//!
//! A queue item's state is the directory that holds it:
//!
//! ```text
//! queue/ ──► processing/ ──► completed/
//!                       └──► failed/ ──(retry)──► queue/
//! ```
//!
//! Every transition is a single rename within the queue root, so an item is
//! in exactly one directory at any instant. All four directories must live
//! on the same volume.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use intake_core::{QueueError, QueueResult};
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::constants::{
    COMPLETED_DIR_NAME, FAILED_DIR_NAME, PROCESSING_DIR_NAME, QUEUED_DIR_NAME,
    QUEUE_FILE_EXTENSION,
};

/// Lifecycle state of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl QueueState {
    pub const ALL: [QueueState; 4] = [
        QueueState::Queued,
        QueueState::Processing,
        QueueState::Completed,
        QueueState::Failed,
    ];

    /// Name of the directory holding items in this state.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Queued => QUEUED_DIR_NAME,
            Self::Processing => PROCESSING_DIR_NAME,
            Self::Completed => COMPLETED_DIR_NAME,
            Self::Failed => FAILED_DIR_NAME,
        }
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// True for file names the queue accepts as payloads (`*.json`).
///
/// Staging files such as `.x.json.tmp` are ignored so producers can write in
/// place and rename.
pub fn is_queue_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == QUEUE_FILE_EXTENSION)
        && !name.starts_with('.')
}

/// The four lifecycle directories under one queue root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDirs {
    root: PathBuf,
}

impl QueueDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `state`.
    pub fn dir(&self, state: QueueState) -> PathBuf {
        self.root.join(state.dir_name())
    }

    /// Path of `name` while in `state`.
    pub fn path(&self, state: QueueState, name: &str) -> PathBuf {
        self.dir(state).join(name)
    }

    /// Create all four directories. Idempotent.
    pub async fn create_all(&self) -> QueueResult<()> {
        for state in QueueState::ALL {
            let dir = self.dir(state);
            fs::create_dir_all(&dir)
                .await
                .map_err(|source| QueueError::Io { path: dir, source })?;
        }
        Ok(())
    }

    /// Sorted names of payload files in `state`. A missing directory is empty.
    pub async fn list(&self, state: QueueState) -> QueueResult<Vec<String>> {
        let dir = self.dir(state);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(QueueError::Io { path: dir, source }),
        };

        let mut names = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => return Err(QueueError::Io { path: dir, source }),
            };
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if is_queue_file(&name) {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Number of payload files in `state`.
    pub async fn count(&self, state: QueueState) -> QueueResult<usize> {
        Ok(self.list(state).await?.len())
    }

    /// Rename `name` from one lifecycle directory to another.
    pub async fn transition(&self, name: &str, from: QueueState, to: QueueState) -> io::Result<()> {
        fs::rename(self.path(from, name), self.path(to, name)).await
    }

    /// Move every item in `from` to `to`, in name order. Items that vanish
    /// mid-move are skipped, as are items whose name is already taken in
    /// `to`; those stay in `from`. Returns the names actually moved.
    pub async fn transition_all(&self, from: QueueState, to: QueueState) -> QueueResult<Vec<String>> {
        let mut moved = Vec::new();
        for name in self.list(from).await? {
            if fs::try_exists(self.path(to, &name)).await.unwrap_or(false) {
                tracing::warn!(
                    file = %name,
                    %from,
                    %to,
                    "Destination already holds an item with this name, leaving it in place"
                );
                continue;
            }
            match self.transition(&name, from, to).await {
                Ok(()) => moved.push(name),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(file = %name, %from, %to, "Item vanished before move");
                }
                Err(source) => {
                    return Err(QueueError::Io {
                        path: self.path(from, &name),
                        source,
                    })
                }
            }
        }
        Ok(moved)
    }

    /// Submit a payload the way producers are expected to: write a hidden
    /// staging file inside `queue/`, then rename it to its final name.
    ///
    /// File names start with a zero-padded millisecond timestamp so name
    /// order follows submission order. Returns the final file name.
    pub async fn enqueue(&self, payload: &Value) -> QueueResult<String> {
        let name = format!(
            "{:016}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::now_v7(),
            QUEUE_FILE_EXTENSION
        );
        let staging = self.dir(QueueState::Queued).join(format!(".{name}.tmp"));
        let target = self.path(QueueState::Queued, &name);

        let body = serde_json::to_vec_pretty(payload).map_err(|source| QueueError::Payload {
            file: name.clone(),
            source,
        })?;

        let write = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&staging, &target).await
        };
        if let Err(source) = write.await {
            let _ = fs::remove_file(&staging).await;
            return Err(QueueError::Io {
                path: target,
                source,
            });
        }

        tracing::debug!(file = %name, "Submission enqueued");
        Ok(name)
    }
}
