//! Crash-safe file replacement.
//!
//! Every write stages the full new content next to the target, fsyncs it,
//! checks the staged file is non-empty and then renames it over the target.
//! Same-volume rename is atomic, so readers of the target see either the old
//! or the new content and never a mix of the two.

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Bounded retry schedule for transient write errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Backoff step; attempt `n` sleeps `n * backoff` before retrying.
    pub backoff: Duration,
}

/// A write that could not be completed.
#[derive(Debug)]
pub struct WriteFailure {
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Error from the final attempt.
    pub source: io::Error,
}

/// Lock and contention errors that are worth retrying.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ResourceBusy
    )
}

/// Atomically replace `target` with `data`, staging through `staging`.
///
/// `staging` must live in the same directory as `target`.
pub async fn write_atomic(
    staging: &Path,
    target: &Path,
    data: &[u8],
    policy: RetryPolicy,
) -> Result<(), WriteFailure> {
    retry_write(staging, target, policy, || write_once(staging, target, data)).await
}

/// Run `step` until it succeeds, fails with a non-transient error or uses up
/// the policy's attempts. The staging file is removed on final failure.
pub(crate) async fn retry_write<F, Fut>(
    staging: &Path,
    target: &Path,
    policy: RetryPolicy,
    mut step: F,
) -> Result<(), WriteFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let max_attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match step().await {
            Ok(()) => return Ok(()),
            Err(e) if is_transient(&e) && attempt < max_attempts => {
                tracing::warn!(
                    path = %target.display(),
                    attempt,
                    max_attempts,
                    error = %e,
                    "Transient write error, retrying"
                );
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => {
                discard_staging(staging).await;
                return Err(WriteFailure {
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}

async fn write_once(staging: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    stage(staging, data).await?;
    publish(staging, target, data).await
}

/// Rename the staged file over `target`, then fsync the directory.
async fn publish(staging: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    match fs::rename(staging, target).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // Staging file vanished between creation and rename; one recreate.
            tracing::warn!(
                staging = %staging.display(),
                "Staging file disappeared before rename, recreating"
            );
            stage(staging, data).await?;
            fs::rename(staging, target).await?;
        }
        Err(e) => return Err(e),
    }

    sync_parent_dir(target).await;
    Ok(())
}

async fn stage(staging: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(staging).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    let staged_len = fs::metadata(staging).await?.len();
    if staged_len == 0 && !data.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("staging file {} is empty after write", staging.display()),
        ));
    }
    Ok(())
}

async fn discard_staging(staging: &Path) {
    match fs::remove_file(staging).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            staging = %staging.display(),
            error = %e,
            "Failed to remove staging file"
        ),
    }
}

#[cfg(unix)]
async fn sync_parent_dir(target: &Path) {
    let Some(parent) = target.parent() else {
        return;
    };
    let result = match fs::File::open(parent).await {
        Ok(dir) => dir.sync_all().await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::debug!(dir = %parent.display(), error = %e, "Directory fsync skipped");
    }
}

#[cfg(not(unix))]
async fn sync_parent_dir(_target: &Path) {}
