//! File-change notification for `queue/`.
//!
//! The watcher only shortens the time between a producer's rename and the
//! worker noticing it. Notification backends can drop events, so the
//! reconciliation sweep in [`super::ingestion_queue`] remains the mechanism
//! that guarantees every file is eventually seen.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use intake_core::{QueueError, QueueResult};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::queue_dirs::is_queue_file;

/// Producer side of the worker's pending list.
///
/// Names are deduplicated against the set of names already waiting, so the
/// watcher and the sweep can both report the same file without it being
/// dequeued twice.
#[derive(Debug, Clone)]
pub(crate) struct PendingQueue {
    tx: mpsc::UnboundedSender<String>,
    waiting: Arc<Mutex<HashSet<String>>>,
}

impl PendingQueue {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<String>,
        waiting: Arc<Mutex<HashSet<String>>>,
    ) -> Self {
        Self { tx, waiting }
    }

    /// Add `name` unless it is already waiting. Returns true if added.
    pub(crate) fn push(&self, name: String) -> bool {
        let mut waiting = self.waiting.lock().unwrap_or_else(|p| p.into_inner());
        if !waiting.insert(name.clone()) {
            return false;
        }
        if self.tx.send(name.clone()).is_err() {
            // Worker has exited; nothing will ever drain this entry.
            waiting.remove(&name);
            return false;
        }
        true
    }
}

/// Start watching `dir` and push every payload file that appears in it.
pub(crate) fn watch_queue_dir(dir: &Path, pending: PendingQueue) -> QueueResult<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => forward_event(&event, &pending),
        Err(e) => tracing::warn!(error = %e, "Queue watcher reported an error"),
    })
    .map_err(|e| QueueError::Watch {
        reason: e.to_string(),
    })?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| QueueError::Watch {
            reason: format!("{}: {}", dir.display(), e),
        })?;

    tracing::debug!(dir = %dir.display(), "Queue watcher started");
    Ok(watcher)
}

fn forward_event(event: &Event, pending: &PendingQueue) {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    ) {
        return;
    }

    for path in &event.paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Rename events also fire for files leaving the directory.
        if is_queue_file(name) && path.is_file() && pending.push(name.to_string()) {
            tracing::trace!(file = name, "Queue watcher picked up file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind, RenameMode};
    use tempfile::TempDir;

    fn pending_queue() -> (
        PendingQueue,
        mpsc::UnboundedReceiver<String>,
        Arc<Mutex<HashSet<String>>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let waiting = Arc::new(Mutex::new(HashSet::new()));
        (PendingQueue::new(tx, Arc::clone(&waiting)), rx, waiting)
    }

    #[test]
    fn test_push_deduplicates_waiting_names() {
        let (pending, mut rx, waiting) = pending_queue();
        assert!(pending.push("a.json".to_string()));
        assert!(!pending.push("a.json".to_string()));
        assert_eq!(rx.try_recv().ok(), Some("a.json".to_string()));
        assert!(rx.try_recv().is_err());

        waiting.lock().expect("lock").remove("a.json");
        assert!(pending.push("a.json".to_string()));
    }

    #[test]
    fn test_push_after_receiver_dropped_is_rejected() {
        let (pending, rx, waiting) = pending_queue();
        drop(rx);
        assert!(!pending.push("a.json".to_string()));
        assert!(waiting.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_forward_event_filters_kinds_and_names() {
        let dir = TempDir::new().expect("TempDir creation should succeed");
        let present = dir.path().join("present.json");
        std::fs::write(&present, b"{}").expect("seed");
        let staging = dir.path().join(".present.json.tmp");
        std::fs::write(&staging, b"{}").expect("seed");
        let gone = dir.path().join("gone.json");

        let (pending, mut rx, _waiting) = pending_queue();

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(present.clone())
            .add_path(staging);
        forward_event(&created, &pending);

        let renamed_away =
            Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From))).add_path(gone);
        forward_event(&renamed_away, &pending);

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(present);
        forward_event(&removed, &pending);

        assert_eq!(rx.try_recv().ok(), Some("present.json".to_string()));
        assert!(rx.try_recv().is_err());
    }
}
