//! Background Jobs for the intake service
//!
//! - `ingestion_queue`: Drains `queue/` into the record store, one item at a time
//! - `queue_dirs`: Lifecycle directories and the producer-side `enqueue`
//! - `queue_watcher`: File-change notifications feeding the pending list
//!
//! # Usage
//!
//! ```ignore
//! use intake_api::jobs::{IngestionQueue, IngestionQueueConfig};
//!
//! let queue = IngestionQueue::new(IngestionQueueConfig::from_env(), creator);
//! queue.initialize().await?;
//!
//! // On shutdown
//! queue.stop().await;
//! ```

pub mod ingestion_queue;
pub mod queue_dirs;
mod queue_watcher;

// Re-export commonly used types
pub use ingestion_queue::{
    IngestionQueue, IngestionQueueConfig, QueueMetrics, QueueMetricsSnapshot, QueueStats,
};
pub use queue_dirs::{is_queue_file, QueueDirs, QueueState};
