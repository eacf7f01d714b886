//! Intake Queue Operator Tool
//!
//! Inspects and repairs the queue directories named by `INTAKE_QUEUE_DIR`.
//! Works directly on the filesystem, so `recover` must only be run while the
//! service is stopped.
//!
//! Usage:
//!   intake-ops stats
//!   intake-ops retry-failed
//!   intake-ops enqueue <payload.json>
//!   intake-ops recover

use intake_api::telemetry::{init_tracer, TelemetryConfig};
use intake_api::{IntakeConfig, QueueDirs, QueueState};
use intake_core::{IntakeResult, QueueError};
use serde_json::{json, Value};

const USAGE: &str = "usage: intake-ops <stats | retry-failed | enqueue <file> | recover>";

#[tokio::main]
async fn main() -> IntakeResult<()> {
    init_tracer(&TelemetryConfig::default())?;

    let config = IntakeConfig::from_env();
    config.validate()?;
    let dirs = QueueDirs::new(config.queue.queue_root.clone());

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["stats"] => stats(&dirs).await,
        ["retry-failed"] => {
            let moved = dirs
                .transition_all(QueueState::Failed, QueueState::Queued)
                .await?;
            println!("{}", json!({ "requeued": moved }));
            Ok(())
        }
        ["enqueue", file] => enqueue(&dirs, file).await,
        ["recover"] => {
            let moved = dirs
                .transition_all(QueueState::Processing, QueueState::Queued)
                .await?;
            println!("{}", json!({ "recovered": moved }));
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

async fn stats(dirs: &QueueDirs) -> IntakeResult<()> {
    let mut counts = serde_json::Map::new();
    for state in QueueState::ALL {
        let count = dirs.count(state).await?;
        counts.insert(state.to_string(), json!(count));
    }
    println!("{}", Value::Object(counts));
    Ok(())
}

async fn enqueue(dirs: &QueueDirs, file: &str) -> IntakeResult<()> {
    let body = tokio::fs::read(file).await.map_err(|source| QueueError::Io {
        path: file.into(),
        source,
    })?;
    let payload: Value = serde_json::from_slice(&body).map_err(|source| QueueError::Payload {
        file: file.to_string(),
        source,
    })?;

    dirs.create_all().await?;
    let name = dirs.enqueue(&payload).await?;
    println!("{}", json!({ "enqueued": name }));
    Ok(())
}
