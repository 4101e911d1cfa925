//! Event publisher that logs and appends to a JSON-lines file.

use std::path::PathBuf;

use dbscale_autoscale::{DownstreamEvent, EventPublisher};
use dbscale_core::BoxFuture;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub struct FileEventPublisher {
    path: Option<PathBuf>,
}

impl FileEventPublisher {
    /// Without a path, events are only logged.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl EventPublisher for FileEventPublisher {
    fn publish<'a>(&'a self, event: &'a DownstreamEvent) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            info!(
                kind = %event.kind,
                project_id = %event.payload.project_id,
                instance_id = %event.payload.instance_id,
                suggested_size = event.payload.suggested_size,
                topic = event.topic.as_deref().unwrap_or("-"),
                "downstream event"
            );

            let Some(path) = &self.path else {
                return Ok(());
            };
            let mut line = serde_json::to_vec(event)?;
            line.push(b'\n');
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(&line).await?;
            file.flush().await?;
            Ok(())
        })
    }
}
