use std::path::Path;

use async_trait::async_trait;

/// Trait for anything that wants to observe transfer progress.
///
/// Workers invoke these methods directly from their own task, outside the
/// registry lock; a presentation layer must treat them as arbitrary-task
/// calls. Updates for one transfer id are strictly ordered (a single worker
/// owns the write path); there is no ordering between different ids.
///
/// Lifecycle:
/// - `on_progress` fires after every written chunk.
/// - `on_complete` fires once when the stream is exhausted without
///   cancellation.
/// - `on_error` fires once when the transfer ends in the error state.
#[async_trait]
pub trait TransferObserver: Send + Sync + 'static {
    async fn on_progress(&self, id: &str, percent: f64, downloaded_bytes: u64, total_bytes: u64);

    async fn on_complete(&self, id: &str, filepath: &Path);

    async fn on_error(&self, id: &str, message: &str);
}
