//! Snapshot storage port.

use async_trait::async_trait;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Snapshot, SnapshotMeta};

/// Persistence for labeled graph captures. Snapshots are never deleted by
/// restore or replay.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn save(&self, snapshot: &Snapshot) -> CoreResult<()>;

    /// Listing without payloads, newest first.
    async fn list(&self) -> CoreResult<Vec<SnapshotMeta>>;

    async fn get(&self, id: &str) -> CoreResult<Option<Snapshot>>;
}
