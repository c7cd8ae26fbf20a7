//! Ports: the persistence interfaces the service layer depends on.

pub mod graph_backend;
pub mod journal_repository;
pub mod snapshot_repository;

pub use graph_backend::{CascadeReport, GraphBackend, KindCount};
pub use journal_repository::JournalRepository;
pub use snapshot_repository::SnapshotRepository;
