//! Codegraph - coordination core for software-engineering agents.
//!
//! A shared, versioned knowledge graph of codebase entities (components,
//! relationships, tasks, comments) with:
//! - Graph store with cascade deletes, bulk transactions, and search
//! - Append-only change journal with time-travel replay
//! - Named snapshots with atomic restore
//! - Command broker: a rendezvous queue matching commands to waiting agents
//!   under filters, priorities, timeouts, and cancellation
//! - In-process event bus with bounded per-subscriber mailboxes
//! - SQLite persistence with WAL mode
//!
//! External transports (MCP, HTTP/SSE, CLI) sit outside this crate and talk
//! to the [`services::facade::CodegraphApi`] entry point.

pub mod adapters;
pub mod domain;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{CoreError, CoreResult, ErrorKind};
pub use services::config::CoreConfig;
pub use services::facade::CodegraphApi;
