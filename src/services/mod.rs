//! Application services for the codegraph core.

pub mod change_journal;
pub mod command_broker;
pub mod config;
pub mod event_bus;
pub mod facade;
pub mod graph_store;
pub mod snapshot_engine;

pub use change_journal::{ChangeHistoryQuery, ChangeJournal};
pub use command_broker::{CommandBroker, WaitOptions};
pub use config::{BrokerConfig, ConfigError, CoreConfig, DatabaseConfig, EventBusConfig};
pub use event_bus::{EventBus, EventKind, GraphEvent, Subscription};
pub use facade::CodegraphApi;
pub use graph_store::{CodebaseOverview, GraphStore, COMPONENT_SEARCH_LIMIT};
pub use snapshot_engine::{
    PlannedOperation, ReplayOutcome, ReplayReport, RestoreReport, SnapshotEngine,
};
