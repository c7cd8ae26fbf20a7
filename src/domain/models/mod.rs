//! Domain models: the entity records of the codebase knowledge graph.

pub mod change;
pub mod command;
pub mod comment;
pub mod component;
pub mod relationship;
pub mod snapshot;
pub mod task;

pub use change::{ChangeEvent, ChangeOperation, EntityKind, EntityState, JournalStats, Provenance};
pub use command::{
    BrokerAction, BrokerHistoryEntry, CommandFilters, CommandInput, CommandPriority, CommandStatus,
    PendingCommand, SendOutcome, WaitingAgentInfo,
};
pub use comment::{Comment, NewComment};
pub use component::{
    Component, ComponentFilter, ComponentKind, ComponentPatch, Metadata, MetadataValue,
    NewComponent,
};
pub use relationship::{
    ComponentRelation, Direction, NewRelationship, Relationship, RelationshipType, TemporalHint,
};
pub use snapshot::{GraphDump, RestoreCounts, Snapshot, SnapshotMeta};
pub use task::{
    NewTask, OrderDirection, Task, TaskOrder, TaskSearch, TaskStatus,
};
