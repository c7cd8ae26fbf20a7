//! Command broker domain model.
//!
//! Commands are typed requests queued for delivery to a matching waiting
//! agent. Broker state is process-local and volatile; only the bounded
//! history survives a delivered or cancelled command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::component::Metadata;

/// Delivery priority, totally ordered LOW < MEDIUM < HIGH < URGENT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Urgent = 4,
}

impl Default for CommandPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl CommandPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "URGENT" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a command: PENDING commands wait in the queue; DELIVERED and
/// CANCELLED are terminal and retained only in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Pending,
    Delivered,
    Cancelled,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A command awaiting (or past) delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCommand {
    pub id: String,
    /// Free-text verb, e.g. "EXECUTE_TASK".
    #[serde(rename = "type")]
    pub command_type: String,
    /// Who produced the command.
    pub source: String,
    #[serde(default)]
    pub payload: Metadata,
    #[serde(default)]
    pub priority: CommandPriority,
    /// Components the command targets; used by componentIds filters.
    #[serde(default)]
    pub target_component_ids: Vec<String>,
    /// Task category, matched against taskTypes filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Input shape for `sendCommand`. Missing id/timestamp are assigned and a
/// missing priority normalizes to MEDIUM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub command_type: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub payload: Metadata,
    #[serde(default)]
    pub priority: Option<CommandPriority>,
    #[serde(default)]
    pub target_component_ids: Vec<String>,
    #[serde(default)]
    pub task_type: Option<String>,
}

impl CommandInput {
    pub fn new(command_type: impl Into<String>) -> Self {
        Self { command_type: command_type.into(), ..Self::default() }
    }

    pub fn with_priority(mut self, priority: CommandPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn with_targets(mut self, target_component_ids: Vec<String>) -> Self {
        self.target_component_ids = target_component_ids;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.command_type.trim().is_empty() {
            return Err(CoreError::validation("command type cannot be empty"));
        }
        Ok(())
    }
}

/// Predicate an agent registers to select the commands it will accept.
///
/// A command matches when ALL present fields accept it; an empty filter
/// accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandFilters {
    /// Accept only these task types, when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_types: Option<Vec<String>>,
    /// Accept only commands targeting at least one of these components,
    /// when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_ids: Option<Vec<String>>,
    /// Accept only commands at or above this priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<CommandPriority>,
}

impl CommandFilters {
    pub fn accepts(&self, command: &PendingCommand) -> bool {
        if let Some(task_types) = &self.task_types {
            if !task_types.is_empty() {
                match &command.task_type {
                    Some(task_type) if task_types.contains(task_type) => {}
                    _ => return false,
                }
            }
        }
        if let Some(component_ids) = &self.component_ids {
            if !component_ids.is_empty()
                && !command.target_component_ids.iter().any(|id| component_ids.contains(id))
            {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if command.priority < min {
                return false;
            }
        }
        true
    }
}

/// Audit action recorded in the broker history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerAction {
    WaitStarted,
    WaitFailed,
    CommandReceived,
    CommandSent,
    CommandQueued,
    CommandCancelled,
}

impl BrokerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitStarted => "WAIT_STARTED",
            Self::WaitFailed => "WAIT_FAILED",
            Self::CommandReceived => "COMMAND_RECEIVED",
            Self::CommandSent => "COMMAND_SENT",
            Self::CommandQueued => "COMMAND_QUEUED",
            Self::CommandCancelled => "COMMAND_CANCELLED",
        }
    }
}

/// One row of the broker's bounded audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: BrokerAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Snapshot of the command or wait this entry describes.
    pub detail: serde_json::Value,
}

/// Introspection row for `getWaitingAgents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingAgentInfo {
    pub agent_id: String,
    pub filters: CommandFilters,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Result of `sendCommand`: whether a waiter took the command immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub command: PendingCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(
        priority: CommandPriority,
        task_type: Option<&str>,
        targets: &[&str],
    ) -> PendingCommand {
        PendingCommand {
            id: "cmd-1".into(),
            command_type: "EXECUTE_TASK".into(),
            source: "test".into(),
            payload: Metadata::new(),
            priority,
            target_component_ids: targets.iter().map(|s| (*s).to_string()).collect(),
            task_type: task_type.map(Into::into),
            created_at: Utc::now(),
            status: CommandStatus::Pending,
            delivered_to: None,
            delivered_at: None,
        }
    }

    #[test]
    fn priorities_are_totally_ordered() {
        assert!(CommandPriority::Low < CommandPriority::Medium);
        assert!(CommandPriority::Medium < CommandPriority::High);
        assert!(CommandPriority::High < CommandPriority::Urgent);
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filters = CommandFilters::default();
        assert!(filters.accepts(&command(CommandPriority::Low, None, &[])));
        assert!(filters.accepts(&command(CommandPriority::Urgent, Some("TESTING"), &["x"])));
    }

    #[test]
    fn task_type_filter() {
        let filters = CommandFilters {
            task_types: Some(vec!["TESTING".into()]),
            ..CommandFilters::default()
        };
        assert!(filters.accepts(&command(CommandPriority::Medium, Some("TESTING"), &[])));
        assert!(!filters.accepts(&command(CommandPriority::Medium, Some("DEPLOY"), &[])));
        assert!(!filters.accepts(&command(CommandPriority::Medium, None, &[])));
    }

    #[test]
    fn component_filter_matches_on_intersection() {
        let filters = CommandFilters {
            component_ids: Some(vec!["x".into(), "y".into()]),
            ..CommandFilters::default()
        };
        assert!(filters.accepts(&command(CommandPriority::Medium, None, &["y", "z"])));
        assert!(!filters.accepts(&command(CommandPriority::Medium, None, &["z"])));
        assert!(!filters.accepts(&command(CommandPriority::Medium, None, &[])));
    }

    #[test]
    fn min_priority_filter() {
        let filters = CommandFilters {
            min_priority: Some(CommandPriority::High),
            ..CommandFilters::default()
        };
        assert!(filters.accepts(&command(CommandPriority::High, None, &[])));
        assert!(filters.accepts(&command(CommandPriority::Urgent, None, &[])));
        assert!(!filters.accepts(&command(CommandPriority::Medium, None, &[])));
    }

    #[test]
    fn empty_vec_filters_accept_all() {
        // Present-but-empty sets behave like absent filters.
        let filters = CommandFilters {
            task_types: Some(vec![]),
            component_ids: Some(vec![]),
            min_priority: None,
        };
        assert!(filters.accepts(&command(CommandPriority::Low, None, &[])));
    }

    #[test]
    fn command_input_requires_type() {
        assert!(CommandInput::new("").validate().is_err());
        assert!(CommandInput::new("EXECUTE_TASK").validate().is_ok());
    }
}
