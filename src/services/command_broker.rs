//! Command broker: a rendezvous queue between command producers and
//! long-lived waiting agents.
//!
//! All broker state (pending queue, waiter registry, bounded history) is
//! process-local and volatile, owned by one mutex. Waits are oneshot-channel
//! rendezvous with a deadline; each wait ends in exactly one of delivered,
//! cancelled, or timed out. The mutex is never held across an await.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration};

use crate::domain::clock::{mint_id, Clock};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    BrokerAction, BrokerHistoryEntry, CommandFilters, CommandInput, CommandPriority, CommandStatus,
    PendingCommand, SendOutcome, WaitingAgentInfo,
};
use crate::services::config::BrokerConfig;
use crate::services::event_bus::{EventBus, GraphEvent};

/// Options for `waitForCommand`.
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// Deadline; None uses the configured default (300 000 ms).
    pub timeout_ms: Option<u64>,
    pub filters: CommandFilters,
}

enum WaitSignal {
    Delivered(Box<PendingCommand>),
    Cancelled { reason: String },
}

struct Waiter {
    /// Distinguishes this registration from a later wait by the same agent,
    /// so a timed-out wait never removes its successor.
    token: String,
    agent_id: String,
    filters: CommandFilters,
    started_at: DateTime<Utc>,
    tx: oneshot::Sender<WaitSignal>,
}

#[derive(Default)]
struct BrokerState {
    pending: Vec<PendingCommand>,
    waiters: Vec<Waiter>,
    history: VecDeque<BrokerHistoryEntry>,
}

/// Rendezvous queue matching commands to waiting agents under filters,
/// priority, timeout, and cancellation.
pub struct CommandBroker {
    state: Mutex<BrokerState>,
    config: BrokerConfig,
    bus: Option<Arc<EventBus>>,
    clock: Clock,
}

impl CommandBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self { state: Mutex::new(BrokerState::default()), config, bus: None, clock: Clock::new() }
    }

    /// Fan broker events out over the shared bus.
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: GraphEvent) {
        if let Some(bus) = &self.bus {
            bus.publish(&event);
        }
    }

    /// Block until a matching command arrives, the wait is cancelled, or the
    /// deadline elapses. A second wait under the same agent id supersedes the
    /// first, which fails with a distinguishable cancellation cause.
    pub async fn wait_for_command(
        &self,
        agent_id: &str,
        options: WaitOptions,
    ) -> CoreResult<PendingCommand> {
        if agent_id.trim().is_empty() {
            return Err(CoreError::validation("agent id cannot be empty"));
        }
        let timeout_ms = options.timeout_ms.unwrap_or(self.config.wait_timeout_ms);
        let started_at = self.clock.now();

        let (token, mut rx) = {
            let mut state = self.lock();

            // At most one active wait per agent: supersede the previous one.
            if let Some(pos) = state.waiters.iter().position(|w| w.agent_id == agent_id) {
                let old = state.waiters.remove(pos);
                let reason = "superseded by new wait".to_string();
                let _ = old.tx.send(WaitSignal::Cancelled { reason: reason.clone() });
                Self::push_history(
                    &mut state,
                    self.config.history_capacity,
                    BrokerHistoryEntry {
                        timestamp: started_at,
                        action: BrokerAction::WaitFailed,
                        agent_id: Some(agent_id.to_string()),
                        detail: serde_json::json!({ "reason": reason }),
                    },
                );
                self.publish(GraphEvent::AgentWaitCancelled {
                    agent_id: agent_id.to_string(),
                    reason,
                });
            }

            // A pending command may satisfy the wait synchronously:
            // highest priority first, then oldest.
            if let Some(idx) = best_pending_match(&state.pending, &options.filters) {
                let mut command = state.pending.remove(idx);
                command.status = CommandStatus::Delivered;
                command.delivered_to = Some(agent_id.to_string());
                command.delivered_at = Some(self.clock.now());
                Self::push_history(
                    &mut state,
                    self.config.history_capacity,
                    BrokerHistoryEntry {
                        timestamp: started_at,
                        action: BrokerAction::CommandReceived,
                        agent_id: Some(agent_id.to_string()),
                        detail: command_detail(&command),
                    },
                );
                self.publish(GraphEvent::CommandDelivered {
                    command: command.clone(),
                    agent_id: agent_id.to_string(),
                });
                return Ok(command);
            }

            let (tx, rx) = oneshot::channel();
            let token = mint_id();
            state.waiters.push(Waiter {
                token: token.clone(),
                agent_id: agent_id.to_string(),
                filters: options.filters.clone(),
                started_at,
                tx,
            });
            Self::push_history(
                &mut state,
                self.config.history_capacity,
                BrokerHistoryEntry {
                    timestamp: started_at,
                    action: BrokerAction::WaitStarted,
                    agent_id: Some(agent_id.to_string()),
                    detail: serde_json::json!({
                        "timeoutMs": timeout_ms,
                        "filters": options.filters,
                    }),
                },
            );
            self.publish(GraphEvent::AgentWaiting {
                agent_id: agent_id.to_string(),
                filters: options.filters.clone(),
            });
            (token, rx)
        };

        match timeout(Duration::from_millis(timeout_ms), &mut rx).await {
            Ok(Ok(WaitSignal::Delivered(command))) => Ok(*command),
            Ok(Ok(WaitSignal::Cancelled { reason })) => {
                Err(CoreError::WaitCancelled { agent_id: agent_id.to_string(), reason })
            }
            Ok(Err(_closed)) => Err(CoreError::Internal(
                "wait channel closed without a terminal signal".to_string(),
            )),
            Err(_elapsed) => {
                let mut state = self.lock();
                if let Some(pos) = state.waiters.iter().position(|w| w.token == token) {
                    state.waiters.remove(pos);
                    Self::push_history(
                        &mut state,
                        self.config.history_capacity,
                        BrokerHistoryEntry {
                            timestamp: self.clock.now(),
                            action: BrokerAction::WaitFailed,
                            agent_id: Some(agent_id.to_string()),
                            detail: serde_json::json!({
                                "reason": "timeout",
                                "timeoutMs": timeout_ms,
                            }),
                        },
                    );
                    return Err(CoreError::WaitTimeout {
                        agent_id: agent_id.to_string(),
                        timeout_ms,
                    });
                }
                drop(state);
                // Deadline raced a concurrent resolution: the signal is
                // already in the channel.
                match rx.try_recv() {
                    Ok(WaitSignal::Delivered(command)) => Ok(*command),
                    Ok(WaitSignal::Cancelled { reason }) => {
                        Err(CoreError::WaitCancelled { agent_id: agent_id.to_string(), reason })
                    }
                    Err(_) => Err(CoreError::WaitTimeout {
                        agent_id: agent_id.to_string(),
                        timeout_ms,
                    }),
                }
            }
        }
    }

    /// Deliver a command to the earliest-registered waiter whose filters
    /// accept it, or queue it as PENDING.
    pub async fn send_command(&self, input: CommandInput) -> CoreResult<SendOutcome> {
        input.validate()?;
        let mut command = PendingCommand {
            id: input.id.unwrap_or_else(mint_id),
            command_type: input.command_type,
            source: input.source.unwrap_or_else(|| "external".to_string()),
            payload: input.payload,
            priority: input.priority.unwrap_or_default(),
            target_component_ids: input.target_component_ids,
            task_type: input.task_type,
            created_at: self.clock.now(),
            status: CommandStatus::Pending,
            delivered_to: None,
            delivered_at: None,
        };

        let mut state = self.lock();
        let mut idx = 0;
        while idx < state.waiters.len() {
            if !state.waiters[idx].filters.accepts(&command) {
                idx += 1;
                continue;
            }
            let waiter = state.waiters.remove(idx);
            command.status = CommandStatus::Delivered;
            command.delivered_to = Some(waiter.agent_id.clone());
            command.delivered_at = Some(self.clock.now());
            match waiter.tx.send(WaitSignal::Delivered(Box::new(command.clone()))) {
                Ok(()) => {
                    Self::push_history(
                        &mut state,
                        self.config.history_capacity,
                        BrokerHistoryEntry {
                            timestamp: self.clock.now(),
                            action: BrokerAction::CommandSent,
                            agent_id: Some(waiter.agent_id.clone()),
                            detail: command_detail(&command),
                        },
                    );
                    self.publish(GraphEvent::CommandDelivered {
                        command: command.clone(),
                        agent_id: waiter.agent_id.clone(),
                    });
                    return Ok(SendOutcome {
                        delivered: true,
                        agent_id: Some(waiter.agent_id),
                        command,
                    });
                }
                Err(_) => {
                    // The waiter's future was dropped mid-registration; put
                    // the command back up for grabs and keep scanning.
                    command.status = CommandStatus::Pending;
                    command.delivered_to = None;
                    command.delivered_at = None;
                }
            }
        }

        state.pending.push(command.clone());
        Self::push_history(
            &mut state,
            self.config.history_capacity,
            BrokerHistoryEntry {
                timestamp: self.clock.now(),
                action: BrokerAction::CommandQueued,
                agent_id: None,
                detail: command_detail(&command),
            },
        );
        self.publish(GraphEvent::CommandQueued(command.clone()));
        Ok(SendOutcome { delivered: false, agent_id: None, command })
    }

    /// Remove a PENDING command. No-op (returns false) when the id is
    /// unknown or the command already reached a terminal state.
    pub fn cancel_command(&self, id: &str) -> bool {
        let mut state = self.lock();
        let Some(pos) = state.pending.iter().position(|c| c.id == id) else {
            return false;
        };
        let mut command = state.pending.remove(pos);
        command.status = CommandStatus::Cancelled;
        Self::push_history(
            &mut state,
            self.config.history_capacity,
            BrokerHistoryEntry {
                timestamp: self.clock.now(),
                action: BrokerAction::CommandCancelled,
                agent_id: None,
                detail: command_detail(&command),
            },
        );
        true
    }

    /// Reject an agent's active wait. No-op (returns false) when the agent
    /// has no active wait.
    pub fn cancel_wait(&self, agent_id: &str) -> bool {
        let mut state = self.lock();
        let Some(pos) = state.waiters.iter().position(|w| w.agent_id == agent_id) else {
            return false;
        };
        let waiter = state.waiters.remove(pos);
        let reason = "cancelled by external request".to_string();
        let _ = waiter.tx.send(WaitSignal::Cancelled { reason: reason.clone() });
        Self::push_history(
            &mut state,
            self.config.history_capacity,
            BrokerHistoryEntry {
                timestamp: self.clock.now(),
                action: BrokerAction::WaitFailed,
                agent_id: Some(agent_id.to_string()),
                detail: serde_json::json!({ "reason": reason }),
            },
        );
        self.publish(GraphEvent::AgentWaitCancelled { agent_id: agent_id.to_string(), reason });
        true
    }

    /// Snapshot of currently waiting agents, in registration order.
    pub fn get_waiting_agents(&self) -> Vec<WaitingAgentInfo> {
        let now = Utc::now();
        let state = self.lock();
        state
            .waiters
            .iter()
            .map(|w| WaitingAgentInfo {
                agent_id: w.agent_id.clone(),
                filters: w.filters.clone(),
                started_at: w.started_at,
                elapsed_ms: (now - w.started_at).num_milliseconds().max(0) as u64,
            })
            .collect()
    }

    /// PENDING commands in delivery order: priority descending, then oldest
    /// first.
    pub fn get_pending_commands(&self) -> Vec<PendingCommand> {
        let state = self.lock();
        let mut pending = state.pending.clone();
        pending.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| a.created_at.cmp(&b.created_at))
        });
        pending
    }

    /// Newest `limit` history entries, newest first.
    pub fn get_history(&self, limit: Option<usize>) -> Vec<BrokerHistoryEntry> {
        let state = self.lock();
        let limit = limit.unwrap_or(state.history.len());
        state.history.iter().rev().take(limit).cloned().collect()
    }

    fn push_history(state: &mut BrokerState, capacity: usize, entry: BrokerHistoryEntry) {
        state.history.push_back(entry);
        while state.history.len() > capacity {
            state.history.pop_front();
        }
    }
}

/// Index of the best pending match: highest priority, oldest within a
/// priority.
fn best_pending_match(pending: &[PendingCommand], filters: &CommandFilters) -> Option<usize> {
    pending
        .iter()
        .enumerate()
        .filter(|(_, command)| filters.accepts(command))
        .max_by(|(_, a), (_, b)| {
            a.priority.cmp(&b.priority).then_with(|| b.created_at.cmp(&a.created_at))
        })
        .map(|(idx, _)| idx)
}

fn command_detail(command: &PendingCommand) -> serde_json::Value {
    serde_json::json!({
        "id": command.id,
        "type": command.command_type,
        "priority": command.priority,
        "taskType": command.task_type,
        "targetComponentIds": command.target_component_ids,
        "status": command.status.as_str(),
        "deliveredTo": command.delivered_to,
    })
}
