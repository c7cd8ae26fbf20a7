//! In-process event bus with bounded per-subscriber mailboxes.
//!
//! Publishers never await subscribers: delivery is a non-blocking `try_send`
//! into each subscriber's mailbox. A subscriber whose mailbox overflows is
//! dropped with an error log; a subscriber whose receiver was dropped is
//! pruned silently on the next publish.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::domain::models::{CommandFilters, Component, PendingCommand, Relationship, Task};

/// Stable event names visible at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ComponentCreated,
    ComponentUpdated,
    ComponentDeleted,
    RelationshipCreated,
    TaskCreated,
    TaskUpdated,
    ComponentsBulkCreated,
    RelationshipsBulkCreated,
    TasksBulkCreated,
    CommandQueued,
    CommandDelivered,
    AgentWaiting,
    AgentWaitCancelled,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComponentCreated => "component-created",
            Self::ComponentUpdated => "component-updated",
            Self::ComponentDeleted => "component-deleted",
            Self::RelationshipCreated => "relationship-created",
            Self::TaskCreated => "task-created",
            Self::TaskUpdated => "task-updated",
            Self::ComponentsBulkCreated => "components-bulk-created",
            Self::RelationshipsBulkCreated => "relationships-bulk-created",
            Self::TasksBulkCreated => "tasks-bulk-created",
            Self::CommandQueued => "command-queued",
            Self::CommandDelivered => "command-delivered",
            Self::AgentWaiting => "agent-waiting",
            Self::AgentWaitCancelled => "agent-wait-cancelled",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events fanned out by the core to subscribed transports.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    ComponentCreated(Component),
    ComponentUpdated(Component),
    ComponentDeleted { id: String },
    RelationshipCreated(Relationship),
    TaskCreated(Task),
    TaskUpdated(Task),
    ComponentsBulkCreated { items: Vec<Component>, count: usize },
    RelationshipsBulkCreated { items: Vec<Relationship>, count: usize },
    TasksBulkCreated { items: Vec<Task>, count: usize },
    CommandQueued(PendingCommand),
    CommandDelivered { command: PendingCommand, agent_id: String },
    AgentWaiting { agent_id: String, filters: CommandFilters },
    AgentWaitCancelled { agent_id: String, reason: String },
}

impl GraphEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ComponentCreated(_) => EventKind::ComponentCreated,
            Self::ComponentUpdated(_) => EventKind::ComponentUpdated,
            Self::ComponentDeleted { .. } => EventKind::ComponentDeleted,
            Self::RelationshipCreated(_) => EventKind::RelationshipCreated,
            Self::TaskCreated(_) => EventKind::TaskCreated,
            Self::TaskUpdated(_) => EventKind::TaskUpdated,
            Self::ComponentsBulkCreated { .. } => EventKind::ComponentsBulkCreated,
            Self::RelationshipsBulkCreated { .. } => EventKind::RelationshipsBulkCreated,
            Self::TasksBulkCreated { .. } => EventKind::TasksBulkCreated,
            Self::CommandQueued(_) => EventKind::CommandQueued,
            Self::CommandDelivered { .. } => EventKind::CommandDelivered,
            Self::AgentWaiting { .. } => EventKind::AgentWaiting,
            Self::AgentWaitCancelled { .. } => EventKind::AgentWaitCancelled,
        }
    }
}

struct SubscriberSlot {
    id: u64,
    /// None subscribes to every event.
    interests: Option<HashSet<EventKind>>,
    tx: mpsc::Sender<GraphEvent>,
}

/// Handle owned by a subscriber; drop it to unsubscribe.
pub struct Subscription {
    pub id: u64,
    rx: mpsc::Receiver<GraphEvent>,
}

impl Subscription {
    /// Receive the next event; None when the bus dropped this subscriber.
    pub async fn recv(&mut self) -> Option<GraphEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<GraphEvent> {
        self.rx.try_recv().ok()
    }
}

/// Publish/subscribe fan-out for core events.
pub struct EventBus {
    subscribers: Mutex<Vec<SubscriberSlot>>,
    mailbox_capacity: usize,
    next_id: AtomicU64,
}

impl EventBus {
    pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            mailbox_capacity: mailbox_capacity.max(1),
            next_id: AtomicU64::new(0),
        }
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> Subscription {
        self.register(None)
    }

    /// Subscribe to a set of event kinds.
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> Subscription {
        self.register(Some(kinds.iter().copied().collect()))
    }

    fn register(&self, interests: Option<HashSet<EventKind>>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(SubscriberSlot { id, interests, tx });
        Subscription { id, rx }
    }

    /// Deliver an event to every interested subscriber without blocking.
    pub fn publish(&self, event: &GraphEvent) {
        let kind = event.kind();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.retain(|slot| {
            if let Some(interests) = &slot.interests {
                if !interests.contains(&kind) {
                    return true;
                }
            }
            match slot.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::error!(
                        subscriber_id = slot.id,
                        event = %kind,
                        "event bus subscriber mailbox overflowed; dropping subscriber"
                    );
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(
                        subscriber_id = slot.id,
                        "event bus subscriber disconnected; pruning"
                    );
                    false
                }
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAILBOX_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted(id: &str) -> GraphEvent {
        GraphEvent::ComponentDeleted { id: id.to_string() }
    }

    #[tokio::test]
    async fn delivers_to_all_subscribers() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(&deleted("c1"));

        for sub in [&mut a, &mut b] {
            match sub.recv().await.unwrap() {
                GraphEvent::ComponentDeleted { id } => assert_eq!(id, "c1"),
                other => panic!("unexpected event: {:?}", other.kind()),
            }
        }
    }

    #[tokio::test]
    async fn interest_filter_selects_kinds() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_to(&[EventKind::ComponentDeleted]);

        bus.publish(&GraphEvent::AgentWaitCancelled {
            agent_id: "a1".into(),
            reason: "test".into(),
        });
        bus.publish(&deleted("c2"));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::ComponentDeleted);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn overflowing_subscriber_is_dropped() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        // Fill the mailbox and overflow it: the third publish drops the slot.
        bus.publish(&deleted("a"));
        bus.publish(&deleted("b"));
        bus.publish(&deleted("c"));
        assert_eq!(bus.subscriber_count(), 0);

        // Queued events are still readable, then the stream ends.
        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn disconnected_subscriber_is_pruned() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        drop(sub);
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(&deleted("a"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn event_names_are_stable() {
        assert_eq!(EventKind::ComponentCreated.as_str(), "component-created");
        assert_eq!(EventKind::ComponentsBulkCreated.as_str(), "components-bulk-created");
        assert_eq!(EventKind::CommandQueued.as_str(), "command-queued");
        assert_eq!(EventKind::AgentWaitCancelled.as_str(), "agent-wait-cancelled");
    }
}
