/// Realtime event fan-out
///
/// One logical channel exists per family (`family_<id>`). The registry
/// maps family IDs to tokio broadcast senders; WebSocket connections
/// subscribe after an explicit join and receive task lifecycle events.
///
/// Delivery is best-effort and at-most-once with no ordering guarantee
/// across channels: events are a cache-invalidation signal, clients
/// re-fetch rather than trusting payloads as authoritative. A client that
/// joins late or lags past the channel buffer simply misses events until
/// its next fetch; there is no replay.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::task::TaskWithAssignees;

/// Buffered events per channel before slow receivers start losing them.
const CHANNEL_CAPACITY: usize = 64;

/// Payload for task deletion events, which carry just the ID
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeleted {
    pub task_id: Uuid,
}

/// Events published to a family's channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum FamilyEvent {
    #[serde(rename = "task_created")]
    TaskCreated(TaskWithAssignees),

    #[serde(rename = "task_updated")]
    TaskUpdated(TaskWithAssignees),

    #[serde(rename = "task_deleted")]
    TaskDeleted(TaskDeleted),
}

impl FamilyEvent {
    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            FamilyEvent::TaskCreated(_) => "task_created",
            FamilyEvent::TaskUpdated(_) => "task_updated",
            FamilyEvent::TaskDeleted(_) => "task_deleted",
        }
    }
}

/// Wire name of a family's channel
pub fn channel_name(family_id: Uuid) -> String {
    format!("family_{}", family_id)
}

/// Registry mapping family IDs to their broadcast channels
///
/// Senders are created lazily on first use and pruned once no receiver is
/// left, so the map only holds families someone is currently watching.
/// Publishing requires only a read lock on the map.
#[derive(Debug, Default)]
pub struct FamilyChannels {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<FamilyEvent>>>,
}

impl FamilyChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a family's channel, creating it if needed
    pub fn subscribe(&self, family_id: Uuid) -> broadcast::Receiver<FamilyEvent> {
        if let Some(sender) = self.channels.read().expect("channel registry poisoned").get(&family_id) {
            return sender.subscribe();
        }

        let mut channels = self.channels.write().expect("channel registry poisoned");
        channels
            .entry(family_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publishes an event to everyone watching a family
    ///
    /// Best-effort: if nobody is subscribed the event is dropped, and a
    /// channel whose last receiver disconnected is pruned from the map.
    pub fn publish(&self, family_id: Uuid, event: FamilyEvent) {
        let delivered = {
            let channels = self.channels.read().expect("channel registry poisoned");
            match channels.get(&family_id) {
                Some(sender) => sender.send(event).is_ok(),
                None => return,
            }
        };

        if !delivered {
            tracing::debug!(
                channel = %channel_name(family_id),
                "No active subscribers, pruning channel"
            );
            let mut channels = self.channels.write().expect("channel registry poisoned");
            if let Some(sender) = channels.get(&family_id) {
                if sender.receiver_count() == 0 {
                    channels.remove(&family_id);
                }
            }
        }
    }

    /// Number of currently registered channels, for diagnostics
    pub fn channel_count(&self) -> usize {
        self.channels.read().expect("channel registry poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{Task, TaskPriority, TaskStatus};
    use chrono::Utc;

    fn sample_event(family_id: Uuid) -> FamilyEvent {
        FamilyEvent::TaskCreated(TaskWithAssignees {
            task: Task {
                id: Uuid::new_v4(),
                family_id,
                created_by: Uuid::new_v4(),
                title: "Buy milk".to_string(),
                description: None,
                priority: TaskPriority::Normal,
                status: TaskStatus::Todo,
                due_date: None,
                image_url: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            assignees: Vec::new(),
        })
    }

    #[test]
    fn test_channel_name() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            channel_name(id),
            "family_550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_event_serialization_shape() {
        let family_id = Uuid::new_v4();
        let json = serde_json::to_value(sample_event(family_id)).unwrap();
        assert_eq!(json["event"], "task_created");
        assert!(json["data"].get("title").is_some());

        let deleted = FamilyEvent::TaskDeleted(TaskDeleted {
            task_id: Uuid::new_v4(),
        });
        let json = serde_json::to_value(&deleted).unwrap();
        assert_eq!(json["event"], "task_deleted");
        assert!(json["data"].get("taskId").is_some());
    }

    #[tokio::test]
    async fn test_subscribe_then_publish() {
        let channels = FamilyChannels::new();
        let family_id = Uuid::new_v4();

        let mut rx = channels.subscribe(family_id);
        channels.publish(family_id, sample_event(family_id));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "task_created");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let channels = FamilyChannels::new();
        channels.publish(Uuid::new_v4(), sample_event(Uuid::new_v4()));
        assert_eq!(channels.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_pruned_after_last_receiver_drops() {
        let channels = FamilyChannels::new();
        let family_id = Uuid::new_v4();

        let rx = channels.subscribe(family_id);
        assert_eq!(channels.channel_count(), 1);
        drop(rx);

        channels.publish(family_id, sample_event(family_id));
        assert_eq!(channels.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_channels_are_isolated_per_family() {
        let channels = FamilyChannels::new();
        let family_a = Uuid::new_v4();
        let family_b = Uuid::new_v4();

        let mut rx_a = channels.subscribe(family_a);
        let mut rx_b = channels.subscribe(family_b);

        channels.publish(family_a, sample_event(family_a));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
