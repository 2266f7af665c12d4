use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::config::NotifierConfig;
use crate::store::StoreEvent;
use crate::types::{GlobalPosition, SequenceNumber};
use crate::Aggregate;

/// A committed fact, as handed to subscribers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub sequence_number: SequenceNumber,
    pub global_position: GlobalPosition,
    pub occurred_on: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// [`EventBus`] fanning committed facts out to every live subscriber.
///
/// Publishing never fails the append: having no subscribers, a lagging subscriber or a payload that
/// can't be encoded are only logged.
#[derive(Clone, Debug)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastEventBus {
    pub fn new(config: &NotifierConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self { sender }
    }

    /// Subscribes to every notification published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(&NotifierConfig::default())
    }
}

#[async_trait]
impl<A> EventBus<A> for BroadcastEventBus
where
    A: Aggregate,
{
    async fn publish(&self, store_event: &StoreEvent<A::Event>) {
        let payload = match serde_json::to_value(&store_event.payload) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!({
                    event_id = %store_event.id,
                    aggregate_id = %store_event.aggregate_id,
                    error = ?error,
                }, "failed to encode notification payload");
                return;
            }
        };

        let notification = Notification {
            event_type: store_event.event_type().to_string(),
            aggregate_id: store_event.aggregate_id,
            sequence_number: store_event.sequence_number,
            global_position: store_event.global_position,
            occurred_on: store_event.occurred_on,
            payload,
        };

        if let Err(error) = self.sender.send(notification) {
            tracing::debug!({
                event_id = %store_event.id,
                event_type = error.0.event_type.as_str(),
            }, "no subscriber listening for notification");
        }
    }
}
