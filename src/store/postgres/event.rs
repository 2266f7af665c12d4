use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::event::Event;
use crate::store::StoreEvent;
use crate::types::{GlobalPosition, SequenceNumber};

/// Event representation on the event store
#[derive(sqlx::FromRow, Debug)]
pub struct DbEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub occurred_on: DateTime<Utc>,
    pub sequence_number: SequenceNumber,
    pub global_position: GlobalPosition,
}

impl DbEvent {
    pub fn try_into_store_event<E: Event>(self) -> Result<StoreEvent<E>, serde_json::Error> {
        Ok(StoreEvent {
            id: self.id,
            aggregate_id: self.aggregate_id,
            payload: serde_json::from_value::<E>(self.payload)?,
            occurred_on: self.occurred_on,
            sequence_number: self.sequence_number,
            global_position: self.global_position,
        })
    }
}
