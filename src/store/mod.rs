use std::ops::Deref;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use uuid::Uuid;

pub use error::{ConcurrencyConflict, StoreError};

use crate::state::AggregateState;
use crate::types::{GlobalPosition, SequenceNumber};
use crate::Aggregate;

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

/// An EventStore is responsible for persisting events that an aggregate emits into a database, and loading the events
/// that represent an aggregate's history from the database.
#[async_trait]
pub trait EventStore {
    type Aggregate: crate::Aggregate;

    /// Loads the events that an aggregate instance has emitted in the past, ordered by sequence number.
    async fn by_aggregate_id(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Vec<StoreEvent<<Self::Aggregate as Aggregate>::Event>>, StoreError>;

    /// Persists multiple events into the database. This should be done in a single transaction - either
    /// all the events are persisted correctly, or none are.
    ///
    /// The sequence number held by `aggregate_state` is the expected version of the stream: if another
    /// writer appended in between, the call fails with [`StoreError::Conflict`] and nothing is written.
    ///
    /// Every configured transactional event handler runs inside the same transaction; if one of them
    /// fails the whole append is rolled back. On success the state is moved forward and the events are
    /// published on the configured event buses.
    async fn persist(
        &self,
        aggregate_state: &mut AggregateState<<Self::Aggregate as Aggregate>::State>,
        events: Vec<<Self::Aggregate as Aggregate>::Event>,
    ) -> Result<Vec<StoreEvent<<Self::Aggregate as Aggregate>::Event>>, StoreError>;

    /// Returns a stream over every committed event with a global position greater than `after`,
    /// across all the aggregate instances, ordered by global position.
    fn stream_events(
        &self,
        after: GlobalPosition,
    ) -> BoxStream<'_, Result<StoreEvent<<Self::Aggregate as Aggregate>::Event>, StoreError>>;

    /// Publish multiple events on the configured events buses.
    async fn publish(&self, store_events: &[StoreEvent<<Self::Aggregate as Aggregate>::Event>]);
}

/// Blanket implementation making an [`EventStore`] every (smart) pointer to an [`EventStore`],
/// e.g. `&Store`, `Box<Store>`, `Arc<Store>`.
#[async_trait]
impl<A, S, T> EventStore for T
where
    A: Aggregate,
    A::State: Send,
    S: EventStore<Aggregate = A> + ?Sized + Send + Sync + 'static,
    T: Deref<Target = S> + Send + Sync,
{
    type Aggregate = A;

    /// Deref call to [`EventStore::by_aggregate_id`].
    async fn by_aggregate_id(&self, aggregate_id: Uuid) -> Result<Vec<StoreEvent<A::Event>>, StoreError> {
        self.deref().by_aggregate_id(aggregate_id).await
    }

    /// Deref call to [`EventStore::persist`].
    async fn persist(
        &self,
        aggregate_state: &mut AggregateState<A::State>,
        events: Vec<A::Event>,
    ) -> Result<Vec<StoreEvent<A::Event>>, StoreError> {
        self.deref().persist(aggregate_state, events).await
    }

    /// Deref call to [`EventStore::stream_events`].
    fn stream_events(&self, after: GlobalPosition) -> BoxStream<'_, Result<StoreEvent<A::Event>, StoreError>> {
        self.deref().stream_events(after)
    }

    /// Deref call to [`EventStore::publish`].
    async fn publish(&self, store_events: &[StoreEvent<A::Event>]) {
        self.deref().publish(store_events).await
    }
}

/// A `StoreEvent` contains the payload (the original event) alongside the event's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent<Event> {
    /// Uniquely identifies an event among all events emitted from all aggregates.
    pub id: Uuid,
    /// The aggregate instance that emitted the event.
    pub aggregate_id: Uuid,
    /// The original, emitted, event.
    pub payload: Event,
    /// The timestamp of when the event is persisted.
    pub occurred_on: DateTime<Utc>,
    /// The sequence number of the event, within its specific aggregate instance. Starts from 1.
    pub sequence_number: SequenceNumber,
    /// The position of the event in the log spanning every aggregate instance.
    pub global_position: GlobalPosition,
}

impl<Event> StoreEvent<Event> {
    /// Returns the sequence number of the event, within its specific aggregate instance.
    pub const fn sequence_number(&self) -> &SequenceNumber {
        &self.sequence_number
    }

    /// Returns the original, emitted, event.
    pub const fn payload(&self) -> &Event {
        &self.payload
    }
}

impl<E: crate::Event> StoreEvent<E> {
    /// Returns the type tag of the payload.
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}
