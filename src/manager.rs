use uuid::Uuid;

use crate::store::{EventStore, StoreError, StoreEvent};
use crate::{Aggregate, AggregateState};

/// The AggregateManager is responsible for coupling the Aggregate with a Store, so that the events
/// can be persisted when handled, and the state can be reconstructed by loading and apply events sequentially.
///
/// The basic APIs are:
/// 1. handle_command
/// 2. load
pub struct AggregateManager<E>
where
    E: EventStore,
{
    event_store: E,
}

impl<E> AggregateManager<E>
where
    E: EventStore,
{
    /// Creates a new instance of an [`AggregateManager`].
    pub fn new(event_store: E) -> Self {
        Self { event_store }
    }

    /// Validates and handles the command onto the given state, and then passes the events to the store.
    ///
    /// The store transactional persists the events - recording it in the aggregate instance's history.
    /// The sequence number of `aggregate_state` is used as the expected version of the stream.
    pub async fn handle_command<Er>(
        &self,
        aggregate_state: &mut AggregateState<<E::Aggregate as Aggregate>::State>,
        command: <E::Aggregate as Aggregate>::Command,
    ) -> Result<Vec<StoreEvent<<E::Aggregate as Aggregate>::Event>>, Er>
    where
        Er: From<StoreError> + From<<E::Aggregate as Aggregate>::Error>,
    {
        let events: Vec<<E::Aggregate as Aggregate>::Event> =
            <E::Aggregate as Aggregate>::handle_command(aggregate_state.inner(), command)?;

        Ok(self.event_store.persist(aggregate_state, events).await?)
    }

    /// Loads an aggregate instance from the event store, by applying previously persisted events onto
    /// the aggregate state by order of their sequence number.
    pub async fn load(
        &self,
        aggregate_id: impl Into<Uuid> + Send,
    ) -> Result<Option<AggregateState<<E::Aggregate as Aggregate>::State>>, StoreError> {
        let aggregate_id: Uuid = aggregate_id.into();

        let store_events: Vec<StoreEvent<<E::Aggregate as Aggregate>::Event>> =
            self.event_store.by_aggregate_id(aggregate_id).await?;

        Ok(if store_events.is_empty() {
            None
        } else {
            let aggregate_state = AggregateState::with_id(aggregate_id);
            Some(aggregate_state.apply_store_events(store_events, <E::Aggregate as Aggregate>::apply_event))
        })
    }

    /// Like [`AggregateManager::load`], but returns an empty state at version zero when the stream
    /// doesn't exist yet.
    pub async fn load_or_default(
        &self,
        aggregate_id: impl Into<Uuid> + Send,
    ) -> Result<AggregateState<<E::Aggregate as Aggregate>::State>, StoreError> {
        let aggregate_id: Uuid = aggregate_id.into();
        Ok(self
            .load(aggregate_id)
            .await?
            .unwrap_or_else(|| AggregateState::with_id(aggregate_id)))
    }

    /// Returns the internal event store
    pub fn event_store(&self) -> &E {
        &self.event_store
    }
}
