use uuid::Uuid;

use crate::store::StoreEvent;
use crate::types::SequenceNumber;

/// The internal state for an Aggregate.
///
/// It contains:
/// - an id uniquely representing the aggregate,
/// - an incremental sequence number, the stream version the state was loaded at,
/// - a state defined by the user of this library.
///
/// The sequence number is the expected version handed to the event store on the next append.
#[derive(Debug, Clone)]
pub struct AggregateState<S> {
    id: Uuid,
    sequence_number: SequenceNumber,
    inner: S,
}

impl<S: Default> Default for AggregateState<S> {
    fn default() -> Self {
        Self::with_id(Uuid::new_v4())
    }
}

impl<S: Default> AggregateState<S> {
    /// Creates a new instance of an [`AggregateState`] with the given aggregate id. The state starts
    /// at version zero, meaning "no stream yet".
    pub fn with_id(id: impl Into<Uuid>) -> Self {
        Self {
            id: id.into(),
            inner: Default::default(),
            sequence_number: 0,
        }
    }
}

impl<S> AggregateState<S> {
    /// Consumes the aggregate state and generates a new one with the events applied to it,
    /// as dictated by `apply_event`.
    pub fn apply_store_events<T, F>(self, store_events: Vec<StoreEvent<T>>, apply_event: F) -> Self
    where
        F: Fn(S, T) -> S,
    {
        store_events.into_iter().fold(self, |mut state: Self, store_event| {
            let sequence_number = store_event.sequence_number;
            let inner = apply_event(state.inner, store_event.payload);
            state.sequence_number = sequence_number;
            state.inner = inner;
            state
        })
    }

    /// Returns an Uuid representing the aggregate id.
    pub const fn id(&self) -> &Uuid {
        &self.id
    }

    /// Returns the internal state.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the internal sequence number, i.e. the number of facts in the stream when the state was
    /// loaded (or last persisted).
    pub const fn sequence_number(&self) -> &SequenceNumber {
        &self.sequence_number
    }

    /// Moves the state forward after a successful append.
    pub(crate) fn advance(&mut self, inner: S, sequence_number: SequenceNumber) {
        self.inner = inner;
        self.sequence_number = sequence_number;
    }

    /// Consumes self and extracts the internal state.
    pub fn into_inner(self) -> S {
        self.inner
    }
}
