//! Inline projections.
//!
//! A [`Projection`] is a pure description of a read model: for every event it names the row the event
//! targets (which may be keyed differently from the stream that emitted it) and computes the new row
//! from the current one. A [`ViewTable`] knows how to load and save those rows through a backend
//! executor. [`InlineProjection`] glues the two together as a [`TransactionalEventHandler`], so that
//! projections are updated inside the very transaction appending the events.

use std::fmt::{Debug, Display};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::handler::TransactionalEventHandler;
use crate::store::{StoreError, StoreEvent};
use crate::Aggregate;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("projection {projection}: no row {key} to apply {event_type} onto")]
    MissingRow {
        projection: &'static str,
        key: String,
        event_type: &'static str,
    },
    #[error("projection {projection}: row {key} already exists, {event_type} only inserts")]
    DuplicateRow {
        projection: &'static str,
        key: String,
        event_type: &'static str,
    },
    #[error("projection {projection} was handed {event_type}, which it does not route")]
    Unrouted {
        projection: &'static str,
        event_type: &'static str,
    },
    #[error("table {table}: {index} already holds `{value}`")]
    UniqueViolation {
        table: String,
        index: &'static str,
        value: String,
    },
}

/// A read model derived from the events of an [`Aggregate`].
pub trait Projection<A>: Send + Sync
where
    A: Aggregate,
{
    /// The key of a row of this projection.
    type Key: Display + Debug + Clone + Send + Sync;
    /// A row of this projection.
    type View: Serialize + DeserializeOwned + Debug + Clone + PartialEq + Send + Sync;

    /// Name of the projection, used in errors and tracing.
    fn name(&self) -> &'static str;

    /// Computes the key of the row this event targets, or `None` if the projection is not interested
    /// in the event.
    fn route(&self, event: &StoreEvent<A::Event>) -> Option<Self::Key>;

    /// Computes the new row given the current one (if any). Only called when [`Projection::route`]
    /// returned a key.
    fn apply(&self, current: Option<Self::View>, event: &StoreEvent<A::Event>) -> Result<Self::View, ProjectionError>;
}

/// Row storage for a projection on a specific backend.
#[async_trait]
pub trait ViewTable<K, V, Executor>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    async fn load(&self, key: &K, executor: &mut Executor) -> Result<Option<V>, StoreError>;

    async fn save(&self, key: &K, view: &V, executor: &mut Executor) -> Result<(), StoreError>;
}

/// Runs a [`Projection`] against a [`ViewTable`] inside the append transaction.
pub struct InlineProjection<P, T> {
    projection: P,
    table: T,
}

impl<P, T> InlineProjection<P, T> {
    pub fn new(projection: P, table: T) -> Self {
        Self { projection, table }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn table(&self) -> &T {
        &self.table
    }
}

#[async_trait]
impl<A, P, T, Executor> TransactionalEventHandler<A, StoreError, Executor> for InlineProjection<P, T>
where
    A: Aggregate,
    P: Projection<A>,
    T: ViewTable<P::Key, P::View, Executor>,
    Executor: Send,
{
    async fn handle(&self, event: &StoreEvent<A::Event>, executor: &mut Executor) -> Result<(), StoreError> {
        let Some(key) = self.projection.route(event) else {
            return Ok(());
        };

        let current = self.table.load(&key, executor).await?;
        let next = self.projection.apply(current, event)?;
        self.table.save(&key, &next, executor).await
    }

    fn name(&self) -> &'static str {
        self.projection.name()
    }
}
