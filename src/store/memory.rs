//! In-memory event store.
//!
//! [`InMemoryStore`] keeps the global log, the per-stream indexes and the projection tables behind a
//! single [`RwLock`]. Projection rows are kept as JSON documents in [`MemoryTables`], keyed by table
//! name and row key, which makes two table sets trivially comparable.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::handler::{run_transactional_event_handlers, TransactionalEventHandler};
use crate::projection::{ProjectionError, ViewTable};
use crate::rebuilder::{RebuildReport, Rebuilder};
use crate::state::AggregateState;
use crate::store::{ConcurrencyConflict, EventStore, StoreError, StoreEvent};
use crate::types::{GlobalPosition, SequenceNumber};
use crate::Aggregate;

pub type MemoryEventHandler<A> = Box<dyn TransactionalEventHandler<A, StoreError, MemoryTransaction> + Send>;

/// Projection rows, as JSON documents, grouped by table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    rows: BTreeMap<String, BTreeMap<String, Value>>,
    unique: BTreeMap<String, BTreeMap<String, String>>,
}

impl MemoryTables {
    /// Returns the row stored under `key`, if any.
    pub fn row<V: DeserializeOwned>(&self, table: &str, key: &str) -> Result<Option<V>, serde_json::Error> {
        self.rows
            .get(table)
            .and_then(|rows| rows.get(key))
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    /// Returns every row of the table, ordered by key.
    pub fn rows<V: DeserializeOwned>(&self, table: &str) -> Result<Vec<V>, serde_json::Error> {
        self.rows
            .get(table)
            .into_iter()
            .flat_map(BTreeMap::values)
            .map(|value| serde_json::from_value(value.clone()))
            .collect()
    }

    /// Looks a row key up through a unique index.
    pub fn unique_key(&self, table: &str, index: &str, value: &str) -> Option<&str> {
        self.unique
            .get(&index_name(table, index))
            .and_then(|entries| entries.get(value))
            .map(String::as_str)
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows.get(table).map_or(0, BTreeMap::len)
    }

    fn merge(&mut self, staged: MemoryTables) {
        for (table, rows) in staged.rows {
            self.rows.entry(table).or_default().extend(rows);
        }
        for (index, entries) in staged.unique {
            self.unique.entry(index).or_default().extend(entries);
        }
    }
}

fn index_name(table: &str, index: &str) -> String {
    format!("{table}.{index}")
}

/// The executor handed to transactional event handlers of an [`InMemoryStore`].
///
/// Writes are staged on top of the committed tables and only become visible on commit.
pub struct MemoryTransaction {
    base: Arc<MemoryTables>,
    staged: MemoryTables,
}

impl MemoryTransaction {
    pub fn begin(base: Arc<MemoryTables>) -> Self {
        Self {
            base,
            staged: MemoryTables::default(),
        }
    }

    pub fn get(&self, table: &str, key: &str) -> Option<&Value> {
        self.staged
            .rows
            .get(table)
            .and_then(|rows| rows.get(key))
            .or_else(|| self.base.rows.get(table).and_then(|rows| rows.get(key)))
    }

    pub fn put(&mut self, table: &str, key: String, value: Value) {
        self.staged.rows.entry(table.to_string()).or_default().insert(key, value);
    }

    /// Records `value` in the unique index for the row `key`. Re-claiming a value for the same key is
    /// a no-op.
    pub fn claim_unique(&mut self, table: &str, index: &'static str, value: String, key: &str) -> Result<(), ProjectionError> {
        let name = index_name(table, index);
        let owner = self
            .staged
            .unique
            .get(&name)
            .and_then(|entries| entries.get(&value))
            .or_else(|| self.base.unique.get(&name).and_then(|entries| entries.get(&value)));

        match owner {
            Some(owner) if owner != key => Err(ProjectionError::UniqueViolation {
                table: table.to_string(),
                index,
                value,
            }),
            _ => {
                self.staged.unique.entry(name).or_default().insert(value, key.to_string());
                Ok(())
            }
        }
    }

    /// Merges the staged writes into the committed tables.
    pub fn commit(self) -> MemoryTables {
        let mut tables = Arc::try_unwrap(self.base).unwrap_or_else(|shared| (*shared).clone());
        tables.merge(self.staged);
        tables
    }
}

/// A [`ViewTable`] storing rows of type `V` in a [`MemoryTransaction`].
pub struct MemoryTable<V> {
    name: &'static str,
    unique: Vec<(&'static str, fn(&V) -> String)>,
    _view: PhantomData<fn() -> V>,
}

impl<V> MemoryTable<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            unique: vec![],
            _view: PhantomData,
        }
    }

    /// Adds a unique index over the value computed by `column`.
    pub fn with_unique(mut self, index: &'static str, column: fn(&V) -> String) -> Self {
        self.unique.push((index, column));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[async_trait]
impl<K, V> ViewTable<K, V, MemoryTransaction> for MemoryTable<V>
where
    K: Display + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self, key: &K, executor: &mut MemoryTransaction) -> Result<Option<V>, StoreError> {
        Ok(executor
            .get(self.name, &key.to_string())
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()?)
    }

    async fn save(&self, key: &K, view: &V, executor: &mut MemoryTransaction) -> Result<(), StoreError> {
        let key = key.to_string();
        for (index, column) in &self.unique {
            executor.claim_unique(self.name, index, column(view), &key)?;
        }
        executor.put(self.name, key, serde_json::to_value(view)?);
        Ok(())
    }
}

struct MemoryLog<E> {
    events: Vec<StoreEvent<E>>,
    streams: HashMap<Uuid, Vec<usize>>,
    tables: Arc<MemoryTables>,
}

impl<E: Clone> MemoryLog<E> {
    fn version(&self, aggregate_id: &Uuid) -> SequenceNumber {
        self.streams
            .get(aggregate_id)
            .map_or(0, |indexes| indexes.len() as SequenceNumber)
    }

    fn stream(&self, aggregate_id: &Uuid) -> Vec<StoreEvent<E>> {
        self.streams
            .get(aggregate_id)
            .into_iter()
            .flatten()
            .map(|index| self.events[*index].clone())
            .collect()
    }

    fn after(&self, position: GlobalPosition) -> Vec<StoreEvent<E>> {
        let start = usize::try_from(position.max(0)).unwrap_or(usize::MAX);
        self.events.iter().skip(start).cloned().collect()
    }

    fn append(&mut self, store_events: &[StoreEvent<E>]) {
        for store_event in store_events {
            self.streams
                .entry(store_event.aggregate_id)
                .or_default()
                .push(self.events.len());
            self.events.push(store_event.clone());
        }
    }
}

/// In-memory [`EventStore`], with inline projections and event buses.
///
/// The store is protected by an [`Arc`] that allows it to be cloneable still having the same memory
/// reference.
pub struct InMemoryStore<A>
where
    A: Aggregate,
{
    inner: Arc<InnerInMemoryStore<A>>,
}

struct InnerInMemoryStore<A>
where
    A: Aggregate,
{
    log: RwLock<MemoryLog<A::Event>>,
    transactional_event_handlers: Vec<MemoryEventHandler<A>>,
    event_buses: Vec<Box<dyn EventBus<A> + Send>>,
}

impl<A> InMemoryStore<A>
where
    A: Aggregate,
{
    /// Returns a snapshot of the committed projection tables.
    pub async fn tables(&self) -> Arc<MemoryTables> {
        Arc::clone(&self.inner.log.read().await.tables)
    }

    /// Returns the number of facts in the stream of the given aggregate.
    pub async fn version(&self, aggregate_id: Uuid) -> SequenceNumber {
        self.inner.log.read().await.version(&aggregate_id)
    }

    /// Returns the position of the last committed event.
    pub async fn last_position(&self) -> GlobalPosition {
        self.inner.log.read().await.events.len() as GlobalPosition
    }
}

#[async_trait]
impl<A> EventStore for InMemoryStore<A>
where
    A: Aggregate,
    A::State: Send,
{
    type Aggregate = A;

    async fn by_aggregate_id(&self, aggregate_id: Uuid) -> Result<Vec<StoreEvent<A::Event>>, StoreError> {
        Ok(self.inner.log.read().await.stream(&aggregate_id))
    }

    #[tracing::instrument(skip_all, fields(aggregate_id = %aggregate_state.id()), err)]
    async fn persist(
        &self,
        aggregate_state: &mut AggregateState<A::State>,
        events: Vec<A::Event>,
    ) -> Result<Vec<StoreEvent<A::Event>>, StoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_id: Uuid = *aggregate_state.id();
        let expected: SequenceNumber = *aggregate_state.sequence_number();
        let occurred_on: DateTime<Utc> = Utc::now();

        let mut log = self.inner.log.write().await;

        let actual = log.version(&aggregate_id);
        if actual != expected {
            return Err(ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: Some(actual),
            }
            .into());
        }

        let first_position = log.events.len() as GlobalPosition + 1;
        let store_events: Vec<StoreEvent<A::Event>> = events
            .into_iter()
            .enumerate()
            .map(|(offset, payload)| StoreEvent {
                id: Uuid::new_v4(),
                aggregate_id,
                payload,
                occurred_on,
                sequence_number: expected + offset as SequenceNumber + 1,
                global_position: first_position + offset as GlobalPosition,
            })
            .collect();

        // The live tables stay in place until every handler succeeded, so a dropped append leaves them intact.
        let mut transaction = MemoryTransaction::begin(Arc::clone(&log.tables));
        run_transactional_event_handlers(&self.inner.transactional_event_handlers, &store_events, &mut transaction)
            .await?;

        // Releasing the live tables lets the commit reuse them instead of copying.
        log.tables = Arc::default();
        log.tables = Arc::new(transaction.commit());
        log.append(&store_events);
        drop(log);

        let inner = store_events
            .iter()
            .map(|store_event| store_event.payload.clone())
            .fold(aggregate_state.inner().clone(), A::apply_event);
        aggregate_state.advance(inner, expected + store_events.len() as SequenceNumber);

        self.publish(&store_events).await;

        Ok(store_events)
    }

    fn stream_events(&self, after: GlobalPosition) -> BoxStream<'_, Result<StoreEvent<A::Event>, StoreError>> {
        futures::stream::once(async move { self.inner.log.read().await.after(after) })
            .flat_map(|events| futures::stream::iter(events.into_iter().map(Ok)))
            .boxed()
    }

    async fn publish(&self, store_events: &[StoreEvent<A::Event>]) {
        let futures: Vec<_> = self
            .inner
            .event_buses
            .iter()
            .map(|bus| async move {
                for store_event in store_events {
                    bus.publish(store_event).await;
                }
            })
            .collect();

        let _ = futures::future::join_all(futures).await;
    }
}

#[async_trait]
impl<A> Rebuilder<A> for InMemoryStore<A>
where
    A: Aggregate,
    A::State: Send,
{
    type Error = StoreError;

    /// Replays the whole log into fresh tables without blocking appends, then, holding the write lock,
    /// applies whatever was committed meanwhile and swaps the fresh tables in.
    #[tracing::instrument(skip_all, err)]
    async fn rebuild(&self) -> Result<RebuildReport, Self::Error> {
        let snapshot: Vec<StoreEvent<A::Event>> = self.inner.log.read().await.events.clone();

        let mut transaction = MemoryTransaction::begin(Arc::default());
        run_transactional_event_handlers(&self.inner.transactional_event_handlers, &snapshot, &mut transaction).await?;
        let rebuilt = transaction.commit();

        let mut log = self.inner.log.write().await;
        let pending: Vec<StoreEvent<A::Event>> = log.after(snapshot.len() as GlobalPosition);

        let mut transaction = MemoryTransaction::begin(Arc::new(rebuilt));
        run_transactional_event_handlers(&self.inner.transactional_event_handlers, &pending, &mut transaction).await?;
        log.tables = Arc::new(transaction.commit());
        drop(log);

        let report = RebuildReport {
            replayed: snapshot.len(),
            caught_up: pending.len(),
        };
        tracing::info!(replayed = report.replayed, caught_up = report.caught_up, "projections rebuilt");

        Ok(report)
    }
}

impl<A> Clone for InMemoryStore<A>
where
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> std::fmt::Debug for InMemoryStore<A>
where
    A: Aggregate,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("aggregate", &A::NAME)
            .field("transactional_event_handlers", &self.inner.transactional_event_handlers.len())
            .field("event_buses", &self.inner.event_buses.len())
            .finish()
    }
}

/// Struct used to build a brand new [`InMemoryStore`].
pub struct InMemoryStoreBuilder<A>
where
    A: Aggregate,
{
    transactional_event_handlers: Vec<MemoryEventHandler<A>>,
    event_buses: Vec<Box<dyn EventBus<A> + Send>>,
}

impl<A> Default for InMemoryStoreBuilder<A>
where
    A: Aggregate,
{
    fn default() -> Self {
        Self {
            transactional_event_handlers: vec![],
            event_buses: vec![],
        }
    }
}

impl<A> InMemoryStoreBuilder<A>
where
    A: Aggregate,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single transactional event handler
    pub fn add_transactional_event_handler(
        mut self,
        transactional_event_handler: impl TransactionalEventHandler<A, StoreError, MemoryTransaction> + Send + 'static,
    ) -> Self {
        self.transactional_event_handlers
            .push(Box::new(transactional_event_handler));
        self
    }

    /// Add a single event bus
    pub fn add_event_bus(mut self, event_bus: impl EventBus<A> + Send + 'static) -> Self {
        self.event_buses.push(Box::new(event_bus));
        self
    }

    pub fn build(self) -> InMemoryStore<A> {
        InMemoryStore {
            inner: Arc::new(InnerInMemoryStore {
                log: RwLock::new(MemoryLog {
                    events: vec![],
                    streams: HashMap::new(),
                    tables: Arc::default(),
                }),
                transactional_event_handlers: self.transactional_event_handlers,
                event_buses: self.event_buses,
            }),
        }
    }
}
