use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::types::Json;
use sqlx::{PgConnection, Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::event::Event;
use crate::handler::{run_transactional_event_handlers, TransactionalEventHandler};
use crate::rebuilder::{RebuildReport, Rebuilder};
use crate::store::postgres::event::DbEvent;
use crate::store::postgres::statements::Statements;
use crate::store::postgres::PgTableSchema;
use crate::store::{ConcurrencyConflict, EventStore, StoreError, StoreEvent};
use crate::types::{GlobalPosition, SequenceNumber};
use crate::{Aggregate, AggregateState};

pub type PgEventHandler<A> = Box<dyn TransactionalEventHandler<A, StoreError, PgConnection> + Send>;

const UNIQUE_VIOLATION: &str = "23505";
const REPLAY_BATCH: i64 = 1_000;

/// Default Postgres implementation for the [`EventStore`]. Use this struct in order to have a
/// pre-made implementation of an [`EventStore`] persisting on Postgres.
///
/// The store is protected by an [`Arc`] that allows it to be cloneable still having the same memory
/// reference.
///
/// Every append holds a shared advisory lock on the log for the length of its transaction. A rebuild
/// takes the same lock exclusively, only to read the log position and to swap the tables.
pub struct PgStore<A>
where
    A: Aggregate,
{
    pub(super) inner: Arc<InnerPgStore<A>>,
}

pub(super) struct InnerPgStore<A>
where
    A: Aggregate,
{
    pub(super) pool: Pool<Postgres>,
    pub(super) statements: Statements,
    pub(super) transactional_event_handlers: Vec<PgEventHandler<A>>,
    pub(super) event_buses: Vec<Box<dyn EventBus<A> + Send>>,
    pub(super) projection_tables: Vec<PgTableSchema>,
}

impl<A> PgStore<A>
where
    A: Aggregate,
{
    /// Returns the name of the event store table
    pub fn table_name(&self) -> &str {
        self.inner.statements.table_name()
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.inner.pool
    }

    /// Returns the position of the last committed event.
    pub async fn last_position(&self) -> Result<GlobalPosition, StoreError> {
        Ok(sqlx::query_scalar(self.inner.statements.last_position())
            .fetch_one(&self.inner.pool)
            .await?)
    }

    /// Save an event in the event store and return a new [`StoreEvent`] instance.
    async fn save_event(
        &self,
        aggregate_id: Uuid,
        event: A::Event,
        occurred_on: DateTime<Utc>,
        sequence_number: SequenceNumber,
        executor: &mut PgConnection,
    ) -> Result<StoreEvent<A::Event>, StoreError> {
        let id: Uuid = Uuid::new_v4();

        let result = sqlx::query_scalar::<_, GlobalPosition>(self.inner.statements.insert())
            .bind(id)
            .bind(aggregate_id)
            .bind(event.event_type())
            .bind(Json(&event))
            .bind(occurred_on)
            .bind(sequence_number)
            .fetch_one(&mut *executor)
            .await;

        let global_position = match result {
            Ok(global_position) => global_position,
            Err(error) if self.is_sequence_violation(&error) => {
                return Err(ConcurrencyConflict {
                    aggregate_id,
                    expected: sequence_number - 1,
                    actual: None,
                }
                .into());
            }
            Err(error) => return Err(error.into()),
        };

        Ok(StoreEvent {
            id,
            aggregate_id,
            payload: event,
            occurred_on,
            sequence_number,
            global_position,
        })
    }

    fn is_sequence_violation(&self, error: &sqlx::Error) -> bool {
        let sqlx::Error::Database(database_error) = error else {
            return false;
        };

        database_error.code().as_deref() == Some(UNIQUE_VIOLATION)
            && database_error.constraint()
                == Some(format!("{}_aggregate_id_sequence_number", self.table_name()).as_str())
    }

    /// Loads at most [`REPLAY_BATCH`] events in `(after, until]`.
    async fn events_between(
        &self,
        after: GlobalPosition,
        until: GlobalPosition,
        executor: &mut PgConnection,
    ) -> Result<Vec<StoreEvent<A::Event>>, StoreError> {
        sqlx::query_as::<_, DbEvent>(self.inner.statements.select_after())
            .bind(after)
            .bind(until)
            .bind(REPLAY_BATCH)
            .fetch_all(&mut *executor)
            .await?
            .into_iter()
            .map(|event| Ok(event.try_into_store_event::<A::Event>()?))
            .collect()
    }

    /// Runs every handler over the events in `(after, until]`, batch by batch, returning how many
    /// events were handled.
    async fn replay(
        &self,
        mut after: GlobalPosition,
        until: GlobalPosition,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<usize, StoreError> {
        let mut replayed: usize = 0;

        loop {
            let batch = self.events_between(after, until, &mut **transaction).await?;
            let Some(last) = batch.last() else {
                return Ok(replayed);
            };
            after = last.global_position;

            run_transactional_event_handlers(&self.inner.transactional_event_handlers, &batch, &mut **transaction)
                .await?;
            replayed += batch.len();
        }
    }
}

#[async_trait]
impl<A> EventStore for PgStore<A>
where
    A: Aggregate,
    A::State: Send,
{
    type Aggregate = A;

    async fn by_aggregate_id(&self, aggregate_id: Uuid) -> Result<Vec<StoreEvent<A::Event>>, StoreError> {
        sqlx::query_as::<_, DbEvent>(self.inner.statements.by_aggregate_id())
            .bind(aggregate_id)
            .fetch_all(&self.inner.pool)
            .await?
            .into_iter()
            .map(|event| Ok(event.try_into_store_event::<A::Event>()?))
            .collect()
    }

    // Note: https://github.com/rust-lang/rust-clippy/issues/12281
    #[allow(clippy::blocks_in_conditions)]
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

        let mut transaction: Transaction<Postgres> = self.inner.pool.begin().await?;

        sqlx::query(self.inner.statements.lock_shared())
            .execute(&mut *transaction)
            .await?;

        let actual: SequenceNumber = sqlx::query_scalar(self.inner.statements.stream_version())
            .bind(aggregate_id)
            .fetch_one(&mut *transaction)
            .await?;

        if actual != expected {
            return Err(ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: Some(actual),
            }
            .into());
        }

        let mut store_events: Vec<StoreEvent<A::Event>> = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            let sequence_number = expected + offset as SequenceNumber + 1;
            let store_event = self
                .save_event(aggregate_id, event, occurred_on, sequence_number, &mut *transaction)
                .await?;

            store_events.push(store_event);
        }

        run_transactional_event_handlers(&self.inner.transactional_event_handlers, &store_events, &mut *transaction)
            .await?;

        transaction.commit().await?;

        let inner = store_events
            .iter()
            .map(|store_event| store_event.payload.clone())
            .fold(aggregate_state.inner().clone(), A::apply_event);
        aggregate_state.advance(inner, expected + store_events.len() as SequenceNumber);

        // Publishing to subscribed event buses
        self.publish(&store_events).await;

        Ok(store_events)
    }

    fn stream_events(&self, after: GlobalPosition) -> BoxStream<'_, Result<StoreEvent<A::Event>, StoreError>> {
        sqlx::query_as::<_, DbEvent>(self.inner.statements.select_after())
            .bind(after)
            .bind(GlobalPosition::MAX)
            .bind(i64::MAX)
            .fetch(&self.inner.pool)
            .map(|row| -> Result<StoreEvent<A::Event>, StoreError> { Ok(row?.try_into_store_event()?) })
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
impl<A> Rebuilder<A> for PgStore<A>
where
    A: Aggregate,
    A::State: Send,
{
    type Error = StoreError;

    /// Fills fresh copies of the projection tables in a dedicated schema, then swaps them with the
    /// live ones in the same transaction. Nothing is left behind if the rebuild fails.
    #[allow(clippy::blocks_in_conditions)]
    #[tracing::instrument(skip_all, fields(table = %self.table_name()), err)]
    async fn rebuild(&self) -> Result<RebuildReport, Self::Error> {
        let statements = &self.inner.statements;

        // No append is in flight while the lock is held, so every position up to here is committed.
        let mut transaction: Transaction<Postgres> = self.inner.pool.begin().await?;
        sqlx::query(statements.lock_exclusive())
            .execute(&mut *transaction)
            .await?;
        let snapshot: GlobalPosition = sqlx::query_scalar(statements.last_position())
            .fetch_one(&mut *transaction)
            .await?;
        transaction.commit().await?;

        let mut transaction: Transaction<Postgres> = self.inner.pool.begin().await?;
        sqlx::query(statements.lock_rebuild())
            .execute(&mut *transaction)
            .await?;

        let live: String = sqlx::query_scalar("SELECT current_schema()")
            .fetch_one(&mut *transaction)
            .await?;
        let shadow: String = statements.rebuild_schema();

        sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{shadow}\" CASCADE"))
            .execute(&mut *transaction)
            .await?;
        sqlx::query(&format!("CREATE SCHEMA \"{shadow}\""))
            .execute(&mut *transaction)
            .await?;
        sqlx::query(&format!("SET LOCAL search_path TO \"{shadow}\", \"{live}\""))
            .execute(&mut *transaction)
            .await?;

        for table in &self.inner.projection_tables {
            for migration in &table.migrations {
                sqlx::query(migration).execute(&mut *transaction).await?;
            }
        }

        let replayed = self.replay(0, snapshot, &mut transaction).await?;

        sqlx::query(statements.lock_exclusive())
            .execute(&mut *transaction)
            .await?;
        let caught_up = self.replay(snapshot, GlobalPosition::MAX, &mut transaction).await?;

        for table in &self.inner.projection_tables {
            sqlx::query(&format!("DROP TABLE IF EXISTS \"{live}\".\"{}\"", table.name))
                .execute(&mut *transaction)
                .await?;
            sqlx::query(&format!("ALTER TABLE \"{shadow}\".\"{}\" SET SCHEMA \"{live}\"", table.name))
                .execute(&mut *transaction)
                .await?;
        }
        sqlx::query(&format!("DROP SCHEMA \"{shadow}\""))
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        let report = RebuildReport { replayed, caught_up };
        tracing::info!(replayed = report.replayed, caught_up = report.caught_up, "projections rebuilt");

        Ok(report)
    }
}

/// Debug implementation for [`PgStore`]. It just shows the statements, that are the only thing
/// that might be useful to debug.
impl<A: Aggregate> std::fmt::Debug for PgStore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("statements", &self.inner.statements)
            .field("projection_tables", &self.inner.projection_tables)
            .finish()
    }
}

impl<A> Clone for PgStore<A>
where
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
