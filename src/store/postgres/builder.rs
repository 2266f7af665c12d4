use std::sync::Arc;

use sqlx::{PgConnection, Pool, Postgres, Transaction};

use crate::bus::EventBus;
use crate::handler::TransactionalEventHandler;
use crate::projection::{InlineProjection, Projection};
use crate::store::postgres::event_store::{InnerPgStore, PgEventHandler};
use crate::store::postgres::statements::Statements;
use crate::store::postgres::{PgTable, PgTableSchema};
use crate::store::StoreError;
use crate::Aggregate;

use super::PgStore;

/// Struct used to build a brand new [`PgStore`].
pub struct PgStoreBuilder<A>
where
    A: Aggregate,
{
    pool: Pool<Postgres>,
    statements: Statements,
    transactional_event_handlers: Vec<PgEventHandler<A>>,
    event_buses: Vec<Box<dyn EventBus<A> + Send>>,
    projection_tables: Vec<PgTableSchema>,
    run_migrations: bool,
}

impl<A> PgStoreBuilder<A>
where
    A: Aggregate,
{
    /// Creates a new instance of a [`PgStoreBuilder`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        PgStoreBuilder {
            pool,
            statements: Statements::new::<A>(),
            transactional_event_handlers: vec![],
            event_buses: vec![],
            projection_tables: vec![],
            run_migrations: true,
        }
    }

    /// Add a single transactional event handler
    pub fn add_transactional_event_handler(
        mut self,
        transaction_event_handler: impl TransactionalEventHandler<A, StoreError, PgConnection> + Send + 'static,
    ) -> Self {
        self.transactional_event_handlers
            .push(Box::new(transaction_event_handler));
        self
    }

    /// Add an inline projection stored in `table`. The table is created by migrations and recreated by
    /// rebuilds.
    pub fn add_projection<P>(mut self, projection: P, table: PgTable<P::View>) -> Self
    where
        P: Projection<A> + 'static,
        P::View: Unpin + 'static,
    {
        self.projection_tables.push(table.schema());
        self.add_transactional_event_handler(InlineProjection::new(projection, table))
    }

    /// Add a single event bus
    pub fn add_event_bus(mut self, event_bus: impl EventBus<A> + Send + 'static) -> Self {
        self.event_buses.push(Box::new(event_bus));
        self
    }

    /// Calling this function the caller avoid running migrations. It is recommend to run migrations
    /// at least once per store per startup.
    pub fn without_running_migrations(mut self) -> Self {
        self.run_migrations = false;
        self
    }

    /// This function runs all the needed migrations, atomically setting up the event table and the
    /// projection tables if `run_migrations` isn't explicitly set to false. Migrations should be run
    /// only at application startup due to avoid performance issues.
    ///
    /// Eventually returns an instance of PgStore.
    ///
    /// # Errors
    ///
    /// Will return an `Err` if there's an error running migrations.
    pub async fn try_build(self) -> Result<PgStore<A>, sqlx::Error> {
        if self.run_migrations {
            let mut transaction: Transaction<Postgres> = self.pool.begin().await?;

            let migrations = self
                .statements
                .migrations()
                .iter()
                .chain(self.projection_tables.iter().flat_map(|table| table.migrations.iter()));

            for migration in migrations {
                let _ = sqlx::query(migration).execute(&mut *transaction).await?;
            }

            transaction.commit().await?;
        }

        Ok(PgStore {
            inner: Arc::new(InnerPgStore {
                pool: self.pool,
                statements: self.statements,
                transactional_event_handlers: self.transactional_event_handlers,
                event_buses: self.event_buses,
                projection_tables: self.projection_tables,
            }),
        })
    }
}
