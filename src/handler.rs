use std::ops::Deref;

use async_trait::async_trait;
use tracing::Instrument;

use crate::store::{StoreError, StoreEvent};
use crate::Aggregate;

/// This trait is used to implement a `TransactionalEventHandler`. A transactional event handler is
/// intended to be an entity which can create and update a read side. No side effects must be
/// performed inside of this kind on handler.
///
/// Handlers run inside the transaction that appends the events: the caller only observes success
/// once every handler succeeded, and a failing handler aborts the append.
#[async_trait]
pub trait TransactionalEventHandler<A, Error, Executor>: Sync
where
    A: Aggregate,
{
    /// Handle an event in a transactional fashion and perform a read side create or update.
    /// If an error is returned the transaction will be aborted and the handling of a command by an
    /// aggregate will return an error.
    async fn handle(&self, event: &StoreEvent<A::Event>, executor: &mut Executor) -> Result<(), Error>;

    /// The name of the event handler. By default, this is the type name of the event handler,
    /// but it can be overridden to provide a custom name. This name is used as
    /// part of tracing spans, to identify the event handler being run.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Runs every handler over every event, in order, stopping at the first failure.
pub(crate) async fn run_transactional_event_handlers<A, Executor>(
    handlers: &[Box<dyn TransactionalEventHandler<A, StoreError, Executor> + Send>],
    store_events: &[StoreEvent<A::Event>],
    executor: &mut Executor,
) -> Result<(), StoreError>
where
    A: Aggregate,
    Executor: Send,
{
    for store_event in store_events {
        for handler in handlers {
            let span = tracing::trace_span!(
                "battery_es.transactional_event_handler",
                event_id = %store_event.id,
                aggregate_id = %store_event.aggregate_id,
                consumer = handler.name()
            );

            if let Err(error) = handler.handle(store_event, executor).instrument(span).await {
                tracing::error!({
                    event_id = %store_event.id,
                    aggregate_id = %store_event.aggregate_id,
                    consumer = handler.name(),
                    error = ?error,
                }, "transactional event handler failed to handle event");

                return Err(error);
            }
        }
    }

    Ok(())
}

#[async_trait]
impl<A, Error, Executor, Q, T> TransactionalEventHandler<A, Error, Executor> for T
where
    A: Aggregate,
    A::Event: Send + Sync,
    Executor: Send,
    Q: TransactionalEventHandler<A, Error, Executor> + ?Sized,
    T: Deref<Target = Q> + Send + Sync,
{
    /// Deref call to [`TransactionalEventHandler::handle`].
    async fn handle(&self, event: &StoreEvent<A::Event>, executor: &mut Executor) -> Result<(), Error> {
        self.deref().handle(event, executor).await
    }

    /// Deref call to [`TransactionalEventHandler::name`].
    fn name(&self) -> &'static str {
        self.deref().name()
    }
}
