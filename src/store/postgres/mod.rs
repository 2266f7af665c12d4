//! Postgres event store.
//!
//! Events live in a `{aggregate}_events` table. Projection rows live in one table per projection, as
//! JSON documents, updated in the transaction that appends the events.

pub use builder::PgStoreBuilder;
pub use event_store::{PgEventHandler, PgStore};
pub use table::{PgTable, PgTableSchema};

mod builder;
mod event;
mod event_store;
mod statements;
mod table;
