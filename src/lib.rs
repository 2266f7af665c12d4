//! Event-sourced battery lifecycle tracking.
//!
//! Facts are appended to per-battery streams with optimistic concurrency, every append updates the
//! inline projections in the same transaction, committed facts are broadcast to subscribers and the
//! projections can be rebuilt from the log at any time.

pub use crate::aggregate::Aggregate;
pub use crate::event::Event;
pub use crate::state::AggregateState;

mod aggregate;
pub mod battery;
pub mod bus;
pub mod config;
mod event;
pub mod handler;
pub mod manager;
pub mod projection;
pub mod rebuilder;
mod state;
pub mod store;

pub mod types {
    /// Position of a fact within its stream. Starts from 1; 0 means "no stream yet".
    pub type SequenceNumber = i32;
    /// Position of a fact within the log spanning every stream. Starts from 1.
    pub type GlobalPosition = i64;
}
