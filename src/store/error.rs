use uuid::Uuid;

use crate::projection::ProjectionError;
use crate::types::SequenceNumber;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The stream was modified since it was loaded.
    #[error(transparent)]
    Conflict(#[from] ConcurrencyConflict),
    /// Sql error
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    /// Serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A projection refused an event; the append has been rolled back.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    /// Error while running a transactional event handler inside of the event store.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Returns the conflict if this error is one.
    pub fn as_conflict(&self) -> Option<&ConcurrencyConflict> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

/// The expected version handed to an append did not match the stream's current version.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", describe(.aggregate_id, .expected, .actual.as_ref()))]
pub struct ConcurrencyConflict {
    pub aggregate_id: Uuid,
    /// The version the caller loaded the stream at.
    pub expected: SequenceNumber,
    /// The version found in the store, when known.
    pub actual: Option<SequenceNumber>,
}

fn describe(aggregate_id: &Uuid, expected: &SequenceNumber, actual: Option<&SequenceNumber>) -> String {
    match (*expected, actual) {
        (0, Some(actual)) => format!(
            "concurrency conflict on {aggregate_id}: expected a new stream, found version {actual} \
             (another writer created it; reload and retry)"
        ),
        (expected, Some(actual)) => format!(
            "concurrency conflict on {aggregate_id}: expected version {expected}, found {actual} \
             (stream was modified; reload and retry)"
        ),
        (expected, None) => format!(
            "concurrency conflict on {aggregate_id}: version {expected} was already taken \
             (stream was modified; reload and retry)"
        ),
    }
}
