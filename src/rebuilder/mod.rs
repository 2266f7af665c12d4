use async_trait::async_trait;

use crate::Aggregate;

/// Outcome of a projection rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebuildReport {
    /// Events replayed from the snapshot taken when the rebuild started.
    pub replayed: usize,
    /// Events committed while replaying, applied right before the swap.
    pub caught_up: usize,
}

/// Recomputes every projection from the event log and atomically replaces the live tables.
///
/// Readers keep seeing the old tables until the swap, and never a partial rebuild. Appends are only
/// paused for the catch-up and swap step. A rebuild that fails leaves the live tables untouched.
#[async_trait]
pub trait Rebuilder<A>
where
    A: Aggregate,
{
    type Error: std::error::Error;

    async fn rebuild(&self) -> Result<RebuildReport, Self::Error>;
}
