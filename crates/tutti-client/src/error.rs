use std::time::Duration;

use thiserror::Error;
use tutti_store::StoreError;

/// Why an event detail view could not be assembled.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The event itself does not exist. No partial view is produced.
    #[error("Event not found: {event_id}")]
    NotFound { event_id: String },

    /// Authentication or backend failure on the event or a repertoire lookup.
    #[error("Aggregation failed: {0}")]
    Failure(#[source] StoreError),

    #[error("Aggregation timed out after {0:?}")]
    TimedOut(Duration),
}
