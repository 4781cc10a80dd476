//! # tutti-client
//!
//! Client-side layer of Tutti: live views over the shared collections, the
//! event detail aggregator, and the session that wires them to a store.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod live;
pub mod state;

use tracing_subscriber::{fmt, EnvFilter};

pub use aggregator::{AggregationState, EventAggregator, EventDetail, EventDetailHandle};
pub use config::ClientConfig;
pub use error::AggregateError;
pub use live::{Live, LiveCollection, LiveState};
pub use state::Session;

const DEFAULT_LOG_FILTER: &str = "tutti_client=debug,tutti_store=info,warn";

/// Install the global `fmt` subscriber.
///
/// `filter` overrides `RUST_LOG`; without either the crate-scoped default is
/// used. Calling this again after a subscriber is installed does nothing.
pub fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
