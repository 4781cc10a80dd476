use std::sync::Arc;

use anyhow::{bail, Context};
use futures::StreamExt;
use serde_json::Value;

use tutti_client::{init_tracing, ClientConfig, Session};
use tutti_shared::constants::APP_NAME;
use tutti_shared::ordering::events_of_kind;
use tutti_shared::EventType;
use tutti_store::{MemoryBackend, MemoryStorage, StaticAuth};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env();
    init_tracing(config.log_filter.as_deref());

    tracing::info!(group = %config.group_id, "Starting {APP_NAME} preview");

    let seed = match &config.seed_path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading seed file {}", path.display()))?;
            serde_json::from_str::<Value>(&raw)
                .with_context(|| format!("parsing seed file {}", path.display()))?
        }
        None => {
            tracing::warn!("TUTTI_SEED_PATH not set, starting from an empty store");
            Value::Null
        }
    };

    let Some(account) = config.account_id.clone() else {
        bail!("TUTTI_ACCOUNT_ID must name the account to sign in as");
    };

    let session = Session::new(
        config,
        Arc::new(MemoryBackend::with_data(seed)),
        Arc::new(MemoryStorage::new()),
        Arc::new(StaticAuth::signed_in(account)),
    );

    let mut events = session.store().watch_events();
    let listing = events
        .next()
        .await
        .context("event stream ended before the first snapshot")??;
    events.close();

    tracing::info!(
        count = listing.len(),
        concerts = events_of_kind(&listing, EventType::Concert).len(),
        "Loaded events"
    );

    for event in &listing {
        match session.load_event_detail(&event.id).await {
            Ok(detail) => println!("{}", serde_json::to_string_pretty(&detail)?),
            Err(e) => tracing::error!(event_id = %event.id, error = %e, "Could not assemble event"),
        }
    }

    Ok(())
}
