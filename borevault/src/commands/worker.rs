// borevault/src/commands/worker.rs

use borevault_core::application::ParseWorker;

use super::open_store;

/// Feed one JSON event (direct payload or batched queue shape) through the
/// parse worker against the configured object store.
pub async fn run(event: &str) -> anyhow::Result<()> {
    let event: serde_json::Value =
        serde_json::from_str(event).map_err(|e| anyhow::anyhow!("invalid event JSON: {e}"))?;

    let store = open_store().await?;
    let worker = ParseWorker::new(store);
    let result = worker.handle_event(&event).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
