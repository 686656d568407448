// borevault/src/commands/dispatch.rs

use borevault_core::application::shared_dispatcher;

/// Feed one JSON request event through the dispatcher and print the
/// response envelope. Mirrors what the transport harness would do.
pub async fn run(event: &str) -> anyhow::Result<()> {
    let event: serde_json::Value =
        serde_json::from_str(event).map_err(|e| anyhow::anyhow!("invalid event JSON: {e}"))?;

    let dispatcher = shared_dispatcher().await?;
    let response = dispatcher.handle(&event).await;

    let output = serde_json::json!({
        "statusCode": response.status_code,
        "headers": response.headers,
        "body": response.body_json(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if response.status_code >= 400 {
        std::process::exit(1);
    }
    Ok(())
}
