// borevault/src/commands/ingest.rs

use std::path::Path;

use borevault_core::application::{CsvIngestion, IngestRequest};

use super::open_repository;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    file: &Path,
    table: &str,
    project_id: &str,
    entity_type: &str,
    entity_id: &str,
    user: &str,
    comment: Option<&str>,
    strict: bool,
) -> anyhow::Result<()> {
    let repository = open_repository().await?;
    let ingestion = CsvIngestion::new(repository.versioned());

    let request = IngestRequest {
        table_name: table,
        project_id,
        entity_type,
        entity_id,
        user_id: user,
        comment,
        skip_errors: !strict,
    };

    let result = ingestion.ingest_file(file, &request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.valid_rows > 0 {
        eprintln!(
            "📦 stored {} row(s) as version {} of {}",
            result.valid_rows,
            result.version.unwrap_or_default(),
            result.record_id
        );
    }
    if result.invalid_rows > 0 {
        eprintln!("⚠️  {} invalid row(s), see errors above", result.invalid_rows);
        std::process::exit(1);
    }
    Ok(())
}
