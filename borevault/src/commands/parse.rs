// borevault/src/commands/parse.rs

use std::path::Path;

use anyhow::Context;
use borevault_core::domain::borelog::build_depth_index;
use borevault_core::domain::parser::parse_borelog_document;
use borevault_core::infrastructure::csv_rows::collect_csv_rows;
use borevault_core::infrastructure::xlsx::xlsx_rows;

/// Parse a borelog document from disk and print the structured output the
/// parse worker would persist. Pure local operation, no storage involved.
pub fn run(file: &Path) -> anyhow::Result<()> {
    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let rows = match extension.as_str() {
        "xlsx" | "xls" => {
            let payload = std::fs::read(file)
                .with_context(|| format!("reading {}", file.display()))?;
            xlsx_rows(&payload)?
        }
        _ => {
            let reader = std::fs::File::open(file)
                .with_context(|| format!("reading {}", file.display()))?;
            collect_csv_rows(reader)?
        }
    };

    let (metadata, strata) = parse_borelog_document(rows)?;
    let depth_index = build_depth_index(&strata);

    let output = serde_json::json!({
        "metadata": metadata,
        "strata": strata,
        "depth_index": depth_index,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    eprintln!("🔬 parsed {} stratum(s)", strata.len());
    Ok(())
}
