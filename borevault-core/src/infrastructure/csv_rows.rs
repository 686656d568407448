// borevault-core/src/infrastructure/csv_rows.rs
//
// CSV row sources. The parser consumes headerless rows of trimmed cells;
// ingestion consumes headered records as column/value string pairs.

use std::io::Read;

use crate::error::VaultError;
use crate::infrastructure::error::InfrastructureError;

/// Stream a CSV byte source into rows of trimmed cells. Rows may be ragged;
/// the parser pads as needed.
pub fn csv_rows<R: Read>(reader: R) -> impl Iterator<Item = Result<Vec<String>, VaultError>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    reader.into_records().map(|record| {
        let record = record.map_err(InfrastructureError::from)?;
        Ok(record
            .iter()
            .map(|cell| cell.trim().to_string())
            .collect::<Vec<String>>())
    })
}

/// Eagerly collect a CSV byte source; a convenience for callers that cannot
/// thread the per-row Results through (the parser takes plain rows).
pub fn collect_csv_rows<R: Read>(reader: R) -> Result<Vec<Vec<String>>, VaultError> {
    csv_rows(reader).collect()
}

/// Headered CSV into (header, records) where each record pairs column name
/// with the raw cell string in header order.
pub fn csv_records<R: Read>(
    reader: R,
) -> Result<(Vec<String>, Vec<Vec<(String, String)>>), VaultError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header: Vec<String> = reader
        .headers()
        .map_err(InfrastructureError::from)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for record in reader.into_records() {
        let record = record.map_err(InfrastructureError::from)?;
        let mut row = Vec::with_capacity(header.len());
        for (idx, name) in header.iter().enumerate() {
            let cell = record.get(idx).unwrap_or("").trim().to_string();
            row.push((name.clone(), cell));
        }
        records.push(row);
    }
    Ok((header, records))
}
