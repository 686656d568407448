// borevault-core/src/domain/parser/mod.rs
//
// Borelog document parser. Consumes a lazy row sequence (one row = ordered
// cells as strings) and produces borehole metadata plus the stratum tree.
// Pure: no I/O happens here; row sources live in the infrastructure layer.
//
// Two dialects are supported:
//
// 1. Structured exports whose header row carries machine-friendly names
//    (`project_name`, `stratum_description`, `stratum_depth_from`, ...).
// 2. Template exports where metadata is scattered across the document head
//    and the stratum table has human headers ("Description of Soil
//    Stratum", "Depth (m) From", three "15 cm" blow-count columns, ...).

mod numeric;
mod structured;
mod template;

pub use numeric::{safe_int, safe_number, safe_string};

use super::borelog::{BoreholeMetadata, Stratum};
use super::error::DomainError;

/// Parse a row sequence into (metadata, strata).
///
/// Dialect detection scans forward for a header row; every row before the
/// template header is kept as metadata material. An undetectable header is
/// a malformed document.
pub fn parse_borelog_document<I>(rows: I) -> Result<(BoreholeMetadata, Vec<Stratum>), DomainError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut iter = rows.into_iter();
    let mut metadata_rows: Vec<Vec<String>> = Vec::new();

    while let Some(row) = iter.next() {
        let normalized = normalize_row(&row);
        if !has_meaningful_data(&normalized) {
            continue;
        }

        if looks_like_structured_header(&normalized) {
            return structured::parse(&normalized, iter);
        }

        metadata_rows.push(normalized.clone());
        if looks_like_template_header(&normalized) {
            return template::parse(&metadata_rows, &normalized, iter);
        }
    }

    Err(DomainError::MalformedDocument(
        "failed to detect borelog header; expected either structured headers \
         (project_name, stratum_description, ...) or template headers \
         containing 'Description of Soil Stratum'"
            .to_string(),
    ))
}

pub(crate) fn normalize_row(row: &[String]) -> Vec<String> {
    row.iter().map(|cell| cell.trim().to_string()).collect()
}

pub(crate) fn has_meaningful_data(row: &[String]) -> bool {
    row.iter().any(|cell| !cell.is_empty())
}

fn looks_like_structured_header(row: &[String]) -> bool {
    let lowered: Vec<String> = row
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| c.to_lowercase())
        .collect();
    lowered.iter().any(|c| c == "project_name")
        && lowered.iter().any(|c| c == "stratum_description")
        && lowered.iter().any(|c| c == "stratum_depth_from")
}

fn looks_like_template_header(row: &[String]) -> bool {
    let joined = row
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| c.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    joined.contains("description of soil stratum") && joined.contains("depth")
}

pub(crate) fn value_from_row<'a>(row: &'a [String], index: Option<usize>) -> Option<&'a str> {
    let idx = index?;
    let cell = row.get(idx)?.trim();
    if cell.is_empty() {
        None
    } else {
        Some(cell)
    }
}

/// Footer markers terminate stratum parsing.
pub(crate) fn is_template_footer(row: &[String]) -> bool {
    let joined = row.join(" ").to_lowercase();
    ["termination depth", "total depth", "end of log"]
        .iter()
        .any(|marker| joined.contains(marker))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_header_detection_failure_is_malformed() {
        let rows = vec![row(&["some", "random", "cells"]), row(&["1", "2", "3"])];
        let err = parse_borelog_document(rows).unwrap_err();
        assert!(matches!(err, DomainError::MalformedDocument(_)));
    }

    #[test]
    fn test_structured_header_detection() {
        assert!(looks_like_structured_header(&row(&[
            "project_name",
            "job_code",
            "stratum_description",
            "stratum_depth_from",
        ])));
        assert!(!looks_like_structured_header(&row(&[
            "project_name",
            "stratum_description"
        ])));
    }

    #[test]
    fn test_template_header_detection() {
        assert!(looks_like_template_header(&row(&[
            "Description of Soil Stratum",
            "Depth (m) From",
            "Depth (m) To",
        ])));
        assert!(!looks_like_template_header(&row(&[
            "Description of Soil Stratum"
        ])));
    }

    #[test]
    fn test_footer_detection() {
        assert!(is_template_footer(&row(&["Termination Depth: 30m"])));
        assert!(is_template_footer(&row(&["", "End of Log"])));
        assert!(!is_template_footer(&row(&["Dense sand"])));
    }

    #[test]
    fn test_value_from_row_bounds() {
        let r = row(&["a", "", "c"]);
        assert_eq!(value_from_row(&r, Some(0)), Some("a"));
        assert_eq!(value_from_row(&r, Some(1)), None);
        assert_eq!(value_from_row(&r, Some(9)), None);
        assert_eq!(value_from_row(&r, None), None);
    }
}
