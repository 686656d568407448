// borevault-core/src/domain/parser/template.rs
//
// Template dialect: human-readable exports of the borelog field template.
// Metadata lives in the rows above the stratum table, either as
// "Label: value" cells or as a label cell followed by the value cell.
// The stratum table header is matched by substring predicates; a sub-header
// row directly below it ("From", "To", "Thickness") refines the depth
// column indices and is never parsed as data.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::numeric::{calculate_thickness, safe_int, safe_number, safe_string};
use super::{has_meaningful_data, is_template_footer, normalize_row, value_from_row};
use crate::domain::borelog::{round_depth, BoreholeMetadata, Sample, Stratum};
use crate::domain::error::DomainError;

// =============================================================================
//  1. COLUMN MAP
// =============================================================================

#[derive(Debug, Default, Clone)]
pub(super) struct ColumnMap {
    description: Option<usize>,
    depth_from: Option<usize>,
    depth_to: Option<usize>,
    thickness: Option<usize>,
    sample_type: Option<usize>,
    sample_depth: Option<usize>,
    run_length: Option<usize>,
    /// Single combined blow-count cell ("15, 18, 21").
    spt_blows: Option<usize>,
    /// Separate SPT1/SPT2/SPT3 15-cm columns.
    spt_blows_1: Option<usize>,
    spt_blows_2: Option<usize>,
    spt_blows_3: Option<usize>,
    n_value: Option<usize>,
    total_core_length: Option<usize>,
    tcr_percent: Option<usize>,
    rqd_length: Option<usize>,
    rqd_percent: Option<usize>,
    return_water_colour: Option<usize>,
    water_loss: Option<usize>,
    borehole_diameter: Option<usize>,
    remarks: Option<usize>,
}

pub(super) fn build_column_map(header_row: &[String]) -> ColumnMap {
    let mut map = ColumnMap::default();
    let mut spt_columns: Vec<usize> = Vec::new();

    for (idx, header) in header_row.iter().enumerate() {
        let lowered = header.to_lowercase();
        if lowered.is_empty() {
            continue;
        }

        if lowered.contains("description of soil stratum") {
            map.description = Some(idx);
        } else if lowered.contains("depth") && lowered.contains("from") {
            map.depth_from = Some(idx);
        } else if lowered.contains("depth") && lowered.contains("to") {
            map.depth_to = Some(idx);
        } else if lowered.contains("thickness") {
            map.thickness = Some(idx);
        } else if lowered.contains("sample") && lowered.contains("type") {
            map.sample_type = Some(idx);
        } else if lowered.contains("sample") && (lowered.contains("depth") || lowered.contains("(m)"))
        {
            map.sample_depth = Some(idx);
        } else if lowered.contains("run length") {
            map.run_length = Some(idx);
        } else if lowered.contains("15 cm") {
            spt_columns.push(idx);
        } else if lowered.contains("n - value") || lowered.contains("n value") {
            map.n_value = Some(idx);
        } else if lowered.contains("total core length") {
            map.total_core_length = Some(idx);
        } else if lowered.contains("rqd length") {
            map.rqd_length = Some(idx);
        } else if lowered.contains("rqd (%)") || lowered.contains("rqd %") {
            map.rqd_percent = Some(idx);
        } else if lowered.contains("tcr") {
            map.tcr_percent = Some(idx);
        } else if lowered.contains("colour of return water") {
            map.return_water_colour = Some(idx);
        } else if lowered.contains("water loss") {
            map.water_loss = Some(idx);
        } else if lowered.contains("diameter") && lowered.contains("bore hole") {
            map.borehole_diameter = Some(idx);
        } else if lowered.contains("remarks") {
            map.remarks = Some(idx);
        }
    }

    // Newer template revisions split the blow counts into three "15 cm"
    // columns; older ones pack all three into a single cell.
    match spt_columns.len() {
        0 => {}
        1 => map.spt_blows = Some(spt_columns[0]),
        _ => {
            map.spt_blows_1 = spt_columns.first().copied();
            map.spt_blows_2 = spt_columns.get(1).copied();
            map.spt_blows_3 = spt_columns.get(2).copied();
        }
    }

    map
}

/// A sub-header row carries only header-like keywords (≤5 non-empty cells,
/// none of them numeric). The one directly under the main header supersedes
/// it for From/To/Thickness indexing.
pub(super) fn is_sub_header_row(row: &[String]) -> bool {
    let non_empty: Vec<&String> = row.iter().filter(|c| !c.is_empty()).collect();
    if non_empty.is_empty() || non_empty.len() > 5 {
        return false;
    }
    non_empty.iter().all(|cell| {
        let lowered = cell.to_lowercase();
        if safe_number(Some(&lowered)).is_some() {
            return false;
        }
        matches!(
            lowered.as_str(),
            "from" | "to" | "thickness" | "depth" | "depth (m)" | "(m)" | "m" | "description"
        )
    })
}

fn refine_from_sub_header(map: &mut ColumnMap, row: &[String]) {
    for (idx, cell) in row.iter().enumerate() {
        match cell.to_lowercase().as_str() {
            "from" => map.depth_from = Some(idx),
            "to" => map.depth_to = Some(idx),
            "thickness" => map.thickness = Some(idx),
            _ => {}
        }
    }
}

// =============================================================================
//  2. METADATA
// =============================================================================

const LABEL_MAP: [(&str, MetaKey); 18] = [
    ("project name", MetaKey::ProjectName),
    ("job code", MetaKey::JobCode),
    ("section name", MetaKey::SectionName),
    ("chainage", MetaKey::ChainageKm),
    ("location", MetaKey::Location),
    ("borehole no", MetaKey::BoreholeNo),
    ("commencement date", MetaKey::CommencementDate),
    ("completion date", MetaKey::CompletionDate),
    ("method of boring", MetaKey::MethodOfBoring),
    ("diameter of hole", MetaKey::DiameterOfHole),
    ("standing water level", MetaKey::StandingWaterLevel),
    ("termination depth", MetaKey::TerminationDepth),
    ("mean sea level", MetaKey::Msl),
    ("no. of permeabilty test", MetaKey::PermeabilityTestsCount),
    ("no. of sp test", MetaKey::SptTestsCount),
    ("no. of undisturbed sample", MetaKey::UndisturbedSamplesCount),
    ("no. of disturbed sample", MetaKey::DisturbedSamplesCount),
    ("no. of water sample", MetaKey::WaterSamplesCount),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaKey {
    ProjectName,
    JobCode,
    SectionName,
    ChainageKm,
    Location,
    BoreholeNo,
    CommencementDate,
    CompletionDate,
    MethodOfBoring,
    DiameterOfHole,
    StandingWaterLevel,
    TerminationDepth,
    Msl,
    PermeabilityTestsCount,
    SptTestsCount,
    UndisturbedSamplesCount,
    DisturbedSamplesCount,
    WaterSamplesCount,
}

fn lookup_label(label: &str) -> Option<MetaKey> {
    let normalized = label.trim().to_lowercase();
    LABEL_MAP
        .iter()
        .find(|(l, _)| *l == normalized)
        .map(|(_, key)| *key)
}

pub(super) fn build_metadata(rows: &[Vec<String>]) -> BoreholeMetadata {
    let mut raw: Vec<(MetaKey, String)> = Vec::new();
    let mut set = |raw: &mut Vec<(MetaKey, String)>, key: MetaKey, value: &str| {
        let value = value.trim();
        if !value.is_empty() && !raw.iter().any(|(k, _)| *k == key) {
            raw.push((key, value.to_string()));
        }
    };

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            // "Label: value" inside one cell wins over adjacency.
            if let Some((label, value)) = cell.split_once(':') {
                if let Some(key) = lookup_label(label) {
                    set(&mut raw, key, value);
                }
                continue;
            }
            if let Some(key) = lookup_label(cell) {
                if let Some(value) = row.get(idx + 1) {
                    set(&mut raw, key, value);
                }
            }
        }
    }

    let get = |key: MetaKey| -> Option<&str> {
        raw.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    };

    BoreholeMetadata {
        project_name: safe_string(get(MetaKey::ProjectName)),
        job_code: safe_string(get(MetaKey::JobCode)),
        section_name: safe_string(get(MetaKey::SectionName)),
        chainage_km: safe_number(get(MetaKey::ChainageKm)),
        location: safe_string(get(MetaKey::Location)).unwrap_or_default(),
        borehole_no: safe_string(get(MetaKey::BoreholeNo)),
        msl: safe_number(get(MetaKey::Msl)),
        method_of_boring: safe_string(get(MetaKey::MethodOfBoring)),
        diameter_of_hole: safe_string(get(MetaKey::DiameterOfHole)),
        coordinate_e: None,
        coordinate_l: None,
        commencement_date: safe_string(get(MetaKey::CommencementDate)),
        completion_date: safe_string(get(MetaKey::CompletionDate)),
        standing_water_level: safe_number(get(MetaKey::StandingWaterLevel)),
        termination_depth: safe_number(get(MetaKey::TerminationDepth)),
        permeability_tests_count: safe_int(get(MetaKey::PermeabilityTestsCount)),
        spt_tests_count: safe_int(get(MetaKey::SptTestsCount)),
        vs_tests_count: None,
        undisturbed_samples_count: safe_int(get(MetaKey::UndisturbedSamplesCount)),
        disturbed_samples_count: safe_int(get(MetaKey::DisturbedSamplesCount)),
        water_samples_count: safe_int(get(MetaKey::WaterSamplesCount)),
        version_number: None,
        status: None,
        remarks: None,
    }
}

// =============================================================================
//  3. STRATA
// =============================================================================

pub(super) fn parse<I>(
    metadata_rows: &[Vec<String>],
    header_row: &[String],
    iter: I,
) -> Result<(BoreholeMetadata, Vec<Stratum>), DomainError>
where
    I: Iterator<Item = Vec<String>>,
{
    debug!(columns = header_row.len(), "template borelog header detected");

    let metadata = build_metadata(metadata_rows);
    let mut column_map = build_column_map(header_row);
    let strata = build_strata(iter, &mut column_map);
    Ok((metadata, strata))
}

/// "2.5-4.0", "2.5 – 4.0 m": en-dash or hyphen, optional unit suffix.
#[allow(clippy::unwrap_used)]
fn depth_range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*[-\u{2013}]\s*(\d+(?:\.\d+)?)\s*m?").unwrap())
}

fn build_strata<I>(iter: I, column_map: &mut ColumnMap) -> Vec<Stratum>
where
    I: Iterator<Item = Vec<String>>,
{
    let mut strata: Vec<Stratum> = Vec::new();
    let mut have_seen_data_row = false;

    for row in iter {
        let normalized = normalize_row(&row);
        if !has_meaningful_data(&normalized) {
            continue;
        }

        if is_template_footer(&normalized) {
            debug!("template footer row reached, stopping stratum parse");
            break;
        }

        if is_sub_header_row(&normalized) {
            if !have_seen_data_row {
                // The row right under the main header labels the depth
                // columns precisely; it supersedes the header's indices.
                refine_from_sub_header(column_map, &normalized);
            }
            continue;
        }
        have_seen_data_row = true;

        let mut description = value_from_row(&normalized, column_map.description)
            .map(str::to_string);
        let mut depth_from = safe_number(value_from_row(&normalized, column_map.depth_from));
        let mut depth_to = safe_number(value_from_row(&normalized, column_map.depth_to));
        let thickness =
            safe_number(value_from_row(&normalized, column_map.thickness)).map(round_depth);

        // Depths embedded in the description ("Dense silty sand, 2.5-4.0 m")
        // fill in missing From/To cells; the range is stripped from the text.
        if depth_from.is_none() || depth_to.is_none() {
            if let Some(desc) = description.clone() {
                if let Some(captures) = depth_range_regex().captures(&desc) {
                    let range_start = captures.get(0).map(|m| m.start()).unwrap_or(0);
                    depth_from = captures.get(1).and_then(|m| m.as_str().parse().ok());
                    depth_to = captures.get(2).and_then(|m| m.as_str().parse().ok());
                    let trimmed = desc[..range_start].trim().to_string();
                    if !trimmed.is_empty() {
                        description = Some(trimmed);
                    }
                }
            }
        }

        let has_depths = depth_from.is_some() && depth_to.is_some();
        let is_stratum = description.is_some() && (has_depths || thickness.is_some());

        if is_stratum {
            let depth_from = depth_from.map(round_depth);
            let depth_to = depth_to.map(round_depth);
            let thickness = thickness.or(match (depth_from, depth_to) {
                (Some(f), Some(t)) => Some(calculate_thickness(f, t)),
                _ => None,
            });

            strata.push(Stratum {
                description: description.unwrap_or_default(),
                depth_from,
                depth_to,
                thickness,
                colour_of_return_water: value_from_row(
                    &normalized,
                    column_map.return_water_colour,
                )
                .map(str::to_string),
                water_loss: value_from_row(&normalized, column_map.water_loss)
                    .map(str::to_string),
                diameter_of_borehole: value_from_row(&normalized, column_map.borehole_diameter)
                    .map(str::to_string),
                tcr_percent: safe_number(value_from_row(&normalized, column_map.tcr_percent)),
                rqd_percent: safe_number(value_from_row(&normalized, column_map.rqd_percent)),
                remarks: value_from_row(&normalized, column_map.remarks).map(str::to_string),
                samples: Vec::new(),
            });
        }

        if let Some(current) = strata.last_mut() {
            let sample = build_sample(&normalized, column_map);
            if !sample.is_empty() {
                current.samples.push(sample);
            }
        }
    }

    strata
}

// =============================================================================
//  4. SAMPLES
// =============================================================================

fn build_sample(row: &[String], map: &ColumnMap) -> Sample {
    let blows = if map.spt_blows_1.is_some() || map.spt_blows_2.is_some() || map.spt_blows_3.is_some()
    {
        vec![
            safe_number(value_from_row(row, map.spt_blows_1)),
            safe_number(value_from_row(row, map.spt_blows_2)),
            safe_number(value_from_row(row, map.spt_blows_3)),
        ]
    } else {
        parse_spt_blows(value_from_row(row, map.spt_blows))
    };

    Sample {
        sample_event_type: value_from_row(row, map.sample_type).map(str::to_string),
        sample_event_depth_m: safe_number(value_from_row(row, map.sample_depth)),
        run_length_m: safe_number(value_from_row(row, map.run_length)),
        penetration_15cm: blows,
        n_value: value_from_row(row, map.n_value).map(str::to_string),
        total_core_length_cm: safe_number(value_from_row(row, map.total_core_length)),
        tcr_percent: safe_number(value_from_row(row, map.tcr_percent)),
        rqd_length_cm: safe_number(value_from_row(row, map.rqd_length)),
        rqd_percent: safe_number(value_from_row(row, map.rqd_percent)),
        remarks: value_from_row(row, map.remarks).map(str::to_string),
    }
}

/// Split a combined blow-count cell on whitespace/commas; always exactly
/// three entries, padded with None.
fn parse_spt_blows(value: Option<&str>) -> Vec<Option<f64>> {
    let mut blows: Vec<Option<f64>> = Vec::with_capacity(3);
    if let Some(raw) = value {
        for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
            if part.is_empty() {
                continue;
            }
            if blows.len() == 3 {
                break;
            }
            blows.push(safe_number(Some(part)));
        }
    }
    while blows.len() < 3 {
        blows.push(None);
    }
    blows
}

// =============================================================================
//  5. TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::parser::parse_borelog_document;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    // Columns: 0 description, 1 from, 2 to, 3 thickness, 4 sample type,
    // 5 sample depth, 6..8 SPT 15cm, 9 N-value, 10 TCR, 11 remarks.
    fn template_header() -> Vec<String> {
        row(&[
            "Description of Soil Stratum",
            "Depth (m) From",
            "Depth (m) To",
            "Thickness (m)",
            "Sample Type",
            "Sample Depth (m)",
            "15 cm",
            "15 cm",
            "15 cm",
            "N - Value",
            "TCR (%)",
            "Remarks",
        ])
    }

    fn metadata_head() -> Vec<Vec<String>> {
        vec![
            row(&["Project Name: Coastal Corridor", "", "Job Code: JC-77"]),
            row(&["Borehole No", "BH-09", "", "Chainage", "12.45"]),
            row(&["Mean Sea Level", "101.2", "", "Termination Depth", "30"]),
        ]
    }

    fn parse_template(data_rows: Vec<Vec<String>>) -> (crate::domain::borelog::BoreholeMetadata, Vec<crate::domain::borelog::Stratum>) {
        let mut rows = metadata_head();
        rows.push(template_header());
        rows.extend(data_rows);
        parse_borelog_document(rows).unwrap()
    }

    #[test]
    fn test_metadata_colon_and_adjacent_conventions() {
        let (metadata, _) = parse_template(vec![row(&[
            "Loose sand", "0.0", "1.5", "", "", "", "", "", "", "", "", "",
        ])]);
        assert_eq!(metadata.project_name.as_deref(), Some("Coastal Corridor"));
        assert_eq!(metadata.job_code.as_deref(), Some("JC-77"));
        assert_eq!(metadata.borehole_no.as_deref(), Some("BH-09"));
        assert_eq!(metadata.chainage_km, Some(12.45));
        assert_eq!(metadata.msl, Some(101.2));
        assert_eq!(metadata.termination_depth, Some(30.0));
    }

    #[test]
    fn test_stratum_with_samples_and_split_spt_columns() {
        let (_, strata) = parse_template(vec![
            row(&[
                "Loose sand", "0.0", "3.0", "", "SPT", "1.5", "6", "9", "11", "20", "", "",
            ]),
            row(&["", "", "", "", "SPT", "2.5", "8", "10", "14", "24", "", ""]),
        ]);

        assert_eq!(strata.len(), 1);
        let stratum = &strata[0];
        assert_eq!(stratum.thickness, Some(3.0));
        assert_eq!(stratum.samples.len(), 2);
        assert_eq!(
            stratum.samples[0].penetration_15cm,
            vec![Some(6.0), Some(9.0), Some(11.0)]
        );
        assert_eq!(stratum.samples[1].n_value.as_deref(), Some("24"));
    }

    #[test]
    fn test_depth_extracted_from_description() {
        let (_, strata) = parse_template(vec![row(&[
            "Dense silty sand, 2.5\u{2013}4.0 m",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ])]);

        assert_eq!(strata.len(), 1);
        assert_eq!(strata[0].depth_from, Some(2.5));
        assert_eq!(strata[0].depth_to, Some(4.0));
        assert_eq!(strata[0].description, "Dense silty sand,");
        assert_eq!(strata[0].thickness, Some(1.5));
    }

    #[test]
    fn test_thickness_only_stratum_keeps_null_depths() {
        let (_, strata) = parse_template(vec![row(&[
            "Filled-up soil", "", "", "1.2", "", "", "", "", "", "", "", "",
        ])]);

        assert_eq!(strata.len(), 1);
        assert_eq!(strata[0].depth_from, None);
        assert_eq!(strata[0].depth_to, None);
        assert_eq!(strata[0].thickness, Some(1.2));
    }

    #[test]
    fn test_sub_header_row_is_skipped_and_refines_columns() {
        // Sub-header labels From/To at different positions than the header.
        let (_, strata) = parse_template(vec![
            row(&["", "From", "To", "Thickness", "", "", "", "", "", "", "", ""]),
            row(&["Stiff clay", "0.0", "2.0", "", "", "", "", "", "", "", "", ""]),
        ]);

        assert_eq!(strata.len(), 1);
        assert_eq!(strata[0].description, "Stiff clay");
        assert_eq!(strata[0].depth_from, Some(0.0));
        assert_eq!(strata[0].depth_to, Some(2.0));
    }

    #[test]
    fn test_footer_terminates_parsing() {
        let (_, strata) = parse_template(vec![
            row(&["Loose sand", "0.0", "3.0", "", "", "", "", "", "", "", "", ""]),
            row(&["Termination Depth: 30.0 m", "", "", "", "", "", "", "", "", "", "", ""]),
            row(&["Ghost stratum", "3.0", "9.0", "", "", "", "", "", "", "", "", ""]),
        ]);
        assert_eq!(strata.len(), 1);
    }

    #[test]
    fn test_combined_spt_cell_is_split_and_padded() {
        assert_eq!(
            parse_spt_blows(Some("6, 9, 11")),
            vec![Some(6.0), Some(9.0), Some(11.0)]
        );
        assert_eq!(parse_spt_blows(Some("7 13")), vec![Some(7.0), Some(13.0), None]);
        assert_eq!(parse_spt_blows(Some("5 - 9")), vec![Some(5.0), None, Some(9.0)]);
        assert_eq!(parse_spt_blows(None), vec![None, None, None]);
    }

    #[test]
    fn test_sentinel_cells_yield_null_numeric_fields() {
        let (_, strata) = parse_template(vec![row(&[
            "Gravel", "0.0", "2.0", "-", "SPT", "#VALUE!", "[object Object]", "4", "6", "", "0",
            "",
        ])]);

        let stratum = &strata[0];
        // "-" thickness is a sentinel, so thickness falls back to the depths.
        assert_eq!(stratum.thickness, Some(2.0));
        assert_eq!(stratum.tcr_percent, Some(0.0));
        let sample = &stratum.samples[0];
        assert_eq!(sample.sample_event_depth_m, None);
        assert_eq!(sample.penetration_15cm, vec![None, Some(4.0), Some(6.0)]);
    }

    #[test]
    fn test_sub_header_detection_rules() {
        assert!(is_sub_header_row(&row(&["", "From", "To", "Thickness"])));
        assert!(!is_sub_header_row(&row(&["", "From", "2.5"])));
        assert!(!is_sub_header_row(&row(&["Dense sand", "From", "To"])));
        assert!(!is_sub_header_row(&row(&[""])));
    }
}
