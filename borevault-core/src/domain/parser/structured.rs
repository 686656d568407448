// borevault-core/src/domain/parser/structured.rs
//
// Structured dialect: the header row names every column, the next non-empty
// row is single-record borehole metadata, and all subsequent rows are
// stratum/sample rows. Rows repeating the same (from, to, description) are
// merged into one stratum, each contributing its sample.

use std::collections::HashMap;

use tracing::debug;

use super::numeric::{calculate_thickness, safe_int, safe_number, safe_string};
use super::{has_meaningful_data, normalize_row};
use crate::domain::borelog::{round_depth, BoreholeMetadata, Sample, Stratum};
use crate::domain::error::DomainError;

type Record = HashMap<String, String>;

pub(super) fn parse<I>(
    header_row: &[String],
    iter: I,
) -> Result<(BoreholeMetadata, Vec<Stratum>), DomainError>
where
    I: Iterator<Item = Vec<String>>,
{
    debug!(columns = header_row.len(), "structured borelog header detected");

    let header: Vec<String> = header_row.iter().map(|c| c.trim().to_lowercase()).collect();
    let mut metadata_record: Option<Record> = None;
    let mut strata_records: Vec<Record> = Vec::new();

    for row in iter {
        let normalized = normalize_row(&row);
        if !has_meaningful_data(&normalized) {
            continue;
        }

        let mut record = Record::new();
        for (i, name) in header.iter().enumerate() {
            let cell = normalized.get(i).map(String::as_str).unwrap_or("");
            record.insert(name.clone(), cell.to_string());
        }

        if metadata_record.is_none() {
            metadata_record = Some(record);
        } else {
            strata_records.push(record);
        }
    }

    let metadata_record = metadata_record.ok_or_else(|| {
        DomainError::MalformedDocument("structured document missing metadata row".to_string())
    })?;

    Ok((
        build_metadata(&metadata_record),
        build_strata(&strata_records),
    ))
}

fn pick<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn build_metadata(record: &Record) -> BoreholeMetadata {
    BoreholeMetadata {
        project_name: safe_string(pick(record, "project_name")),
        job_code: safe_string(pick(record, "job_code")),
        section_name: safe_string(pick(record, "section_name")),
        chainage_km: safe_number(pick(record, "chainage_km")),
        location: safe_string(pick(record, "location")).unwrap_or_default(),
        borehole_no: safe_string(pick(record, "borehole_no")),
        msl: safe_number(pick(record, "msl")),
        method_of_boring: safe_string(pick(record, "method_of_boring")),
        diameter_of_hole: safe_string(pick(record, "diameter_of_hole")),
        coordinate_e: safe_string(pick(record, "coordinate_e")),
        coordinate_l: safe_string(pick(record, "coordinate_l")),
        commencement_date: safe_string(pick(record, "commencement_date")),
        completion_date: safe_string(pick(record, "completion_date")),
        standing_water_level: safe_number(pick(record, "standing_water_level")),
        termination_depth: safe_number(pick(record, "termination_depth")),
        permeability_tests_count: safe_int(pick(record, "permeability_tests_count")),
        spt_tests_count: safe_int(pick(record, "spt_tests_count")),
        vs_tests_count: safe_int(pick(record, "vs_tests_count")),
        undisturbed_samples_count: safe_int(pick(record, "undisturbed_samples_count")),
        disturbed_samples_count: safe_int(pick(record, "disturbed_samples_count")),
        water_samples_count: safe_int(pick(record, "water_samples_count")),
        version_number: safe_int(pick(record, "version_number")),
        status: Some(
            safe_string(pick(record, "status")).unwrap_or_else(|| "draft".to_string()),
        ),
        remarks: safe_string(pick(record, "remarks")),
    }
}

fn build_strata(records: &[Record]) -> Vec<Stratum> {
    let mut strata: Vec<Stratum> = Vec::new();
    // (from, to, description) -> position in `strata`
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let description = safe_string(pick(record, "stratum_description"));
        let depth_from = safe_number(pick(record, "stratum_depth_from"));
        let depth_to = safe_number(pick(record, "stratum_depth_to"));

        let (description, depth_from, depth_to) = match (description, depth_from, depth_to) {
            (Some(d), Some(f), Some(t)) => (d, f, t),
            (description, _, _) => {
                if description.is_some() || pick(record, "sample_event_type").is_some() {
                    debug!(?description, "skipping row lacking essential stratum data");
                }
                continue;
            }
        };

        let key = format!("{depth_from:.3}|{depth_to:.3}|{description}");
        let position = match index.get(&key) {
            Some(&pos) => {
                // Merge: keep the first stratum, fill remarks when absent.
                if strata[pos].remarks.is_none() {
                    strata[pos].remarks = safe_string(pick(record, "remarks"));
                }
                pos
            }
            None => {
                let thickness = safe_number(pick(record, "stratum_thickness_m"))
                    .map(round_depth)
                    .unwrap_or_else(|| calculate_thickness(depth_from, depth_to));
                strata.push(Stratum {
                    description,
                    depth_from: Some(round_depth(depth_from)),
                    depth_to: Some(round_depth(depth_to)),
                    thickness: Some(thickness),
                    colour_of_return_water: safe_string(pick(record, "return_water_colour")),
                    water_loss: safe_string(pick(record, "water_loss")),
                    diameter_of_borehole: safe_string(pick(record, "borehole_diameter")),
                    tcr_percent: safe_number(pick(record, "tcr_percent")),
                    rqd_percent: safe_number(pick(record, "rqd_percent")),
                    remarks: safe_string(pick(record, "remarks")),
                    samples: Vec::new(),
                });
                let pos = strata.len() - 1;
                index.insert(key, pos);
                pos
            }
        };

        let sample = build_sample(record);
        if !sample.is_empty() {
            strata[position].samples.push(sample);
        }
    }

    strata
}

fn build_sample(record: &Record) -> Sample {
    Sample {
        sample_event_type: safe_string(pick(record, "sample_event_type")),
        sample_event_depth_m: safe_number(pick(record, "sample_event_depth_m")),
        run_length_m: safe_number(pick(record, "run_length_m")),
        penetration_15cm: vec![
            safe_number(pick(record, "spt_blows_1")),
            safe_number(pick(record, "spt_blows_2")),
            safe_number(pick(record, "spt_blows_3")),
        ],
        n_value: safe_string(pick(record, "n_value_is_2131")),
        total_core_length_cm: safe_number(pick(record, "total_core_length_cm")),
        tcr_percent: safe_number(pick(record, "tcr_percent")),
        rqd_length_cm: safe_number(pick(record, "rqd_length_cm")),
        rqd_percent: safe_number(pick(record, "rqd_percent")),
        remarks: safe_string(pick(record, "remarks")),
    }
}
