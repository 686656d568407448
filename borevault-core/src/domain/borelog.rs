// borevault-core/src/domain/borelog.rs
//
// Parsed-document entities produced by the borelog parser: single-borehole
// metadata, the stratum tree with attached samples, and the depth index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Borehole-level metadata extracted from the document head (template
/// dialect) or the first data row (structured dialect).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoreholeMetadata {
    pub project_name: Option<String>,
    pub job_code: Option<String>,
    pub section_name: Option<String>,
    pub chainage_km: Option<f64>,
    pub location: String,
    pub borehole_no: Option<String>,
    pub msl: Option<f64>,
    pub method_of_boring: Option<String>,
    pub diameter_of_hole: Option<String>,
    pub coordinate_e: Option<String>,
    pub coordinate_l: Option<String>,
    pub commencement_date: Option<String>,
    pub completion_date: Option<String>,
    pub standing_water_level: Option<f64>,
    pub termination_depth: Option<f64>,
    pub permeability_tests_count: Option<i64>,
    pub spt_tests_count: Option<i64>,
    pub vs_tests_count: Option<i64>,
    pub undisturbed_samples_count: Option<i64>,
    pub disturbed_samples_count: Option<i64>,
    pub water_samples_count: Option<i64>,
    pub version_number: Option<i64>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

/// A test or specimen event at a depth within a stratum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sample_event_type: Option<String>,
    pub sample_event_depth_m: Option<f64>,
    pub run_length_m: Option<f64>,
    /// Three successive 15-cm penetration blow counts; entries stay null
    /// when the source cell is missing or unparseable.
    pub penetration_15cm: Vec<Option<f64>>,
    pub n_value: Option<String>,
    pub total_core_length_cm: Option<f64>,
    pub tcr_percent: Option<f64>,
    pub rqd_length_cm: Option<f64>,
    pub rqd_percent: Option<f64>,
    pub remarks: Option<String>,
}

impl Sample {
    /// A sample row devoid of any sample-related data is discarded.
    pub fn is_empty(&self) -> bool {
        self.sample_event_type.is_none()
            && self.sample_event_depth_m.is_none()
            && self.run_length_m.is_none()
            && self.total_core_length_cm.is_none()
            && self.tcr_percent.is_none()
            && self.rqd_length_cm.is_none()
            && self.rqd_percent.is_none()
            && self.n_value.is_none()
            && self.remarks.is_none()
            && !self.penetration_15cm.iter().any(Option::is_some)
    }
}

/// One contiguous soil or rock layer, bounded by a depth range when the
/// source provides one (thickness-only strata keep null depths).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stratum {
    pub description: String,
    pub depth_from: Option<f64>,
    pub depth_to: Option<f64>,
    pub thickness: Option<f64>,
    pub colour_of_return_water: Option<String>,
    pub water_loss: Option<String>,
    pub diameter_of_borehole: Option<String>,
    pub tcr_percent: Option<f64>,
    pub rqd_percent: Option<f64>,
    pub remarks: Option<String>,
    pub samples: Vec<Sample>,
}

/// Round a depth/thickness to the canonical 3 decimal places.
pub fn round_depth(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Depth index over a stratum list: `"{from:.3}-{to:.3}"` → 0-based ordinal.
/// Strata without both depths are not indexable and are skipped.
pub fn build_depth_index(strata: &[Stratum]) -> BTreeMap<String, usize> {
    let mut index = BTreeMap::new();
    for (ordinal, stratum) in strata.iter().enumerate() {
        if let (Some(from), Some(to)) = (stratum.depth_from, stratum.depth_to) {
            index.insert(format!("{from:.3}-{to:.3}"), ordinal);
        }
    }
    index
}
