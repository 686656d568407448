// borevault-core/src/domain/registry.rs
//
// Static catalogue of table schemas, derived from the platform's relational
// schema. The registry is data, not behavior: `lookup` is the only query.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::schema::{Field, LogicalType, TableSchema};

static REGISTRY: OnceLock<HashMap<String, TableSchema>> = OnceLock::new();

/// Look up a table schema by name (case-insensitive).
pub fn lookup(table_name: &str) -> Option<&'static TableSchema> {
    registry().get(&table_name.to_lowercase())
}

/// All registered table names, sorted.
pub fn table_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = registry().keys().map(|k| k.as_str()).collect();
    names.sort_unstable();
    names
}

fn registry() -> &'static HashMap<String, TableSchema> {
    REGISTRY.get_or_init(build_registry)
}

// --- Field shorthands (every table below is nullable-heavy) ---

fn text(name: &str) -> Field {
    Field::new(name, LogicalType::String, true)
}

fn text_req(name: &str) -> Field {
    Field::new(name, LogicalType::String, false)
}

fn int(name: &str) -> Field {
    Field::new(name, LogicalType::Int64, true)
}

fn int_req(name: &str) -> Field {
    Field::new(name, LogicalType::Int64, false)
}

fn num(name: &str) -> Field {
    Field::new(name, LogicalType::Float64, true)
}

fn flag(name: &str) -> Field {
    Field::new(name, LogicalType::Boolean, true)
}

fn ts(name: &str) -> Field {
    Field::new(name, LogicalType::TimestampMs, true)
}

fn num_list(name: &str) -> Field {
    Field::new(
        name,
        LogicalType::List(Box::new(LogicalType::Float64)),
        true,
    )
}

fn text_list(name: &str) -> Field {
    Field::new(name, LogicalType::List(Box::new(LogicalType::String)), true)
}

fn build_registry() -> HashMap<String, TableSchema> {
    let tables = vec![
        // --- Borelogs ---
        TableSchema::new(
            "borelog_versions",
            vec![
                text_req("borelog_id"),
                text_req("project_id"),
                int("version_no"),
                text("job_code"),
                text("project_name"),
                text("section_name"),
                num("chainage_km"),
                text("location"),
                text("borehole_no"),
                num("msl"),
                text("method_of_boring"),
                text("diameter_of_hole"),
                text("coordinate_e"),
                text("coordinate_l"),
                ts("commencement_date"),
                ts("completion_date"),
                num("standing_water_level"),
                num("termination_depth"),
                int("permeability_tests_count"),
                int("spt_tests_count"),
                int("vs_tests_count"),
                int("undisturbed_samples_count"),
                int("disturbed_samples_count"),
                int("water_samples_count"),
                text("status"),
                text("remarks"),
                text("created_by"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "borelog_details",
            vec![
                text_req("borelog_id"),
                text_req("project_id"),
                int("version_no"),
                text("number"),
                num("msl"),
                text("boring_method"),
                num("hole_diameter"),
                ts("commencement_date"),
                ts("completion_date"),
                num("standing_water_level"),
                num("termination_depth"),
                text("stratum_description"),
                num("stratum_depth_from"),
                num("stratum_depth_to"),
                num("stratum_thickness_m"),
                text("remarks"),
            ],
        ),
        TableSchema::new(
            "geological_log",
            vec![
                text_req("geological_log_id"),
                text_req("project_id"),
                text("project_name"),
                text("client_name"),
                text("design_consultant"),
                text("job_code"),
                text("area"),
                text("borehole_location"),
                text("borehole_number"),
                num("msl"),
                text("method_of_boring"),
                num("diameter_of_hole"),
                ts("commencement_date"),
                ts("completion_date"),
                num("standing_water_level"),
                num("termination_depth"),
                text("coordinate"),
                text("type_of_core_barrel"),
                text("bearing_of_hole"),
                num("collar_elevation"),
                text("logged_by"),
                text("checked_by"),
                text("remarks"),
                text("created_by_user_id"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "stratum_layers",
            vec![
                text_req("layer_id"),
                text_req("borelog_id"),
                int("stratum_order"),
                text("description"),
                num("depth_from"),
                num("depth_to"),
                num("thickness"),
                text("colour_of_return_water"),
                text("water_loss"),
                text("diameter_of_borehole"),
                num("tcr_percent"),
                num("rqd_percent"),
                text("remarks"),
            ],
        ),
        TableSchema::new(
            "stratum_sample_points",
            vec![
                text_req("sample_id"),
                text_req("layer_id"),
                text("sample_event_type"),
                num("sample_event_depth_m"),
                num("run_length_m"),
                num_list("penetration_15cm"),
                text("n_value"),
                num("total_core_length_cm"),
                num("tcr_percent"),
                num("rqd_length_cm"),
                num("rqd_percent"),
                text("remarks"),
            ],
        ),
        // --- Lab reports ---
        TableSchema::new(
            "unified_lab_reports",
            vec![
                text_req("report_id"),
                text_req("project_id"),
                text("borelog_id"),
                text("sample_id"),
                text("lab_name"),
                text("test_type"),
                ts("test_date"),
                text("tested_by"),
                text("checked_by"),
                text("approved_by_name"),
                num("moisture_content"),
                num("bulk_density"),
                num("dry_density"),
                num("specific_gravity"),
                num("liquid_limit"),
                num("plastic_limit"),
                num("plasticity_index"),
                text("soil_classification"),
                text("remarks"),
                text("status"),
                text("created_by"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "lab_report_versions",
            vec![
                text_req("report_id"),
                text_req("project_id"),
                int_req("version_no"),
                text("status"),
                text("payload_json"),
                text("created_by"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "soil_test_samples",
            vec![
                text_req("sample_id"),
                text_req("report_id"),
                num("depth_m"),
                text("sample_type"),
                num("moisture_content"),
                num("liquid_limit"),
                num("plastic_limit"),
                num("shrinkage_limit"),
                num("grain_size_gravel"),
                num("grain_size_sand"),
                num("grain_size_silt"),
                num("grain_size_clay"),
                num("cohesion_kpa"),
                num("friction_angle_deg"),
                text("remarks"),
            ],
        ),
        TableSchema::new(
            "rock_test_samples",
            vec![
                text_req("sample_id"),
                text_req("report_id"),
                num("depth_m"),
                text("rock_type"),
                num("ucs_mpa"),
                num("point_load_index"),
                num("tensile_strength_mpa"),
                num("density"),
                num("porosity_percent"),
                num("water_absorption_percent"),
                text("remarks"),
            ],
        ),
        // --- Uploads ---
        TableSchema::new(
            "pending_csv_uploads",
            vec![
                text_req("upload_id"),
                text_req("project_id"),
                text("borelog_id"),
                text("file_name"),
                text("file_type"),
                text("s3_key"),
                int("total_rows"),
                int("valid_rows"),
                int("invalid_rows"),
                text("error_summary_json"),
                text("status"),
                text("uploaded_by"),
                ts("uploaded_at"),
            ],
        ),
        // --- Core platform entities ---
        TableSchema::new(
            "projects",
            vec![
                text_req("project_id"),
                text_req("name"),
                text("location"),
                text("client_name"),
                text("job_code"),
                ts("start_date"),
                ts("end_date"),
                text("created_by"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "users",
            vec![
                text_req("user_id"),
                text_req("email"),
                text("name"),
                text("organisation"),
                text("role"),
                flag("is_active"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "contacts",
            vec![
                text_req("contact_id"),
                text_req("organisation"),
                text("name"),
                text("designation"),
                text("email"),
                text("phone"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "structures",
            vec![
                text_req("structure_id"),
                text_req("project_id"),
                text("structure_type"),
                text("description"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "substructures",
            vec![
                text_req("substructure_id"),
                text_req("structure_id"),
                text_req("project_id"),
                text("substructure_type"),
                text("remark"),
                ts("created_at"),
            ],
        ),
        TableSchema::new(
            "borelog_assignments",
            vec![
                text_req("assignment_id"),
                text_req("borelog_id"),
                text_req("assigned_to"),
                text("assigned_by"),
                text("status"),
                ts("assigned_at"),
                ts("completed_at"),
            ],
        ),
        TableSchema::new(
            "lab_test_assignments",
            vec![
                text_req("assignment_id"),
                text_req("report_id"),
                text_req("assigned_to"),
                text("assigned_by"),
                text("status"),
                ts("assigned_at"),
                ts("completed_at"),
            ],
        ),
        TableSchema::new(
            "anomalies",
            vec![
                text_req("anomaly_id"),
                text_req("project_id"),
                text("borelog_id"),
                text("description"),
                text("severity"),
                text("flagged_by"),
                ts("flagged_at"),
                flag("resolved"),
            ],
        ),
        TableSchema::new(
            "borelog_images",
            vec![
                text_req("image_id"),
                text_req("borelog_id"),
                text("s3_key"),
                text("caption"),
                num("depth_m"),
                text("uploaded_by"),
                ts("uploaded_at"),
            ],
        ),
        TableSchema::new(
            "lab_report_images",
            vec![
                text_req("image_id"),
                text_req("report_id"),
                text("s3_key"),
                text("caption"),
                text("uploaded_by"),
                ts("uploaded_at"),
            ],
        ),
        TableSchema::new(
            "user_project_assignments",
            vec![
                text_req("assignment_id"),
                text_req("user_id"),
                text_req("project_id"),
                text("role"),
                ts("assigned_at"),
            ],
        ),
        TableSchema::new(
            "workflow_actions",
            vec![
                text_req("action_id"),
                text_req("entity_id"),
                text("entity_type"),
                text("action"),
                text("actor"),
                text("comment"),
                ts("performed_at"),
            ],
        ),
        TableSchema::new(
            "borelog_submissions",
            vec![
                text_req("submission_id"),
                text_req("borelog_id"),
                text_req("project_id"),
                int("version_no"),
                text("submitted_by"),
                ts("submitted_at"),
                text("status"),
                text("comment"),
            ],
        ),
        TableSchema::new(
            "lab_submissions",
            vec![
                text_req("submission_id"),
                text_req("report_id"),
                text_req("project_id"),
                int("version_no"),
                text("submitted_by"),
                ts("submitted_at"),
                text("status"),
                text("comment"),
                text_list("attachments"),
            ],
        ),
    ];

    tables
        .into_iter()
        .map(|t| (t.name.to_lowercase(), t))
        .collect()
}
