// borevault-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

use super::record::RecordStatus;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Record '{0}' already exists")]
    #[diagnostic(
        code(borevault::domain::already_exists),
        help("create_record is only valid for new record ids; use update_record instead.")
    )]
    AlreadyExists(String),

    #[error("Record '{0}' does not exist")]
    #[diagnostic(code(borevault::domain::record_not_found))]
    RecordNotFound(String),

    #[error("Version {version} of record '{record_id}' does not exist")]
    #[diagnostic(code(borevault::domain::version_not_found))]
    VersionNotFound { record_id: String, version: u32 },

    #[error("Illegal status transition for '{record_id}': {from} -> {to}")]
    #[diagnostic(
        code(borevault::domain::illegal_transition),
        help("Approved and rejected records must go through a new draft version first.")
    )]
    IllegalTransition {
        record_id: String,
        from: RecordStatus,
        to: RecordStatus,
    },

    #[error("Schema validation failed:\n{}", .violations.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n"))]
    #[diagnostic(
        code(borevault::domain::schema_validation),
        help("Every listed field must match the registered table schema.")
    )]
    SchemaValidation { violations: Vec<String> },

    #[error("No schema registered for table '{0}'")]
    #[diagnostic(code(borevault::domain::unknown_table))]
    UnknownTable(String),

    #[error("Unknown entity type: '{0}'")]
    #[diagnostic(
        code(borevault::domain::unknown_entity_type),
        help("Valid entity types: borelog, geological_log, lab_test.")
    )]
    UnknownEntityType(String),

    #[error("Malformed borelog document: {0}")]
    #[diagnostic(code(borevault::domain::malformed_document))]
    MalformedDocument(String),

    #[error("Missing required field(s): {0}")]
    #[diagnostic(code(borevault::domain::missing_field))]
    MissingField(String),
}

impl DomainError {
    pub fn schema_validation(violations: Vec<String>) -> Self {
        DomainError::SchemaValidation { violations }
    }
}
