// borevault-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

/// Object-store failures, separated so that callers can tell a clean
/// "not there" from a transport fault and from an overwrite collision.
#[derive(Error, Debug, Diagnostic)]
pub enum ObjectStoreError {
    #[error("Object not found: {0}")]
    #[diagnostic(code(borevault::infra::store::not_found))]
    NotFound(String),

    #[error("Object already exists at '{0}'; overwrites are not allowed")]
    #[diagnostic(
        code(borevault::infra::store::overwrite_forbidden),
        help("Data files are immutable. A collision here usually means a concurrent writer \
              won the race; re-read the record metadata and retry.")
    )]
    OverwriteForbidden(String),

    #[error("Object store transport error: {0}")]
    #[diagnostic(code(borevault::infra::store::transport))]
    Transport(String),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- OBJECT STORE ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(borevault::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- COLUMNAR ---
    #[error("Parquet error: {0}")]
    #[diagnostic(code(borevault::infra::parquet))]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    #[diagnostic(code(borevault::infra::arrow))]
    Arrow(#[from] arrow::error::ArrowError),

    // --- SERIALIZATION ---
    #[error("JSON error: {0}")]
    #[diagnostic(code(borevault::infra::json))]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(borevault::infra::csv))]
    Csv(#[from] csv::Error),

    // --- SPREADSHEETS ---
    #[error("Spreadsheet archive error: {0}")]
    #[diagnostic(
        code(borevault::infra::xlsx::archive),
        help("XLSX files are zip archives; the upload may be truncated or not an XLSX at all.")
    )]
    Archive(#[from] zip::result::ZipError),

    #[error("Spreadsheet XML error: {0}")]
    #[diagnostic(code(borevault::infra::xlsx::xml))]
    Xml(#[from] quick_xml::Error),

    // --- CONFIG ---
    #[error("Configuration error: {0}")]
    #[diagnostic(code(borevault::infra::config))]
    Config(String),
}
