// borevault-core/src/lib.rs

// 1. Mandatory documentation for production code
#![allow(missing_docs)]
// 2. Memory safety
#![deny(unsafe_code)]
// 3. Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// 4. Performance
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports (Interfaces / Traits)
// The object-store contract every backend implements.
pub mod ports;

// 2. Domain (business core)
// Record model, schema catalogue, parsed-document entities, borelog parser.
// Depends on nothing else.
pub mod domain;

// 3. Infrastructure (Adapters)
// S3/local/memory backends, Parquet engine, XLSX/CSV row sources, config.
pub mod infrastructure;

// 4. Application (Use Cases)
// Versioned repository, entity facade, CSV ingestion, parse worker,
// request dispatcher, legacy layout support.
pub mod application;

// --- GLOBAL ERROR HANDLING ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
pub use error::VaultError;
