// borevault-core/src/infrastructure/mod.rs
//
// Technical adapters: object-store backends, the Parquet engine, document
// row sources, and environment configuration. Depends on domain and ports.

pub mod columnar;
pub mod config;
pub mod csv_rows;
pub mod error;
pub mod object_store;
pub mod xlsx;

pub use error::{InfrastructureError, ObjectStoreError};
