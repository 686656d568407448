// borevault-core/src/ports/mod.rs

pub mod object_store;

pub use object_store::{ObjectStore, CONTENT_TYPE_JSON, CONTENT_TYPE_PARQUET};
