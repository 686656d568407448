// borevault-core/src/error.rs

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::error::DomainError;
use crate::infrastructure::error::{InfrastructureError, ObjectStoreError};

#[derive(Error, Debug, Diagnostic)]
pub enum VaultError {
    // --- DOMAIN (state machine, schemas, parsing rules) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    // --- INFRASTRUCTURE (object store, parquet, IO, formats) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- GENERIC / APPLICATIVE ---
    #[error("Internal Error: {0}")]
    Internal(String),
}

// Manual impls keep `?` ergonomic at call sites without duplicate variants.
impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl From<ObjectStoreError> for VaultError {
    fn from(err: ObjectStoreError) -> Self {
        VaultError::Infrastructure(InfrastructureError::ObjectStore(err))
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Infrastructure(InfrastructureError::Json(err))
    }
}

impl VaultError {
    /// User-visible status-code mapping used by the request dispatcher.
    pub fn status_code(&self) -> u16 {
        match self {
            VaultError::Domain(domain) => match domain {
                DomainError::RecordNotFound(_) | DomainError::VersionNotFound { .. } => 404,
                DomainError::AlreadyExists(_) => 409,
                DomainError::IllegalTransition { .. }
                | DomainError::SchemaValidation { .. }
                | DomainError::UnknownTable(_)
                | DomainError::UnknownEntityType(_)
                | DomainError::MalformedDocument(_)
                | DomainError::MissingField(_) => 400,
            },
            VaultError::Infrastructure(infra) => match infra {
                InfrastructureError::ObjectStore(ObjectStoreError::NotFound(_)) => 404,
                // A lost data-file race is a retryable collision, not a fault.
                InfrastructureError::ObjectStore(ObjectStoreError::OverwriteForbidden(_)) => 409,
                _ => 500,
            },
            VaultError::Internal(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::RecordStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            VaultError::from(DomainError::RecordNotFound("r".into())).status_code(),
            404
        );
        assert_eq!(
            VaultError::from(DomainError::AlreadyExists("r".into())).status_code(),
            409
        );
        assert_eq!(
            VaultError::from(DomainError::IllegalTransition {
                record_id: "r".into(),
                from: RecordStatus::Approved,
                to: RecordStatus::Rejected,
            })
            .status_code(),
            400
        );
        assert_eq!(
            VaultError::from(ObjectStoreError::NotFound("k".into())).status_code(),
            404
        );
        assert_eq!(
            VaultError::from(ObjectStoreError::OverwriteForbidden("k".into())).status_code(),
            409
        );
        assert_eq!(
            VaultError::from(ObjectStoreError::Transport("boom".into())).status_code(),
            500
        );
        assert_eq!(VaultError::Internal("x".into()).status_code(), 500);
    }
}
