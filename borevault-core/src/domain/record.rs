// borevault-core/src/domain/record.rs
//
// The record model: addressing, approval status, and the metadata document
// stored as metadata.json next to each record's versions/ directory.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::DomainError;

// =============================================================================
//  1. ADDRESSING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Borelog,
    GeologicalLog,
    LabTest,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Borelog => "borelog",
            EntityType::GeologicalLog => "geological_log",
            EntityType::LabTest => "lab_test",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "borelog" => Ok(EntityType::Borelog),
            "geological_log" => Ok(EntityType::GeologicalLog),
            "lab_test" => Ok(EntityType::LabTest),
            other => Err(DomainError::UnknownEntityType(other.to_string())),
        }
    }

    /// Schema-registry table locked in for all versions of this entity.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Borelog => "borelog_versions",
            EntityType::GeologicalLog => "geological_log",
            EntityType::LabTest => "unified_lab_reports",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (project, entity_type, entity_id) triple. Maps deterministically to the
/// record directory `records/{project}/{entity_type}/{entity}/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAddress {
    pub project_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
}

impl RecordAddress {
    pub fn new(project_id: &str, entity_type: EntityType, entity_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            entity_type,
            entity_id: entity_id.to_string(),
        }
    }

    /// Record id in the canonical `{project}/{entity_type}/{entity}` form.
    pub fn record_id(&self) -> String {
        format!(
            "{}/{}/{}",
            self.project_id,
            self.entity_type.as_str(),
            self.entity_id
        )
    }
}

// =============================================================================
//  2. STATUS STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Draft,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "draft",
            RecordStatus::Approved => "approved",
            RecordStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(RecordStatus::Draft),
            "approved" => Some(RecordStatus::Approved),
            "rejected" => Some(RecordStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
//  3. METADATA DOCUMENT
// =============================================================================

/// One append-only history entry. The first entry always describes v1 being
/// created as draft; approvals and rejections append at current_version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: u32,
    pub status: RecordStatus,
    pub created_by: String,
    pub created_at: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub record_id: String,
    pub table_name: String,
    pub current_version: u32,
    pub status: RecordStatus,
    pub created_by: String,
    pub created_at: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<String>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl RecordMetadata {
    pub fn new_draft(
        record_id: &str,
        table_name: &str,
        created_by: &str,
        created_at: &str,
    ) -> Self {
        Self {
            record_id: record_id.to_string(),
            table_name: table_name.to_string(),
            current_version: 1,
            status: RecordStatus::Draft,
            created_by: created_by.to_string(),
            created_at: created_at.to_string(),
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            history: Vec::new(),
        }
    }

    /// Append one history entry. History only ever grows.
    pub fn push_history(
        &mut self,
        version: u32,
        status: RecordStatus,
        user: &str,
        at: &str,
        comment: &str,
    ) {
        self.history.push(HistoryEntry {
            version,
            status,
            created_by: user.to_string(),
            created_at: at.to_string(),
            comment: comment.to_string(),
        });
    }

    /// Guard for the approve transition. Approval is only legal from draft.
    pub fn check_approvable(&self) -> Result<(), DomainError> {
        match self.status {
            RecordStatus::Draft => Ok(()),
            from => Err(DomainError::IllegalTransition {
                record_id: self.record_id.clone(),
                from,
                to: RecordStatus::Approved,
            }),
        }
    }

    /// Guard for the reject transition. Rejection is only legal from draft.
    pub fn check_rejectable(&self) -> Result<(), DomainError> {
        match self.status {
            RecordStatus::Draft => Ok(()),
            from => Err(DomainError::IllegalTransition {
                record_id: self.record_id.clone(),
                from,
                to: RecordStatus::Rejected,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_layout() {
        let addr = RecordAddress::new("proj1", EntityType::Borelog, "bh-001");
        assert_eq!(addr.record_id(), "proj1/borelog/bh-001");
    }

    #[test]
    fn test_entity_type_round_trip() {
        for raw in ["borelog", "geological_log", "lab_test"] {
            let parsed = EntityType::parse(raw).unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
        assert!(EntityType::parse("contact").is_err());
    }

    #[test]
    fn test_entity_table_mapping() {
        assert_eq!(EntityType::Borelog.table_name(), "borelog_versions");
        assert_eq!(EntityType::GeologicalLog.table_name(), "geological_log");
        assert_eq!(EntityType::LabTest.table_name(), "unified_lab_reports");
    }

    #[test]
    fn test_transition_guards() {
        let mut meta = RecordMetadata::new_draft("p/borelog/e", "borelog_versions", "u1", "t0");
        assert!(meta.check_approvable().is_ok());
        assert!(meta.check_rejectable().is_ok());

        meta.status = RecordStatus::Approved;
        assert!(meta.check_approvable().is_err());
        assert!(meta.check_rejectable().is_err());

        meta.status = RecordStatus::Rejected;
        assert!(meta.check_approvable().is_err());
        assert!(meta.check_rejectable().is_err());
    }

    #[test]
    fn test_metadata_json_round_trip() {
        let mut meta = RecordMetadata::new_draft("p/borelog/e", "borelog_versions", "u1", "t0");
        meta.push_history(1, RecordStatus::Draft, "u1", "t0", "Initial creation");

        let json = serde_json::to_string_pretty(&meta).unwrap();
        assert!(json.contains("\"status\": \"draft\""));
        assert!(json.contains("\"approved_by\": null"));

        let back: RecordMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
        assert_eq!(back.history.len(), 1);
        assert_eq!(back.history[0].version, 1);
    }
}
