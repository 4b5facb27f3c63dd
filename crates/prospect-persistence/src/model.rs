//! Domain model types for the persistence abstraction layer
//!
//! These types are returned by the persistence traits, decoupled from
//! specific storage backends.

use chrono::NaiveDateTime;
use prospect_common::NaturalKey;
use serde::{Deserialize, Serialize};

/// Kind of change captured in the source change log (`DMLTYPE$$`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    /// A code outside `I`/`U`/`D`, kept verbatim for reporting
    Unknown(String),
}

impl OperationKind {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "I" => OperationKind::Insert,
            "U" => OperationKind::Update,
            "D" => OperationKind::Delete,
            other => OperationKind::Unknown(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            OperationKind::Insert => "I",
            OperationKind::Update => "U",
            OperationKind::Delete => "D",
            OperationKind::Unknown(code) => code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pending unit of work in a region's change log.
///
/// The row's existence is the durable "not yet done" marker; it is removed
/// only once the target side effect is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub key: NaturalKey,
    pub sequence: i64,
    pub operation: OperationKind,
}

impl ChangeLogEntry {
    pub fn new(key: NaturalKey, sequence: i64, operation: OperationKind) -> Self {
        Self {
            key,
            sequence,
            operation,
        }
    }
}

/// Document metadata row, mirrored from source to target.
///
/// `stored_location` holds the raw source form in the source store and the
/// published form in the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub key: NaturalKey,
    pub stored_location: String,
    pub document_type: Option<String>,
    pub document_subtype: Option<String>,
    pub data_category: Option<String>,
    pub filing_unit: Option<String>,
    pub filing_date: Option<NaiveDateTime>,
    pub note: Option<String>,
}

impl DocumentRecord {
    /// A record with only the key and location set
    pub fn new(key: NaturalKey, stored_location: impl Into<String>) -> Self {
        Self {
            key,
            stored_location: stored_location.into(),
            document_type: None,
            document_subtype: None,
            data_category: None,
            filing_unit: None,
            filing_date: None,
            note: None,
        }
    }

    /// Copy of this record pointing at another location
    pub fn relocated(&self, stored_location: impl Into<String>) -> Self {
        Self {
            stored_location: stored_location.into(),
            ..self.clone()
        }
    }
}
