//! Error types for prospect-sync
//!
//! `SyncError` classifies every failure a reconciliation step can hit. The
//! classification drives policy: transient errors leave the change-log entry
//! for the next cycle, permanent ones may eventually be dead-lettered.

/// Reconciliation error kinds
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("compensation failure: {0}")]
    CompensationFailure(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unrecognized operation kind '{0}'")]
    UnknownOperation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn connectivity(msg: impl std::fmt::Display) -> Self {
        SyncError::Connectivity(msg.to_string())
    }

    pub fn not_found(msg: impl std::fmt::Display) -> Self {
        SyncError::NotFound(msg.to_string())
    }

    pub fn transform(msg: impl std::fmt::Display) -> Self {
        SyncError::Transform(msg.to_string())
    }

    pub fn configuration(msg: impl std::fmt::Display) -> Self {
        SyncError::Configuration(msg.to_string())
    }

    /// Errors that retrying the same entry cannot fix.
    ///
    /// Transform errors are excluded: they depend on region configuration,
    /// which an operator can still correct.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SyncError::NotFound(_) | SyncError::UnknownOperation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }

    /// Short stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Connectivity(_) => "connectivity",
            SyncError::NotFound(_) => "not_found",
            SyncError::Transform(_) => "transform",
            SyncError::CompensationFailure(_) => "compensation_failure",
            SyncError::Configuration(_) => "configuration",
            SyncError::UnknownOperation(_) => "unknown_operation",
            SyncError::Unauthorized(_) => "unauthorized",
            SyncError::Filesystem(_) => "filesystem",
        }
    }
}
