use super::store::StoreError;

/// Errors from record operations and per-entity pass steps.
#[derive(Debug, thiserror::Error)]
pub enum AttitudeError {
    /// Rejected before touching the store. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The stored payload does not decode into the expected shape.
    #[error("corrupt {kind} record {key}: {source}")]
    Corrupt {
        kind: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {kind} record {key}: {source}")]
    Encode {
        kind: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AttitudeError {
    /// Only transient store faults are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}
