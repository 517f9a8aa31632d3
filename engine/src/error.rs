use serde::Serialize;
use thiserror::Error;

/// Unified error surface for hosts embedding the engine.
///
/// Serializes as tagged JSON so front-ends can branch on `type` without
/// string matching. Nothing in the engine crashes the host; every failure
/// reaches it as one of these or as a status field.
#[derive(Error, Debug, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum EngineError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Classification error: {message}")]
    Classification { message: String },

    #[error("Guide error: {message}")]
    Guide { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },
}

impl EngineError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn classification(message: impl Into<String>) -> Self {
        Self::Classification {
            message: message.into(),
        }
    }

    pub fn guide(message: impl Into<String>) -> Self {
        Self::Guide {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Whether retrying the operation can plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage { .. }
            | Self::Classification { .. }
            | Self::Guide { .. }
            | Self::Io { .. } => true,
            Self::NotFound { .. } | Self::Parse { .. } => false,
        }
    }
}

impl From<crate::review::storage::StorageError> for EngineError {
    fn from(err: crate::review::storage::StorageError) -> Self {
        use crate::review::storage::StorageError;
        match err {
            StorageError::Json(e) => Self::Parse {
                message: e.to_string(),
            },
            other => Self::storage(other.to_string()),
        }
    }
}

impl From<crate::classify::ClassifyError> for EngineError {
    fn from(err: crate::classify::ClassifyError) -> Self {
        use crate::classify::ClassifyError;
        match err {
            ClassifyError::Parse(msg) => Self::Parse { message: msg },
            ClassifyError::Io(e) => Self::Io {
                message: e.to_string(),
            },
            other => Self::classification(other.to_string()),
        }
    }
}

impl From<crate::guide::GuideError> for EngineError {
    fn from(err: crate::guide::GuideError) -> Self {
        Self::guide(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
