//! Bridge generation error types.

use tether_native::NativeError;

/// Errors that abort a bridge generation call.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A value's type has no mirror.
    #[error("unmapped type '{ty}': {reason}")]
    UnmappedType { ty: String, reason: String },

    /// A type combination the marshalling rules do not define.
    #[error("unsupported shape: {detail}")]
    UnsupportedShape { detail: String },

    /// Generated code used a temporary outside the scope that keeps it valid.
    #[error("scope violation: {detail}")]
    ScopeViolation { detail: String },

    /// Error from the native declaration model.
    #[error("native model error: {0}")]
    Native(#[from] NativeError),

    /// Report serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub(crate) fn unmapped(ty: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::UnmappedType {
            ty: ty.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        BridgeError::UnsupportedShape {
            detail: detail.into(),
        }
    }

    pub(crate) fn scope_violation(detail: impl Into<String>) -> Self {
        BridgeError::ScopeViolation {
            detail: detail.into(),
        }
    }
}

/// Result type alias for bridge generation.
pub type Result<T> = std::result::Result<T, BridgeError>;
