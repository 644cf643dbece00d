use thiserror::Error;

/// User-facing failures. None of these are fatal; the caller is sent back to
/// `redirect` with the message as an error notice.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{message}")]
    Validation { message: String, redirect: String },

    #[error("{message}")]
    Conflict { message: String, redirect: String },

    #[error("{message}")]
    Authorization { message: String, redirect: String },

    #[error("{message}")]
    NotFound { message: String, redirect: String },

    #[error("Please log in to access this page.")]
    Unauthenticated,

    #[error("failed to persist changes: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl PortalError {
    pub fn validation(message: impl Into<String>, redirect: &str) -> Self {
        PortalError::Validation {
            message: message.into(),
            redirect: redirect.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>, redirect: &str) -> Self {
        PortalError::Conflict {
            message: message.into(),
            redirect: redirect.to_string(),
        }
    }

    pub fn authorization(message: impl Into<String>, redirect: &str) -> Self {
        PortalError::Authorization {
            message: message.into(),
            redirect: redirect.to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>, redirect: &str) -> Self {
        PortalError::NotFound {
            message: message.into(),
            redirect: redirect.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Validation { .. } => "validation_error",
            PortalError::Conflict { .. } => "conflict",
            PortalError::Authorization { .. } => "unauthorized",
            PortalError::NotFound { .. } => "not_found",
            PortalError::Unauthenticated => "unauthenticated",
            PortalError::Storage(_) => "storage_failed",
        }
    }

    /// Method the presentation layer should return to.
    pub fn redirect(&self) -> Option<&str> {
        match self {
            PortalError::Validation { redirect, .. }
            | PortalError::Conflict { redirect, .. }
            | PortalError::Authorization { redirect, .. }
            | PortalError::NotFound { redirect, .. } => Some(redirect),
            PortalError::Unauthenticated => Some("auth.login"),
            PortalError::Storage(_) => None,
        }
    }
}
