use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::TabId;

pub type Result<T> = std::result::Result<T, TabSeekError>;

#[derive(Debug, Error)]
pub enum TabSeekError {
    #[error("script injection denied for tab {tab_id}: {reason}")]
    InjectionDenied { tab_id: TabId, reason: String },

    #[error("unroutable action: {0}")]
    UnroutableAction(String),

    #[error("no active tab in the focused window")]
    MissingActiveTab,

    #[error("host capability unavailable: {0}")]
    HostUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
}

impl TabSeekError {
    pub(crate) fn mutex_poisoned(name: &str) -> Self {
        Self::Internal(format!("{name} mutex poisoned"))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InjectionDenied { .. } => "INJECTION_DENIED",
            Self::UnroutableAction(_) => "UNROUTABLE_ACTION",
            Self::MissingActiveTab => "MISSING_ACTIVE_TAB",
            Self::HostUnavailable(_) => "HOST_UNAVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Failures the synchronizer downgrades to "no text available".
    #[must_use]
    pub fn is_injection_denied(&self) -> bool {
        matches!(self, Self::InjectionDenied { .. })
    }

    pub fn to_payload(&self, operation: impl Into<String>) -> ErrorPayload {
        let tab_id = match self {
            Self::InjectionDenied { tab_id, .. } => Some(*tab_id),
            _ => None,
        };
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            tab_id,
        }
    }
}
