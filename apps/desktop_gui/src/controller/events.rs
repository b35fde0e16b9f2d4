//! UI/backend events and error modeling for the desktop shell.

use client_core::{LibraryEntry, StageResponse, WorkflowError};
use shared::{
    domain::SignatureId,
    error::{ApiError, ErrorCode},
    protocol::StageAction,
};

pub enum UiEvent {
    Info(String),
    Error(UiError),
    LibraryLoaded(Vec<LibraryEntry>),
    SignatureDeleted(SignatureId),
    StageFinished {
        action: StageAction,
        outcome: Result<StageResponse, WorkflowError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Remote,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Library,
    LocalFile,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_api(context: UiErrorContext, error: ApiError) -> Self {
        let category = match error.code {
            ErrorCode::Credential => UiErrorCategory::Auth,
            ErrorCode::Transport => UiErrorCategory::Transport,
            ErrorCode::Remote => UiErrorCategory::Remote,
            ErrorCode::Precondition | ErrorCode::Decode => UiErrorCategory::Validation,
            ErrorCode::Internal => UiErrorCategory::Unknown,
        };
        Self {
            category,
            context,
            message: error.message,
        }
    }

    /// For failures that never went through the client core, such as a file
    /// that could not be read.
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("connection") || lower.contains("timed out") {
            UiErrorCategory::Transport
        } else if lower.contains("failed to read") || lower.contains("not a recognised image") {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };
        Self {
            category,
            context,
            message,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == UiErrorCategory::Auth
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Banner text; credential problems lead with a sign-in hint.
    pub fn banner(&self) -> String {
        let area = match self.context {
            UiErrorContext::BackendStartup => "Startup",
            UiErrorContext::Library => "Signature library",
            UiErrorContext::LocalFile => "File",
        };
        if self.requires_reauth() {
            format!("{area}: {} (re-authenticate and refresh)", self.message)
        } else {
            format!("{area}: {}", self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_require_reauth() {
        let err = UiError::from_api(
            UiErrorContext::Library,
            ApiError::new(ErrorCode::Credential, "access token expired; please sign in again"),
        );
        assert_eq!(err.category(), UiErrorCategory::Auth);
        assert!(err.requires_reauth());
        assert!(err.banner().starts_with("Signature library: access token expired"));
    }

    #[test]
    fn unreadable_local_file_is_a_validation_error() {
        let err = UiError::from_message(
            UiErrorContext::LocalFile,
            "failed to read '/tmp/x.png': permission denied",
        );
        assert_eq!(err.category(), UiErrorCategory::Validation);
        assert_eq!(err.context(), UiErrorContext::LocalFile);
        assert!(!err.requires_reauth());
    }
}
