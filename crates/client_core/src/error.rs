use shared::{
    error::{ApiError, ErrorCode},
    protocol::StageAction,
};
use thiserror::Error;

pub const UPLOAD_PROBLEM: &str = "upload problem: the processing service could not be reached";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("'{name}' is not a recognised image: {source}")]
    Unrecognized {
        name: String,
        source: image::ImageError,
    },
    #[error("failed to decode '{name}': {source}")]
    Decode {
        name: String,
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("access token is missing; please sign in again")]
    Missing,
    #[error("access token is malformed ({0}); please sign in again")]
    Malformed(String),
    #[error("access token expired; please sign in again")]
    Expired { expired_at: i64 },
    #[error("token expired or invalid; please sign in again")]
    Rejected,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("signature library returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("signature library request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid signature library url: {0}")]
    Url(#[from] url::ParseError),
}

impl LibraryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LibraryError::Credential(_) => ErrorCode::Credential,
            LibraryError::Remote { .. } => ErrorCode::Remote,
            LibraryError::Transport(_) => ErrorCode::Transport,
            LibraryError::Url(_) => ErrorCode::Internal,
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(self.code(), self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Precondition(String),
    #[error("{action} stage returned {status}: {message}")]
    Remote {
        action: StageAction,
        status: u16,
        message: String,
    },
    #[error("{action} stage request failed: {source}")]
    Transport {
        action: StageAction,
        source: reqwest::Error,
    },
    #[error("{action} stage returned an unreadable result: {message}")]
    Decode { action: StageAction, message: String },
    #[error("{action} stage returned an unusable image: {source}")]
    Image {
        action: StageAction,
        source: ImageError,
    },
}

impl WorkflowError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WorkflowError::Precondition(_) => ErrorCode::Precondition,
            WorkflowError::Remote { .. } => ErrorCode::Remote,
            WorkflowError::Transport { .. } => ErrorCode::Transport,
            WorkflowError::Decode { .. } | WorkflowError::Image { .. } => ErrorCode::Decode,
        }
    }

    /// Text rendered into the results area.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Precondition(message) => message.clone(),
            WorkflowError::Remote {
                action, message, ..
            } => format!("{} failed: {message}", action.label()),
            WorkflowError::Transport { .. } => UPLOAD_PROBLEM.to_string(),
            WorkflowError::Decode { action, message } => {
                format!("{} returned an unreadable result: {message}", action.label())
            }
            WorkflowError::Image { action, source } => {
                format!("{} returned an unusable image: {source}", action.label())
            }
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(self.code(), self.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_name_the_stage() {
        let err = WorkflowError::Remote {
            action: StageAction::Clear,
            status: 422,
            message: "region is empty".into(),
        };
        assert_eq!(err.code(), ErrorCode::Remote);
        assert_eq!(err.user_message(), "Clear region failed: region is empty");
    }

    #[test]
    fn credential_errors_require_reauth() {
        let err = LibraryError::from(CredentialError::Expired { expired_at: 1 });
        let api = err.to_api_error();
        assert!(api.code.requires_reauth());
        assert!(api.message.contains("expired"));
    }
}
