use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A required selection or file is missing; nothing was sent.
    Precondition,
    /// Bearer credential missing, expired or rejected.
    Credential,
    /// The remote service answered with a non-success status.
    Remote,
    /// The request never completed.
    Transport,
    /// The remote answer could not be interpreted.
    Decode,
    Internal,
}

impl ErrorCode {
    pub fn requires_reauth(self) -> bool {
        matches!(self, ErrorCode::Credential)
    }
}

/// Error record shown to the user in the results area or status banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
