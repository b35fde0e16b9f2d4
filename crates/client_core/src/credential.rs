//! Bearer credentials for the signature library.
//!
//! Tokens are issued elsewhere; this module only reads them and refuses to use
//! one whose `exp` claim is already in the past.

use std::{fs, path::PathBuf};

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

use crate::error::CredentialError;

pub trait TokenSource: Send + Sync {
    fn load(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

impl TokenSource for StaticToken {
    fn load(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the token from a file on every call so a refreshed token is picked up
/// without restarting.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenSource for TokenFile {
    fn load(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Some(raw),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "failed to read token file: {err}");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    raw: String,
    expires_at: Option<i64>,
}

impl BearerToken {
    /// Reads the claims without verifying the signature; the library service
    /// does that.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let raw = raw.trim();
        let raw = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        if raw.is_empty() {
            return Err(CredentialError::Missing);
        }

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Claims>(raw, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|err| CredentialError::Malformed(err.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            expires_at: data.claims.exp,
        })
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn ensure_fresh(self, now: i64) -> Result<Self, CredentialError> {
        match self.expires_at {
            Some(exp) if exp < now => Err(CredentialError::Expired { expired_at: exp }),
            _ => Ok(self),
        }
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.raw)
    }
}

/// Loads, parses and checks the current token. Nothing goes on the wire unless
/// this succeeds.
pub fn current_bearer(source: &dyn TokenSource, now: i64) -> Result<BearerToken, CredentialError> {
    let raw = source.load().ok_or(CredentialError::Missing)?;
    BearerToken::parse(&raw)?.ensure_fresh(now)
}
