//! Client for the stored-signature library.
//!
//! Every call first checks the bearer token locally; a missing or expired
//! token never reaches the network.

use std::{sync::Arc, time::Duration, time::Instant};

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use shared::{
    domain::{SignatureId, SignatureSummary},
    protocol::error_body_message,
};
use url::Url;

use crate::{
    credential::{current_bearer, TokenSource},
    error::{CredentialError, LibraryError},
};

/// A stored signature together with its image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub summary: SignatureSummary,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct LibraryUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait SignatureLibrary: Send + Sync {
    async fn list(&self) -> Result<Vec<SignatureSummary>, LibraryError>;
    async fn fetch_blob(&self, id: SignatureId) -> Result<Vec<u8>, LibraryError>;
    async fn add(&self, files: Vec<LibraryUpload>) -> Result<(), LibraryError>;
    async fn delete(&self, id: SignatureId) -> Result<(), LibraryError>;
}

pub struct HttpSignatureLibrary {
    http: Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl HttpSignatureLibrary {
    pub fn new(
        base_url: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, LibraryError> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: Url::parse(base_url.trim_end_matches('/'))?,
            tokens,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, LibraryError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, LibraryError> {
        let now = chrono::Utc::now().timestamp();
        let bearer = current_bearer(self.tokens.as_ref(), now).inspect_err(|err| {
            tracing::warn!("library call blocked: {err}");
        })?;
        Ok(request.header(reqwest::header::AUTHORIZATION, bearer.header_value()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, LibraryError> {
        let response = self.authorized(request)?.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(status = status.as_u16(), "library rejected the access token");
            return Err(CredentialError::Rejected.into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_body_message(&body);
            tracing::warn!(status = status.as_u16(), %message, "library request failed");
            return Err(LibraryError::Remote {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SignatureLibrary for HttpSignatureLibrary {
    async fn list(&self) -> Result<Vec<SignatureSummary>, LibraryError> {
        let url = self.endpoint("Information/Get")?;
        let request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        Ok(self.send(request).await?.json().await?)
    }

    async fn fetch_blob(&self, id: SignatureId) -> Result<Vec<u8>, LibraryError> {
        let url = self.endpoint("GetSignature")?;
        let request = self.http.get(url).query(&[("fileId", id.0)]);
        Ok(self.send(request).await?.bytes().await?.to_vec())
    }

    async fn add(&self, files: Vec<LibraryUpload>) -> Result<(), LibraryError> {
        let url = self.endpoint("AddSignature")?;
        let count = files.len();
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime_type)?;
            form = form.part("file", part);
        }
        self.send(self.http.post(url).multipart(form)).await?;
        tracing::info!(count, "uploaded signatures to library");
        Ok(())
    }

    async fn delete(&self, id: SignatureId) -> Result<(), LibraryError> {
        let url = self.endpoint("DeleteSignature")?;
        let request = self
            .http
            .delete(url)
            .query(&[("fileId", id.0)])
            .header(reqwest::header::ACCEPT, "*/*");
        self.send(request).await?;
        tracing::info!(%id, "deleted signature from library");
        Ok(())
    }
}

/// Lists the library, then fetches every blob concurrently.
pub async fn load_library(library: &dyn SignatureLibrary) -> Result<Vec<LibraryEntry>, LibraryError> {
    let started = Instant::now();
    let summaries = library.list().await?;
    let entries = try_join_all(summaries.into_iter().map(|summary| async move {
        let bytes = library.fetch_blob(summary.id).await?;
        Ok::<_, LibraryError>(LibraryEntry { summary, bytes })
    }))
    .await?;
    tracing::info!(
        count = entries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "loaded signature library"
    );
    Ok(entries)
}

#[cfg(test)]
#[path = "tests/library_tests.rs"]
mod tests;
