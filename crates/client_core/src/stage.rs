//! Remote processing stages over HTTP multipart.

use std::{sync::Arc, time::Duration, time::Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Lane, LanePair, NormalizedRect},
    protocol::{
        error_body_message, DetectionPayload, ImagePairPayload, StageAction, VerdictRow,
        VerifyPayload,
    },
};

use crate::error::WorkflowError;

/// One lane's part of a stage request.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Arc<[u8]>,
    /// `[y1, x1, y2, x2]`, only sent to the clear stage.
    pub region: Option<[f64; 4]>,
}

#[derive(Debug, Clone)]
pub struct StageRequest {
    pub action: StageAction,
    pub inputs: LanePair<StageInput>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StagePayload {
    /// Encoded image bytes per lane (align, clear, points).
    Images(LanePair<Vec<u8>>),
    Detections(LanePair<Vec<NormalizedRect>>),
    Verdict(Vec<VerdictRow>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageResponse {
    pub action: StageAction,
    pub payload: StagePayload,
}

#[async_trait]
pub trait StageTransport: Send + Sync {
    async fn dispatch(&self, request: StageRequest) -> Result<StageResponse, WorkflowError>;
}

pub struct HttpStageTransport {
    http: Client,
    base_url: String,
}

impl HttpStageTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn form(request: &StageRequest) -> Result<Form, WorkflowError> {
        let mut form = Form::new();
        for (lane, input) in request.inputs.iter() {
            let part = Part::bytes(input.bytes.to_vec())
                .file_name(input.file_name.clone())
                .mime_str(input.mime_type)
                .map_err(|source| WorkflowError::Transport {
                    action: request.action,
                    source,
                })?;
            form = match request.action {
                StageAction::Clear => {
                    let field = lane.field_name();
                    let region = input.region.ok_or_else(|| {
                        WorkflowError::Precondition(format!("no region selected on the {lane} image"))
                    })?;
                    let mut form = form.part(format!("{field}[file]"), part);
                    for (name, value) in ["y1", "x1", "y2", "x2"].iter().zip(region) {
                        form = form.text(format!("{field}[{name}]"), value.to_string());
                    }
                    form
                }
                _ => form.part(lane.field_name(), part),
            };
        }
        Ok(form)
    }
}

fn parse_json<T: DeserializeOwned>(action: StageAction, body: &[u8]) -> Result<T, WorkflowError> {
    serde_json::from_slice(body).map_err(|err| WorkflowError::Decode {
        action,
        message: err.to_string(),
    })
}

fn decode_image_b64(action: StageAction, lane: Lane, encoded: &str) -> Result<Vec<u8>, WorkflowError> {
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|err| WorkflowError::Decode {
            action,
            message: format!("{lane} image is not valid base64: {err}"),
        })
}

/// Interprets a successful stage body according to the action's response shape.
pub fn decode_stage_body(action: StageAction, body: &[u8]) -> Result<StagePayload, WorkflowError> {
    match action {
        StageAction::Align | StageAction::Clear | StageAction::ExtractPoints => {
            let pair: ImagePairPayload = parse_json(action, body)?;
            Ok(StagePayload::Images(LanePair::new(
                decode_image_b64(action, Lane::Original, &pair.file_original)?,
                decode_image_b64(action, Lane::Test, &pair.file_test)?,
            )))
        }
        StageAction::Detect => {
            let detections: DetectionPayload = parse_json(action, body)?;
            Ok(StagePayload::Detections(LanePair::new(
                detections.file_original.rects(),
                detections.file_test.rects(),
            )))
        }
        StageAction::Verify => {
            let verdict: VerifyPayload = parse_json(action, body)?;
            Ok(StagePayload::Verdict(verdict.rows()))
        }
    }
}

#[async_trait]
impl StageTransport for HttpStageTransport {
    async fn dispatch(&self, request: StageRequest) -> Result<StageResponse, WorkflowError> {
        let action = request.action;
        let url = format!("{}{}", self.base_url, action.path());
        let form = Self::form(&request)?;
        let started = Instant::now();
        tracing::debug!(stage = %action, %url, "dispatching stage request");

        let transport = |source| WorkflowError::Transport { action, source };
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_body_message(&body);
            tracing::warn!(stage = %action, status = status.as_u16(), %message, "stage failed");
            return Err(WorkflowError::Remote {
                action,
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        let payload = decode_stage_body(action, &body)?;
        tracing::info!(
            stage = %action,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stage completed"
        );
        Ok(StageResponse { action, payload })
    }
}

#[cfg(test)]
#[path = "tests/stage_tests.rs"]
mod tests;
