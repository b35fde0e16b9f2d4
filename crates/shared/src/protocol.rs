use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::NormalizedRect;

/// The five remote operations of the verification workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    Align,
    Detect,
    Clear,
    Verify,
    ExtractPoints,
}

impl StageAction {
    pub const ALL: [StageAction; 5] = [
        StageAction::Align,
        StageAction::Detect,
        StageAction::Clear,
        StageAction::Verify,
        StageAction::ExtractPoints,
    ];

    pub fn path(self) -> &'static str {
        match self {
            StageAction::Align => "/transform-signatures",
            StageAction::Detect => "/detect-signatures",
            StageAction::Clear => "/clear-signatures",
            StageAction::Verify => "/verify-signatures",
            StageAction::ExtractPoints => "/points-signatures",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StageAction::Align => "Align images",
            StageAction::Detect => "Detect signatures",
            StageAction::Clear => "Clear region",
            StageAction::Verify => "Verify authenticity",
            StageAction::ExtractPoints => "Extract points",
        }
    }
}

impl fmt::Display for StageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageAction::Align => "align",
            StageAction::Detect => "detect",
            StageAction::Clear => "clear",
            StageAction::Verify => "verify",
            StageAction::ExtractPoints => "extract_points",
        };
        f.write_str(name)
    }
}

/// Response of the align, clear and points stages: one base64 image per lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePairPayload {
    #[serde(rename = "fileOriginal")]
    pub file_original: String,
    #[serde(rename = "fileTest", alias = "fileCheck")]
    pub file_test: String,
}

/// Detector output for one lane. The service has been seen to answer both
/// with an index-keyed object and with a plain list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetectionSet {
    Indexed(Map<String, Value>),
    Listed(Vec<Value>),
}

impl Default for DetectionSet {
    fn default() -> Self {
        DetectionSet::Listed(Vec::new())
    }
}

impl DetectionSet {
    /// Rectangles in response order. Entries that are not four numbers are skipped.
    pub fn rects(&self) -> Vec<NormalizedRect> {
        let values: Vec<&Value> = match self {
            DetectionSet::Indexed(map) => map.values().collect(),
            DetectionSet::Listed(list) => list.iter().collect(),
        };
        values.into_iter().filter_map(rect_from_value).collect()
    }
}

fn rect_from_value(value: &Value) -> Option<NormalizedRect> {
    let coords = value
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<f64>>>()?;
    NormalizedRect::from_slice(&coords)
        .filter(NormalizedRect::is_finite)
        .map(|rect| rect.ordered().clamped())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionPayload {
    #[serde(rename = "fileOriginal", default)]
    pub file_original: DetectionSet,
    #[serde(rename = "fileTest", alias = "fileCheck", default)]
    pub file_test: DetectionSet,
}

/// One row of the verification results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRow {
    pub check: String,
    pub value: String,
}

/// Verify stage response: metric name to a result array whose first element
/// is the human-readable value. Key order is the server's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerifyPayload(pub Map<String, Value>);

impl VerifyPayload {
    pub fn rows(&self) -> Vec<VerdictRow> {
        self.0
            .iter()
            .map(|(check, value)| VerdictRow {
                check: check.clone(),
                value: displayed_value(value),
            })
            .collect()
    }
}

fn displayed_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items.first().map(scalar_text).unwrap_or_default(),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Extracts a readable message from a stage or library error body.
pub fn error_body_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details provided".to_string();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(text)) => text,
        Ok(Value::Object(map)) => ["error", "detail", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Ok(other) => other.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_rows_keep_server_order_and_first_element() {
        let payload: VerifyPayload = serde_json::from_str(
            r#"{"zeta": ["forged", 0.12], "check1": ["match", 0.98], "alpha": [true, 1]}"#,
        )
        .expect("payload");
        let rows = payload.rows();
        assert_eq!(
            rows,
            vec![
                VerdictRow {
                    check: "zeta".into(),
                    value: "forged".into()
                },
                VerdictRow {
                    check: "check1".into(),
                    value: "match".into()
                },
                VerdictRow {
                    check: "alpha".into(),
                    value: "true".into()
                },
            ]
        );
    }

    #[test]
    fn detections_accept_object_and_list_shapes() {
        let payload: DetectionPayload = serde_json::from_str(
            r#"{
                "fileOriginal": {"0": [0.1, 0.2, 0.3, 0.4], "1": [0.5, 0.5, 0.9, 0.9]},
                "fileTest": [[0.0, 0.0, 1.0, 1.0], [0.5, 0.5]]
            }"#,
        )
        .expect("payload");
        assert_eq!(payload.file_original.rects().len(), 2);
        assert_eq!(
            payload.file_test.rects(),
            vec![NormalizedRect::new(0.0, 0.0, 1.0, 1.0)]
        );
    }

    #[test]
    fn detections_outside_the_image_are_clamped() {
        let payload: DetectionPayload = serde_json::from_str(
            r#"{"fileOriginal": {"0": [0.1, 0.1, 1e300, 0.5]}, "fileTest": [[1.4, -0.2, 0.6, 0.3]]}"#,
        )
        .expect("payload");
        assert_eq!(
            payload.file_original.rects(),
            vec![NormalizedRect::new(0.1, 0.1, 1.0, 0.5)]
        );
        assert_eq!(
            payload.file_test.rects(),
            vec![NormalizedRect::new(0.6, 0.0, 1.0, 0.3)]
        );
    }

    #[test]
    fn empty_detection_mapping_yields_no_rects() {
        let payload: DetectionPayload =
            serde_json::from_str(r#"{"fileOriginal": {}, "fileTest": {}}"#).expect("payload");
        assert!(payload.file_original.rects().is_empty());
        assert!(payload.file_test.rects().is_empty());
    }

    #[test]
    fn image_pair_accepts_legacy_check_field() {
        let payload: ImagePairPayload =
            serde_json::from_str(r#"{"fileOriginal": "AA==", "fileCheck": "AQ=="}"#)
                .expect("payload");
        assert_eq!(payload.file_test, "AQ==");
    }

    #[test]
    fn error_body_message_prefers_known_fields() {
        assert_eq!(error_body_message(r#""bad image""#), "bad image");
        assert_eq!(
            error_body_message(r#"{"detail": "no signature found"}"#),
            "no signature found"
        );
        assert_eq!(error_body_message(r#"{"code": 7}"#), r#"{"code":7}"#);
        assert_eq!(error_body_message("  gateway timeout "), "gateway timeout");
        assert_eq!(error_body_message(""), "no details provided");
    }
}
