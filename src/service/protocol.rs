use crate::common::{FaceLensError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const IMAGE_FIELD: &str = "image";
pub const FRAME_FILE_NAME: &str = "frame.jpg";
pub const CAPTURE_FILE_NAME: &str = "live.jpg";
pub const JPEG_MIME: &str = "image/jpeg";

// Face shape

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceMeasurement {
    pub face_shape: Option<String>,
    /// Pixels.
    pub face_width: Option<f64>,
    /// Pixels.
    pub face_height: Option<f64>,
    /// 0..=100.
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FaceShapeReport {
    Processing,
    Complete(FaceMeasurement),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFaceShape {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    face_shape: Option<String>,
    #[serde(default)]
    face_width: Option<f64>,
    #[serde(default)]
    face_height: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Decodes a `/analyze-frame` or `/face-shape-result` body.
///
/// A `null` body and `status == "processing"` both mean the backend has no
/// result yet. Once it has one it omits `status` entirely.
pub fn decode_face_shape(body: &[u8]) -> Result<FaceShapeReport> {
    let raw: Option<RawFaceShape> = serde_json::from_slice(body)
        .map_err(|e| FaceLensError::Decode(format!("face shape payload: {}", e)))?;

    let Some(raw) = raw else {
        return Ok(FaceShapeReport::Processing);
    };
    if raw.status.as_deref() == Some("processing") {
        return Ok(FaceShapeReport::Processing);
    }

    Ok(FaceShapeReport::Complete(FaceMeasurement {
        face_shape: raw.face_shape,
        face_width: raw.face_width,
        face_height: raw.face_height,
        confidence: raw.confidence,
    }))
}

// Skin metrics

/// One entry of the backend's `skinMetrics` object, classified once at decode
/// time.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEntry {
    /// A `[label, score]` pair.
    Row { label: String, score: f64 },
    /// Anything else the backend put in the mapping. Never rendered.
    Other(Value),
}

impl MetricEntry {
    pub fn classify(value: Value) -> Self {
        if let Value::Array(items) = &value {
            if let [label, score] = items.as_slice() {
                if let (Some(label), Some(score)) = (label_text(label), score_value(score)) {
                    return MetricEntry::Row { label, score };
                }
            }
        }
        MetricEntry::Other(value)
    }
}

fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn score_value(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    score.is_finite().then_some(score)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRow<'a> {
    pub key: &'a str,
    pub label: &'a str,
    pub score: f64,
}

/// Metric name to entry, in the order the backend sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinMetrics {
    entries: Vec<(String, MetricEntry)>,
}

impl SkinMetrics {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, value)| (key, MetricEntry::classify(value)))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(String, MetricEntry)] {
        &self.entries
    }

    /// Only the `[label, score]` entries.
    pub fn rows(&self) -> impl Iterator<Item = MetricRow<'_>> {
        self.entries.iter().filter_map(|(key, entry)| match entry {
            MetricEntry::Row { label, score } => Some(MetricRow { key, label, score: *score }),
            MetricEntry::Other(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkinOutcome {
    Metrics(SkinMetrics),
    /// Non-2xx status or no `skinMetrics` in the payload.
    Failed { status: u16, detail: Option<String> },
}

impl SkinOutcome {
    /// The backend-reported failure as an error, `None` for usable metrics.
    pub fn failure(&self) -> Option<FaceLensError> {
        match self {
            SkinOutcome::Metrics(_) => None,
            SkinOutcome::Failed { status, detail } => Some(FaceLensError::Backend(format!(
                "HTTP {}: {}",
                status,
                detail.as_deref().unwrap_or("no skinMetrics in response")
            ))),
        }
    }
}

/// Decodes an `/analyze-skin` response. A body that is not JSON is an error;
/// a JSON body without usable metrics is a backend failure.
pub fn decode_skin_response(status: u16, body: &[u8]) -> Result<SkinOutcome> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| FaceLensError::Decode(format!("skin payload: {}", e)))?;

    let detail = payload
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string);

    let success = (200..300).contains(&status);
    match payload {
        Value::Object(mut fields) if success => match fields.remove("skinMetrics") {
            Some(Value::Object(metrics)) => Ok(SkinOutcome::Metrics(SkinMetrics::from_map(metrics))),
            _ => Ok(SkinOutcome::Failed { status, detail }),
        },
        _ => Ok(SkinOutcome::Failed { status, detail }),
    }
}
