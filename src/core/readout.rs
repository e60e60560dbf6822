//! Projection of backend results into the text the screen shows.

use crate::service::protocol::{FaceMeasurement, SkinMetrics};

pub const PLACEHOLDER: &str = "—";
pub const EXPLANATION: &str = "Based on stable facial landmark geometry";
pub const NO_METRICS: &str = "No metrics detected";

/// Ratios above this read as balanced.
const BALANCE_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceReadout {
    pub face_shape: String,
    pub face_width: String,
    pub face_height: String,
    pub face_ratio: String,
    pub facial_balance: String,
    pub confidence: String,
    pub explanation: String,
}

impl Default for FaceReadout {
    fn default() -> Self {
        Self {
            face_shape: PLACEHOLDER.to_string(),
            face_width: PLACEHOLDER.to_string(),
            face_height: PLACEHOLDER.to_string(),
            face_ratio: PLACEHOLDER.to_string(),
            facial_balance: PLACEHOLDER.to_string(),
            confidence: PLACEHOLDER.to_string(),
            explanation: PLACEHOLDER.to_string(),
        }
    }
}

impl FaceReadout {
    /// Every field is optional on its own. With `zero_as_missing`, a value of
    /// 0 renders like an absent one.
    pub fn from_measurement(m: &FaceMeasurement, zero_as_missing: bool) -> Self {
        let shown = |v: Option<f64>| v.filter(|v| !v.is_nan() && !(zero_as_missing && *v == 0.0));

        let ratio = face_ratio(m.face_width, m.face_height);

        Self {
            face_shape: m.face_shape
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(PLACEHOLDER)
                .to_string(),
            face_width: with_unit(shown(m.face_width), " px"),
            face_height: with_unit(shown(m.face_height), " px"),
            face_ratio: ratio.map_or_else(|| PLACEHOLDER.to_string(), |r| format!("{:.2}", r)),
            facial_balance: ratio.map_or(PLACEHOLDER, facial_balance).to_string(),
            confidence: with_unit(shown(m.confidence), "%"),
            explanation: EXPLANATION.to_string(),
        }
    }

    pub fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("Face shape", self.face_shape.as_str()),
            ("Face width", self.face_width.as_str()),
            ("Face height", self.face_height.as_str()),
            ("Face ratio", self.face_ratio.as_str()),
            ("Facial balance", self.facial_balance.as_str()),
            ("Confidence", self.confidence.as_str()),
            ("Explanation", self.explanation.as_str()),
        ]
    }
}

/// `width / height` rounded to two decimals, when both are present and non-zero.
pub fn face_ratio(width: Option<f64>, height: Option<f64>) -> Option<f64> {
    match (width, height) {
        (Some(w), Some(h)) if w != 0.0 && h != 0.0 && w.is_finite() && h.is_finite() => {
            Some((w / h * 100.0).round() / 100.0)
        }
        _ => None,
    }
}

pub fn facial_balance(rounded_ratio: f64) -> &'static str {
    if rounded_ratio > BALANCE_THRESHOLD {
        "Balanced"
    } else {
        "Elongated"
    }
}

fn with_unit(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{}{}", v, unit),
        None => PLACEHOLDER.to_string(),
    }
}

/// Horizontal bar that follows the last reported confidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceBar {
    percent: Option<f64>,
}

impl ConfidenceBar {
    /// Only a present, non-zero confidence moves the bar.
    pub fn update(&mut self, confidence: Option<f64>) {
        if let Some(c) = confidence.filter(|c| *c != 0.0 && c.is_finite()) {
            self.percent = Some(c.clamp(0.0, 100.0));
        }
    }

    pub fn percent(&self) -> Option<f64> {
        self.percent
    }

    pub fn render(&self, width: usize) -> String {
        let pct = self.percent.unwrap_or(0.0);
        let filled = ((pct / 100.0) * width as f64).round() as usize;
        let filled = filled.min(width);
        format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
    }
}

/// `glow_level` → `GLOW LEVEL`.
pub fn metric_label(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}

/// One line per `[label, score]` metric, or the "no metrics" placeholder.
pub fn format_metric_rows(metrics: &SkinMetrics) -> Vec<String> {
    let rows: Vec<String> = metrics
        .rows()
        .map(|row| format!("{} : {} ({:.1})", metric_label(row.key), row.label, row.score))
        .collect();

    if rows.is_empty() {
        vec![NO_METRICS.to_string()]
    } else {
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn measurement(w: Option<f64>, h: Option<f64>, c: Option<f64>) -> FaceMeasurement {
        FaceMeasurement {
            face_shape: Some("Oval".into()),
            face_width: w,
            face_height: h,
            confidence: c,
        }
    }

    fn metrics(value: serde_json::Value) -> SkinMetrics {
        match value {
            serde_json::Value::Object(map) => SkinMetrics::from_map(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn elongated_face() {
        let r = FaceReadout::from_measurement(&measurement(Some(100.0), Some(120.0), Some(97.0)), true);
        assert_eq!(r.face_ratio, "0.83");
        assert_eq!(r.facial_balance, "Elongated");
        assert_eq!(r.face_width, "100 px");
        assert_eq!(r.face_height, "120 px");
        assert_eq!(r.confidence, "97%");
        assert_eq!(r.explanation, EXPLANATION);
    }

    #[test]
    fn balanced_face() {
        let r = FaceReadout::from_measurement(&measurement(Some(110.0), Some(100.0), None), true);
        assert_eq!(r.face_ratio, "1.10");
        assert_eq!(r.facial_balance, "Balanced");
    }

    #[test]
    fn missing_fields_render_placeholder_never_empty() {
        let r = FaceReadout::from_measurement(&FaceMeasurement::default(), true);
        for (name, value) in r.fields() {
            if name != "Explanation" {
                assert_eq!(value, PLACEHOLDER, "{}", name);
            }
        }

        let blank_shape = FaceMeasurement { face_shape: Some(String::new()), ..FaceMeasurement::default() };
        assert_eq!(FaceReadout::from_measurement(&blank_shape, true).face_shape, PLACEHOLDER);
    }

    #[test]
    fn zero_is_missing_unless_disabled() {
        let m = measurement(Some(120.0), Some(140.0), Some(0.0));
        assert_eq!(FaceReadout::from_measurement(&m, true).confidence, PLACEHOLDER);
        assert_eq!(FaceReadout::from_measurement(&m, false).confidence, "0%");
    }

    #[test]
    fn fractional_pixels_keep_their_decimals() {
        let r = FaceReadout::from_measurement(&measurement(Some(142.5), Some(171.0), Some(96.0)), true);
        assert_eq!(r.face_width, "142.5 px");
    }

    #[test]
    fn rendering_is_idempotent() {
        let m = measurement(Some(131.0), Some(150.0), Some(98.0));
        assert_eq!(FaceReadout::from_measurement(&m, true), FaceReadout::from_measurement(&m, true));
    }

    #[test]
    fn confidence_bar_ignores_missing_updates() {
        let mut bar = ConfidenceBar::default();
        bar.update(Some(50.0));
        bar.update(None);
        bar.update(Some(0.0));
        assert_eq!(bar.percent(), Some(50.0));
        assert_eq!(bar.render(10), "[█████░░░░░]");
    }

    #[test]
    fn metric_rows_skip_non_pairs() {
        let m = metrics(json!({"glow": ["Good", 82.46], "redness": ["Low", 12], "note": "text"}));
        assert_eq!(format_metric_rows(&m), vec!["GLOW : Good (82.5)", "REDNESS : Low (12.0)"]);
    }

    #[test]
    fn labels_replace_every_underscore() {
        assert_eq!(metric_label("dark_spot_level"), "DARK SPOT LEVEL");
    }

    #[test]
    fn empty_metrics_render_placeholder() {
        assert_eq!(format_metric_rows(&SkinMetrics::default()), vec![NO_METRICS]);
        let only_other = metrics(json!({"note": "text"}));
        assert_eq!(format_metric_rows(&only_other), vec![NO_METRICS]);
    }
}
