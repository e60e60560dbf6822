use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{FaceLensError, Result};
use crate::common::paths;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    /// 999 picks the first colour capture device.
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
}

fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_warmup_frames() -> u32 { 3 }
fn default_warmup_delay() -> u64 { 50 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_width(),
            height: default_height(),
            warmup_frames: default_warmup_frames(),
            warmup_delay_ms: default_warmup_delay(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_analyze_frame_path")]
    pub analyze_frame_path: String,
    #[serde(default = "default_face_result_path")]
    pub face_result_path: String,
    #[serde(default = "default_analyze_skin_path")]
    pub analyze_skin_path: String,
    /// Unset means requests never time out.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_base_url() -> String { "http://127.0.0.1:5000".to_string() }
fn default_analyze_frame_path() -> String { "/analyze-frame".to_string() }
fn default_face_result_path() -> String { "/face-shape-result".to_string() }
fn default_analyze_skin_path() -> String { "/analyze-skin".to_string() }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            analyze_frame_path: default_analyze_frame_path(),
            face_result_path: default_face_result_path(),
            analyze_skin_path: default_analyze_skin_path(),
            request_timeout_ms: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_upload_interval")]
    pub upload_interval_ms: u64,
    #[serde(default = "default_stream_quality")]
    pub jpeg_quality: u8,
}

fn default_upload_interval() -> u64 { 300 }
fn default_stream_quality() -> u8 { 85 }

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            upload_interval_ms: default_upload_interval(),
            jpeg_quality: default_stream_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GateConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_stable_frames")]
    pub stable_frames_required: u32,
    #[serde(default = "default_capture_quality")]
    pub jpeg_quality: u8,
}

fn default_poll_interval() -> u64 { 500 }
fn default_min_confidence() -> f64 { 95.0 }
fn default_stable_frames() -> u32 { 6 }
fn default_capture_quality() -> u8 { 95 }

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            min_confidence: default_min_confidence(),
            stable_frames_required: default_stable_frames(),
            jpeg_quality: default_capture_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderConfig {
    /// Render 0 the same as a missing value ("—").
    #[serde(default = "default_true")]
    pub zero_as_missing: bool,
    #[serde(default = "default_chart_path")]
    pub chart_path: PathBuf,
    #[serde(default = "default_true")]
    pub ascii_preview: bool,
    #[serde(default)]
    pub ascii_width: Option<usize>,
    #[serde(default)]
    pub ascii_height: Option<usize>,
}

fn default_true() -> bool { true }
fn default_chart_path() -> PathBuf { PathBuf::from("skin_radar.svg") }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            zero_as_missing: true,
            chart_path: default_chart_path(),
            ascii_preview: true,
            ascii_width: None,
            ascii_height: None,
        }
    }
}

impl Config {
    /// Loads the explicit path if given, otherwise the first config found on
    /// the search path, otherwise the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        match paths::config_candidates().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load_from_path(&path),
            None => {
                tracing::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceLensError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| FaceLensError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(FaceLensError::Config(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(FaceLensError::Config(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }

        if !self.backend.base_url.starts_with("http://") && !self.backend.base_url.starts_with("https://") {
            return Err(FaceLensError::Config(format!(
                "Backend base_url must start with http:// or https://, got {}", self.backend.base_url
            )));
        }

        for (name, interval) in [
            ("stream.upload_interval_ms", self.stream.upload_interval_ms),
            ("gate.poll_interval_ms", self.gate.poll_interval_ms),
        ] {
            if interval == 0 || interval > 60_000 {
                return Err(FaceLensError::Config(format!(
                    "{} must be between 1 and 60000, got {}", name, interval
                )));
            }
        }

        for (name, quality) in [
            ("stream.jpeg_quality", self.stream.jpeg_quality),
            ("gate.jpeg_quality", self.gate.jpeg_quality),
        ] {
            if quality == 0 || quality > 100 {
                return Err(FaceLensError::Config(format!(
                    "{} must be between 1 and 100, got {}", name, quality
                )));
            }
        }

        if !(0.0..=100.0).contains(&self.gate.min_confidence) {
            return Err(FaceLensError::Config(format!(
                "Minimum confidence must be between 0 and 100, got {}",
                self.gate.min_confidence
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_cadence() {
        let config = Config::default();
        assert_eq!(config.stream.upload_interval_ms, 300);
        assert_eq!(config.stream.jpeg_quality, 85);
        assert_eq!(config.gate.poll_interval_ms, 500);
        assert_eq!(config.gate.jpeg_quality, 95);
        assert_eq!(config.gate.stable_frames_required, 6);
        assert!(config.render.zero_as_missing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\nbase_url = \"http://10.0.0.2:8000\"\n\n[gate]\npoll_interval_ms = 600").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://10.0.0.2:8000");
        assert_eq!(config.backend.analyze_skin_path, "/analyze-skin");
        assert_eq!(config.gate.poll_interval_ms, 600);
        assert_eq!(config.gate.min_confidence, 95.0);
        assert_eq!(config.camera.width, 640);
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stream]\njpeg_quality = 0").unwrap();

        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("stream.jpeg_quality"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/facelens.toml"))).unwrap_err();
        assert!(matches!(err, FaceLensError::Config(_)));
    }
}
