use crate::camera::{encode_jpeg, CameraStatus, CapturedImage};
use crate::common::{Config, FaceLensError, Result};
use crate::core::readout::{format_metric_rows, ConfidenceBar, FaceReadout};
use crate::core::schedule::LatestGate;
use crate::core::stability::{PollOutcome, PoseState, StabilityTracker};
use crate::service::protocol::{FaceShapeReport, SkinMetrics, SkinOutcome};
use image::DynamicImage;
use std::path::{Path, PathBuf};

pub const STATUS_STARTING: &str = "Starting camera…";
pub const STATUS_CAMERA_READY: &str = "Camera ready";
pub const STATUS_CAMERA_ERROR: &str = "Camera error";
pub const STATUS_ANALYZING: &str = "Analyzing…";
pub const STATUS_COMPLETE: &str = "Analysis complete";
pub const STATUS_CONNECTION_ERROR: &str = "Connection error";
pub const STATUS_DETECTING: &str = "Detecting face…";
pub const STATUS_HOLD_STILL: &str = "Hold still…";
pub const STATUS_POSE_READY: &str = "Perfect pose detected";
pub const STATUS_SYNC_LOST: &str = "Camera sync lost";

pub const RESULT_READY: &str = "Ready to analyze ✔";
pub const RESULT_ANALYZING: &str = "Analyzing...";
pub const RESULT_FAILED: &str = "❌ Analysis failed";
pub const PROMPT_CAPTURE_FIRST: &str = "Please capture image first";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Upload a frame every tick and show whatever comes back.
    Continuous,
    /// Poll pose stability, capture on demand, then analyze the capture.
    Gated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartState {
    pub path: PathBuf,
    pub generation: u64,
}

/// Everything one run of either flow mutates. All UI-visible state lives
/// here so the loop driving it stays free of globals.
#[derive(Debug)]
pub struct Session {
    mode: Mode,
    zero_as_missing: bool,
    stream_quality: u8,
    capture_quality: u8,
    camera: CameraStatus,
    status: String,
    readout: FaceReadout,
    confidence_bar: ConfidenceBar,
    tracker: StabilityTracker,
    captured: Option<CapturedImage>,
    analyze_in_flight: bool,
    result_box: Vec<String>,
    skin: Option<SkinMetrics>,
    chart: Option<ChartState>,
    chart_error: Option<String>,
    frame_gate: LatestGate,
    pose_gate: LatestGate,
    skin_gate: LatestGate,
}

impl Session {
    pub fn new(mode: Mode, config: &Config) -> Self {
        Self {
            mode,
            zero_as_missing: config.render.zero_as_missing,
            stream_quality: config.stream.jpeg_quality,
            capture_quality: config.gate.jpeg_quality,
            camera: CameraStatus::Starting,
            status: STATUS_STARTING.to_string(),
            readout: FaceReadout::default(),
            confidence_bar: ConfidenceBar::default(),
            tracker: StabilityTracker::from_config(&config.gate),
            captured: None,
            analyze_in_flight: false,
            result_box: Vec::new(),
            skin: None,
            chart: None,
            chart_error: None,
            frame_gate: LatestGate::default(),
            pose_gate: LatestGate::default(),
            skin_gate: LatestGate::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn camera(&self) -> &CameraStatus {
        &self.camera
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn readout(&self) -> &FaceReadout {
        &self.readout
    }

    pub fn confidence_bar(&self) -> &ConfidenceBar {
        &self.confidence_bar
    }

    pub fn pose_state(&self) -> PoseState {
        self.tracker.state()
    }

    pub fn tracker(&self) -> &StabilityTracker {
        &self.tracker
    }

    pub fn captured(&self) -> Option<&CapturedImage> {
        self.captured.as_ref()
    }

    pub fn result_box(&self) -> &[String] {
        &self.result_box
    }

    pub fn skin_metrics(&self) -> Option<&SkinMetrics> {
        self.skin.as_ref()
    }

    pub fn chart(&self) -> Option<&ChartState> {
        self.chart.as_ref()
    }

    pub fn chart_error(&self) -> Option<&str> {
        self.chart_error.as_deref()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyze_in_flight
    }

    pub fn capture_available(&self) -> bool {
        self.mode == Mode::Gated && self.tracker.pose_ready()
    }

    pub fn analyze_enabled(&self) -> bool {
        self.mode == Mode::Gated && self.captured.is_some() && !self.analyze_in_flight
    }

    // Camera

    pub fn camera_ready(&mut self) {
        self.camera = CameraStatus::Ready;
        self.status = STATUS_CAMERA_READY.to_string();
    }

    pub fn camera_failed(&mut self, reason: impl Into<String>) {
        self.camera = CameraStatus::Error(reason.into());
        self.status = STATUS_CAMERA_ERROR.to_string();
    }

    fn camera_lost(&self) -> bool {
        matches!(self.camera, CameraStatus::Error(_))
    }

    // Continuous flow

    /// Encodes a streaming frame. `None` while the camera has nothing to show.
    pub fn encode_stream_frame(&self, frame: Option<&DynamicImage>) -> Result<Option<CapturedImage>> {
        match frame {
            Some(frame) => encode_jpeg(frame, self.stream_quality),
            None => Ok(None),
        }
    }

    /// Returns false when a newer response was already applied.
    pub fn apply_frame_analysis(&mut self, seq: u64, result: Result<FaceShapeReport>) -> bool {
        if self.camera_lost() {
            return false;
        }
        if !self.frame_gate.admit(seq) {
            tracing::debug!("Dropping stale frame analysis {}", seq);
            return false;
        }

        match result {
            Ok(FaceShapeReport::Processing) => {
                self.status = STATUS_ANALYZING.to_string();
            }
            Ok(FaceShapeReport::Complete(measurement)) => {
                self.readout = FaceReadout::from_measurement(&measurement, self.zero_as_missing);
                self.confidence_bar.update(measurement.confidence);
                self.status = STATUS_COMPLETE.to_string();
            }
            Err(e) => {
                tracing::warn!("Frame upload error: {}", e);
                self.status = STATUS_CONNECTION_ERROR.to_string();
            }
        }
        true
    }

    // Gated flow

    pub fn apply_pose_poll(&mut self, seq: u64, result: Result<FaceShapeReport>) -> bool {
        if self.camera_lost() {
            return false;
        }
        if !self.pose_gate.admit(seq) {
            tracing::debug!("Dropping stale pose poll {}", seq);
            return false;
        }

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Pose poll failed: {}", e);
                self.status = STATUS_SYNC_LOST.to_string();
                return true;
            }
        };

        let outcome = self.tracker.observe(&report);
        self.status = match (outcome, self.tracker.state()) {
            (PollOutcome::Processing, _) => STATUS_DETECTING,
            (_, PoseState::Ready) => STATUS_POSE_READY,
            _ => STATUS_HOLD_STILL,
        }
        .to_string();
        true
    }

    /// Snapshots `frame` once the pose is ready. Returns the new capture, or
    /// `None` when capturing is not possible right now.
    pub fn capture(&mut self, frame: Option<&DynamicImage>) -> Result<Option<&CapturedImage>> {
        if !self.capture_available() {
            return Ok(None);
        }
        let Some(frame) = frame else {
            return Ok(None);
        };
        let Some(image) = encode_jpeg(frame, self.capture_quality)? else {
            return Ok(None);
        };

        tracing::info!("Captured {}x{} snapshot ({} bytes)", image.width(), image.height(), image.len());
        self.result_box = vec![RESULT_READY.to_string()];
        let stored = self.captured.insert(image);
        Ok(Some(&*stored))
    }

    /// Locks the analyze trigger and hands out the image to upload.
    pub fn begin_analyze(&mut self) -> Result<CapturedImage> {
        let Some(image) = self.captured.clone() else {
            return Err(FaceLensError::Validation(PROMPT_CAPTURE_FIRST.to_string()));
        };
        if self.analyze_in_flight {
            return Err(FaceLensError::Validation("Analysis already in progress".to_string()));
        }

        tracing::debug!("Analyzing capture taken {:.1?} ago", image.captured_at().elapsed());
        self.analyze_in_flight = true;
        self.result_box = vec![RESULT_ANALYZING.to_string()];
        Ok(image)
    }

    /// Applies a skin analysis result. Returns true when the chart needs to
    /// be rebuilt from `skin_metrics()`.
    pub fn finish_analyze(&mut self, seq: u64, result: Result<SkinOutcome>) -> bool {
        self.analyze_in_flight = false;
        if !self.skin_gate.admit(seq) {
            tracing::debug!("Dropping stale skin analysis {}", seq);
            return false;
        }

        match result {
            Ok(SkinOutcome::Metrics(metrics)) => {
                self.result_box = format_metric_rows(&metrics);
                self.skin = Some(metrics);
                true
            }
            Ok(SkinOutcome::Failed { .. }) => {
                self.result_box = vec![RESULT_FAILED.to_string()];
                false
            }
            Err(e) => {
                self.result_box = vec![format!("⚠️ Client error: {}", e)];
                false
            }
        }
    }

    pub fn chart_rendered(&mut self, path: &Path) {
        let generation = self.chart.as_ref().map_or(1, |c| c.generation + 1);
        self.chart = Some(ChartState { path: path.to_path_buf(), generation });
        self.chart_error = None;
    }

    pub fn chart_failed(&mut self, error: &FaceLensError) {
        tracing::warn!("Radar chart render failed: {}", error);
        self.chart_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::protocol::FaceMeasurement;
    use image::{Rgb, RgbImage};
    use serde_json::json;

    fn good() -> FaceShapeReport {
        FaceShapeReport::Complete(FaceMeasurement {
            face_shape: Some("Round".into()),
            face_width: Some(150.0),
            face_height: Some(160.0),
            confidence: Some(98.0),
        })
    }

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([90, 90, 90])))
    }

    fn ready_session() -> Session {
        let mut session = Session::new(Mode::Gated, &Config::default());
        for seq in 1..=7 {
            session.apply_pose_poll(seq, Ok(good()));
        }
        assert!(session.capture_available());
        session
    }

    fn metrics_outcome() -> SkinOutcome {
        let body = json!({"skinMetrics": {"glow": ["Good", 82.46]}}).to_string();
        crate::service::protocol::decode_skin_response(200, body.as_bytes()).unwrap()
    }

    #[test]
    fn processing_keeps_previous_fields() {
        let mut session = Session::new(Mode::Continuous, &Config::default());
        session.apply_frame_analysis(1, Ok(good()));
        let before = session.readout().clone();

        session.apply_frame_analysis(2, Ok(FaceShapeReport::Processing));
        assert_eq!(session.status(), STATUS_ANALYZING);
        assert_eq!(session.readout(), &before);
    }

    #[test]
    fn transport_error_only_changes_status() {
        let mut session = Session::new(Mode::Continuous, &Config::default());
        session.apply_frame_analysis(1, Ok(good()));
        let before = session.readout().clone();

        session.apply_frame_analysis(2, Err(FaceLensError::Transport("refused".into())));
        assert_eq!(session.status(), STATUS_CONNECTION_ERROR);
        assert_eq!(session.readout(), &before);
        assert_eq!(session.confidence_bar().percent(), Some(98.0));
    }

    #[test]
    fn late_frame_response_is_discarded() {
        let mut session = Session::new(Mode::Continuous, &Config::default());
        assert!(session.apply_frame_analysis(5, Ok(good())));
        assert!(!session.apply_frame_analysis(4, Ok(FaceShapeReport::Processing)));
        assert_eq!(session.status(), STATUS_COMPLETE);
    }

    #[test]
    fn pose_statuses_follow_tracker() {
        let mut session = Session::new(Mode::Gated, &Config::default());
        session.apply_pose_poll(1, Ok(FaceShapeReport::Processing));
        assert_eq!(session.status(), STATUS_DETECTING);

        session.apply_pose_poll(2, Ok(good()));
        assert_eq!(session.status(), STATUS_HOLD_STILL);
        assert!(!session.capture_available());

        for seq in 3..=8 {
            session.apply_pose_poll(seq, Ok(good()));
        }
        assert_eq!(session.status(), STATUS_POSE_READY);

        session.apply_pose_poll(9, Err(FaceLensError::Transport("down".into())));
        assert_eq!(session.status(), STATUS_SYNC_LOST);
        assert!(session.capture_available(), "transport errors leave the counter alone");
    }

    #[test]
    fn capture_requires_ready_pose() {
        let mut session = Session::new(Mode::Gated, &Config::default());
        assert!(session.capture(Some(&frame())).unwrap().is_none());
        assert!(session.captured().is_none());
    }

    #[test]
    fn capture_without_frame_is_silent() {
        let mut session = ready_session();
        assert!(session.capture(None).unwrap().is_none());
        assert!(session.result_box().is_empty());
    }

    #[test]
    fn analyze_without_capture_is_rejected_locally() {
        let mut session = Session::new(Mode::Gated, &Config::default());
        let err = session.begin_analyze().unwrap_err();
        assert_eq!(err.to_string(), PROMPT_CAPTURE_FIRST);
        assert!(!session.is_analyzing());
    }

    #[test]
    fn capture_then_analyze_renders_rows() {
        let mut session = ready_session();
        session.capture(Some(&frame())).unwrap();
        assert_eq!(session.result_box(), &[RESULT_READY.to_string()]);
        assert!(session.analyze_enabled());

        session.begin_analyze().unwrap();
        assert!(!session.analyze_enabled());
        assert!(session.begin_analyze().is_err(), "trigger is locked while in flight");

        assert!(session.finish_analyze(1, Ok(metrics_outcome())));
        assert_eq!(session.result_box(), &["GLOW : Good (82.5)".to_string()]);
        assert!(session.analyze_enabled());
    }

    #[test]
    fn failed_analysis_reenables_trigger_and_keeps_chart() {
        let mut session = ready_session();
        session.capture(Some(&frame())).unwrap();
        session.begin_analyze().unwrap();
        session.finish_analyze(1, Ok(metrics_outcome()));
        session.chart_rendered(Path::new("radar.svg"));
        let chart = session.chart().cloned();

        session.begin_analyze().unwrap();
        let rebuild = session.finish_analyze(2, Ok(SkinOutcome::Failed { status: 500, detail: None }));
        assert!(!rebuild);
        assert_eq!(session.result_box(), &[RESULT_FAILED.to_string()]);
        assert!(session.analyze_enabled());
        assert_eq!(session.chart().cloned(), chart);
    }

    #[test]
    fn client_error_shows_message() {
        let mut session = ready_session();
        session.capture(Some(&frame())).unwrap();
        session.begin_analyze().unwrap();
        session.finish_analyze(1, Err(FaceLensError::Decode("expected value".into())));
        assert_eq!(session.result_box(), &["⚠️ Client error: Invalid response: expected value".to_string()]);
        assert!(session.analyze_enabled());
    }

    #[test]
    fn recapture_during_analysis_keeps_in_flight_image() {
        let mut session = ready_session();
        session.capture(Some(&frame())).unwrap();
        let uploading = session.begin_analyze().unwrap();

        let brighter = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([250, 250, 250])));
        session.capture(Some(&brighter)).unwrap();
        assert_ne!(session.captured().unwrap().bytes(), uploading.bytes());
        assert!(!uploading.is_empty());
    }

    #[test]
    fn results_after_camera_loss_keep_camera_error() {
        let mut session = ready_session();
        session.camera_failed("unplugged");

        assert!(!session.apply_pose_poll(100, Ok(good())));
        assert_eq!(session.status(), STATUS_CAMERA_ERROR);

        let mut live = Session::new(Mode::Continuous, &Config::default());
        live.camera_ready();
        live.camera_failed("unplugged");
        assert!(!live.apply_frame_analysis(1, Ok(good())));
        assert_eq!(live.status(), STATUS_CAMERA_ERROR);
        assert_eq!(live.readout().face_shape, crate::core::readout::PLACEHOLDER);
    }

    #[test]
    fn chart_generation_increments() {
        let mut session = Session::new(Mode::Gated, &Config::default());
        session.chart_rendered(Path::new("a.svg"));
        session.chart_rendered(Path::new("a.svg"));
        assert_eq!(session.chart().unwrap().generation, 2);
    }
}
