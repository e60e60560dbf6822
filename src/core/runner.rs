use crate::camera::{CameraStatus, FrameSource};
use crate::common::{Config, DevMode, ErrorCategory, Result};
use crate::core::schedule::{Completion, Dispatcher, Interval, Lane, Tagged};
use crate::core::session::{Mode, Session};
use crate::service::client::AnalysisBackend;
use crate::service::protocol::SkinMetrics;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const IDLE_WAIT: Duration = Duration::from_millis(50);
const REDRAW_EVERY: Duration = Duration::from_millis(100);
/// Consecutive failed grabs after which the camera is treated as lost.
pub const MAX_FRAME_ERRORS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Capture,
    Analyze,
    Quit,
}

/// The screen and keyboard the session loop talks to.
pub trait Console {
    /// Waits up to `timeout` for the next user command.
    fn poll_command(&mut self, timeout: Duration) -> Result<Option<Command>>;

    fn draw(&mut self, session: &Session, preview: Option<&DynamicImage>) -> Result<()>;

    /// Shows `message` and blocks until the user acknowledges it.
    fn alert(&mut self, message: &str) -> Result<()>;
}

pub trait ChartRenderer {
    /// Rebuilds the chart from scratch and returns where it was written.
    fn render(&mut self, metrics: &SkinMetrics) -> Result<PathBuf>;
}

/// Drives one session: grabs frames, fires the mode's timer, dispatches
/// requests, applies their results and forwards user commands.
pub struct SessionRunner<F: FrameSource, C: Console> {
    session: Session,
    frames: F,
    console: C,
    backend: Arc<dyn AnalysisBackend>,
    charts: Box<dyn ChartRenderer>,
    dev_mode: DevMode,
    dispatcher: Dispatcher,
    timer: Interval,
    latest_frame: Option<DynamicImage>,
    frame_errors: u32,
    dirty: bool,
    last_draw: Option<Instant>,
}

impl<F: FrameSource, C: Console> SessionRunner<F, C> {
    pub fn new(
        mode: Mode,
        config: &Config,
        frames: F,
        console: C,
        backend: Arc<dyn AnalysisBackend>,
        charts: Box<dyn ChartRenderer>,
        dev_mode: DevMode,
    ) -> Self {
        let period = match mode {
            Mode::Continuous => Duration::from_millis(config.stream.upload_interval_ms),
            Mode::Gated => Duration::from_millis(config.gate.poll_interval_ms),
        };

        Self {
            session: Session::new(mode, config),
            frames,
            console,
            backend,
            charts,
            dev_mode,
            dispatcher: Dispatcher::new(),
            timer: Interval::new(period, Instant::now()),
            latest_frame: None,
            frame_errors: 0,
            dirty: true,
            last_draw: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs until the user quits. Returns the final session state and the
    /// console.
    pub fn run(mut self, camera: CameraStatus) -> Result<(Session, C)> {
        match camera {
            CameraStatus::Error(reason) => {
                tracing::error!("Camera error: {}", reason);
                self.console.alert(&format!("Camera permission denied or unavailable.\n{}", reason))?;
                self.session.camera_failed(reason);
            }
            CameraStatus::Ready => self.session.camera_ready(),
            CameraStatus::Starting => {}
        }
        tracing::info!("Session started in {:?} mode", self.session.mode());

        loop {
            if self.session.camera().is_ready() {
                self.grab_frame()?;
            }

            let now = Instant::now();
            if self.timer.poll(now) {
                self.on_tick()?;
            }

            for done in self.dispatcher.drain() {
                self.apply(done);
            }

            self.redraw()?;

            let wait = if self.session.camera().is_ready() && self.frame_errors == 0 {
                Duration::ZERO
            } else {
                self.timer.time_until_due(Instant::now()).unwrap_or(IDLE_WAIT).min(IDLE_WAIT)
            };
            match self.console.poll_command(wait)? {
                Some(Command::Quit) => break,
                Some(Command::Capture) => self.capture(),
                Some(Command::Analyze) => self.analyze()?,
                None => {}
            }
        }

        self.timer.cancel();
        if self.dispatcher.in_flight() > 0 {
            tracing::debug!("Abandoning {} in-flight requests", self.dispatcher.in_flight());
        }
        Ok((self.session, self.console))
    }

    fn grab_frame(&mut self) -> Result<()> {
        let err = match self.frames.next_frame() {
            Ok(frame) => {
                self.frame_errors = 0;
                if let Some(frame) = frame {
                    self.latest_frame = Some(frame);
                    self.dirty = true;
                }
                return Ok(());
            }
            Err(e) => e,
        };

        self.frame_errors += 1;
        tracing::warn!("Frame grab failed ({}/{}): {}", self.frame_errors, MAX_FRAME_ERRORS, err);
        if self.frame_errors < MAX_FRAME_ERRORS {
            return Ok(());
        }

        let reason = err.to_string();
        tracing::error!("Camera lost: {}", reason);
        self.latest_frame = None;
        self.session.camera_failed(reason.clone());
        self.dirty = true;
        self.console.alert(&format!("Camera stopped delivering frames.\n{}", reason))
    }

    fn on_tick(&mut self) -> Result<()> {
        if matches!(self.session.camera(), CameraStatus::Error(_)) {
            return Ok(());
        }
        let backend = Arc::clone(&self.backend);
        match self.session.mode() {
            Mode::Continuous => {
                let image = match self.session.encode_stream_frame(self.latest_frame.as_ref()) {
                    Ok(Some(image)) => image,
                    Ok(None) => return Ok(()),
                    Err(e) => {
                        tracing::warn!("Failed to encode frame: {}", e);
                        return Ok(());
                    }
                };
                self.dispatcher.submit(Lane::FrameAnalysis, move || {
                    Completion::FrameAnalyzed(backend.analyze_frame(&image))
                });
            }
            Mode::Gated => {
                self.dispatcher.submit(Lane::PosePoll, move || {
                    Completion::PosePolled(backend.poll_face_shape())
                });
            }
        }
        Ok(())
    }

    fn apply(&mut self, done: Tagged<Completion>) {
        let Tagged { seq, value } = done;
        let changed = match value {
            Completion::FrameAnalyzed(result) => self.session.apply_frame_analysis(seq, result),
            Completion::PosePolled(result) => self.session.apply_pose_poll(seq, result),
            Completion::SkinAnalyzed(result) => {
                if self.session.finish_analyze(seq, result) {
                    self.render_chart();
                }
                true
            }
        };
        self.dirty |= changed;
    }

    fn render_chart(&mut self) {
        let rendered = match self.session.skin_metrics() {
            Some(metrics) => self.charts.render(metrics),
            None => return,
        };
        match rendered {
            Ok(path) => self.session.chart_rendered(&path),
            Err(e) => self.session.chart_failed(&e),
        }
    }

    fn capture(&mut self) {
        match self.session.capture(self.latest_frame.as_ref()) {
            Ok(Some(image)) => {
                if let Err(e) = self.dev_mode.save_capture(image) {
                    tracing::warn!("Failed to save capture: {}", e);
                }
                self.dirty = true;
            }
            Ok(None) => tracing::debug!("Capture ignored: pose not ready or no frame"),
            Err(e) => tracing::warn!("Capture failed: {}", e),
        }
    }

    fn analyze(&mut self) -> Result<()> {
        match self.session.begin_analyze() {
            Ok(image) => {
                let backend = Arc::clone(&self.backend);
                self.dispatcher.submit(Lane::SkinAnalysis, move || {
                    Completion::SkinAnalyzed(backend.analyze_skin(&image))
                });
                self.dirty = true;
                Ok(())
            }
            Err(e) if e.category() == ErrorCategory::Validation => {
                self.dirty = true;
                self.console.alert(&e.to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        let due = self.last_draw.map_or(true, |t| now.duration_since(t) >= REDRAW_EVERY);
        if !(self.dirty && due) {
            return Ok(());
        }

        self.console.draw(&self.session, self.latest_frame.as_ref())?;
        self.dirty = false;
        self.last_draw = Some(now);
        Ok(())
    }
}
