use crate::common::config::GateConfig;
use crate::service::protocol::{FaceMeasurement, FaceShapeReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseState {
    Detecting,
    HoldingStill,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Backend has no result yet.
    Processing,
    /// Result present but not good enough to count.
    Disqualified,
    Qualified,
}

/// Counts consecutive qualifying polls. Any other poll resets the count, so
/// readiness depends only on the current run and no history is stored.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    consecutive: u32,
    required: u32,
    min_confidence: f64,
}

impl StabilityTracker {
    pub fn new(required: u32, min_confidence: f64) -> Self {
        Self {
            consecutive: 0,
            required,
            min_confidence,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.stable_frames_required, config.min_confidence)
    }

    pub fn classify(&self, report: &FaceShapeReport) -> PollOutcome {
        match report {
            FaceShapeReport::Processing => PollOutcome::Processing,
            FaceShapeReport::Complete(m) if self.qualifies(m) => PollOutcome::Qualified,
            FaceShapeReport::Complete(_) => PollOutcome::Disqualified,
        }
    }

    fn qualifies(&self, m: &FaceMeasurement) -> bool {
        present(m.face_width)
            && present(m.face_height)
            && m.confidence.is_some_and(|c| c >= self.min_confidence)
    }

    pub fn observe(&mut self, report: &FaceShapeReport) -> PollOutcome {
        let outcome = self.classify(report);
        match outcome {
            PollOutcome::Qualified => self.consecutive = self.consecutive.saturating_add(1),
            PollOutcome::Processing | PollOutcome::Disqualified => self.consecutive = 0,
        }
        outcome
    }

    pub fn state(&self) -> PoseState {
        if self.pose_ready() {
            PoseState::Ready
        } else if self.consecutive > 0 {
            PoseState::HoldingStill
        } else {
            PoseState::Detecting
        }
    }

    pub fn pose_ready(&self) -> bool {
        self.consecutive > self.required
    }

    pub fn consecutive_stable_frames(&self) -> u32 {
        self.consecutive
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}

fn present(value: Option<f64>) -> bool {
    value.is_some_and(|v| v != 0.0 && !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn good() -> FaceShapeReport {
        FaceShapeReport::Complete(FaceMeasurement {
            face_shape: Some("Oval".into()),
            face_width: Some(140.0),
            face_height: Some(170.0),
            confidence: Some(97.0),
        })
    }

    fn low_confidence() -> FaceShapeReport {
        FaceShapeReport::Complete(FaceMeasurement {
            confidence: Some(94.9),
            face_width: Some(140.0),
            face_height: Some(170.0),
            ..FaceMeasurement::default()
        })
    }

    fn missing_height() -> FaceShapeReport {
        FaceShapeReport::Complete(FaceMeasurement {
            confidence: Some(99.0),
            face_width: Some(140.0),
            ..FaceMeasurement::default()
        })
    }

    #[test]
    fn starts_detecting() {
        let tracker = StabilityTracker::new(6, 95.0);
        assert_eq!(tracker.state(), PoseState::Detecting);
        assert!(!tracker.pose_ready());
    }

    #[test]
    fn ready_after_seventh_qualifying_poll() {
        let mut tracker = StabilityTracker::new(6, 95.0);
        for _ in 0..6 {
            tracker.observe(&good());
            assert_eq!(tracker.state(), PoseState::HoldingStill);
        }
        tracker.observe(&good());
        assert_eq!(tracker.state(), PoseState::Ready);
        assert_eq!(tracker.consecutive_stable_frames(), 7);
    }

    #[test]
    fn confidence_threshold_is_inclusive() {
        let tracker = StabilityTracker::new(6, 95.0);
        let exactly = FaceShapeReport::Complete(FaceMeasurement {
            face_width: Some(1.0),
            face_height: Some(1.0),
            confidence: Some(95.0),
            ..FaceMeasurement::default()
        });
        assert_eq!(tracker.classify(&exactly), PollOutcome::Qualified);
    }

    #[test]
    fn any_disqualifying_poll_falls_back_from_ready() {
        for bad in [FaceShapeReport::Processing, low_confidence(), missing_height()] {
            let mut tracker = StabilityTracker::new(6, 95.0);
            for _ in 0..10 {
                tracker.observe(&good());
            }
            assert!(tracker.pose_ready());

            tracker.observe(&bad);
            assert_eq!(tracker.state(), PoseState::Detecting);
            assert_eq!(tracker.consecutive_stable_frames(), 0);
        }
    }

    #[test]
    fn zero_dimension_does_not_count() {
        let tracker = StabilityTracker::new(6, 95.0);
        let zero = FaceShapeReport::Complete(FaceMeasurement {
            face_width: Some(0.0),
            face_height: Some(170.0),
            confidence: Some(99.0),
            ..FaceMeasurement::default()
        });
        assert_eq!(tracker.classify(&zero), PollOutcome::Disqualified);
    }

    fn arb_report() -> impl Strategy<Value = FaceShapeReport> {
        prop_oneof![
            Just(FaceShapeReport::Processing),
            Just(good()),
            Just(low_confidence()),
            Just(missing_height()),
        ]
    }

    proptest! {
        #[test]
        fn ready_iff_trailing_run_exceeds_threshold(polls in prop::collection::vec(arb_report(), 0..40)) {
            let mut tracker = StabilityTracker::new(6, 95.0);
            for poll in &polls {
                tracker.observe(poll);
            }

            let trailing = polls
                .iter()
                .rev()
                .take_while(|p| **p == good())
                .count();
            prop_assert_eq!(tracker.pose_ready(), trailing > 6);
            prop_assert_eq!(tracker.consecutive_stable_frames() as usize, trailing);
        }
    }
}
