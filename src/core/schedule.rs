use crate::common::Result;
use crate::service::protocol::{FaceShapeReport, SkinOutcome};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Fixed-cadence deadline driven by the session loop. The first tick is due
/// one period after creation.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    next_due: Instant,
    cancelled: bool,
}

impl Interval {
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next_due: now + period,
            cancelled: false,
        }
    }

    /// True once per elapsed period. Missed ticks are not replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.cancelled || now < self.next_due {
            return false;
        }
        self.next_due += self.period;
        if self.next_due <= now {
            self.next_due = now + self.period;
        }
        true
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        (!self.cancelled).then(|| self.next_due.saturating_duration_since(now))
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    FrameAnalysis,
    PosePoll,
    SkinAnalysis,
}

#[derive(Debug)]
pub enum Completion {
    FrameAnalyzed(Result<FaceShapeReport>),
    PosePolled(Result<FaceShapeReport>),
    SkinAnalyzed(Result<SkinOutcome>),
}

impl Completion {
    pub fn lane(&self) -> Lane {
        match self {
            Completion::FrameAnalyzed(_) => Lane::FrameAnalysis,
            Completion::PosePolled(_) => Lane::PosePoll,
            Completion::SkinAnalyzed(_) => Lane::SkinAnalysis,
        }
    }
}

#[derive(Debug)]
pub struct Tagged<T> {
    pub seq: u64,
    pub value: T,
}

/// Admits only responses newer than the last one applied on its lane.
#[derive(Debug, Clone, Default)]
pub struct LatestGate {
    applied: Option<u64>,
}

impl LatestGate {
    pub fn admit(&mut self, seq: u64) -> bool {
        match self.applied {
            Some(last) if seq <= last => false,
            _ => {
                self.applied = Some(seq);
                true
            }
        }
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.applied
    }
}

/// Runs each request on its own thread and hands the tagged result back to
/// the session loop. Overlapping requests are allowed; ordering is restored
/// by the receiving side's `LatestGate`.
pub struct Dispatcher {
    tx: Sender<Tagged<Completion>>,
    rx: Receiver<Tagged<Completion>>,
    next_seq: u64,
    in_flight: usize,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            next_seq: 1,
            in_flight: 0,
        }
    }

    pub fn submit<F>(&mut self, lane: Lane, job: F) -> u64
    where
        F: FnOnce() -> Completion + Send + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight += 1;

        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("facelens-{:?}-{}", lane, seq))
            .spawn(move || {
                let value = job();
                // The loop may already be gone.
                let _ = tx.send(Tagged { seq, value });
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn {:?} request {}: {}", lane, seq, e);
            self.in_flight -= 1;
        } else {
            tracing::trace!("Submitted {:?} request {}", lane, seq);
        }
        seq
    }

    /// Completed requests, oldest arrival first. Never blocks.
    pub fn drain(&mut self) -> Vec<Tagged<Completion>> {
        let done: Vec<_> = self.rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Waits up to `timeout` for one completion.
    pub fn wait(&mut self, timeout: Duration) -> Option<Tagged<Completion>> {
        let done = self.rx.recv_timeout(timeout).ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(done)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::protocol::FaceShapeReport;

    #[test]
    fn interval_fires_once_per_period() {
        let start = Instant::now();
        let mut interval = Interval::new(Duration::from_millis(300), start);

        assert!(!interval.poll(start));
        assert!(!interval.poll(start + Duration::from_millis(299)));
        assert!(interval.poll(start + Duration::from_millis(300)));
        assert!(!interval.poll(start + Duration::from_millis(400)));
        assert!(interval.poll(start + Duration::from_millis(600)));
    }

    #[test]
    fn interval_skips_missed_ticks() {
        let start = Instant::now();
        let mut interval = Interval::new(Duration::from_millis(100), start);

        assert!(interval.poll(start + Duration::from_millis(1000)));
        assert!(!interval.poll(start + Duration::from_millis(1050)));
        assert!(interval.poll(start + Duration::from_millis(1100)));
    }

    #[test]
    fn cancelled_interval_never_fires() {
        let start = Instant::now();
        let mut interval = Interval::new(Duration::from_millis(10), start);
        interval.cancel();
        assert!(!interval.poll(start + Duration::from_secs(5)));
        assert!(interval.time_until_due(start).is_none());
    }

    #[test]
    fn gate_discards_stale_sequence_numbers() {
        let mut gate = LatestGate::default();
        assert!(gate.admit(2));
        assert!(!gate.admit(1));
        assert!(!gate.admit(2));
        assert!(gate.admit(5));
        assert_eq!(gate.last_applied(), Some(5));
    }

    #[test]
    fn dispatcher_tags_requests_in_submission_order() {
        let mut dispatcher = Dispatcher::new();
        let first = dispatcher.submit(Lane::PosePoll, || {
            thread::sleep(Duration::from_millis(50));
            Completion::PosePolled(Ok(FaceShapeReport::Processing))
        });
        let second = dispatcher.submit(Lane::PosePoll, || {
            Completion::PosePolled(Ok(FaceShapeReport::Processing))
        });
        assert!(second > first);
        assert_eq!(dispatcher.in_flight(), 2);

        let mut arrived = Vec::new();
        for _ in 0..2 {
            let done = dispatcher.wait(Duration::from_secs(2)).expect("request completed");
            assert_eq!(done.value.lane(), Lane::PosePoll);
            arrived.push(done.seq);
        }
        // The slow first request lands last and must be rejected by a gate.
        assert_eq!(arrived, vec![second, first]);
        let mut gate = LatestGate::default();
        assert!(gate.admit(arrived[0]));
        assert!(!gate.admit(arrived[1]));
        assert_eq!(dispatcher.in_flight(), 0);
    }
}
