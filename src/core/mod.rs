pub mod readout;
pub mod runner;
pub mod schedule;
pub mod session;
pub mod stability;

pub use readout::{ConfidenceBar, FaceReadout};
pub use runner::{ChartRenderer, Command, Console, SessionRunner};
pub use schedule::{Dispatcher, Interval, LatestGate};
pub use session::{Mode, Session};
pub use stability::{PoseState, StabilityTracker};
