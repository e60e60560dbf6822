pub mod client;
pub mod protocol;

pub use client::{AnalysisBackend, BackendClient};
pub use protocol::{FaceMeasurement, FaceShapeReport, MetricEntry, SkinMetrics, SkinOutcome};
