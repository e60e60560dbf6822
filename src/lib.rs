pub mod camera;
pub mod cli;
pub mod common;
pub mod core;
pub mod service;

// Re-export commonly used types
pub use camera::{CameraStatus, CapturedImage, FrameSource};
pub use common::{Config, DevMode, ErrorCategory, FaceLensError, Result};
pub use core::{Mode, Session, SessionRunner};
pub use service::{AnalysisBackend, BackendClient};
