pub mod frame;
pub mod v4l2;

use crate::common::Result;
use image::DynamicImage;

pub use frame::{encode_jpeg, CapturedImage};
pub use v4l2::{Camera, CameraInfo, CameraSession};

/// Anything that can hand out the current video frame.
pub trait FrameSource {
    /// `Ok(None)` while the stream has nothing to show yet.
    fn next_frame(&mut self) -> Result<Option<DynamicImage>>;
}

/// Placeholder source for a session whose camera could not be opened.
pub struct NoCamera;

impl FrameSource for NoCamera {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatus {
    Starting,
    Ready,
    Error(String),
}

impl CameraStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CameraStatus::Ready)
    }
}
