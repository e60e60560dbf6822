use crate::camera::frame::{grey_to_image, yuyv_to_image};
use crate::camera::FrameSource;
use crate::common::config::CameraConfig;
use crate::common::{FaceLensError, Result};
use image::{DynamicImage, ImageFormat};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};
use std::fs;
use std::time::Duration;

/// Sentinel device index that selects the first colour capture device.
pub const AUTO_DEVICE_INDEX: u32 = 999;

#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
    pub formats: Vec<String>,
    pub video_capture: bool,
}

impl CameraInfo {
    pub fn has_color_format(&self) -> bool {
        self.formats.iter().any(|f| f == "MJPG" || f == "YUYV")
    }
}

pub struct Camera {
    device: Device,
    index: u32,
    config: CameraConfig,
}

pub struct CameraSession<'a> {
    stream: v4l::io::mmap::Stream<'a>,
    format: v4l::Format,
}

impl Camera {
    /// Opens the configured device once. There is no retry: a failure here
    /// leaves the session without a camera until the program is restarted.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let index = if config.device_index == AUTO_DEVICE_INDEX {
            Self::detect_color_camera()?
        } else {
            config.device_index
        };

        tracing::info!("Opening camera device {}", index);
        let device = Device::new(index as usize)
            .map_err(|e| FaceLensError::Camera(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device.query_caps()
            .map_err(|e| FaceLensError::Camera(format!("Failed to query capabilities: {}", e)))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(FaceLensError::Camera(format!(
                "/dev/video{} ({}) does not support video capture", index, caps.card
            )));
        }

        let mut fmt = device.format()
            .map_err(|e| FaceLensError::Camera(format!("Failed to get format: {}", e)))?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(b"MJPG");

        // Devices without MJPG keep their own fourcc.
        let actual = match device.set_format(&fmt) {
            Ok(actual) => actual,
            Err(e) => {
                tracing::warn!("Could not set {}x{} MJPG: {}. Using device defaults.",
                               config.width, config.height, e);
                device.format()
                    .map_err(|e| FaceLensError::Camera(format!("Failed to get format: {}", e)))?
            }
        };

        let fourcc = fourcc_name(&actual.fourcc);
        if !matches!(fourcc.as_str(), "MJPG" | "YUYV" | "GREY") {
            return Err(FaceLensError::Camera(format!("Unsupported pixel format {}", fourcc)));
        }

        if actual.width != config.width || actual.height != config.height {
            tracing::warn!("Camera resolution {}x{} differs from requested {}x{}",
                           actual.width, actual.height, config.width, config.height);
        }
        tracing::info!("Camera {} ready: {}x{} {}", caps.card, actual.width, actual.height, fourcc);

        Ok(Self { device, index, config: config.clone() })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Lists every /dev/video* node that answers a capability query.
    pub fn list_all() -> Result<Vec<CameraInfo>> {
        let mut cameras = Vec::new();

        for entry in fs::read_dir("/dev")? {
            let entry = entry?;
            let path = entry.path();
            let filename = path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("");

            let Some(index) = filename.strip_prefix("video").and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let Ok(device) = Device::new(index as usize) else {
                continue;
            };
            let Ok(caps) = device.query_caps() else {
                continue;
            };

            let formats = device.enum_formats()
                .unwrap_or_default()
                .iter()
                .map(|desc| fourcc_name(&desc.fourcc))
                .collect();

            cameras.push(CameraInfo {
                index,
                name: caps.card.clone(),
                formats,
                video_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            });
        }

        cameras.sort_by_key(|c| c.index);
        Ok(cameras)
    }

    /// The built-in user-facing webcam is normally the lowest-numbered colour
    /// capture node, so that one wins.
    pub fn detect_color_camera() -> Result<u32> {
        let cameras = Self::list_all()?;
        match cameras.iter().find(|c| c.video_capture && c.has_color_format()) {
            Some(camera) => {
                tracing::info!("Selected camera /dev/video{} ({})", camera.index, camera.name);
                Ok(camera.index)
            }
            None => Err(FaceLensError::Camera("No colour capture device found".into())),
        }
    }

    /// Starts streaming and discards the warmup frames.
    pub fn start_session(&mut self) -> Result<CameraSession<'_>> {
        let format = self.device.format()
            .map_err(|e| FaceLensError::Camera(format!("Failed to get format: {}", e)))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(&mut self.device, Type::VideoCapture, 4)
            .map_err(|e| FaceLensError::Camera(format!("Failed to create stream: {}", e)))?;

        for i in 0..self.config.warmup_frames {
            stream.next()
                .map_err(|e| FaceLensError::Camera(format!("Failed to capture warmup frame {}: {}", i, e)))?;
            std::thread::sleep(Duration::from_millis(self.config.warmup_delay_ms));
        }
        tracing::debug!("Camera warmed up after {} frames", self.config.warmup_frames);

        Ok(CameraSession { stream, format })
    }
}

impl<'a> FrameSource for CameraSession<'a> {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        let (buf, meta) = self.stream.next()
            .map_err(|e| FaceLensError::Camera(format!("Failed to capture: {}", e)))?;

        let used = (meta.bytesused as usize).min(buf.len());
        if used == 0 || self.format.width == 0 || self.format.height == 0 {
            return Ok(None);
        }
        let data = &buf[..used];

        let frame = match fourcc_name(&self.format.fourcc).as_str() {
            "MJPG" => image::load_from_memory_with_format(data, ImageFormat::Jpeg)?,
            "YUYV" => yuyv_to_image(data, self.format.width, self.format.height)?,
            "GREY" => grey_to_image(data, self.format.width, self.format.height)?,
            other => return Err(FaceLensError::Camera(format!("Unsupported pixel format {}", other))),
        };
        Ok(Some(frame))
    }
}

fn fourcc_name(fourcc: &FourCC) -> String {
    fourcc.str()
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| "UNKNOWN".to_string())
}
