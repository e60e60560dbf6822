use crate::common::{FaceLensError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageBuffer, Luma, Rgb};
use std::sync::Arc;
use std::time::Instant;

/// An encoded JPEG snapshot. Cloning shares the bytes, so an upload that is
/// still running keeps its own handle when a new capture replaces this one.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
    captured_at: Instant,
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes: bytes.into(),
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Rasterizes `frame` at its natural size and encodes it as JPEG.
///
/// Returns `Ok(None)` when the frame has no dimensions yet, so callers can
/// invoke this before the stream is playing.
pub fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<Option<CapturedImage>> {
    let (width, height) = (frame.width(), frame.height());
    if width == 0 || height == 0 {
        return Ok(None);
    }

    let rgb = frame.to_rgb8();
    let mut bytes = Vec::with_capacity((width * height / 4) as usize);
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| FaceLensError::Encode(format!("JPEG encode failed: {}", e)))?;

    Ok(Some(CapturedImage::new(bytes, width, height)))
}

pub fn grey_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let needed = (width * height) as usize;
    if data.len() < needed {
        return Err(FaceLensError::Camera(format!(
            "Short GREY buffer: {} bytes for {}x{}", data.len(), width, height
        )));
    }

    let buffer = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data[..needed].to_vec())
        .ok_or_else(|| FaceLensError::Camera("Failed to create grayscale image buffer".into()))?;
    Ok(DynamicImage::ImageLuma8(buffer))
}

/// Converts packed YUYV 4:2:2 into RGB using BT.601 coefficients.
pub fn yuyv_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let needed = (width * height * 2) as usize;
    if width % 2 != 0 || data.len() < needed {
        return Err(FaceLensError::Camera(format!(
            "Bad YUYV buffer: {} bytes for {}x{}", data.len(), width, height
        )));
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..needed].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }

    let buffer = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb)
        .ok_or_else(|| FaceLensError::Camera("Failed to create RGB image buffer".into()))?;
    Ok(DynamicImage::ImageRgb8(buffer))
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as f32 - 16.0;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;

    let r = 1.164 * c + 1.596 * e;
    let g = 1.164 * c - 0.392 * d - 0.813 * e;
    let b = 1.164 * c + 2.017 * d;

    [clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
