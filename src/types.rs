//! Common types used throughout gridloop

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    // Common resolutions
    pub const CELL_180P: Self = Self::new(320, 180);
    pub const HD_720P: Self = Self::new(1280, 720);
    pub const FHD_1080P: Self = Self::new(1920, 1080);

    /// Calculate total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Calculate aspect ratio
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FHD_1080P
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| crate::error::Error::Config(format!("bad resolution '{}'", s)))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| crate::error::Error::Config(format!("bad width in '{}'", s)))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| crate::error::Error::Config(format!("bad height in '{}'", s)))?;
        Ok(Self::new(width, height))
    }
}

/// Frame format / pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FrameFormat {
    /// BGRA - 32-bit BGRA (compositor canvas format)
    #[default]
    Bgra,
    /// RGBA - 32-bit RGBA
    Rgba,
    /// UYVY - packed 4:2:2 (typical webcam output)
    Uyvy,
    /// I420 - planar YUV 4:2:0
    I420,
    /// NV12 - Y plane + interleaved UV
    Nv12,
}

impl FrameFormat {
    /// Bytes per pixel (approximate for planar formats)
    pub fn bytes_per_pixel(&self) -> f32 {
        match self {
            FrameFormat::Bgra | FrameFormat::Rgba => 4.0,
            FrameFormat::Uyvy => 2.0,
            FrameFormat::I420 | FrameFormat::Nv12 => 1.5,
        }
    }

    /// Can the compositor blit this format directly?
    pub fn is_packed_32bit(&self) -> bool {
        matches!(self, FrameFormat::Bgra | FrameFormat::Rgba)
    }
}

/// A decoded video frame.
///
/// Pixel data is reference counted: cloning a `Frame` shares the image
/// buffer, so storing a frame in several places costs one pointer each.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame data
    pub data: Arc<[u8]>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Row stride in bytes
    pub stride: u32,
    /// Pixel format
    pub format: FrameFormat,
    /// Presentation timestamp in microseconds
    pub pts: i64,
    /// Declared duration in microseconds, if the source provided one
    pub duration: Option<u64>,
    /// Source sequence number
    pub sequence: u64,
}

impl Frame {
    /// Create a new zero-filled frame
    pub fn new(width: u32, height: u32, format: FrameFormat) -> Self {
        let size = (width as f32 * height as f32 * format.bytes_per_pixel()) as usize;
        Self::from_data(vec![0u8; size], width, height, format)
    }

    /// Create a frame from existing data
    pub fn from_data(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        let stride = if format.is_packed_32bit() {
            width * 4
        } else if format == FrameFormat::Uyvy {
            width * 2
        } else {
            width
        };
        Self {
            data: data.into(),
            width,
            height,
            stride,
            format,
            pts: 0,
            duration: None,
            sequence: 0,
        }
    }

    /// Create a solid-colour BGRA frame
    pub fn solid_bgra(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let data = bgra
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::from_data(data, width, height, FrameFormat::Bgra)
    }

    /// Set the presentation timestamp
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = pts;
        self
    }

    /// Set the declared duration
    pub fn with_duration(mut self, duration_us: u64) -> Self {
        self.duration = Some(duration_us);
        self
    }

    /// Set the source sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Get resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Calculate frame size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check whether two frames share the same pixel buffer
    pub fn shares_data_with(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

/// A frame re-stamped for output by a producer
#[derive(Debug, Clone)]
pub struct TimedFrame {
    /// The frame being emitted
    pub frame: Frame,
    /// Output presentation timestamp in microseconds
    pub pts: u64,
    /// Output duration in microseconds
    pub duration: u64,
}

/// Framerate representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub den: u32,
}

impl Framerate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    // Common framerates
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_60: Self = Self::new(60, 1);
    pub const FPS_120: Self = Self::new(120, 1);

    /// Get framerate as f64
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /// Frame duration in microseconds
    pub fn frame_duration_us(&self) -> u64 {
        if self.num == 0 {
            return 0;
        }
        (1_000_000 * self.den as u64) / self.num as u64
    }

    /// Frame interval as a `Duration`
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(self.frame_duration_us())
    }

    /// Is this a usable rate (non-zero numerator and denominator)?
    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{} fps", self.num)
        } else {
            write!(f, "{:.2} fps", self.as_f64())
        }
    }
}

/// Statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Frames received from the camera source
    pub frames_captured: u64,
    /// Canvas frames produced by the compositor
    pub frames_composited: u64,
    /// Recordings that ended in a playing loop
    pub recordings_completed: u64,
    /// Recordings abandoned (empty buffer or attach failure)
    pub recordings_aborted: u64,
    /// Frames dropped at the junction because a branch was busy
    pub branch_frames_dropped: u64,
    /// Frames discarded by buffer overflow across all recordings
    pub buffer_overflows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse() {
        let res: Resolution = "1280x720".parse().unwrap();
        assert_eq!(res, Resolution::HD_720P);
        assert!("1280".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_framerate_duration() {
        assert_eq!(Framerate::FPS_30.frame_duration_us(), 33_333);
        assert_eq!(Framerate::FPS_60.frame_duration_us(), 16_666);
        assert_eq!(Framerate::new(0, 1).frame_duration_us(), 0);
        assert!(!Framerate::new(30, 0).is_valid());
    }

    #[test]
    fn test_frame_clone_shares_pixels() {
        let frame = Frame::solid_bgra(4, 2, [1, 2, 3, 255]);
        let copy = frame.clone();
        assert!(frame.shares_data_with(&copy));
        assert_eq!(frame.size_bytes(), 4 * 2 * 4);
        assert_eq!(frame.stride, 16);
        assert_eq!(&frame.data[..4], &[1, 2, 3, 255]);
    }
}
