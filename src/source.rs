//! Camera sources
//!
//! The looper consumes a single stream of timestamped frames. Real cameras
//! sit behind [`FrameSource`]; [`TestPatternSource`] generates a moving
//! pattern at the configured rate for demos and tests.

use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::types::{Frame, FrameFormat, Framerate, Resolution};

use tokio::time::{Interval, MissedTickBehavior};

/// Trait for camera sources
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Start producing frames
    async fn start(&mut self) -> Result<()>;

    /// Stop producing frames
    async fn stop(&mut self) -> Result<()>;

    /// Wait for the next frame
    async fn next_frame(&mut self) -> Result<Frame>;

    /// Check if the source is running
    fn is_active(&self) -> bool;

    /// Negotiated resolution
    fn resolution(&self) -> Resolution;

    /// Negotiated framerate
    fn framerate(&self) -> Framerate;
}

/// Create the source described by the capture configuration
pub fn create_source(config: &CaptureConfig) -> Box<dyn FrameSource> {
    Box::new(TestPatternSource::new(config.resolution, config.framerate))
}

/// Synthetic camera: a colour field with a bar sweeping across it
pub struct TestPatternSource {
    resolution: Resolution,
    framerate: Framerate,
    sequence: u64,
    limit: Option<u64>,
    paced: bool,
    interval: Option<Interval>,
    active: bool,
}

impl TestPatternSource {
    pub fn new(resolution: Resolution, framerate: Framerate) -> Self {
        Self {
            resolution,
            framerate,
            sequence: 0,
            limit: None,
            paced: true,
            interval: None,
            active: false,
        }
    }

    /// End the stream after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Produce frames as fast as they are pulled
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn frames_generated(&self) -> u64 {
        self.sequence
    }

    fn render(&self) -> Frame {
        let w = self.resolution.width as usize;
        let h = self.resolution.height as usize;
        let n = self.sequence;
        let field = [
            (n * 3 % 256) as u8,
            (n * 5 % 256) as u8,
            (n * 7 % 256) as u8,
            255,
        ];
        let bar_x = if w == 0 { 0 } else { (n as usize * 8) % w };
        let bar_w = (w / 32).max(1);

        let mut data = Vec::with_capacity(w * h * 4);
        for _ in 0..h {
            for x in 0..w {
                if x >= bar_x && x < bar_x + bar_w {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    data.extend_from_slice(&field);
                }
            }
        }

        let duration = self.framerate.frame_duration_us();
        Frame::from_data(data, self.resolution.width, self.resolution.height, FrameFormat::Bgra)
            .with_pts((n * duration) as i64)
            .with_duration(duration)
            .with_sequence(n)
    }
}

#[async_trait::async_trait]
impl FrameSource for TestPatternSource {
    async fn start(&mut self) -> Result<()> {
        if !self.framerate.is_valid() {
            return Err(Error::Source(format!(
                "framerate {}/{} is not usable",
                self.framerate.num, self.framerate.den
            )));
        }
        if self.paced {
            let mut interval = tokio::time::interval(self.framerate.frame_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            self.interval = Some(interval);
        }
        self.active = true;
        tracing::info!(
            "Test pattern source started: {} @ {}",
            self.resolution,
            self.framerate
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if self.active {
            self.active = false;
            self.interval = None;
            tracing::info!("Test pattern source stopped after {} frames", self.sequence);
        }
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        if !self.active {
            return Err(Error::Source("source not started".into()));
        }
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(Error::SourceEnded);
        }
        if let Some(interval) = self.interval.as_mut() {
            interval.tick().await;
        }
        let frame = self.render();
        self.sequence += 1;
        Ok(frame)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn framerate(&self) -> Framerate {
        self.framerate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pattern_frames_are_stamped() {
        let mut source = TestPatternSource::new(Resolution::new(64, 4), Framerate::FPS_30).unpaced();
        source.start().await.unwrap();
        let first = source.next_frame().await.unwrap();
        let second = source.next_frame().await.unwrap();
        assert_eq!((first.sequence, second.sequence), (0, 1));
        assert_eq!(second.pts, 33_333);
        assert_eq!(second.duration, Some(33_333));
        assert_eq!(first.size_bytes(), 64 * 4 * 4);
    }

    #[tokio::test]
    async fn test_limit_ends_stream() {
        let mut source = TestPatternSource::new(Resolution::new(8, 8), Framerate::FPS_60)
            .unpaced()
            .with_limit(2);
        source.start().await.unwrap();
        source.next_frame().await.unwrap();
        source.next_frame().await.unwrap();
        assert!(matches!(source.next_frame().await, Err(Error::SourceEnded)));
    }

    #[tokio::test]
    async fn test_not_started() {
        let mut source = TestPatternSource::new(Resolution::new(8, 8), Framerate::FPS_30);
        assert!(matches!(source.next_frame().await, Err(Error::Source(_))));
        source.start().await.unwrap();
        assert!(source.is_active());
        source.stop().await.unwrap();
        assert!(!source.is_active());
    }
}
