//! Configuration types for gridloop

use crate::error::{Error, Result};
use crate::types::{Framerate, Resolution};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shortest hold a recording is credited with (one frame at 30 fps)
pub const MIN_RECORDING_DURATION_US: u64 = 33_333;

/// Duration assumed for frames that carry no duration of their own
pub const FALLBACK_FRAME_DURATION_US: u64 = 33_333;

/// Top-level looper configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LooperConfig {
    pub grid: GridConfig,
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
    pub junction: JunctionConfig,
    pub preview: PreviewConfig,
}

impl LooperConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject configurations the core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.grid.cells == 0 {
            return Err(Error::Config("grid.cells must be at least 1".into()));
        }
        if self.grid.columns == 0 {
            return Err(Error::Config("grid.columns must be at least 1".into()));
        }
        if self.grid.cell_width == 0 || self.grid.cell_height == 0 {
            return Err(Error::Config("grid cell size must be non-zero".into()));
        }
        if self.capture.buffer_frames == 0 {
            return Err(Error::Config("capture.buffer_frames must be at least 1".into()));
        }
        if !self.capture.framerate.is_valid() {
            return Err(Error::Config(format!(
                "capture.framerate {}/{} is not usable",
                self.capture.framerate.num, self.capture.framerate.den
            )));
        }
        if !self.playback.framerate.is_valid() {
            return Err(Error::Config(format!(
                "playback.framerate {}/{} is not usable",
                self.playback.framerate.num, self.playback.framerate.den
            )));
        }
        if self.junction.max_branches == 0 {
            return Err(Error::Config("junction.max_branches must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_cells(mut self, cells: u32) -> Self {
        self.grid.cells = cells;
        self
    }

    pub fn with_buffer_frames(mut self, frames: usize) -> Self {
        self.capture.buffer_frames = frames;
        self
    }

    pub fn with_capture_fps(mut self, fps: u32) -> Self {
        self.capture.framerate = Framerate::new(fps, 1);
        self
    }

    pub fn with_playback_fps(mut self, fps: u32) -> Self {
        self.playback.framerate = Framerate::new(fps, 1);
        self
    }

    pub fn with_max_branches(mut self, max: usize) -> Self {
        self.junction.max_branches = max;
        self
    }

    pub fn with_preview(mut self, enabled: bool) -> Self {
        self.preview.enabled = enabled;
        self
    }
}

/// Output grid layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of recordable cells (keys 1..=cells)
    pub cells: u32,
    /// Recordable cells per row (the live view column is extra)
    pub columns: u32,
    /// Cell width in pixels
    pub cell_width: u32,
    /// Cell height in pixels
    pub cell_height: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cells: 20,
            columns: 10,
            cell_width: 320,
            cell_height: 180,
        }
    }
}

impl GridConfig {
    pub fn cell_resolution(&self) -> Resolution {
        Resolution::new(self.cell_width, self.cell_height)
    }
}

/// Camera capture configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Negotiated camera resolution
    pub resolution: Resolution,
    /// Camera framerate
    pub framerate: Framerate,
    /// Ring buffer capacity per recording, in frames
    pub buffer_frames: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::FHD_1080P,
            framerate: Framerate::FPS_30,
            buffer_frames: 60, // 2 seconds at 30fps
        }
    }
}

/// Loop playback configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output pacing, independent of the capture rate
    pub framerate: Framerate,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            framerate: Framerate::FPS_30,
        }
    }
}

/// Stream junction limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JunctionConfig {
    /// Ceiling on simultaneously attached dynamic branches
    pub max_branches: usize,
}

impl Default for JunctionConfig {
    fn default() -> Self {
        Self { max_branches: 64 }
    }
}

/// Live preview while a key is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = LooperConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.cells, 20);
        assert_eq!(config.capture.buffer_frames, 60);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = LooperConfig::from_toml_str(
            r#"
            [grid]
            cells = 9

            [playback]
            framerate = { num = 60, den = 1 }
            "#,
        )
        .unwrap();
        assert_eq!(config.grid.cells, 9);
        assert_eq!(config.grid.columns, 10);
        assert_eq!(config.playback.framerate, Framerate::FPS_60);
        assert!(config.preview.enabled);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = LooperConfig::from_toml_str("[capture]\nbuffer_frames = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = LooperConfig::default().with_cells(4).with_preview(false);
        let text = config.to_toml_string().unwrap();
        assert_eq!(LooperConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[junction]\nmax_branches = 3").unwrap();
        let config = LooperConfig::load(file.path()).unwrap();
        assert_eq!(config.junction.max_branches, 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LooperConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
