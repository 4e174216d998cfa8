//! gridloop — real-time grid video looper
//!
//! Hold a key to record the live camera, release it to turn the take into
//! an endless palindrome loop in that key's grid cell.
//!
//! # Features
//!
//! - **Recording**: per-key capture slots fed from a live stream junction
//! - **Playback**: forward/backward loops paced on their own output clock
//! - **Composition**: fixed grid with the live view in the top-left cell
//!
//! # Example
//!
//! ```rust,no_run
//! use gridloop::{KeyQueue, LooperConfig, Session};
//! use gridloop::source::create_source;
//!
//! #[tokio::main]
//! async fn main() -> gridloop::Result<()> {
//!     let config = LooperConfig::default().with_cells(10);
//!     let source = create_source(&config.capture);
//!     let (keys_tx, keys) = KeyQueue::new(64);
//!     gridloop::input::spawn_stdin_reader(keys_tx)?;
//!
//!     let session = Session::new(config)?;
//!     let stats = session.run(source, keys, None).await?;
//!     println!("{} loops recorded", stats.recordings_completed);
//!     Ok(())
//! }
//! ```

pub mod compositor;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod input;
pub mod junction;
pub mod monitor;
pub mod playback;
pub mod processing;
pub mod recording;
pub mod session;
pub mod source;
pub mod types;

// Re-exports for convenience
pub use compositor::{CellGeometry, Compositor, FrameProducer, GridCompositor, GridLayout};
pub use config::LooperConfig;
pub use coordinator::{Coordinator, KeyState};
pub use error::{Error, Result};
pub use input::{KeyEvent, KeyQueue};
pub use junction::{FrameSink, LatestFrame, StreamJunction};
pub use playback::{OutputFormat, PlaybackLoop, PlaybackSlot};
pub use recording::{CaptureSlot, FrameBuffer};
pub use session::Session;
pub use types::{Frame, FrameFormat, Framerate, Resolution, Stats, TimedFrame};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
