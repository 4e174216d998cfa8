//! Playback module
//!
//! Turns a finished recording into an endless loop:
//! - Palindrome cursor over the recorded frames
//! - Per-cell playback slot that paces output timestamps

mod palindrome;
mod slot;

pub use palindrome::{Direction, PlaybackLoop};
pub use slot::{OutputFormat, PlaybackSlot};
