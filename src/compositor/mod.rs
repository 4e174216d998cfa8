//! Compositor module
//!
//! The compositor owns the output grid. Producers are attached to cells and
//! pulled once per output tick:
//! - `Compositor` contract used by the coordinator
//! - Fixed grid geometry (`GridLayout`)
//! - In-process BGRA compositor (`GridCompositor`)

mod grid;
mod layout;

pub use grid::GridCompositor;
pub use layout::GridLayout;

use crate::config::FALLBACK_FRAME_DURATION_US;
use crate::error::Result;
use crate::junction::LatestFrame;
use crate::types::TimedFrame;

use parking_lot::Mutex;
use std::sync::Arc;

/// Something that can hand the compositor one frame per tick
pub trait FrameProducer: Send {
    /// Next frame for the cell, or `None` if nothing is ready
    fn pull_frame(&mut self) -> Option<TimedFrame>;
}

/// A producer shared between its owner and the compositor
pub type SharedProducer = Arc<Mutex<dyn FrameProducer>>;

/// Placement of a producer on the output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Higher values are drawn on top
    pub z_order: u32,
}

/// Opaque handle to an attached producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProducerHandle(u64);

impl ProducerHandle {
    /// Wrap a compositor-assigned id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "producer-{}", self.0)
    }
}

/// Output surface the coordinator places loops and previews on
pub trait Compositor {
    /// Attach `producer` to `cell` at `geometry`
    fn attach_producer(
        &mut self,
        cell: u32,
        producer: SharedProducer,
        geometry: CellGeometry,
    ) -> Result<ProducerHandle>;

    /// Stop pulling from a producer and free its cell
    fn detach_producer(&mut self, handle: ProducerHandle) -> Result<()>;

    /// Fixed geometry of `cell` (0 is the live view)
    fn cell_geometry(&self, cell: u32) -> Option<CellGeometry>;
}

impl FrameProducer for LatestFrame {
    fn pull_frame(&mut self) -> Option<TimedFrame> {
        let frame = self.latest()?.clone();
        let duration = frame.duration.unwrap_or(FALLBACK_FRAME_DURATION_US);
        Some(TimedFrame {
            pts: frame.pts.max(0) as u64,
            duration,
            frame,
        })
    }
}

/// Create the in-process compositor for a layout
pub fn create_compositor(layout: GridLayout) -> GridCompositor {
    GridCompositor::new(layout)
}
