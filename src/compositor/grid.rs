//! In-process grid compositor
//!
//! Holds at most one producer per cell and renders every attached producer
//! into a single BGRA canvas on each [`GridCompositor::composite`] call.

use super::{CellGeometry, Compositor, GridLayout, ProducerHandle, SharedProducer};
use crate::error::{Error, Result};
use crate::processing::{self, Canvas};
use crate::types::{Frame, FrameFormat, Resolution};

use std::collections::HashMap;

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

struct Attached {
    cell: u32,
    producer: SharedProducer,
    geometry: CellGeometry,
}

pub struct GridCompositor {
    layout: GridLayout,
    canvas: Vec<u8>,
    producers: HashMap<u64, Attached>,
    cells: HashMap<u32, u64>,
    next_id: u64,
    frames_composited: u64,
}

impl GridCompositor {
    pub fn new(layout: GridLayout) -> Self {
        let res = layout.canvas_resolution();
        tracing::info!(
            "Grid compositor: {} cells in {} columns, canvas {}",
            layout.cells(),
            layout.columns(),
            res
        );
        Self {
            layout,
            canvas: vec![0u8; res.pixels() as usize * 4],
            producers: HashMap::new(),
            cells: HashMap::new(),
            next_id: 1,
            frames_composited: 0,
        }
    }

    /// Pull one frame from every producer and render the grid
    pub fn composite(&mut self) -> Frame {
        let res = self.layout.canvas_resolution();
        let mut canvas = Canvas {
            data: &mut self.canvas,
            width: res.width,
            height: res.height,
        };
        processing::fill(&mut canvas, BACKGROUND);

        let mut order: Vec<&Attached> = self.producers.values().collect();
        order.sort_by_key(|a| (a.geometry.z_order, a.cell));

        for attached in order {
            let pulled = attached.producer.lock().pull_frame();
            let Some(timed) = pulled else {
                continue;
            };
            if let Err(e) = processing::blit_scaled(&mut canvas, &timed.frame, &attached.geometry) {
                tracing::warn!("Cell {}: frame not drawn: {}", attached.cell, e);
            }
        }

        let sequence = self.frames_composited;
        self.frames_composited += 1;
        Frame::from_data(self.canvas.clone(), res.width, res.height, FrameFormat::Bgra)
            .with_sequence(sequence)
    }

    /// Handle of the producer occupying `cell`
    pub fn producer_for_cell(&self, cell: u32) -> Option<ProducerHandle> {
        self.cells.get(&cell).copied().map(ProducerHandle::new)
    }

    pub fn is_occupied(&self, cell: u32) -> bool {
        self.cells.contains_key(&cell)
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    pub fn frames_composited(&self) -> u64 {
        self.frames_composited
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn canvas_resolution(&self) -> Resolution {
        self.layout.canvas_resolution()
    }
}

impl Compositor for GridCompositor {
    fn attach_producer(
        &mut self,
        cell: u32,
        producer: SharedProducer,
        geometry: CellGeometry,
    ) -> Result<ProducerHandle> {
        if cell > self.layout.cells() {
            return Err(Error::InvalidCell(cell));
        }
        if let Some(existing) = self.cells.get(&cell) {
            tracing::error!(
                "Cell {} still has producer-{} attached; detach it first",
                cell,
                existing
            );
            return Err(Error::CellOccupied(cell));
        }

        let handle = ProducerHandle::new(self.next_id);
        self.next_id += 1;
        self.producers.insert(
            handle.id(),
            Attached {
                cell,
                producer,
                geometry,
            },
        );
        self.cells.insert(cell, handle.id());
        tracing::debug!(
            "Attached {} to cell {} at ({}, {}) z={}",
            handle,
            cell,
            geometry.x,
            geometry.y,
            geometry.z_order
        );
        Ok(handle)
    }

    fn detach_producer(&mut self, handle: ProducerHandle) -> Result<()> {
        let attached = self
            .producers
            .remove(&handle.id())
            .ok_or(Error::ProducerNotFound(handle.id()))?;
        self.cells.remove(&attached.cell);
        tracing::debug!("Detached {} from cell {}", handle, attached.cell);
        Ok(())
    }

    fn cell_geometry(&self, cell: u32) -> Option<CellGeometry> {
        self.layout.geometry(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::FrameProducer;
    use crate::types::TimedFrame;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Solid([u8; 4]);

    impl FrameProducer for Solid {
        fn pull_frame(&mut self) -> Option<TimedFrame> {
            Some(TimedFrame {
                frame: Frame::solid_bgra(4, 4, self.0),
                pts: 0,
                duration: 0,
            })
        }
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * frame.width + x) * 4) as usize;
        [
            frame.data[i],
            frame.data[i + 1],
            frame.data[i + 2],
            frame.data[i + 3],
        ]
    }

    #[test]
    fn test_second_producer_rejected() {
        let mut comp = GridCompositor::new(GridLayout::new(2, 2, 4, 4));
        let geometry = comp.cell_geometry(1).unwrap();
        comp.attach_producer(1, Arc::new(Mutex::new(Solid([1; 4]))), geometry)
            .unwrap();
        let err = comp
            .attach_producer(1, Arc::new(Mutex::new(Solid([2; 4]))), geometry)
            .unwrap_err();
        assert!(matches!(err, Error::CellOccupied(1)));
        assert_eq!(comp.producer_count(), 1);
    }

    #[test]
    fn test_detach_frees_cell() {
        let mut comp = GridCompositor::new(GridLayout::new(2, 2, 4, 4));
        let geometry = comp.cell_geometry(2).unwrap();
        let handle = comp
            .attach_producer(2, Arc::new(Mutex::new(Solid([1; 4]))), geometry)
            .unwrap();
        comp.detach_producer(handle).unwrap();
        assert!(!comp.is_occupied(2));
        assert!(matches!(
            comp.detach_producer(handle),
            Err(Error::ProducerNotFound(_))
        ));
        assert!(matches!(
            comp.attach_producer(3, Arc::new(Mutex::new(Solid([1; 4]))), geometry),
            Err(Error::InvalidCell(3))
        ));
    }

    #[test]
    fn test_composite_places_cells() {
        let mut comp = GridCompositor::new(GridLayout::new(2, 2, 4, 4));
        let live = comp.cell_geometry(0).unwrap();
        let second = comp.cell_geometry(2).unwrap();
        comp.attach_producer(0, Arc::new(Mutex::new(Solid([1, 1, 1, 255]))), live)
            .unwrap();
        comp.attach_producer(2, Arc::new(Mutex::new(Solid([2, 2, 2, 255]))), second)
            .unwrap();

        let frame = comp.composite();
        assert_eq!(frame.resolution(), Resolution::new(12, 4));
        assert_eq!(pixel(&frame, 0, 0), [1, 1, 1, 255]);
        assert_eq!(pixel(&frame, 4, 0), BACKGROUND);
        assert_eq!(pixel(&frame, 8, 3), [2, 2, 2, 255]);
        assert_eq!(comp.frames_composited(), 1);
    }
}
