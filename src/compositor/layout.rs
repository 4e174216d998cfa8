//! Fixed grid geometry
//!
//! The live view takes the top-left cell. Recorded cells fill the columns
//! to its right, `columns` per row, numbered from 1.

use super::CellGeometry;
use crate::config::GridConfig;
use crate::types::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    cells: u32,
    columns: u32,
    cell_width: u32,
    cell_height: u32,
}

impl GridLayout {
    pub fn new(cells: u32, columns: u32, cell_width: u32, cell_height: u32) -> Self {
        Self {
            cells,
            columns: columns.max(1),
            cell_width,
            cell_height,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(
            config.cells,
            config.columns,
            config.cell_width,
            config.cell_height,
        )
    }

    /// Geometry of `cell`; `None` past the last recordable cell
    pub fn geometry(&self, cell: u32) -> Option<CellGeometry> {
        if cell == 0 {
            return Some(CellGeometry {
                x: 0,
                y: 0,
                width: self.cell_width,
                height: self.cell_height,
                z_order: 0,
            });
        }
        if cell > self.cells {
            return None;
        }

        let col = (cell - 1) % self.columns + 1;
        let row = (cell - 1) / self.columns;
        Some(CellGeometry {
            x: col * self.cell_width,
            y: row * self.cell_height,
            width: self.cell_width,
            height: self.cell_height,
            z_order: cell,
        })
    }

    /// Size of the full output canvas
    pub fn canvas_resolution(&self) -> Resolution {
        let rows = self.cells.div_ceil(self.columns).max(1);
        Resolution::new(
            (self.columns + 1) * self.cell_width,
            rows * self.cell_height,
        )
    }

    /// Every cell with its geometry, live view first
    pub fn iter(&self) -> impl Iterator<Item = (u32, CellGeometry)> + '_ {
        (0..=self.cells).filter_map(move |cell| self.geometry(cell).map(|g| (cell, g)))
    }

    pub fn cells(&self) -> u32 {
        self.cells
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn cell_resolution(&self) -> Resolution {
        Resolution::new(self.cell_width, self.cell_height)
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::from_config(&GridConfig::default())
    }
}
