use super::region::RegionId;
use crate::nav::types::{Cell, MapDims};

/// `Cell -> RegionId` over the whole map. `None` for cells outside any region.
pub struct RegionGrid {
    dims: MapDims,
    cells: Vec<Option<RegionId>>,
}

impl RegionGrid {
    pub fn new(dims: MapDims) -> Self {
        Self { dims, cells: vec![None; dims.area()] }
    }

    pub fn dims(&self) -> MapDims {
        self.dims
    }

    /// Raw lookup without any freshness check.
    #[inline]
    pub fn region_at_no_rebuild(&self, cell: Cell) -> Option<RegionId> {
        self.dims.index_checked(cell).and_then(|i| self.cells[i])
    }

    #[inline]
    pub(crate) fn set(&mut self, cell: Cell, region: Option<RegionId>) {
        if let Some(i) = self.dims.index_checked(cell) {
            self.cells[i] = region;
        }
    }

    /// Clear `cell` only if it still points at `region`.
    pub(crate) fn clear_if(&mut self, cell: Cell, region: RegionId) {
        if let Some(i) = self.dims.index_checked(cell) {
            if self.cells[i] == Some(region) {
                self.cells[i] = None;
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.cells.fill(None);
    }

    pub fn assigned_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}
