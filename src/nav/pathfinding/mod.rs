mod astar;

#[cfg(test)]
mod tests;

// ============================================================================
// PUBLIC API
// ============================================================================

pub use astar::GridPathfinder;

use super::config::NavConfig;
use super::cost_grid::MovementCostGrid;
use super::error::NoRouteReason;
use super::regions::RegionStore;
use super::types::Cell;

/// A route from the start cell (first) to a goal cell (last).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavPath {
    pub cells: Vec<Cell>,
    /// Sum of step costs (cell cost × 10, or × 14 diagonally).
    pub cost: u64,
    /// Cells expanded by the search that produced this path.
    pub expanded: usize,
}

impl NavPath {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn start(&self) -> Option<Cell> {
        self.cells.first().copied()
    }

    pub fn end(&self) -> Option<Cell> {
        self.cells.last().copied()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }
}

/// Outcome of advancing an incremental search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    InProgress { expanded: usize },
    Found(NavPath),
    Failed(NoRouteReason),
}

/// Read-only view of the grids a search runs over.
pub struct SearchGrid<'a> {
    pub costs: &'a MovementCostGrid,
    pub regions: &'a RegionStore,
    pub config: &'a NavConfig,
}
