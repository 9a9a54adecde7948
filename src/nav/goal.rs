//! Turning a target plus path end mode into the set of cells a route may end on.
//!
//! Reachability and path search both go through [`PathGoal::resolve`], so a
//! route the pathfinder returns always ends on a cell whose region the
//! reachability service considered.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::cost_grid::MovementCostGrid;
use super::error::NavError;
use super::types::{Cell, CellRect};

/// An object occupying one or more cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThingTarget {
    pub position: Cell,
    pub footprint: CellRect,
    /// Where agents stand to use the thing.
    pub interaction_cell: Option<Cell>,
}

impl ThingTarget {
    pub fn single(position: Cell) -> Self {
        Self { position, footprint: CellRect::single(position), interaction_cell: None }
    }

    pub fn with_interaction_cell(mut self, cell: Cell) -> Self {
        self.interaction_cell = Some(cell);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Cell(Cell),
    Thing(ThingTarget),
}

impl Target {
    pub fn cell(&self) -> Cell {
        match self {
            Target::Cell(c) => *c,
            Target::Thing(t) => t.position,
        }
    }

    pub fn footprint(&self) -> CellRect {
        match self {
            Target::Cell(c) => CellRect::single(*c),
            Target::Thing(t) => t.footprint,
        }
    }
}

impl From<Cell> for Target {
    fn from(cell: Cell) -> Self {
        Target::Cell(cell)
    }
}

impl From<ThingTarget> for Target {
    fn from(thing: ThingTarget) -> Self {
        Target::Thing(thing)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathEndMode {
    /// End exactly on the target cell.
    #[default]
    OnCell,
    /// End next to the target's footprint, never inside it.
    Touch,
    /// Whichever of touching or standing on the target is cheaper.
    ClosestTouch,
    /// End on the thing's interaction cell.
    InteractionCell,
}

/// Resolved goal: every acceptable end cell plus their bounding rectangle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathGoal {
    pub cells: SmallVec<[Cell; 16]>,
    pub bounds: CellRect,
}

impl PathGoal {
    pub fn resolve(target: &Target, mode: PathEndMode, costs: &MovementCostGrid) -> Result<Self, NavError> {
        let dims = costs.dims();
        match mode {
            PathEndMode::OnCell => Self::on_cell(target.cell(), costs),
            PathEndMode::InteractionCell => match target {
                Target::Thing(ThingTarget { interaction_cell: Some(cell), .. }) => Self::on_cell(*cell, costs),
                _ => Err(NavError::MissingInteractionCell),
            },
            PathEndMode::Touch | PathEndMode::ClosestTouch => {
                let footprint = target.footprint();
                if footprint.is_empty() || footprint.intersect(&dims.rect()).is_empty() {
                    return Err(NavError::EmptyFootprint);
                }
                let mut cells: SmallVec<[Cell; 16]> = touch_cells(footprint, costs).collect();
                if mode == PathEndMode::ClosestTouch {
                    let inside = footprint.intersect(&dims.rect());
                    cells.extend(inside.cells().filter(|&c| costs.class_at(c).is_navigable()));
                }
                Ok(Self::from_cells(cells))
            }
        }
    }

    fn on_cell(cell: Cell, costs: &MovementCostGrid) -> Result<Self, NavError> {
        if !costs.dims().contains(cell) {
            return Err(NavError::OutOfBounds(cell));
        }
        Ok(Self { cells: SmallVec::from_slice(&[cell]), bounds: CellRect::single(cell) })
    }

    fn from_cells(cells: SmallVec<[Cell; 16]>) -> Self {
        let mut bounds = match cells.first() {
            Some(&c) => CellRect::single(c),
            None => CellRect::new(Cell::new(0, 0), Cell::new(-1, -1)),
        };
        for &c in &cells {
            bounds.encapsulate(c);
        }
        Self { cells, bounds }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }
}

/// Navigable cells around `footprint` an agent can touch it from.
///
/// A diagonal corner only counts when one of the two cells beside it along the
/// footprint is navigable; otherwise the agent would reach across a corner.
/// Only cells on the map are visited, however far the footprint extends.
fn touch_cells(footprint: CellRect, costs: &MovementCostGrid) -> impl Iterator<Item = Cell> + '_ {
    let navigable = move |c: Cell| costs.class_at(c).is_navigable();
    let ring = footprint.expanded_by(1).intersect(&costs.dims().rect());
    ring.cells().filter(move |&c| {
        let (dx, dz) = footprint.axis_distance(c);
        match (dx, dz) {
            (0, 0) => false,
            (1, 1) => {
                if !navigable(c) {
                    return false;
                }
                let sx = if c.x < footprint.min.x { 1 } else { -1 };
                let sz = if c.z < footprint.min.z { 1 } else { -1 };
                navigable(c.offset(sx, 0)) || navigable(c.offset(0, sz))
            }
            _ => navigable(c),
        }
    })
}
