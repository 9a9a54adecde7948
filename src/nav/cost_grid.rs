use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

use super::config::NavConfig;
use super::terrain::{Depth, TerrainKind, TerrainSource};
use super::types::{Cell, Danger, MapDims};

/// Sentinel cost for cells this layer cannot enter.
pub const IMPASSABLE: u32 = u32::MAX;

/// Navigation classification of a cell, derived together with its cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellClass {
    /// Land, walls, or anything else liquid-bound agents never enter.
    #[default]
    Blocked,
    /// An obstacle that bashing agents may break through.
    Destroyable,
    Liquid { depth: Depth, danger: Danger },
    Door { open: bool, depth: Depth, danger: Danger },
}

impl CellClass {
    /// Can an agent stand here without breaking anything.
    #[inline]
    pub fn is_navigable(&self) -> bool {
        matches!(self, CellClass::Liquid { .. } | CellClass::Door { .. })
    }

    pub fn depth(&self) -> Option<Depth> {
        match *self {
            CellClass::Liquid { depth, .. } | CellClass::Door { depth, .. } => Some(depth),
            _ => None,
        }
    }

    pub fn danger(&self) -> Danger {
        match *self {
            CellClass::Liquid { danger, .. } | CellClass::Door { danger, .. } => danger,
            _ => Danger::None,
        }
    }
}

/// The subset of [`NavConfig`] that determines per-cell costs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CostRules {
    pub shallow_cost: u32,
    pub deep_cost: u32,
    pub door_cost: u32,
    pub near_obstacle_cost: u32,
}

impl From<&NavConfig> for CostRules {
    fn from(config: &NavConfig) -> Self {
        Self {
            shallow_cost: config.shallow_cost,
            deep_cost: config.deep_cost,
            door_cost: config.door_cost,
            near_obstacle_cost: config.near_obstacle_cost,
        }
    }
}

/// Array-backed `Cell -> cost` mapping over the whole map.
///
/// # Consistency
///
/// Values only change through [`set_dirty`](Self::set_dirty) /
/// [`notify_terrain_changed`](Self::notify_terrain_changed) followed by
/// [`recompute_dirty`](Self::recompute_dirty). The per-map context runs both
/// inside the same notification, so a read never observes a value older than
/// the latest notification for that cell.
///
/// # Cost model
///
/// `base(kind) + extra_cost + near_obstacle_cost` where the last term applies
/// when any 8-neighbour inside the map is not liquid. Doors use `door_cost`
/// as base. Anything that is not liquid is [`IMPASSABLE`].
pub struct MovementCostGrid {
    dims: MapDims,
    rules: CostRules,
    costs: Vec<u32>,
    classes: Vec<CellClass>,
    dirty: FixedBitSet,
    dirty_list: Vec<usize>,
}

impl MovementCostGrid {
    pub fn new(dims: MapDims, rules: CostRules) -> Self {
        let area = dims.area();
        Self {
            dims,
            rules,
            costs: vec![IMPASSABLE; area],
            classes: vec![CellClass::Blocked; area],
            dirty: FixedBitSet::with_capacity(area),
            dirty_list: Vec::new(),
        }
    }

    pub fn dims(&self) -> MapDims {
        self.dims
    }

    /// Cost of entering `cell`, [`IMPASSABLE`] outside the map.
    #[inline]
    pub fn cost_at(&self, cell: Cell) -> u32 {
        match self.dims.index_checked(cell) {
            Some(i) => self.costs[i],
            None => IMPASSABLE,
        }
    }

    /// Classification of `cell`, [`CellClass::Blocked`] outside the map.
    #[inline]
    pub fn class_at(&self, cell: Cell) -> CellClass {
        match self.dims.index_checked(cell) {
            Some(i) => self.classes[i],
            None => CellClass::Blocked,
        }
    }

    #[inline]
    pub fn is_passable(&self, cell: Cell) -> bool {
        self.cost_at(cell) != IMPASSABLE
    }

    /// Mark a single cell for recomputation on the next terrain read.
    pub fn set_dirty(&mut self, cell: Cell) {
        if let Some(i) = self.dims.index_checked(cell) {
            if !self.dirty.put(i) {
                self.dirty_list.push(i);
            }
        }
    }

    /// Mark a changed cell and its neighbours, whose near-obstacle surcharge
    /// depends on it.
    pub fn notify_terrain_changed(&mut self, cell: Cell) {
        for c in cell.block_3x3() {
            self.set_dirty(c);
        }
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty_list.is_empty()
    }

    /// Recompute every dirty cell from `terrain`. Returns how many cells were
    /// recomputed. Idempotent: recomputing an unchanged cell stores the same value.
    pub fn recompute_dirty(&mut self, terrain: &impl TerrainSource) -> usize {
        let pending = std::mem::take(&mut self.dirty_list);
        for &i in &pending {
            let cell = self.dims.cell_of(i);
            let (cost, class) = self.compute(terrain, cell);
            self.costs[i] = cost;
            self.classes[i] = class;
            self.dirty.set(i, false);
        }
        pending.len()
    }

    /// Recompute the whole map.
    pub fn rebuild_all(&mut self, terrain: &impl TerrainSource) {
        for i in 0..self.dims.area() {
            let cell = self.dims.cell_of(i);
            let (cost, class) = self.compute(terrain, cell);
            self.costs[i] = cost;
            self.classes[i] = class;
        }
        self.dirty.clear();
        self.dirty_list.clear();
    }

    fn compute(&self, terrain: &impl TerrainSource, cell: Cell) -> (u32, CellClass) {
        let t = terrain.terrain_at(cell);
        let depth = match t.kind {
            TerrainKind::Liquid(depth) => depth,
            TerrainKind::Obstacle { destroyable: true } => return (IMPASSABLE, CellClass::Destroyable),
            TerrainKind::Obstacle { destroyable: false } | TerrainKind::Land => {
                return (IMPASSABLE, CellClass::Blocked)
            }
        };

        let (base, class) = match t.door {
            Some(door) => (
                self.rules.door_cost,
                CellClass::Door { open: door.open, depth, danger: t.danger },
            ),
            None => {
                let base = match depth {
                    Depth::Shallow => self.rules.shallow_cost,
                    Depth::Deep => self.rules.deep_cost,
                };
                (base, CellClass::Liquid { depth, danger: t.danger })
            }
        };

        let near_obstacle = cell
            .block_3x3()
            .filter(|&n| n != cell && self.dims.contains(n))
            .any(|n| !terrain.terrain_at(n).is_liquid());
        let surcharge = if near_obstacle { self.rules.near_obstacle_cost } else { 0 };

        let cost = base.saturating_add(t.extra_cost).saturating_add(surcharge).min(IMPASSABLE - 1);
        (cost, class)
    }
}
