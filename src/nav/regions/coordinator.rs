use fixedbitset::FixedBitSet;
use shoal_macros::profile;
use tracing::{debug, info};

use super::builder::RegionBuilder;
use super::{RegionId, RegionStore};
use crate::nav::config::NavConfig;
use crate::nav::cost_grid::MovementCostGrid;
use crate::nav::types::{Cell, MapDims};

/// Schedules region rebuilds after terrain changes.
///
/// While enabled, a change immediately marks the regions around it invalid and
/// the next query rebuilds just those regions. While disabled (bulk writes),
/// changes only accumulate in the dirty worklist and queries see the last
/// fully built state.
pub struct RegionCoordinator {
    enabled: bool,
    builder: RegionBuilder,
    dirty: FixedBitSet,
    dirty_cells: Vec<Cell>,
    invalid: Vec<RegionId>,
    generation: u64,
    rebuilds: u64,
}

impl RegionCoordinator {
    pub fn new(dims: MapDims, config: &NavConfig) -> Self {
        Self {
            enabled: true,
            builder: RegionBuilder::new(config.section_size, config.track_destroyable_obstacles),
            dirty: FixedBitSet::with_capacity(dims.area()),
            dirty_cells: Vec::new(),
            invalid: Vec::new(),
            generation: 0,
            rebuilds: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            debug!("[REGIONS] Rebuilding {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    /// Bumped by every completed rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn needs_rebuild(&self) -> bool {
        !self.dirty_cells.is_empty() || !self.invalid.is_empty()
    }

    pub fn pending_cells(&self) -> usize {
        self.dirty_cells.len()
    }

    pub fn builder(&self) -> &RegionBuilder {
        &self.builder
    }

    /// Record a terrain change at `cell`. The regions of the cell and its eight
    /// neighbours lose their validity (immediately when enabled, at the next
    /// rebuild otherwise).
    pub fn notify_cell_changed(&mut self, cell: Cell, store: &mut RegionStore) {
        let dims = store.grid.dims();
        for c in cell.block_3x3() {
            let Some(i) = dims.index_checked(c) else { continue };
            if !self.dirty.put(i) {
                self.dirty_cells.push(c);
            }
            if self.enabled {
                self.invalidate_at(c, store);
            }
        }
    }

    fn invalidate_at(&mut self, cell: Cell, store: &mut RegionStore) {
        let Some(id) = store.grid.region_at_no_rebuild(cell) else { return };
        if let Some(region) = store.arena.get_mut(id) {
            if region.valid {
                region.valid = false;
                self.invalid.push(id);
            }
        }
    }

    /// Rebuild every invalid region. Does nothing while disabled or when
    /// nothing changed. Returns whether a rebuild ran.
    #[profile(2)]
    pub fn rebuild_if_needed(&mut self, costs: &MovementCostGrid, store: &mut RegionStore) -> bool {
        if !self.enabled || !self.needs_rebuild() {
            return false;
        }

        // Changes made while disabled were never invalidated.
        let dirty = std::mem::take(&mut self.dirty_cells);
        for &cell in &dirty {
            self.invalidate_at(cell, store);
        }

        let mut seeds = dirty;
        let invalid = std::mem::take(&mut self.invalid);
        let removed = invalid.len();
        for id in invalid {
            if let Some(region) = store.remove_region(id) {
                seeds.extend_from_slice(&region.cells);
            }
        }

        let mut built = 0usize;
        for &seed in &seeds {
            if self.builder.try_generate_region_from(seed, costs, store).is_some() {
                built += 1;
            }
        }

        self.dirty.clear();
        self.generation += 1;
        self.rebuilds += 1;
        debug!(
            "[REGIONS] Rebuilt {} regions into {} from {} seeds (generation {})",
            removed,
            built,
            seeds.len(),
            self.generation
        );
        true
    }

    /// Throw away all regions and links and flood the whole map.
    #[profile(5)]
    pub fn rebuild_all(&mut self, costs: &MovementCostGrid, store: &mut RegionStore) {
        store.clear();
        self.dirty.clear();
        self.dirty_cells.clear();
        self.invalid.clear();

        for cell in costs.dims().cells() {
            self.builder.try_generate_region_from(cell, costs, store);
        }

        self.generation += 1;
        self.rebuilds += 1;
        info!(
            "[REGIONS] Full rebuild: {} regions, {} links, {} cells assigned (generation {})",
            store.arena.len(),
            store.links.len(),
            store.grid.assigned_cells(),
            self.generation
        );
    }
}
