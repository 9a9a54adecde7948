use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::{debug, trace};

use super::{NavPath, SearchGrid, SearchStatus};
use crate::nav::cost_grid::{CellClass, IMPASSABLE};
use crate::nav::error::NoRouteReason;
use crate::nav::goal::PathGoal;
use crate::nav::regions::RegionId;
use crate::nav::traverse::TraverseParams;
use crate::nav::types::{Cell, CellRect, Direction, MapDims};

const CARDINAL_STEP: u64 = 10;
const DIAGONAL_STEP: u64 = 14;
const NO_PARENT: u32 = u32::MAX;

/// Octile distance from `cell` to the nearest cell of `bounds`, in step units.
pub(super) fn heuristic(cell: Cell, bounds: &CellRect, allow_diagonal: bool) -> u64 {
    let (dx, dz) = bounds.axis_distance(cell);
    let (dx, dz) = (dx as u64, dz as u64);
    if allow_diagonal {
        let (lo, hi) = if dx < dz { (dx, dz) } else { (dz, dx) };
        CARDINAL_STEP * hi + (DIAGONAL_STEP - CARDINAL_STEP) * lo
    } else {
        CARDINAL_STEP * (dx + dz)
    }
}

struct ActiveSearch {
    start: Cell,
    start_region: Option<RegionId>,
    /// Regions holding at least one goal cell.
    goal_regions: SmallVec<[RegionId; 4]>,
    bounds: CellRect,
    params: TraverseParams,
    expanded: usize,
}

/// Cell-level A* over the movement cost grid.
///
/// Scratch arrays are map-sized and reused across searches; a per-search stamp
/// marks which entries belong to the current search, so starting a search
/// never clears the arrays. The open list is ordered by `(f, insertion
/// sequence)` which makes equal-cost ties first-in first-out.
///
/// A search can run to completion in one call ([`find_path`](Self::find_path))
/// or be advanced a bounded number of expansions at a time
/// ([`begin`](Self::begin) / [`step`](Self::step)).
pub struct GridPathfinder {
    dims: MapDims,
    g: Vec<u64>,
    parent: Vec<u32>,
    seen: Vec<u32>,
    closed: Vec<u32>,
    goal_mark: Vec<u32>,
    stamp: u32,
    open: BinaryHeap<Reverse<(u64, u64, u32)>>,
    seq: u64,
    /// Transit admission per region, valid for the current search only.
    region_allows: FxHashMap<RegionId, bool>,
    active: Option<ActiveSearch>,
    searches: u64,
    total_expanded: u64,
}

impl GridPathfinder {
    pub fn new(dims: MapDims) -> Self {
        let area = dims.area();
        Self {
            dims,
            g: vec![0; area],
            parent: vec![NO_PARENT; area],
            seen: vec![0; area],
            closed: vec![0; area],
            goal_mark: vec![0; area],
            stamp: 0,
            open: BinaryHeap::new(),
            seq: 0,
            region_allows: FxHashMap::default(),
            active: None,
            searches: 0,
            total_expanded: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn searches(&self) -> u64 {
        self.searches
    }

    pub fn total_expanded(&self) -> u64 {
        self.total_expanded
    }

    /// Run a whole search.
    pub fn find_path(
        &mut self,
        start: Cell,
        goal: &PathGoal,
        params: &TraverseParams,
        grid: &SearchGrid<'_>,
    ) -> Result<NavPath, NoRouteReason> {
        self.begin(start, goal, params, grid);
        match self.step(grid, usize::MAX) {
            SearchStatus::Found(path) => Ok(path),
            SearchStatus::Failed(reason) => Err(reason),
            SearchStatus::InProgress { expanded } => {
                self.cancel();
                Err(NoRouteReason::BudgetExhausted { expanded })
            }
        }
    }

    /// Start a search, abandoning any search in progress.
    pub fn begin(&mut self, start: Cell, goal: &PathGoal, params: &TraverseParams, grid: &SearchGrid<'_>) {
        self.next_stamp();
        self.open.clear();
        self.seq = 0;
        self.region_allows.clear();
        self.searches += 1;

        let mut goal_regions = SmallVec::new();
        for &cell in &goal.cells {
            if let Some(i) = self.dims.index_checked(cell) {
                self.goal_mark[i] = self.stamp;
            }
            if let Some(id) = grid.regions.grid.region_at_no_rebuild(cell) {
                if !goal_regions.contains(&id) {
                    goal_regions.push(id);
                }
            }
        }

        self.active = Some(ActiveSearch {
            start,
            start_region: grid.regions.grid.region_at_no_rebuild(start),
            goal_regions,
            bounds: goal.bounds,
            params: *params,
            expanded: 0,
        });

        if let Some(i) = self.dims.index_checked(start) {
            self.g[i] = 0;
            self.parent[i] = NO_PARENT;
            self.seen[i] = self.stamp;
            let h = self.scaled_heuristic(start, &goal.bounds, grid);
            self.push(h, i as u32);
        }
        trace!("[PATH] Search from {} to {} goal cells", start, goal.cells.len());
    }

    /// Expand at most `max_expansions` cells of the active search.
    pub fn step(&mut self, grid: &SearchGrid<'_>, max_expansions: usize) -> SearchStatus {
        let Some(active) = self.active.take() else {
            return SearchStatus::Failed(NoRouteReason::Cancelled);
        };
        let status = self.run(&active, grid, max_expansions);
        match status {
            SearchStatus::InProgress { expanded } => {
                self.active = Some(ActiveSearch { expanded, ..active });
            }
            SearchStatus::Found(ref path) => {
                self.total_expanded += path.expanded as u64;
                self.open.clear();
            }
            SearchStatus::Failed(reason) => {
                if let NoRouteReason::BudgetExhausted { expanded } = reason {
                    self.total_expanded += expanded as u64;
                }
                debug!("[PATH] No route from {}: {:?}", active.start, reason);
                self.open.clear();
            }
        }
        status
    }

    /// Abandon the active search and release its open list.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.active.take().is_some();
        self.open.clear();
        self.open.shrink_to_fit();
        self.region_allows.clear();
        was_active
    }

    fn run(&mut self, active: &ActiveSearch, grid: &SearchGrid<'_>, max_expansions: usize) -> SearchStatus {
        let budget = grid.config.max_expanded_nodes;
        let mut expanded = active.expanded;
        let mut this_step = 0usize;

        while let Some(Reverse((_, _, idx))) = self.open.pop() {
            let i = idx as usize;
            if self.closed[i] == self.stamp {
                continue;
            }
            self.closed[i] = self.stamp;

            if self.goal_mark[i] == self.stamp {
                return SearchStatus::Found(self.reconstruct(i, expanded));
            }

            expanded += 1;
            if expanded > budget {
                return SearchStatus::Failed(NoRouteReason::BudgetExhausted { expanded });
            }

            self.expand(i, active, grid);

            this_step += 1;
            if this_step >= max_expansions {
                return SearchStatus::InProgress { expanded };
            }
        }
        SearchStatus::Failed(NoRouteReason::FrontierExhausted)
    }

    fn expand(&mut self, i: usize, active: &ActiveSearch, grid: &SearchGrid<'_>) {
        let cell = self.dims.cell_of(i);
        let g = self.g[i];
        let directions: &[Direction] = if grid.config.allow_diagonal { &Direction::ALL } else { &Direction::CARDINAL };

        for &dir in directions {
            let next = cell.step(dir);
            let Some(n) = self.dims.index_checked(next) else { continue };
            if self.closed[n] == self.stamp || !self.enterable(next, active, grid) {
                continue;
            }
            if let Some((a, b)) = dir.cardinal_parts() {
                if !self.enterable(cell.step(a), active, grid) || !self.enterable(cell.step(b), active, grid) {
                    continue;
                }
            }

            let Some(step) = self.step_cost(next, dir, &active.params, grid) else { continue };
            let tentative = g + step;
            if self.seen[n] == self.stamp && tentative >= self.g[n] {
                continue;
            }
            self.seen[n] = self.stamp;
            self.g[n] = tentative;
            self.parent[n] = i as u32;
            let f = tentative + self.scaled_heuristic(next, &active.bounds, grid);
            self.push(f, n as u32);
        }
    }

    fn step_cost(&self, cell: Cell, dir: Direction, params: &TraverseParams, grid: &SearchGrid<'_>) -> Option<u64> {
        let class = grid.costs.class_at(cell);
        let base = match class {
            CellClass::Destroyable => grid.config.bash_cost,
            _ => grid.costs.cost_at(cell),
        };
        if base == IMPASSABLE {
            return None;
        }
        let extra = if params.opens_closed_door(class) { grid.config.closed_door_extra_cost } else { 0 };
        let mult = if dir.is_diagonal() { DIAGONAL_STEP } else { CARDINAL_STEP };
        Some((base as u64 + extra as u64) * mult)
    }

    /// Region-level admission for one cell. Regions holding a goal cell only
    /// need to admit a destination; the start region is always open to its
    /// occupant.
    fn enterable(&mut self, cell: Cell, active: &ActiveSearch, grid: &SearchGrid<'_>) -> bool {
        let Some(id) = grid.regions.grid.region_at_no_rebuild(cell) else {
            return false;
        };
        if Some(id) == active.start_region {
            return true;
        }
        let Some(region) = grid.regions.region(id) else {
            return false;
        };
        if active.goal_regions.contains(&id) {
            return region.valid && region.allows(&active.params, grid.costs, true);
        }
        *self
            .region_allows
            .entry(id)
            .or_insert_with(|| region.valid && region.allows(&active.params, grid.costs, false))
    }

    fn scaled_heuristic(&self, cell: Cell, bounds: &CellRect, grid: &SearchGrid<'_>) -> u64 {
        heuristic(cell, bounds, grid.config.allow_diagonal) * grid.config.min_cell_cost() as u64
    }

    fn push(&mut self, f: u64, idx: u32) {
        self.open.push(Reverse((f, self.seq, idx)));
        self.seq += 1;
    }

    fn reconstruct(&self, end: usize, expanded: usize) -> NavPath {
        let mut cells = Vec::new();
        let mut i = end;
        loop {
            cells.push(self.dims.cell_of(i));
            let p = self.parent[i];
            if p == NO_PARENT {
                break;
            }
            i = p as usize;
        }
        cells.reverse();
        NavPath { cells, cost: self.g[end], expanded }
    }

    fn next_stamp(&mut self) {
        if self.stamp == u32::MAX {
            self.seen.fill(0);
            self.closed.fill(0);
            self.goal_mark.fill(0);
            self.stamp = 0;
        }
        self.stamp += 1;
    }
}
