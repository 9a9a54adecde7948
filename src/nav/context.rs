use serde::{Deserialize, Serialize};
use shoal_macros::profile;
use tracing::{debug, error, info, warn};

use super::config::NavConfig;
use super::cost_grid::{CellClass, CostRules, MovementCostGrid};
use super::debug::NavStats;
use super::error::{NavError, NoRouteReason, PathFailure};
use super::goal::{PathEndMode, PathGoal, Target};
use super::pathfinding::{GridPathfinder, NavPath, SearchGrid, SearchStatus};
use super::reachability::ReachabilityService;
use super::regions::{Region, RegionCoordinator, RegionId, RegionStore};
use super::terrain::TerrainSource;
use super::traverse::{AgentId, AgentProfile, TraverseMode, TraverseParams};
use super::types::{Cell, Danger, MapDims};

/// Lifecycle of one map's navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavState {
    Uninitialized,
    /// Components exist, grids are empty.
    Constructing,
    /// Initial full build in progress.
    Finalizing,
    Ready,
    /// Rebuilding is switched off for bulk terrain writes; reads may be stale.
    DisabledForBulkWrite,
    TornDown,
}

impl NavState {
    pub fn serves_queries(self) -> bool {
        matches!(self, NavState::Ready | NavState::DisabledForBulkWrite)
    }
}

/// An agent as the reachability API sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentInfo {
    pub id: AgentId,
    pub position: Cell,
    pub profile: AgentProfile,
}

/// A search holds region ids, so it is only valid for the terrain epoch and
/// region generation it started on.
struct BackgroundSearch {
    epoch: u64,
    generation: u64,
    start: Cell,
}

/// Everything navigation knows about one map.
///
/// Created when the map loads, torn down when it unloads. All mutation and
/// every query go through `&mut self`, which serializes them on the owning
/// thread; nothing is shared between maps.
pub struct MapNavigation<T: TerrainSource> {
    terrain: T,
    config: NavConfig,
    state: NavState,
    costs: MovementCostGrid,
    regions: RegionStore,
    coordinator: RegionCoordinator,
    reachability: ReachabilityService,
    primary: GridPathfinder,
    secondary: GridPathfinder,
    background: Option<BackgroundSearch>,
    /// Bumped by every terrain or door notification.
    terrain_epoch: u64,
    path_queries: u64,
}

impl<T: TerrainSource> MapNavigation<T> {
    /// Instantiate every component with empty grids. An invalid config is
    /// logged and replaced by the defaults.
    pub fn new(terrain: T, config: NavConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                error!("[NAV] {}; using default NavConfig", e);
                NavConfig::default()
            }
        };
        let dims = terrain.dims();
        Self {
            costs: MovementCostGrid::new(dims, CostRules::from(&config)),
            regions: RegionStore::new(dims),
            coordinator: RegionCoordinator::new(dims, &config),
            reachability: ReachabilityService::new(config.cache_reachability),
            primary: GridPathfinder::new(dims),
            secondary: GridPathfinder::new(dims),
            background: None,
            terrain_epoch: 0,
            path_queries: 0,
            state: NavState::Constructing,
            terrain,
            config,
        }
    }

    /// Construct and run the initial full build.
    pub fn load(terrain: T, config: NavConfig) -> Self {
        let mut nav = Self::new(terrain, config);
        nav.build_initial();
        nav
    }

    /// Compute every cell cost and flood every region.
    pub fn finalize(&mut self) -> Result<(), NavError> {
        match self.state {
            NavState::Constructing => {
                self.build_initial();
                Ok(())
            }
            NavState::TornDown => Err(NavError::TornDown),
            state => Err(NavError::NotReady(state)),
        }
    }

    #[profile(5)]
    fn build_initial(&mut self) {
        self.state = NavState::Finalizing;
        self.costs.rebuild_all(&self.terrain);
        self.coordinator.rebuild_all(&self.costs, &mut self.regions);
        self.reachability.sync_generation(self.coordinator.generation());
        self.state = NavState::Ready;
        let dims = self.costs.dims();
        info!("[NAV] Map {}x{} ready", dims.width, dims.height);
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn terrain(&self) -> &T {
        &self.terrain
    }

    /// Mutable terrain access. Every change must be followed by
    /// [`notify_terrain_changed`](Self::notify_terrain_changed) or
    /// [`notify_door_toggled`](Self::notify_door_toggled).
    pub fn terrain_mut(&mut self) -> &mut T {
        &mut self.terrain
    }

    pub fn into_terrain(self) -> T {
        self.terrain
    }

    fn check_serving(&self) -> Result<(), NavError> {
        match self.state {
            s if s.serves_queries() => Ok(()),
            NavState::TornDown => Err(NavError::TornDown),
            s => Err(NavError::NotReady(s)),
        }
    }

    fn check_in_bounds(&self, cell: Cell) -> Result<(), NavError> {
        if self.costs.dims().contains(cell) {
            Ok(())
        } else {
            Err(NavError::OutOfBounds(cell))
        }
    }

    // ------------------------------------------------------------------------
    // Change notifications
    // ------------------------------------------------------------------------

    /// The terrain at `cell` changed. Costs update immediately; regions around
    /// the cell are rebuilt before the next query.
    pub fn notify_terrain_changed(&mut self, cell: Cell) -> Result<(), NavError> {
        if self.state == NavState::Constructing {
            return Ok(());
        }
        self.check_serving()?;
        if let Err(e) = self.check_in_bounds(cell) {
            warn!("[NAV] Ignoring terrain change: {}", e);
            return Err(e);
        }
        self.costs.notify_terrain_changed(cell);
        self.costs.recompute_dirty(&self.terrain);
        self.coordinator.notify_cell_changed(cell, &mut self.regions);
        self.terrain_epoch += 1;
        Ok(())
    }

    /// A door at `cell` opened or closed. If the cell gained or lost its door
    /// this is a terrain change instead.
    pub fn notify_door_toggled(&mut self, cell: Cell) -> Result<(), NavError> {
        if self.state == NavState::Constructing {
            return Ok(());
        }
        self.check_serving()?;
        if let Err(e) = self.check_in_bounds(cell) {
            warn!("[NAV] Ignoring door toggle: {}", e);
            return Err(e);
        }

        let was_door = matches!(self.costs.class_at(cell), CellClass::Door { .. });
        let now = self.terrain.terrain_at(cell);
        if !(was_door && now.door.is_some() && now.is_liquid()) {
            return self.notify_terrain_changed(cell);
        }

        self.costs.set_dirty(cell);
        self.costs.recompute_dirty(&self.terrain);
        self.reachability.clear_cache();
        self.terrain_epoch += 1;
        debug!("[NAV] Door at {} toggled", cell);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Rebuild control
    // ------------------------------------------------------------------------

    /// Switch incremental rebuilding. Re-enabling rebuilds what accumulated.
    pub fn set_rebuild_enabled(&mut self, enabled: bool) -> Result<(), NavError> {
        self.check_serving()?;
        self.coordinator.set_enabled(enabled);
        if enabled {
            self.state = NavState::Ready;
            self.ensure_fresh();
        } else {
            self.state = NavState::DisabledForBulkWrite;
        }
        Ok(())
    }

    /// Recompute all costs and regions from scratch.
    pub fn rebuild_all(&mut self) -> Result<(), NavError> {
        self.check_serving()?;
        self.costs.rebuild_all(&self.terrain);
        self.coordinator.rebuild_all(&self.costs, &mut self.regions);
        self.reachability.sync_generation(self.coordinator.generation());
        self.terrain_epoch += 1;
        Ok(())
    }

    /// Run any pending localized rebuild and drop cached answers that
    /// depended on the old regions.
    fn ensure_fresh(&mut self) {
        if self.coordinator.rebuild_if_needed(&self.costs, &mut self.regions) {
            self.reachability.sync_generation(self.coordinator.generation());
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// The region owning `cell`, after any pending rebuild.
    pub fn region_at(&mut self, cell: Cell) -> Option<&Region> {
        if self.check_serving().is_err() {
            return None;
        }
        self.ensure_fresh();
        self.regions.valid_region_at(cell)
    }

    /// Region lookup without triggering a rebuild.
    pub fn region_at_no_rebuild(&self, cell: Cell) -> Option<RegionId> {
        self.regions.grid.region_at_no_rebuild(cell)
    }

    pub fn regions(&self) -> &RegionStore {
        &self.regions
    }

    /// Movement cost of `cell`, [`IMPASSABLE`](super::IMPASSABLE) when it
    /// cannot be entered or lies outside the map.
    pub fn cost_at(&self, cell: Cell) -> u32 {
        self.costs.cost_at(cell)
    }

    pub fn costs(&self) -> &MovementCostGrid {
        &self.costs
    }

    /// Region of the starting cell plus the regions of every goal cell.
    fn resolve_query(
        &mut self,
        from: Cell,
        target: &Target,
        mode: PathEndMode,
    ) -> Result<(RegionId, PathGoal, Vec<RegionId>), NavError> {
        self.check_serving()?;
        self.check_in_bounds(from)?;
        let goal = PathGoal::resolve(target, mode, &self.costs)?;
        self.ensure_fresh();

        let start = self.regions.valid_region_at(from).ok_or(NavError::StartNotNavigable(from))?.id;
        let mut dests: Vec<RegionId> = goal
            .cells
            .iter()
            .filter_map(|&c| self.regions.valid_region_at(c).map(|r| r.id))
            .collect();
        dests.sort_unstable();
        dests.dedup();
        Ok((start, goal, dests))
    }

    /// Whether an agent at `from` could ever reach `target` under `params`.
    /// Input errors are logged and answer `false`.
    pub fn can_reach(&mut self, from: Cell, target: &Target, mode: PathEndMode, params: &TraverseParams) -> bool {
        let (start, _, dests) = match self.resolve_query(from, target, mode) {
            Ok(q) => q,
            Err(e) => {
                warn!("[REACH] CanReach {} -> {:?}: {}", from, target, e);
                return false;
            }
        };
        let reachable = self.reachability.can_reach_regions(start, &dests, params, &self.regions, &self.costs);
        crate::profile_log!(
            self.reachability.stats().queries,
            "[REACH] {:?}, {} cached answers",
            self.reachability.stats(),
            self.reachability.cached_entries()
        );
        reachable
    }

    /// Agent-facing form of [`can_reach`](Self::can_reach).
    pub fn can_reach_agent(
        &mut self,
        agent: &AgentInfo,
        target: &Target,
        mode: PathEndMode,
        max_danger: Danger,
        can_bash: bool,
        traverse_mode: TraverseMode,
    ) -> bool {
        let params = TraverseParams::for_agent(agent.id, agent.profile, traverse_mode, max_danger, can_bash);
        self.can_reach(agent.position, target, mode, &params)
    }

    /// Whether an agent at `from` could leave the map.
    pub fn can_reach_map_edge(&mut self, from: Cell, params: &TraverseParams) -> bool {
        let start = match self.start_region(from) {
            Ok(id) => id,
            Err(e) => {
                warn!("[REACH] CanReachMapEdge {}: {}", from, e);
                return false;
            }
        };
        self.reachability.can_reach_map_edge(start, params, &self.regions, &self.costs)
    }

    fn start_region(&mut self, from: Cell) -> Result<RegionId, NavError> {
        self.check_serving()?;
        self.check_in_bounds(from)?;
        self.ensure_fresh();
        self.regions.valid_region_at(from).map(|r| r.id).ok_or(NavError::StartNotNavigable(from))
    }

    /// Cell route from `from` to `target`. Never runs a cell search when the
    /// region graph already rules the target out.
    #[profile(2)]
    pub fn find_path(
        &mut self,
        from: Cell,
        target: &Target,
        mode: PathEndMode,
        params: &TraverseParams,
    ) -> Result<NavPath, PathFailure> {
        self.path_queries += 1;
        let goal = self.prepare_search(from, target, mode, params)?;

        let grid = SearchGrid { costs: &self.costs, regions: &self.regions, config: &self.config };
        match self.primary.find_path(from, &goal, params, &grid) {
            Ok(path) => {
                debug!("[PATH] {} -> {:?}: {} cells, cost {}", from, target, path.len(), path.cost);
                Ok(path)
            }
            Err(reason) => Err(PathFailure::NoRoute(reason)),
        }
    }

    /// Shared front half of every path query: input checks, goal resolution
    /// and the region-graph early exit.
    fn prepare_search(
        &mut self,
        from: Cell,
        target: &Target,
        mode: PathEndMode,
        params: &TraverseParams,
    ) -> Result<PathGoal, PathFailure> {
        let (start, goal, dests) = self.resolve_query(from, target, mode).map_err(|e| {
            warn!("[PATH] FindPath {} -> {:?}: {}", from, target, e);
            PathFailure::from(e)
        })?;
        if !self.reachability.can_reach_regions(start, &dests, params, &self.regions, &self.costs) {
            debug!("[PATH] {} -> {:?}: regions disconnected", from, target);
            return Err(PathFailure::NoRoute(NoRouteReason::RegionsDisconnected));
        }
        Ok(goal)
    }

    // ------------------------------------------------------------------------
    // Background search (secondary pathfinder)
    // ------------------------------------------------------------------------

    /// Start an incremental search on the secondary pathfinder, replacing any
    /// search already running there. The primary pathfinder is untouched.
    pub fn begin_background_search(
        &mut self,
        from: Cell,
        target: &Target,
        mode: PathEndMode,
        params: &TraverseParams,
    ) -> Result<(), PathFailure> {
        self.cancel_background_search();
        let goal = self.prepare_search(from, target, mode, params)?;
        let grid = SearchGrid { costs: &self.costs, regions: &self.regions, config: &self.config };
        self.secondary.begin(from, &goal, params, &grid);
        self.background =
            Some(BackgroundSearch { epoch: self.terrain_epoch, generation: self.coordinator.generation(), start: from });
        Ok(())
    }

    /// Advance the background search by at most `max_expansions` cells.
    /// A terrain or door notification, or a region rebuild, since the search
    /// began abandons it.
    pub fn step_background_search(&mut self, max_expansions: usize) -> SearchStatus {
        let Some(bg) = self.background.as_ref() else {
            return SearchStatus::Failed(NoRouteReason::Cancelled);
        };
        if self.state == NavState::TornDown {
            self.cancel_background_search();
            return SearchStatus::Failed(NoRouteReason::Cancelled);
        }
        if bg.epoch != self.terrain_epoch || bg.generation != self.coordinator.generation() {
            debug!("[PATH] Background search from {} invalidated by terrain change", bg.start);
            self.cancel_background_search();
            return SearchStatus::Failed(NoRouteReason::Invalidated);
        }

        let grid = SearchGrid { costs: &self.costs, regions: &self.regions, config: &self.config };
        let status = self.secondary.step(&grid, max_expansions);
        if !matches!(status, SearchStatus::InProgress { .. }) {
            self.background = None;
        }
        status
    }

    /// Abandon the background search. Returns whether one was running.
    pub fn cancel_background_search(&mut self) -> bool {
        let had = self.background.take().is_some();
        self.secondary.cancel();
        had
    }

    pub fn has_background_search(&self) -> bool {
        self.background.is_some()
    }

    // ------------------------------------------------------------------------
    // Cache control and lifecycle
    // ------------------------------------------------------------------------

    pub fn clear_cache(&mut self) {
        self.reachability.clear_cache();
    }

    /// Forget cached answers for `agent`, e.g. after its capabilities changed.
    pub fn clear_cache_for(&mut self, agent: AgentId) {
        self.reachability.clear_cache_for(agent);
    }

    pub fn stats(&self) -> NavStats {
        NavStats {
            state: self.state,
            regions: self.regions.arena.len(),
            links: self.regions.links.len(),
            assigned_cells: self.regions.grid.assigned_cells(),
            generation: self.coordinator.generation(),
            rebuilds: self.coordinator.rebuild_count(),
            pending_cells: self.coordinator.pending_cells(),
            reach: self.reachability.stats(),
            path_queries: self.path_queries,
            searches: self.primary.searches() + self.secondary.searches(),
            expanded: self.primary.total_expanded() + self.secondary.total_expanded(),
        }
    }

    /// Release every component. No query is served afterwards.
    pub fn tear_down(&mut self) {
        if self.state == NavState::TornDown {
            return;
        }
        self.cancel_background_search();
        let dims = MapDims::new(0, 0);
        self.costs = MovementCostGrid::new(dims, CostRules::from(&self.config));
        self.regions = RegionStore::new(dims);
        self.coordinator = RegionCoordinator::new(dims, &self.config);
        self.reachability = ReachabilityService::new(self.config.cache_reachability);
        self.primary = GridPathfinder::new(dims);
        self.secondary = GridPathfinder::new(dims);
        self.state = NavState::TornDown;
        info!("[NAV] Navigation torn down");
    }
}
