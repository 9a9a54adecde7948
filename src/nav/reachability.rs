use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::{debug, trace};

use super::cost_grid::MovementCostGrid;
use super::regions::{RegionId, RegionStore};
use super::traverse::{AgentId, TraverseParams};

/// What a cached reachability answer was about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReachDest {
    Region(RegionId),
    MapEdge,
}

type CacheKey = (RegionId, ReachDest, TraverseParams);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReachStats {
    pub queries: u64,
    pub cache_hits: u64,
    pub searches: u64,
    pub regions_visited: u64,
    pub cache_clears: u64,
}

/// Region-graph breadth-first reachability with a per-parameter cache.
///
/// Answers are cached per `(start region, destination, params)` and dropped
/// wholesale when the region topology changes (tracked by generation), on
/// [`clear_cache`](Self::clear_cache), or per agent on
/// [`clear_cache_for`](Self::clear_cache_for).
pub struct ReachabilityService {
    cache_enabled: bool,
    cache: FxHashMap<CacheKey, bool>,
    generation: u64,
    queue: VecDeque<RegionId>,
    visited: FxHashSet<RegionId>,
    stats: ReachStats,
}

impl ReachabilityService {
    pub fn new(cache_enabled: bool) -> Self {
        Self {
            cache_enabled,
            cache: FxHashMap::default(),
            generation: 0,
            queue: VecDeque::new(),
            visited: FxHashSet::default(),
            stats: ReachStats::default(),
        }
    }

    pub fn stats(&self) -> ReachStats {
        self.stats
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Drop the cache if the region topology moved on since it was filled.
    pub fn sync_generation(&mut self, generation: u64) {
        if self.generation != generation {
            self.generation = generation;
            self.clear_cache();
        }
    }

    pub fn clear_cache(&mut self) {
        if !self.cache.is_empty() {
            trace!("[REACH] Dropping {} cached answers", self.cache.len());
        }
        self.cache.clear();
        self.stats.cache_clears += 1;
    }

    /// Drop only answers computed for `agent`'s parameters.
    pub fn clear_cache_for(&mut self, agent: AgentId) {
        let before = self.cache.len();
        self.cache.retain(|(_, _, params), _| params.agent != Some(agent));
        debug!("[REACH] Cleared {} cached answers for {}", before - self.cache.len(), agent);
    }

    /// Can an agent in `start` reach any of `dests`.
    pub fn can_reach_regions(
        &mut self,
        start: RegionId,
        dests: &[RegionId],
        params: &TraverseParams,
        store: &RegionStore,
        costs: &MovementCostGrid,
    ) -> bool {
        self.stats.queries += 1;
        if dests.contains(&start) {
            return true;
        }

        let dests: Vec<RegionId> = dests
            .iter()
            .copied()
            .filter(|&d| store.region(d).is_some_and(|r| r.allows(params, costs, true)))
            .collect();
        if dests.is_empty() {
            return false;
        }

        if self.cache_enabled {
            let mut all_false = true;
            for &d in &dests {
                match self.cache.get(&(start, ReachDest::Region(d), *params)) {
                    Some(true) => {
                        self.stats.cache_hits += 1;
                        return true;
                    }
                    Some(false) => {}
                    None => all_false = false,
                }
            }
            if all_false {
                self.stats.cache_hits += 1;
                return false;
            }
        }

        let found = self.search(start, params, store, costs, |id| dests.contains(&id));
        if self.cache_enabled {
            match found {
                Some(d) => {
                    self.cache.insert((start, ReachDest::Region(d), *params), true);
                }
                None => {
                    for &d in &dests {
                        self.cache.insert((start, ReachDest::Region(d), *params), false);
                    }
                }
            }
        }
        found.is_some()
    }

    /// Can an agent in `start` reach a region touching the map edge.
    pub fn can_reach_map_edge(
        &mut self,
        start: RegionId,
        params: &TraverseParams,
        store: &RegionStore,
        costs: &MovementCostGrid,
    ) -> bool {
        self.stats.queries += 1;
        if store.region(start).is_some_and(|r| r.touches_map_edge) {
            return true;
        }
        let key = (start, ReachDest::MapEdge, *params);
        if self.cache_enabled {
            if let Some(&answer) = self.cache.get(&key) {
                self.stats.cache_hits += 1;
                return answer;
            }
        }

        let is_edge = |id: RegionId| {
            store.region(id).is_some_and(|r| r.touches_map_edge && r.allows(params, costs, true))
        };
        let found = self.search(start, params, store, costs, is_edge).is_some();
        if self.cache_enabled {
            self.cache.insert(key, found);
        }
        found
    }

    /// Breadth-first search over links from `start` until `is_goal` accepts a
    /// region. Regions the params refuse are never expanded; a goal region is
    /// accepted before its own admission check since danger only applies in
    /// transit.
    fn search(
        &mut self,
        start: RegionId,
        params: &TraverseParams,
        store: &RegionStore,
        costs: &MovementCostGrid,
        is_goal: impl Fn(RegionId) -> bool,
    ) -> Option<RegionId> {
        self.stats.searches += 1;
        self.queue.clear();
        self.visited.clear();
        self.queue.push_back(start);
        self.visited.insert(start);

        let mut found = None;
        'bfs: while let Some(current) = self.queue.pop_front() {
            self.stats.regions_visited += 1;
            for next in store.neighbours(current) {
                if !self.visited.insert(next) {
                    continue;
                }
                if is_goal(next) {
                    found = Some(next);
                    break 'bfs;
                }
                if store.region(next).is_some_and(|r| r.valid && r.allows(params, costs, false)) {
                    self.queue.push_back(next);
                }
            }
        }

        trace!(
            "[REACH] BFS from {} visited {} regions, found {:?}",
            start,
            self.visited.len(),
            found
        );
        self.queue.clear();
        found
    }
}
