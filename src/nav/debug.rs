use std::fmt;

use super::context::NavState;
use super::reachability::ReachStats;
use super::regions::{RegionKind, RegionStore};
use super::types::Cell;

/// Counters for one map, cheap to snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavStats {
    pub state: NavState,
    pub regions: usize,
    pub links: usize,
    pub assigned_cells: usize,
    pub generation: u64,
    pub rebuilds: u64,
    pub pending_cells: usize,
    pub reach: ReachStats,
    pub path_queries: u64,
    pub searches: u64,
    pub expanded: u64,
}

impl fmt::Display for NavStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state:          {:?}", self.state)?;
        writeln!(
            f,
            "regions:        {} ({} links, {} cells, generation {}, {} rebuilds, {} pending)",
            self.regions, self.links, self.assigned_cells, self.generation, self.rebuilds, self.pending_cells
        )?;
        let hit_rate = if self.reach.queries > 0 {
            100.0 * self.reach.cache_hits as f64 / self.reach.queries as f64
        } else {
            0.0
        };
        writeln!(
            f,
            "reachability:   {} queries, {:.1}% cache hits, {} searches, {} regions visited",
            self.reach.queries, hit_rate, self.reach.searches, self.reach.regions_visited
        )?;
        write!(
            f,
            "pathfinding:    {} queries, {} searches, {} cells expanded",
            self.path_queries, self.searches, self.expanded
        )
    }
}

const REGION_GLYPHS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Render region ownership, one glyph per cell, row `z` on line `z`.
///
/// Normal regions cycle through letters and digits by id, portals are `+`,
/// tracked obstacles `%`, invalid regions `?` and unassigned cells `#`.
pub fn region_map_ascii(store: &RegionStore) -> String {
    let dims = store.grid.dims();
    let mut out = String::with_capacity(dims.area() + dims.height.max(0) as usize);
    for z in 0..dims.height {
        for x in 0..dims.width {
            let glyph = match store.grid.region_at_no_rebuild(Cell::new(x, z)).and_then(|id| store.region(id)) {
                None => '#',
                Some(r) if !r.valid => '?',
                Some(r) => match r.kind() {
                    RegionKind::Portal => '+',
                    RegionKind::ImpassableTracked => '%',
                    RegionKind::Normal => REGION_GLYPHS[r.id.0 as usize % REGION_GLYPHS.len()] as char,
                },
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}
