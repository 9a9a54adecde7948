mod builder;
mod coordinator;
mod grid;
mod link;
mod region;


// ============================================================================
// PUBLIC API
// ============================================================================

pub use builder::RegionBuilder;
pub use coordinator::RegionCoordinator;
pub use grid::RegionGrid;
pub use link::{EdgeSpan, LinkId, LinkTable, RegionLink, SpanAxis};
pub use region::{Region, RegionArena, RegionId, RegionKind, RegionSignature};

use tracing::error;

use crate::nav::types::{Cell, MapDims};

/// Regions, links and the cell lookup of one map, mutated together.
pub struct RegionStore {
    pub arena: RegionArena,
    pub links: LinkTable,
    pub grid: RegionGrid,
}

impl RegionStore {
    pub fn new(dims: MapDims) -> Self {
        Self { arena: RegionArena::default(), links: LinkTable::default(), grid: RegionGrid::new(dims) }
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.arena.get(id)
    }

    /// The region owning `cell`, refusing to serve one that is known stale.
    pub fn valid_region_at(&self, cell: Cell) -> Option<&Region> {
        let id = self.grid.region_at_no_rebuild(cell)?;
        let Some(region) = self.arena.get(id) else {
            error!("[REGIONS] Grid points {} at missing region {}", cell, id);
            return None;
        };
        if !region.valid {
            error!("[REGIONS] Queried invalid region {} at {} before rebuild", id, cell);
            return None;
        }
        Some(region)
    }

    /// Regions across every link of `id`.
    pub fn neighbours(&self, id: RegionId) -> impl Iterator<Item = RegionId> + '_ {
        self.arena
            .get(id)
            .into_iter()
            .flat_map(|r| r.links.iter())
            .filter_map(move |&link| self.links.get(link).and_then(|l| l.other(id)))
    }

    /// Detach a region from its links and grid cells and drop it.
    pub fn remove_region(&mut self, id: RegionId) -> Option<Region> {
        let region = self.arena.remove(id)?;
        for &link in &region.links {
            self.links.deregister(link, id);
        }
        for &cell in &region.cells {
            self.grid.clear_if(cell, id);
        }
        Some(region)
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.links.clear();
        self.grid.clear();
    }
}
