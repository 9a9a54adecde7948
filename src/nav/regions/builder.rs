use fixedbitset::FixedBitSet;
use smallvec::SmallVec;
use std::collections::VecDeque;
use tracing::{error, trace};

use super::link::{EdgeSpan, SpanAxis};
use super::region::{Region, RegionSignature};
use super::RegionStore;
use crate::nav::cost_grid::MovementCostGrid;
use crate::nav::types::{Cell, CellRect, Direction, MapDims};

/// Flood-fill region construction.
///
/// A flood starts at a seed cell, expands through 4-adjacent cells of the same
/// signature and never leaves the seed's section. Afterwards every boundary
/// cell is swept along its edge to produce canonical spans, and the region
/// registers itself into the link of each span.
///
/// All scratch state is section-local and reused between floods.
pub struct RegionBuilder {
    section_size: i32,
    track_destroyable: bool,
    queue: VecDeque<Cell>,
    /// Membership of the region being built, indexed section-locally.
    in_region: FixedBitSet,
    /// Cells already covered by a span, one set per cardinal direction.
    processed: [FixedBitSet; 4],
}

impl RegionBuilder {
    pub fn new(section_size: usize, track_destroyable: bool) -> Self {
        let section_size = section_size.max(1) as i32;
        let area = (section_size * section_size) as usize;
        Self {
            section_size,
            track_destroyable,
            queue: VecDeque::new(),
            in_region: FixedBitSet::with_capacity(area),
            processed: std::array::from_fn(|_| FixedBitSet::with_capacity(area)),
        }
    }

    pub fn section_size(&self) -> i32 {
        self.section_size
    }

    pub fn section_of(&self, cell: Cell) -> (i32, i32) {
        (cell.x.div_euclid(self.section_size), cell.z.div_euclid(self.section_size))
    }

    /// Cells of `section`, clipped to the map.
    pub fn section_rect(&self, section: (i32, i32), dims: MapDims) -> CellRect {
        let min = Cell::new(section.0 * self.section_size, section.1 * self.section_size);
        CellRect::from_size(min, self.section_size, self.section_size).intersect(&dims.rect())
    }

    /// Section-local scratch index. Caller guarantees `cell` is in `section`.
    #[inline]
    fn local_index(&self, section: (i32, i32), cell: Cell) -> usize {
        let lx = cell.x - section.0 * self.section_size;
        let lz = cell.z - section.1 * self.section_size;
        (lz * self.section_size + lx) as usize
    }

    /// Build a region containing `seed` unless `seed` already has one or does
    /// not form regions at all.
    pub fn try_generate_region_from(
        &mut self,
        seed: Cell,
        costs: &MovementCostGrid,
        store: &mut RegionStore,
    ) -> Option<super::RegionId> {
        let dims = costs.dims();
        if !dims.contains(seed) || store.grid.region_at_no_rebuild(seed).is_some() {
            return None;
        }
        let signature = RegionSignature::of(costs.class_at(seed), self.track_destroyable)?;

        let section = self.section_of(seed);
        let bounds = self.section_rect(section, dims);
        let id = store.arena.alloc_id();

        let cells = self.flood(seed, signature, section, bounds, id, costs, store);

        let mut extents = CellRect::single(seed);
        let mut touches_map_edge = false;
        for &cell in &cells {
            extents.encapsulate(cell);
            touches_map_edge |= dims.is_edge(cell);
        }

        let mut region = Region {
            id,
            signature,
            cells,
            extents,
            section,
            touches_map_edge,
            links: SmallVec::new(),
            valid: true,
        };
        self.create_links(&mut region, costs, store);

        trace!(
            "[REGIONS] Built {} ({:?}) with {} cells, {} links in section {:?}",
            id,
            signature.kind,
            region.cells.len(),
            region.links.len(),
            section
        );

        self.in_region.clear();
        for set in &mut self.processed {
            set.clear();
        }

        store.arena.insert(region);
        Some(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn flood(
        &mut self,
        seed: Cell,
        signature: RegionSignature,
        section: (i32, i32),
        bounds: CellRect,
        id: super::RegionId,
        costs: &MovementCostGrid,
        store: &mut RegionStore,
    ) -> Vec<Cell> {
        let mut cells = vec![seed];
        store.grid.set(seed, Some(id));
        let local = self.local_index(section, seed);
        self.in_region.insert(local);

        if signature.is_one_cell() {
            return cells;
        }

        self.queue.clear();
        self.queue.push_back(seed);
        while let Some(cell) = self.queue.pop_front() {
            for dir in Direction::CARDINAL {
                let next = cell.step(dir);
                if !bounds.contains(next) || store.grid.region_at_no_rebuild(next).is_some() {
                    continue;
                }
                if RegionSignature::of(costs.class_at(next), self.track_destroyable) != Some(signature) {
                    continue;
                }
                store.grid.set(next, Some(id));
                let local = self.local_index(section, next);
                self.in_region.insert(local);
                cells.push(next);
                self.queue.push_back(next);
            }
        }
        cells
    }

    /// Is `cell` a member of the region currently being built.
    #[inline]
    fn is_member(&self, region: &Region, cell: Cell) -> bool {
        self.section_of(cell) == region.section && self.in_region.contains(self.local_index(region.section, cell))
    }

    /// Signature of a cell that may form a region on the far side of a boundary.
    fn neighbour_signature(&self, region: &Region, cell: Cell, costs: &MovementCostGrid) -> Option<RegionSignature> {
        if self.is_member(region, cell) {
            return None;
        }
        RegionSignature::of(costs.class_at(cell), self.track_destroyable)
    }

    fn create_links(&mut self, region: &mut Region, costs: &MovementCostGrid, store: &mut RegionStore) {
        let dims = costs.dims();
        for i in 0..region.cells.len() {
            let cell = region.cells[i];
            for dir in Direction::CARDINAL {
                let neighbour = cell.step(dir);
                if !dims.contains(neighbour) {
                    continue;
                }
                let local = self.local_index(region.section, cell);
                if self.processed[dir.as_index()].contains(local) {
                    continue;
                }
                let Some(far) = self.neighbour_signature(region, neighbour, costs) else {
                    continue;
                };
                let span = self.sweep(region, cell, dir, far, costs);
                let link = store.links.link_from(span);
                match store.links.register(link, region.id) {
                    Ok(()) => {
                        if !region.links.contains(&link) {
                            region.links.push(link);
                        }
                    }
                    Err(e) => error!("[LINKS] {}", e),
                }
            }
        }
    }

    /// Extend a boundary from `cell` in both directions perpendicular to `dir`
    /// while the own side stays in the region and the far side keeps `far`.
    fn sweep(
        &mut self,
        region: &Region,
        cell: Cell,
        dir: Direction,
        far: RegionSignature,
        costs: &MovementCostGrid,
    ) -> EdgeSpan {
        let along = match dir {
            Direction::North | Direction::South => Direction::East,
            _ => Direction::North,
        };
        let back = match along {
            Direction::East => Direction::West,
            _ => Direction::South,
        };

        let mut lo = 0i32;
        let mut hi = 0i32;
        if !far.is_one_cell() {
            let continues = |c: Cell| {
                self.is_member(region, c) && self.neighbour_signature(region, c.step(dir), costs) == Some(far)
            };
            let mut c = cell.step(back);
            while continues(c) {
                lo += 1;
                c = c.step(back);
            }
            let mut c = cell.step(along);
            while continues(c) {
                hi += 1;
                c = c.step(along);
            }
        }

        let start = match back {
            Direction::West => cell.offset(-lo, 0),
            _ => cell.offset(0, -lo),
        };
        for k in 0..=(lo + hi) {
            let c = match along {
                Direction::East => start.offset(k, 0),
                _ => start.offset(0, k),
            };
            let local = self.local_index(region.section, c);
            self.processed[dir.as_index()].insert(local);
        }

        let length = (lo + hi + 1) as u32;
        match dir {
            Direction::North => EdgeSpan::new(start, SpanAxis::Horizontal, length),
            Direction::South => EdgeSpan::new(start.offset(0, -1), SpanAxis::Horizontal, length),
            Direction::East => EdgeSpan::new(start, SpanAxis::Vertical, length),
            _ => EdgeSpan::new(start.offset(-1, 0), SpanAxis::Vertical, length),
        }
    }
}
