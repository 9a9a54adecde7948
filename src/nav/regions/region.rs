use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;

use super::link::LinkId;
use crate::nav::cost_grid::{CellClass, MovementCostGrid};
use crate::nav::terrain::Depth;
use crate::nav::traverse::TraverseParams;
use crate::nav::types::{Cell, CellRect, Danger};

/// Opaque region handle. Ids are never reused within one map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Open liquid.
    Normal,
    /// A one-cell door region. Traffic through it is always link-mediated.
    Portal,
    /// A one-cell destroyable obstacle, only present when obstacle tracking is on.
    ImpassableTracked,
}

/// Cells flood into the same region only when their signatures are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionSignature {
    pub kind: RegionKind,
    pub depth: Option<Depth>,
    pub danger: Danger,
}

impl RegionSignature {
    /// `None` for cells that never belong to a region.
    pub fn of(class: CellClass, track_destroyable: bool) -> Option<Self> {
        match class {
            CellClass::Blocked => None,
            CellClass::Destroyable if track_destroyable => Some(Self {
                kind: RegionKind::ImpassableTracked,
                depth: None,
                danger: Danger::None,
            }),
            CellClass::Destroyable => None,
            CellClass::Liquid { depth, danger } => Some(Self { kind: RegionKind::Normal, depth: Some(depth), danger }),
            CellClass::Door { depth, danger, .. } => Some(Self { kind: RegionKind::Portal, depth: Some(depth), danger }),
        }
    }

    #[inline]
    pub fn is_one_cell(&self) -> bool {
        self.kind != RegionKind::Normal
    }
}

/// A maximal set of 4-connected cells of one signature inside one section.
#[derive(Clone, Debug)]
pub struct Region {
    pub id: RegionId,
    pub signature: RegionSignature,
    pub cells: Vec<Cell>,
    pub extents: CellRect,
    /// Section coordinates (not cells) this region lives in.
    pub section: (i32, i32),
    pub touches_map_edge: bool,
    pub links: SmallVec<[LinkId; 8]>,
    pub valid: bool,
}

impl Region {
    #[inline]
    pub fn kind(&self) -> RegionKind {
        self.signature.kind
    }

    pub fn danger(&self) -> Danger {
        self.signature.danger
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Any member cell; portals and tracked obstacles only have one.
    pub fn any_cell(&self) -> Cell {
        self.cells[0]
    }

    /// Whether an agent with `params` may enter this region.
    ///
    /// Door state is read from the cost grid rather than the signature, so a
    /// door toggle never requires a region rebuild.
    pub fn allows(&self, params: &TraverseParams, costs: &MovementCostGrid, is_destination: bool) -> bool {
        let class = match self.signature.kind {
            RegionKind::Portal => costs.class_at(self.any_cell()),
            RegionKind::ImpassableTracked => CellClass::Destroyable,
            RegionKind::Normal => CellClass::Liquid {
                depth: self.signature.depth.unwrap_or_default(),
                danger: self.signature.danger,
            },
        };
        params.allows_class(class, is_destination)
    }
}

/// Owner of every live region of a map.
#[derive(Default)]
pub struct RegionArena {
    regions: FxHashMap<RegionId, Region>,
    next_id: u32,
}

impl RegionArena {
    pub fn alloc_id(&mut self) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub fn insert(&mut self, region: Region) {
        self.regions.insert(region.id, region);
    }

    pub fn remove(&mut self, id: RegionId) -> Option<Region> {
        self.regions.remove(&id)
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Drops every region. Ids keep counting up.
    pub fn clear(&mut self) {
        self.regions.clear();
    }
}
