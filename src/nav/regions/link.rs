use rustc_hash::FxHashMap;
use std::fmt;

use super::region::RegionId;
use crate::nav::error::LinkError;
use crate::nav::types::{Cell, MAX_MAP_DIM};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpanAxis {
    /// Boundary runs along x, between row `root.z` and row `root.z + 1`.
    Horizontal,
    /// Boundary runs along z, between column `root.x` and column `root.x + 1`.
    Vertical,
}

/// Canonical description of a straight boundary between two regions.
///
/// `root` is the lowest cell on the south side (horizontal) or the west side
/// (vertical), so both regions compute the same span for the same boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeSpan {
    pub root: Cell,
    pub axis: SpanAxis,
    pub length: u32,
}

impl EdgeSpan {
    pub fn new(root: Cell, axis: SpanAxis, length: u32) -> Self {
        Self { root, axis, length }
    }

    /// Collision-free key: 20 bits each for x, z and length, one for the axis.
    pub fn unique_hash(&self) -> u64 {
        const MASK: u64 = (MAX_MAP_DIM as u64) - 1;
        let x = (self.root.x as u64) & MASK;
        let z = (self.root.z as u64) & MASK;
        let axis = match self.axis {
            SpanAxis::Horizontal => 0u64,
            SpanAxis::Vertical => 1u64,
        };
        let len = (self.length as u64) & MASK;
        x | (z << 20) | (axis << 40) | (len << 41)
    }

    /// Cells on the south/west side of the boundary.
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let span = *self;
        (0..span.length as i32).map(move |i| match span.axis {
            SpanAxis::Horizontal => span.root.offset(i, 0),
            SpanAxis::Vertical => span.root.offset(0, i),
        })
    }
}

/// A link is identified by the hash of its span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl From<&EdgeSpan> for LinkId {
    fn from(span: &EdgeSpan) -> Self {
        LinkId(span.unique_hash())
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{:x}", self.0)
    }
}

/// Shared boundary between at most two regions.
#[derive(Clone, Debug)]
pub struct RegionLink {
    pub span: EdgeSpan,
    regions: [Option<RegionId>; 2],
}

impl RegionLink {
    pub fn new(span: EdgeSpan) -> Self {
        Self { span, regions: [None, None] }
    }

    pub fn id(&self) -> LinkId {
        LinkId::from(&self.span)
    }

    pub fn regions(&self) -> [Option<RegionId>; 2] {
        self.regions
    }

    pub fn contains(&self, region: RegionId) -> bool {
        self.regions.contains(&Some(region))
    }

    pub fn is_empty(&self) -> bool {
        self.regions == [None, None]
    }

    pub fn is_full(&self) -> bool {
        self.regions[0].is_some() && self.regions[1].is_some()
    }

    /// Put `region` into a free slot. Registering a region twice is a no-op.
    pub fn register(&mut self, region: RegionId) -> Result<(), LinkError> {
        if self.contains(region) {
            return Ok(());
        }
        match self.regions {
            [None, _] => self.regions[0] = Some(region),
            [_, None] => self.regions[1] = Some(region),
            [Some(a), Some(b)] => {
                return Err(LinkError::LinkFull {
                    link: self.id(),
                    span: self.span,
                    existing: [a, b],
                    rejected: region,
                })
            }
        }
        Ok(())
    }

    pub fn deregister(&mut self, region: RegionId) {
        for slot in &mut self.regions {
            if *slot == Some(region) {
                *slot = None;
            }
        }
    }

    /// The region across the boundary from `region`.
    pub fn other(&self, region: RegionId) -> Option<RegionId> {
        match self.regions {
            [Some(a), b] if a == region => b,
            [a, Some(b)] if b == region => a,
            _ => None,
        }
    }
}

/// Every link of a map keyed by span hash.
#[derive(Default)]
pub struct LinkTable {
    links: FxHashMap<LinkId, RegionLink>,
}

impl LinkTable {
    /// The link for `span`, created on first use.
    pub fn link_from(&mut self, span: EdgeSpan) -> LinkId {
        let id = LinkId::from(&span);
        self.links.entry(id).or_insert_with(|| RegionLink::new(span));
        id
    }

    pub fn register(&mut self, link: LinkId, region: RegionId) -> Result<(), LinkError> {
        match self.links.get_mut(&link) {
            Some(l) => l.register(region),
            None => Err(LinkError::UnknownLink { link, region }),
        }
    }

    /// Remove `region` from `link`, dropping the link once both slots are empty.
    pub fn deregister(&mut self, link: LinkId, region: RegionId) {
        let emptied = match self.links.get_mut(&link) {
            Some(l) => {
                l.deregister(region);
                l.is_empty()
            }
            None => false,
        };
        if emptied {
            self.links.remove(&link);
        }
    }

    pub fn get(&self, link: LinkId) -> Option<&RegionLink> {
        self.links.get(&link)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionLink> {
        self.links.values()
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }
}
