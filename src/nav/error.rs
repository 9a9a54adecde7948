use thiserror::Error;

use super::context::NavState;
use super::regions::{EdgeSpan, LinkId, RegionId};
use super::types::Cell;
use super::world::MapId;

/// Input errors: the query itself was malformed or addressed a map that
/// cannot serve it. These are routine in a running simulation (despawned
/// targets, unloaded maps) and never abort the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("cell {0} is outside the map")]
    OutOfBounds(Cell),

    #[error("start cell {0} is not navigable")]
    StartNotNavigable(Cell),

    #[error("interaction-cell end mode requested for a target without an interaction cell")]
    MissingInteractionCell,

    #[error("target footprint does not overlap the map")]
    EmptyFootprint,

    #[error("navigation is not ready (state {0:?})")]
    NotReady(NavState),

    #[error("navigation for this map has been torn down")]
    TornDown,

    #[error("map {0} is not loaded")]
    UnknownMap(MapId),

    #[error("map {0} is already loaded")]
    MapAlreadyLoaded(MapId),
}

/// Why a path query produced no route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoRouteReason {
    /// The region graph proved the goal unreachable; no cell search ran.
    RegionsDisconnected,
    /// The cell-level frontier emptied without reaching a goal cell.
    FrontierExhausted,
    /// The search expanded more cells than the configured budget.
    BudgetExhausted { expanded: usize },
    /// Terrain changed underneath an incremental search.
    Invalidated,
    /// The requester abandoned the search.
    Cancelled,
}

/// Failure of a path query, keeping "no route" distinct from "bad input".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathFailure {
    #[error("no route: {0:?}")]
    NoRoute(NoRouteReason),

    #[error(transparent)]
    Invalid(#[from] NavError),
}

impl PathFailure {
    pub fn is_no_route(&self) -> bool {
        matches!(self, PathFailure::NoRoute(_))
    }

    pub fn reason(&self) -> Option<NoRouteReason> {
        match self {
            PathFailure::NoRoute(reason) => Some(*reason),
            PathFailure::Invalid(_) => None,
        }
    }
}

/// Link bookkeeping refused a registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link {link:?} over {span:?} already joins {existing:?}; refusing {rejected}")]
    LinkFull {
        link: LinkId,
        span: EdgeSpan,
        existing: [RegionId; 2],
        rejected: RegionId,
    },

    #[error("link {link:?} does not exist; cannot register {region}")]
    UnknownLink { link: LinkId, region: RegionId },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse navigation config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("invalid navigation config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerrainParseError {
    #[error("map text is empty")]
    Empty,

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow { row: usize, found: usize, expected: usize },

    #[error("unknown terrain glyph {glyph:?} at {cell}")]
    UnknownGlyph { glyph: char, cell: Cell },
}
