mod config;
mod context;
mod cost_grid;
mod debug;
mod error;
mod goal;
mod reachability;
mod terrain;
mod traverse;
mod types;
mod world;

pub mod pathfinding;
pub mod regions;

#[cfg(test)]
mod tests;

// ============================================================================
// PUBLIC API
// ============================================================================

pub use config::NavConfig;
pub use context::{AgentInfo, MapNavigation, NavState};
pub use cost_grid::{CellClass, CostRules, MovementCostGrid, IMPASSABLE};
pub use debug::{region_map_ascii, NavStats};
pub use error::{ConfigError, LinkError, NavError, NoRouteReason, PathFailure, TerrainParseError};
pub use goal::{PathEndMode, PathGoal, Target, ThingTarget};
pub use pathfinding::{GridPathfinder, NavPath, SearchStatus};
pub use reachability::{ReachDest, ReachStats, ReachabilityService};
pub use regions::{Region, RegionId, RegionKind};
pub use terrain::{CellTerrain, Depth, DoorState, TerrainGrid, TerrainKind, TerrainSource};
pub use traverse::{AgentId, AgentProfile, TraverseMode, TraverseParams};
pub use types::{Cell, CellRect, Danger, Direction, MapDims};
pub use world::{MapId, NavWorld};
