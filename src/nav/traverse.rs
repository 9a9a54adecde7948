use serde::{Deserialize, Serialize};
use std::fmt;

use super::cost_grid::CellClass;
use super::terrain::Depth;
use super::types::Danger;

/// Opaque handle for an agent, supplied by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Movement capabilities of an agent class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentProfile {
    pub can_open_doors: bool,
    pub can_swim_deep: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraverseMode {
    /// Use the agent's own capabilities.
    #[default]
    ByAgent,
    /// Treat every door as passable.
    PassDoors,
    NoPassClosedDoors,
    NoPassClosedDoorsOrDeepLiquid,
    /// Break through doors and destroyable obstacles.
    PassAllDestroyableThings,
    PassAllDestroyableThingsNotDeepLiquid,
}

impl TraverseMode {
    pub fn passes_destroyables(self) -> bool {
        matches!(
            self,
            TraverseMode::PassAllDestroyableThings | TraverseMode::PassAllDestroyableThingsNotDeepLiquid
        )
    }

    fn refuses_deep(self) -> bool {
        matches!(
            self,
            TraverseMode::NoPassClosedDoorsOrDeepLiquid | TraverseMode::PassAllDestroyableThingsNotDeepLiquid
        )
    }
}

/// Traversal parameters of one query. The whole value is part of every
/// reachability cache key, so two queries only share cached answers when
/// they would be admitted by exactly the same rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraverseParams {
    pub agent: Option<AgentId>,
    pub profile: AgentProfile,
    pub mode: TraverseMode,
    pub max_danger: Danger,
    pub can_bash: bool,
}

impl TraverseParams {
    pub fn for_agent(agent: AgentId, profile: AgentProfile, mode: TraverseMode, max_danger: Danger, can_bash: bool) -> Self {
        Self { agent: Some(agent), profile, mode, max_danger, can_bash }
    }

    /// Agent-independent parameters.
    pub fn with_mode(mode: TraverseMode, max_danger: Danger) -> Self {
        Self { agent: None, profile: AgentProfile::default(), mode, max_danger, can_bash: false }
    }

    pub fn pass_all() -> Self {
        Self::with_mode(TraverseMode::PassDoors, Danger::Deadly).with_profile(AgentProfile {
            can_open_doors: true,
            can_swim_deep: true,
        })
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn allows_deep(&self) -> bool {
        if self.mode.refuses_deep() {
            return false;
        }
        match self.mode {
            TraverseMode::ByAgent => self.profile.can_swim_deep,
            _ => true,
        }
    }

    /// Whether an agent may pass a door in the given state.
    pub fn allows_door(&self, open: bool) -> bool {
        if open {
            return true;
        }
        match self.mode {
            TraverseMode::PassDoors
            | TraverseMode::PassAllDestroyableThings
            | TraverseMode::PassAllDestroyableThingsNotDeepLiquid => true,
            TraverseMode::NoPassClosedDoors | TraverseMode::NoPassClosedDoorsOrDeepLiquid => false,
            TraverseMode::ByAgent => self.profile.can_open_doors || self.can_bash,
        }
    }

    /// Admission rule shared by region-level BFS and cell-level search.
    ///
    /// Danger is only enforced on cells/regions the agent passes through;
    /// the destination itself may be as dangerous as it likes.
    pub fn allows_class(&self, class: CellClass, is_destination: bool) -> bool {
        match class {
            CellClass::Blocked => false,
            CellClass::Destroyable => self.mode.passes_destroyables(),
            CellClass::Liquid { depth, danger } => self.allows_water(depth, danger, is_destination),
            CellClass::Door { open, depth, danger } => {
                self.allows_door(open) && self.allows_water(depth, danger, is_destination)
            }
        }
    }

    fn allows_water(&self, depth: Depth, danger: Danger, is_destination: bool) -> bool {
        if depth == Depth::Deep && !self.allows_deep() {
            return false;
        }
        is_destination || danger <= self.max_danger
    }

    /// Whether entering a closed door costs the opening surcharge.
    pub fn opens_closed_door(&self, class: CellClass) -> bool {
        matches!(class, CellClass::Door { open: false, .. }) && self.allows_class(class, true)
    }
}
