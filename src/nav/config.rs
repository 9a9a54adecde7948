use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

use super::error::ConfigError;

/// Per-map navigation configuration.
///
/// Passed into every [`MapNavigation`](super::MapNavigation) at construction;
/// there are no process-wide lookup tables. Values are fixed for the life of a
/// map: changing section size or costs mid-game would invalidate every cached
/// region and path.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NavConfig {
    // Region partitioning
    /// Side length of the square sections a region may not leave.
    pub section_size: usize,
    /// Give destroyable obstacles their own one-cell regions so bashing agents
    /// can be routed through them.
    pub track_destroyable_obstacles: bool,

    // Movement costs (per cell entered, before the 10/14 step multiplier)
    pub shallow_cost: u32,
    pub deep_cost: u32,
    pub door_cost: u32,
    /// Added to liquid cells with a non-liquid 8-neighbour.
    pub near_obstacle_cost: u32,
    /// Added when an agent has to open a closed door to enter it.
    pub closed_door_extra_cost: u32,
    /// Cost of entering a destroyable obstacle by breaking it.
    pub bash_cost: u32,

    // Search
    pub allow_diagonal: bool,
    /// Expansion budget after which a search gives up with "no route".
    pub max_expanded_nodes: usize,

    // Reachability
    pub cache_reachability: bool,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            section_size: 12,
            track_destroyable_obstacles: false,
            shallow_cost: 1,
            deep_cost: 2,
            door_cost: 1,
            near_obstacle_cost: 1,
            closed_door_extra_cost: 4,
            bash_cost: 30,
            allow_diagonal: true,
            max_expanded_nodes: 160_000,
            cache_reachability: true,
        }
    }
}

impl NavConfig {
    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        let config: NavConfig = ron::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&contents)
    }

    /// Load `path`, falling back to defaults (and logging why) on any failure.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!("[CONFIG] Loaded navigation config from {}", path.display());
                config
            }
            Err(e) => {
                error!("[CONFIG] {}", e);
                error!("[CONFIG] Using default NavConfig");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.section_size == 0 {
            return Err(ConfigError::Invalid("section_size must be at least 1".into()));
        }
        if self.section_size > i32::MAX as usize {
            return Err(ConfigError::Invalid(format!("section_size {} is too large", self.section_size)));
        }
        if self.max_expanded_nodes == 0 {
            return Err(ConfigError::Invalid("max_expanded_nodes must be at least 1".into()));
        }
        Ok(())
    }

    /// Cheapest cost any enterable cell can have; scales the search heuristic.
    pub fn min_cell_cost(&self) -> u32 {
        let mut min = self.shallow_cost.min(self.deep_cost).min(self.door_cost);
        if self.track_destroyable_obstacles {
            min = min.min(self.bash_cost);
        }
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_fills_defaults() {
        let config = NavConfig::from_ron_str("(section_size: 8, allow_diagonal: false)").unwrap();
        assert_eq!(config.section_size, 8);
        assert!(!config.allow_diagonal);
        assert_eq!(config.bash_cost, NavConfig::default().bash_cost);
    }

    #[test]
    fn test_zero_section_size_is_rejected() {
        let err = NavConfig::from_ron_str("(section_size: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(NavConfig::from_ron_str("(section_size: \"big\")"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = NavConfig::load_or_default("does/not/exist/nav_config.ron");
        assert_eq!(config, NavConfig::default());
    }

    #[test]
    fn test_min_cell_cost_ignores_bash_unless_tracked() {
        let mut config = NavConfig { bash_cost: 0, ..Default::default() };
        assert_eq!(config.min_cell_cost(), 1);
        config.track_destroyable_obstacles = true;
        assert_eq!(config.min_cell_cost(), 0);
    }
}
