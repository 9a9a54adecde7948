use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use super::config::NavConfig;
use super::context::{MapNavigation, NavState};
use super::error::NavError;
use super::terrain::TerrainSource;
use super::types::Cell;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub u32);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

/// Navigation for every loaded map.
///
/// Maps are fully independent: each owns its own grids, caches and
/// pathfinders, and nothing here is shared between them except the config
/// new maps are created with.
pub struct NavWorld<T: TerrainSource> {
    config: NavConfig,
    maps: FxHashMap<MapId, MapNavigation<T>>,
}

impl<T: TerrainSource> NavWorld<T> {
    pub fn new(config: NavConfig) -> Self {
        Self { config, maps: FxHashMap::default() }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Build navigation for a freshly loaded map.
    pub fn on_map_loaded(&mut self, id: MapId, terrain: T) -> Result<&mut MapNavigation<T>, NavError> {
        if self.maps.contains_key(&id) {
            warn!("[NAV] {} loaded twice", id);
            return Err(NavError::MapAlreadyLoaded(id));
        }
        info!("[NAV] Building navigation for {}", id);
        let nav = MapNavigation::load(terrain, self.config.clone());
        Ok(self.maps.entry(id).or_insert(nav))
    }

    /// Tear down and drop a map's navigation, handing its terrain back.
    pub fn on_map_about_to_unload(&mut self, id: MapId) -> Result<T, NavError> {
        let Some(mut nav) = self.maps.remove(&id) else {
            return Err(NavError::UnknownMap(id));
        };
        nav.tear_down();
        info!("[NAV] Unloaded {}", id);
        Ok(nav.into_terrain())
    }

    pub fn map(&self, id: MapId) -> Result<&MapNavigation<T>, NavError> {
        self.maps.get(&id).ok_or(NavError::UnknownMap(id))
    }

    pub fn map_mut(&mut self, id: MapId) -> Result<&mut MapNavigation<T>, NavError> {
        self.maps.get_mut(&id).ok_or(NavError::UnknownMap(id))
    }

    /// Lifecycle state of a map; unknown maps are `Uninitialized`.
    pub fn state(&self, id: MapId) -> NavState {
        self.maps.get(&id).map_or(NavState::Uninitialized, |nav| nav.state())
    }

    pub fn notify_terrain_changed(&mut self, id: MapId, cell: Cell) -> Result<(), NavError> {
        self.map_mut(id)?.notify_terrain_changed(cell)
    }

    pub fn notify_door_toggled(&mut self, id: MapId, cell: Cell) -> Result<(), NavError> {
        self.map_mut(id)?.notify_door_toggled(cell)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn map_ids(&self) -> impl Iterator<Item = MapId> + '_ {
        self.maps.keys().copied()
    }
}
