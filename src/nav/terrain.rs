//! Terrain as seen by the navigation layer.
//!
//! The host simulation owns the authoritative terrain. The navigation layer
//! only reads it through [`TerrainSource`] when a cell is (re)classified,
//! which happens on map load and after change notifications.

use serde::{Deserialize, Serialize};

use super::error::TerrainParseError;
use super::types::{Cell, Danger, MapDims};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Depth {
    #[default]
    Shallow,
    Deep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    /// Navigable by this layer.
    Liquid(Depth),
    /// Solid ground. Passable for walkers, impassable for liquid-bound agents.
    Land,
    /// Rock, walls, structures.
    Obstacle { destroyable: bool },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DoorState {
    pub open: bool,
}

/// Everything the navigation layer needs to know about one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellTerrain {
    pub kind: TerrainKind,
    /// Terrain-specific surcharge on top of the base movement cost.
    pub extra_cost: u32,
    pub danger: Danger,
    /// A door (gate, sluice) standing on this cell.
    pub door: Option<DoorState>,
}

impl Default for CellTerrain {
    fn default() -> Self {
        Self::shallow()
    }
}

impl CellTerrain {
    pub const fn new(kind: TerrainKind) -> Self {
        Self { kind, extra_cost: 0, danger: Danger::None, door: None }
    }

    pub const fn shallow() -> Self {
        Self::new(TerrainKind::Liquid(Depth::Shallow))
    }

    pub const fn deep() -> Self {
        Self::new(TerrainKind::Liquid(Depth::Deep))
    }

    pub const fn land() -> Self {
        Self::new(TerrainKind::Land)
    }

    pub const fn wall() -> Self {
        Self::new(TerrainKind::Obstacle { destroyable: false })
    }

    pub const fn destroyable() -> Self {
        Self::new(TerrainKind::Obstacle { destroyable: true })
    }

    /// Shallow liquid with a door on it.
    pub const fn door(open: bool) -> Self {
        Self { door: Some(DoorState { open }), ..Self::shallow() }
    }

    pub fn with_danger(mut self, danger: Danger) -> Self {
        self.danger = danger;
        self
    }

    pub fn with_extra_cost(mut self, extra_cost: u32) -> Self {
        self.extra_cost = extra_cost;
        self
    }

    pub fn with_door(mut self, door: Option<DoorState>) -> Self {
        self.door = door;
        self
    }

    pub fn is_liquid(&self) -> bool {
        matches!(self.kind, TerrainKind::Liquid(_))
    }

    fn glyph(&self) -> char {
        match (self.kind, self.door, self.danger) {
            (_, Some(DoorState { open: true }), _) => 'd',
            (_, Some(DoorState { open: false }), _) => 'D',
            (TerrainKind::Liquid(Depth::Deep), _, _) => '~',
            (TerrainKind::Liquid(Depth::Shallow), _, Danger::Deadly) => '!',
            (TerrainKind::Liquid(Depth::Shallow), _, Danger::Some) => '?',
            (TerrainKind::Liquid(Depth::Shallow), _, Danger::None) => '.',
            (TerrainKind::Land, _, _) => '_',
            (TerrainKind::Obstacle { destroyable: true }, _, _) => '%',
            (TerrainKind::Obstacle { destroyable: false }, _, _) => '#',
        }
    }

    fn from_glyph(glyph: char) -> Option<Self> {
        Some(match glyph {
            '.' => Self::shallow(),
            '~' => Self::deep(),
            '#' => Self::wall(),
            '%' => Self::destroyable(),
            '_' => Self::land(),
            'D' => Self::door(false),
            'd' => Self::door(true),
            '!' => Self::shallow().with_danger(Danger::Deadly),
            '?' => Self::shallow().with_danger(Danger::Some),
            _ => return None,
        })
    }
}

/// Read access to authoritative terrain, implemented by the host.
///
/// `terrain_at` is only called for cells inside `dims()`.
pub trait TerrainSource {
    fn dims(&self) -> MapDims;
    fn terrain_at(&self, cell: Cell) -> CellTerrain;
}

/// Plain array-backed terrain, used by tests and the headless driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainGrid {
    dims: MapDims,
    cells: Vec<CellTerrain>,
}

impl TerrainGrid {
    pub fn new(width: i32, height: i32, fill: CellTerrain) -> Self {
        let dims = MapDims::new(width, height);
        Self { dims, cells: vec![fill; dims.area()] }
    }

    pub fn get(&self, cell: Cell) -> Option<&CellTerrain> {
        self.dims.index_checked(cell).map(|i| &self.cells[i])
    }

    /// Returns false when `cell` is outside the map.
    pub fn set(&mut self, cell: Cell, terrain: CellTerrain) -> bool {
        match self.dims.index_checked(cell) {
            Some(i) => {
                self.cells[i] = terrain;
                true
            }
            None => false,
        }
    }

    /// Set door state on an existing cell. Returns false when out of bounds.
    pub fn set_door(&mut self, cell: Cell, door: Option<DoorState>) -> bool {
        match self.dims.index_checked(cell) {
            Some(i) => {
                self.cells[i].door = door;
                true
            }
            None => false,
        }
    }

    pub fn fill_rect(&mut self, rect: super::types::CellRect, terrain: CellTerrain) {
        for cell in rect.cells() {
            self.set(cell, terrain);
        }
    }

    /// Parse an ASCII map. Line `i` becomes row `z = i`.
    ///
    /// Glyphs: `.` shallow, `~` deep, `#` wall, `%` destroyable obstacle,
    /// `_` land, `D` closed door, `d` open door, `!` deadly shallows,
    /// `?` mildly dangerous shallows. Blank lines are skipped, surrounding
    /// whitespace is trimmed.
    pub fn from_ascii(text: &str) -> Result<Self, TerrainParseError> {
        let rows: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let Some(first) = rows.first() else {
            return Err(TerrainParseError::Empty);
        };
        let width = first.chars().count();
        let mut cells = Vec::with_capacity(width * rows.len());

        for (z, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(TerrainParseError::RaggedRow { row: z, found, expected: width });
            }
            for (x, glyph) in row.chars().enumerate() {
                let terrain = CellTerrain::from_glyph(glyph).ok_or(TerrainParseError::UnknownGlyph {
                    glyph,
                    cell: Cell::new(x as i32, z as i32),
                })?;
                cells.push(terrain);
            }
        }

        Ok(Self { dims: MapDims::new(width as i32, rows.len() as i32), cells })
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(self.cells.len() + self.dims.height as usize);
        for z in 0..self.dims.height {
            for x in 0..self.dims.width {
                out.push(self.cells[self.dims.index(Cell::new(x, z))].glyph());
            }
            out.push('\n');
        }
        out
    }
}

impl TerrainSource for TerrainGrid {
    fn dims(&self) -> MapDims {
        self.dims
    }

    fn terrain_at(&self, cell: Cell) -> CellTerrain {
        self.cells[self.dims.index(cell)]
    }
}

impl<T: TerrainSource + ?Sized> TerrainSource for Box<T> {
    fn dims(&self) -> MapDims {
        (**self).dims()
    }

    fn terrain_at(&self, cell: Cell) -> CellTerrain {
        (**self).terrain_at(cell)
    }
}
