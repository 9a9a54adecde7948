use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest supported map side. Edge-span hashes pack coordinates into 20 bits.
pub const MAX_MAP_DIM: i32 = 1 << 20;

/// Integer grid coordinate. Not an owned object: used as a key everywhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Cell {
    pub x: i32,
    pub z: i32,
}

impl Cell {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self { x: self.x + dx, z: self.z + dz }
    }

    #[inline]
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dz) = dir.offset();
        self.offset(dx, dz)
    }

    /// True for the eight cells surrounding `self` (not `self`).
    pub fn is_adjacent_8(self, other: Cell) -> bool {
        let dx = (self.x - other.x).abs();
        let dz = (self.z - other.z).abs();
        dx <= 1 && dz <= 1 && (dx, dz) != (0, 0)
    }

    /// The 3×3 block centred on this cell, the cell itself included.
    pub fn block_3x3(self) -> impl Iterator<Item = Cell> {
        (-1..=1).flat_map(move |dz| (-1..=1).map(move |dx| self.offset(dx, dz)))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, z): (i32, i32)) -> Self {
        Self { x, z }
    }
}

/// Map dimensions and the row-major cell indexing shared by every grid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct MapDims {
    pub width: i32,
    pub height: i32,
}

impl MapDims {
    pub fn new(width: i32, height: i32) -> Self {
        debug_assert!(width >= 0 && height >= 0, "negative map size {width}x{height}");
        debug_assert!(width < MAX_MAP_DIM && height < MAX_MAP_DIM, "map too large {width}x{height}");
        Self { width, height }
    }

    #[inline]
    pub fn area(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.z >= 0 && cell.x < self.width && cell.z < self.height
    }

    /// Row-major index. Caller guarantees `contains(cell)`.
    #[inline]
    pub fn index(&self, cell: Cell) -> usize {
        cell.z as usize * self.width as usize + cell.x as usize
    }

    #[inline]
    pub fn index_checked(&self, cell: Cell) -> Option<usize> {
        self.contains(cell).then(|| self.index(cell))
    }

    #[inline]
    pub fn cell_of(&self, index: usize) -> Cell {
        let w = self.width as usize;
        Cell::new((index % w) as i32, (index / w) as i32)
    }

    pub fn is_edge(&self, cell: Cell) -> bool {
        self.contains(cell)
            && (cell.x == 0 || cell.z == 0 || cell.x == self.width - 1 || cell.z == self.height - 1)
    }

    pub fn rect(&self) -> CellRect {
        CellRect::new(Cell::new(0, 0), Cell::new(self.width - 1, self.height - 1))
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let (w, h) = (self.width, self.height);
        (0..h).flat_map(move |z| (0..w).map(move |x| Cell::new(x, z)))
    }
}

/// Inclusive axis-aligned rectangle of cells.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CellRect {
    pub min: Cell,
    pub max: Cell,
}

impl CellRect {
    pub fn new(min: Cell, max: Cell) -> Self {
        Self { min, max }
    }

    pub fn single(cell: Cell) -> Self {
        Self { min: cell, max: cell }
    }

    /// Rectangle of `width × height` cells with `min` as its lower corner.
    pub fn from_size(min: Cell, width: i32, height: i32) -> Self {
        Self { min, max: min.offset(width - 1, height - 1) }
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.z < self.min.z
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> i32 {
        self.max.z - self.min.z + 1
    }

    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width() as usize * self.height() as usize
        }
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= self.min.x && cell.x <= self.max.x && cell.z >= self.min.z && cell.z <= self.max.z
    }

    /// Grow (or shrink, for negative `amount`) on every side, saturating at the
    /// `i32` range.
    pub fn expanded_by(&self, amount: i32) -> Self {
        Self {
            min: Cell::new(self.min.x.saturating_sub(amount), self.min.z.saturating_sub(amount)),
            max: Cell::new(self.max.x.saturating_add(amount), self.max.z.saturating_add(amount)),
        }
    }

    pub fn intersect(&self, other: &CellRect) -> Self {
        Self {
            min: Cell::new(self.min.x.max(other.min.x), self.min.z.max(other.min.z)),
            max: Cell::new(self.max.x.min(other.max.x), self.max.z.min(other.max.z)),
        }
    }

    /// Grow to include `cell`.
    pub fn encapsulate(&mut self, cell: Cell) {
        self.min.x = self.min.x.min(cell.x);
        self.min.z = self.min.z.min(cell.z);
        self.max.x = self.max.x.max(cell.x);
        self.max.z = self.max.z.max(cell.z);
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let r = *self;
        (r.min.z..=r.max.z).flat_map(move |z| (r.min.x..=r.max.x).map(move |x| Cell::new(x, z)))
    }

    /// Per-axis distance from `cell` to the closest cell of the rectangle.
    pub fn axis_distance(&self, cell: Cell) -> (i32, i32) {
        let dx = self.min.x.saturating_sub(cell.x).max(0).max(cell.x.saturating_sub(self.max.x));
        let dz = self.min.z.saturating_sub(cell.z).max(0).max(cell.z.saturating_sub(self.max.z));
        (dx, dz)
    }
}

/// Directions for neighbour stepping (cardinal + diagonal).
///
/// Region links only ever use the four cardinal directions; the grid search
/// uses all eight.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
    NorthEast = 4,
    SouthEast = 5,
    SouthWest = 6,
    NorthWest = 7,
}

impl Direction {
    pub const CARDINAL: [Direction; 4] =
        [Direction::North, Direction::East, Direction::South, Direction::West];

    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
    ];

    #[inline]
    pub fn as_index(self) -> usize {
        self as usize
    }

    /// `(dx, dz)`; north is +z, east is +x.
    #[inline]
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, 1),
            Direction::SouthEast => (1, -1),
            Direction::SouthWest => (-1, -1),
            Direction::NorthWest => (-1, 1),
        }
    }

    #[inline]
    pub fn is_diagonal(self) -> bool {
        self.as_index() >= 4
    }

    /// The two cardinal components of a diagonal direction.
    pub fn cardinal_parts(self) -> Option<(Direction, Direction)> {
        match self {
            Direction::NorthEast => Some((Direction::North, Direction::East)),
            Direction::SouthEast => Some((Direction::South, Direction::East)),
            Direction::SouthWest => Some((Direction::South, Direction::West)),
            Direction::NorthWest => Some((Direction::North, Direction::West)),
            _ => None,
        }
    }
}

/// How hazardous a cell is for an agent to cross.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Danger {
    #[default]
    None,
    Some,
    Deadly,
}
