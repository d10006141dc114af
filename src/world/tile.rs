use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// === Enums ===

/// Terrain kind held by a single cell of the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Terrain {
    Grass = 0,
    Tree = 1,
    Water = 2,
    Stone = 3,
    WoodPlank = 4,
    Glass = 5,
    Roofed = 6,
    Soil = 7,
    Empty = 8,
    CaveEntrance = 9,
    EnemyMarker = 10,
}

impl Terrain {
    pub const ALL: [Terrain; 11] = [
        Terrain::Grass,
        Terrain::Tree,
        Terrain::Water,
        Terrain::Stone,
        Terrain::WoodPlank,
        Terrain::Glass,
        Terrain::Roofed,
        Terrain::Soil,
        Terrain::Empty,
        Terrain::CaveEntrance,
        Terrain::EnemyMarker,
    ];

    /// Single-character map symbol.
    pub fn symbol(self) -> char {
        match self {
            Terrain::Grass => '.',
            Terrain::Tree => 'T',
            Terrain::Water => '~',
            Terrain::Stone => 'S',
            Terrain::WoodPlank => 'P',
            Terrain::Glass => 'G',
            Terrain::Roofed => 'R',
            Terrain::Soil => '#',
            Terrain::Empty => ' ',
            Terrain::CaveEntrance => 'C',
            Terrain::EnemyMarker => 'E',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Terrain> {
        Terrain::ALL.iter().copied().find(|t| t.symbol() == symbol)
    }

    pub fn name(self) -> &'static str {
        match self {
            Terrain::Grass => "Grass",
            Terrain::Tree => "Tree",
            Terrain::Water => "Water",
            Terrain::Stone => "Stone wall",
            Terrain::WoodPlank => "Wood floor",
            Terrain::Glass => "Glass window",
            Terrain::Roofed => "Roofed floor",
            Terrain::Soil => "Soil",
            Terrain::Empty => "Cave",
            Terrain::CaveEntrance => "Cave entrance",
            Terrain::EnemyMarker => "Enemy",
        }
    }

    /// Whether the player may step onto this terrain.
    pub fn is_passable(self) -> bool {
        !matches!(self, Terrain::Water | Terrain::Stone | Terrain::Glass)
    }

    /// Passability restricted to building parts: floor and roofed floor
    /// are walkable, walls and windows are not.
    pub fn is_structure_passable(self) -> bool {
        matches!(self, Terrain::WoodPlank | Terrain::Roofed)
    }
}

impl TryFrom<u8> for Terrain {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Terrain::ALL.get(value as usize).copied().ok_or(value)
    }
}

impl From<Terrain> for u8 {
    fn from(t: Terrain) -> u8 {
        t as u8
    }
}

/// Coarse biome classification derived from noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    Meadow = 0,
    Forest = 1,
}

impl Biome {
    pub fn name(self) -> &'static str {
        match self {
            Biome::Meadow => "Meadow",
            Biome::Forest => "Forest",
        }
    }
}

impl TryFrom<u8> for Biome {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Biome::Meadow),
            1 => Ok(Biome::Forest),
            other => Err(other),
        }
    }
}

impl From<Biome> for u8 {
    fn from(b: Biome) -> u8 {
        b as u8
    }
}

/// Facing of a player, with the numeric codes used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    Down,
    Up,
    Left,
    Right,
}

impl Direction {
    pub fn code(self) -> u8 {
        match self {
            Direction::Down => 0,
            Direction::Up => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Direction> {
        match code {
            0 => Some(Direction::Down),
            1 => Some(Direction::Up),
            2 => Some(Direction::Left),
            3 => Some(Direction::Right),
            _ => None,
        }
    }

    /// Unit step (dx, dy) in tile space; y grows downward.
    pub fn delta(self) -> (f64, f64) {
        match self {
            Direction::Down => (0.0, 1.0),
            Direction::Up => (0.0, -1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }
}

// === Grid ===

/// Dense row-major 2D grid. All access goes through bounds-checked
/// accessors; there is no way to index outside `[0, width) x [0, height)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "RawGrid",
    into = "RawGrid",
    bound = "T: Copy + Into<u8> + TryFrom<u8>"
)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    cells: Vec<T>,
}

pub type TileGrid = Grid<Terrain>;
pub type BiomeGrid = Grid<Biome>;

impl<T: Copy> Grid<T> {
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Grid {
            width,
            height,
            cells: vec![fill; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<T> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Writes a cell. Out-of-bounds writes are skipped and reported as `false`.
    pub fn set(&mut self, x: i32, y: i32, value: T) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// Mutable rows in parallel, for row-independent generation passes.
    pub fn par_rows_mut(&mut self) -> rayon::slice::ChunksMut<'_, T>
    where
        T: Send,
    {
        let width = self.width.max(1) as usize;
        self.cells.par_chunks_mut(width)
    }

    pub fn count(&self, value: T) -> usize
    where
        T: PartialEq,
    {
        self.cells.iter().filter(|&&c| c == value).count()
    }
}

/// Wire form of a grid: dimensions plus one byte per cell.
#[derive(Serialize, Deserialize)]
struct RawGrid {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl<T: Copy + Into<u8>> From<Grid<T>> for RawGrid {
    fn from(grid: Grid<T>) -> Self {
        RawGrid {
            width: grid.width,
            height: grid.height,
            cells: grid.cells.into_iter().map(Into::into).collect(),
        }
    }
}

impl<T: Copy + TryFrom<u8>> TryFrom<RawGrid> for Grid<T> {
    type Error = String;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        let expected = raw.width as usize * raw.height as usize;
        if raw.cells.len() != expected {
            return Err(format!(
                "grid {}x{} carries {} cells, expected {}",
                raw.width,
                raw.height,
                raw.cells.len(),
                expected
            ));
        }
        let cells = raw
            .cells
            .into_iter()
            .map(|b| T::try_from(b).map_err(|_| format!("invalid cell value {}", b)))
            .collect::<Result<Vec<T>, String>>()?;
        Ok(Grid {
            width: raw.width,
            height: raw.height,
            cells,
        })
    }
}
