//! Traversal queries consumed by movement and AI.
//!
//! Dungeon generation itself lives outside the simulation core; the core
//! only ever asks whether a world position is standable floor. When no map
//! is installed the simulation runs as a pure open field.

/// Walkability query over world coordinates.
pub trait Walkability {
    fn is_walkable(&self, x: f32, y: f32) -> bool;
}

/// Everything is floor. Useful stand-in for arenas and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl Walkability for OpenField {
    fn is_walkable(&self, _x: f32, _y: f32) -> bool {
        true
    }
}

/// Boolean tile grid anchored at the origin. Out-of-bounds is not walkable.
#[derive(Debug, Clone)]
pub struct TileMap {
    columns: usize,
    rows: usize,
    tile_size: f32,
    tiles: Vec<bool>,
}

impl TileMap {
    /// Create a fully walkable map of `columns` x `rows` tiles.
    pub fn new(columns: usize, rows: usize, tile_size: f32) -> Self {
        Self {
            columns,
            rows,
            tile_size,
            tiles: vec![true; columns * rows],
        }
    }

    pub fn set_walkable(&mut self, column: usize, row: usize, walkable: bool) {
        if column < self.columns && row < self.rows {
            self.tiles[row * self.columns + column] = walkable;
        }
    }

    fn tile_at(&self, x: f32, y: f32) -> Option<bool> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let column = (x / self.tile_size).floor() as usize;
        let row = (y / self.tile_size).floor() as usize;
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some(self.tiles[row * self.columns + column])
    }
}

impl Walkability for TileMap {
    fn is_walkable(&self, x: f32, y: f32) -> bool {
        self.tile_at(x, y).unwrap_or(false)
    }
}
