//! Spatial partitioning for the collision broad phase.
//!
//! A uniform grid over the world keyed by integer cell coordinates. The
//! grid is rebuilt in full every frame (no incremental updates), so queries
//! never see stale positions.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use crate::world::EntityId;

/// Grid-based spatial index.
///
/// Each collidable entity is inserted into the cell containing its position;
/// a neighbor query checks the entity's own cell plus the 8 surrounding
/// cells, which is sufficient as long as collider extents stay below the
/// cell size.
#[derive(Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    cells: HashMap<(i32, i32), Vec<EntityId>>,
    count: usize,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            count: 0,
        }
    }

    /// Convert a world position to cell coordinates.
    #[inline]
    pub fn cell_of(&self, position: Vec2) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Drop all entries. Called at the start of each rebuild; cell vectors
    /// keep their allocations across frames.
    pub fn clear(&mut self) {
        for entries in self.cells.values_mut() {
            entries.clear();
        }
        self.count = 0;
    }

    /// Insert an entity at a position.
    pub fn insert(&mut self, entity: EntityId, position: Vec2) {
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().push(entity);
        self.count += 1;
    }

    /// Candidate neighbors of `entity` at `position`: every entity in the
    /// 3x3 cell block around it, deduplicated, excluding `entity` itself.
    pub fn neighbors_of(&self, entity: EntityId, position: Vec2) -> Vec<EntityId> {
        let (cx, cy) = self.cell_of(position);
        let mut seen = HashSet::new();
        let mut result = Vec::new();

        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(entries) = self.cells.get(&(cx + dx, cy + dy)) {
                    for &other in entries {
                        if other != entity && seen.insert(other) {
                            result.push(other);
                        }
                    }
                }
            }
        }

        result
    }

    /// Total number of inserted entities.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn test_entity(n: u64) -> EntityId {
        EntityId::from(KeyData::from_ffi(n | (1 << 32)))
    }

    #[test]
    fn neighbors_cover_adjacent_cells_only() {
        let mut grid = SpatialGrid::new(100.0);
        let a = test_entity(1);
        let b = test_entity(2);
        let c = test_entity(3);

        grid.insert(a, Vec2::new(50.0, 50.0)); // cell (0, 0)
        grid.insert(b, Vec2::new(150.0, 50.0)); // cell (1, 0) - adjacent
        grid.insert(c, Vec2::new(550.0, 50.0)); // cell (5, 0) - far away

        let neighbors = grid.neighbors_of(a, Vec2::new(50.0, 50.0));
        assert_eq!(neighbors, vec![b]);
    }

    #[test]
    fn neighbors_exclude_self_and_deduplicate() {
        let mut grid = SpatialGrid::new(100.0);
        let a = test_entity(1);
        let b = test_entity(2);

        grid.insert(a, Vec2::new(10.0, 10.0));
        grid.insert(b, Vec2::new(20.0, 20.0));

        let neighbors = grid.neighbors_of(a, Vec2::new(10.0, 10.0));
        assert!(!neighbors.contains(&a));
        assert_eq!(neighbors.len(), 1);
    }

    #[test]
    fn negative_coordinates_map_to_distinct_cells() {
        let grid = SpatialGrid::new(100.0);
        assert_eq!(grid.cell_of(Vec2::new(-1.0, -1.0)), (-1, -1));
        assert_eq!(grid.cell_of(Vec2::new(1.0, 1.0)), (0, 0));
        assert_eq!(grid.cell_of(Vec2::new(-150.0, 250.0)), (-2, 2));
    }

    #[test]
    fn clear_empties_the_grid() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(test_entity(1), Vec2::ZERO);
        grid.insert(test_entity(2), Vec2::new(300.0, 0.0));
        assert_eq!(grid.len(), 2);

        grid.clear();
        assert!(grid.is_empty());
        assert!(grid.neighbors_of(test_entity(3), Vec2::ZERO).is_empty());
    }
}
