//! Shared cell map handed to city modules.

use crate::resources::ResourceType;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Ground type of a tile; drives resource placement and module ratings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    /// Open flat land, the default tile.
    Plains,
    /// Wooded land, source of Wood.
    Forest,
    /// Raised ground suited to relay sites.
    Hills,
    /// High ground holding ore and gold.
    Mountains,
    /// Lakes and coast.
    Water,
    /// Arid land, may hold oil.
    Desert,
}

impl TerrainType {
    pub fn name(self) -> &'static str {
        match self {
            TerrainType::Plains => "Plains",
            TerrainType::Forest => "Forest",
            TerrainType::Hills => "Hills",
            TerrainType::Mountains => "Mountains",
            TerrainType::Water => "Water",
            TerrainType::Desert => "Desert",
        }
    }
}

/// One map tile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cell {
    /// Column, from the west edge.
    pub x: u32,
    /// Row, from the north edge.
    pub y: u32,
    pub terrain: TerrainType,
    /// Resource present on the tile, if any.
    pub resource: Option<ResourceType>,
    /// Free-form text modules may rewrite.
    pub tooltip: String,
}

impl Cell {
    pub fn new(x: u32, y: u32, terrain: TerrainType, resource: Option<ResourceType>) -> Self {
        let tooltip = match resource {
            Some(r) => format!("{} ({x},{y}) - {}", terrain.name(), r.name()),
            None => format!("{} ({x},{y})", terrain.name()),
        };
        Self {
            x,
            y,
            terrain,
            resource,
            tooltip,
        }
    }
}

/// Row-major grid of cells.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellGrid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl CellGrid {
    /// A grid of empty plains.
    pub fn new(width: u32, height: u32) -> Self {
        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| Cell::new(x, y, TerrainType::Plains, None)))
            .collect();
        Self {
            width,
            height,
            cells,
        }
    }

    /// Seeded random map; the same seed always yields the same grid.
    pub fn generate(width: u32, height: u32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut cells = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                let terrain = match rng.gen_range(0u32..100) {
                    0..=39 => TerrainType::Plains,
                    40..=59 => TerrainType::Forest,
                    60..=74 => TerrainType::Hills,
                    75..=84 => TerrainType::Mountains,
                    85..=94 => TerrainType::Water,
                    _ => TerrainType::Desert,
                };
                let roll = rng.gen_range(0u32..100);
                let resource = match terrain {
                    TerrainType::Forest if roll < 60 => Some(ResourceType::Wood),
                    TerrainType::Hills if roll < 20 => Some(ResourceType::Stone),
                    TerrainType::Hills if roll < 35 => Some(ResourceType::Coal),
                    TerrainType::Mountains if roll < 30 => Some(ResourceType::Iron),
                    TerrainType::Mountains if roll < 35 => Some(ResourceType::Gold),
                    TerrainType::Desert if roll < 25 => Some(ResourceType::Oil),
                    TerrainType::Plains if roll < 5 => Some(ResourceType::Stone),
                    _ => None,
                };
                cells.push(Cell::new(x, y, terrain, resource));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y as usize) * (self.width as usize) + x as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&Cell> {
        self.index(x, y).and_then(|i| self.cells.get(i))
    }

    pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut Cell> {
        self.index(x, y).and_then(move |i| self.cells.get_mut(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cell> + '_ {
        self.cells.iter_mut()
    }

    pub fn count_terrain(&self, terrain: TerrainType) -> usize {
        self.cells.iter().filter(|c| c.terrain == terrain).count()
    }

    pub fn count_resource(&self, resource: ResourceType) -> usize {
        self.cells
            .iter()
            .filter(|c| c.resource == Some(resource))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_row_major() {
        let grid = CellGrid::new(3, 2);
        assert_eq!(grid.len(), 6);
        let c = grid.get(2, 1).unwrap();
        assert_eq!((c.x, c.y), (2, 1));
        assert!(grid.get(3, 0).is_none());
        assert!(grid.get(0, 2).is_none());
    }

    #[test]
    fn generation_is_seeded() {
        let a = CellGrid::generate(16, 16, 42);
        let b = CellGrid::generate(16, 16, 42);
        let same = a
            .iter()
            .zip(b.iter())
            .all(|(l, r)| l.terrain == r.terrain && l.resource == r.resource);
        assert!(same);
        for c in a.iter() {
            if c.resource == Some(ResourceType::Wood) {
                assert_eq!(c.terrain, TerrainType::Forest);
            }
        }
    }

    #[test]
    fn tooltip_mentions_resource() {
        let c = Cell::new(1, 2, TerrainType::Desert, Some(ResourceType::Oil));
        assert_eq!(c.tooltip, "Desert (1,2) - Oil");
    }
}
