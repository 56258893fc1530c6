//! Communications module: places relay towers on high ground and reports
//! map coverage.

use crate::{CityModule, ModuleError, ModuleView};
use city_core::{CellGrid, TerrainType};

pub const NAME: &str = "comms";

/// Default relay reach in cells (Chebyshev distance).
pub const DEFAULT_RADIUS: u32 = 3;

#[derive(Debug)]
pub struct CommsModule {
    radius: u32,
    relays: Vec<(u32, u32)>,
    covered: usize,
}

impl Default for CommsModule {
    fn default() -> Self {
        Self::with_radius(DEFAULT_RADIUS)
    }
}

impl CommsModule {
    pub fn with_radius(radius: u32) -> Self {
        Self {
            radius,
            relays: Vec::new(),
            covered: 0,
        }
    }

    pub fn relays(&self) -> &[(u32, u32)] {
        &self.relays
    }

    pub fn covered_cells(&self) -> usize {
        self.covered
    }

    fn in_reach(&self, x: u32, y: u32) -> bool {
        self.relays
            .iter()
            .any(|&(rx, ry)| rx.abs_diff(x) <= self.radius && ry.abs_diff(y) <= self.radius)
    }
}

impl CityModule for CommsModule {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self, cells: &mut CellGrid) -> Result<(), ModuleError> {
        self.relays.clear();
        // Greedy: a high cell becomes a relay unless an earlier relay reaches it.
        for cell in cells.iter_mut() {
            let high = matches!(cell.terrain, TerrainType::Hills | TerrainType::Mountains);
            if high && !self.in_reach(cell.x, cell.y) {
                self.relays.push((cell.x, cell.y));
                cell.tooltip.push_str(" | relay");
            }
        }
        self.covered = cells.iter().filter(|c| self.in_reach(c.x, c.y)).count();
        Ok(())
    }

    fn show(&self, cells: &CellGrid) -> ModuleView {
        let pct = if cells.is_empty() {
            0.0
        } else {
            self.covered as f64 * 100.0 / cells.len() as f64
        };
        ModuleView {
            title: "Communications".to_string(),
            lines: vec![
                format!("Relays: {}", self.relays.len()),
                format!("Coverage: {} cells ({pct:.1}%)", self.covered),
            ],
        }
    }
}
