//! Energy planning module: rates each cell's generation potential.

use crate::{CityModule, ModuleError, ModuleView};
use city_core::{CellGrid, ResourceType, TerrainType};

pub const NAME: &str = "energy";

/// Generation potential in MW for a cell.
fn potential(terrain: TerrainType, resource: Option<ResourceType>) -> f64 {
    let base = match terrain {
        TerrainType::Desert => 3.0, // solar
        TerrainType::Hills => 2.0,  // wind
        TerrainType::Water => 4.0,  // hydro
        TerrainType::Plains | TerrainType::Forest | TerrainType::Mountains => 0.0,
    };
    let fuel = match resource {
        Some(ResourceType::Coal) | Some(ResourceType::Oil) => 5.0,
        _ => 0.0,
    };
    base + fuel
}

#[derive(Debug, Default)]
pub struct EnergyModule {
    sites: Vec<(u32, u32, f64)>,
}

impl EnergyModule {
    pub fn total_potential(&self) -> f64 {
        self.sites.iter().map(|(_, _, p)| p).sum()
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }
}

impl CityModule for EnergyModule {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self, cells: &mut CellGrid) -> Result<(), ModuleError> {
        if cells.is_empty() {
            return Err(ModuleError::Init {
                module: NAME.to_string(),
                reason: "empty map".to_string(),
            });
        }
        self.sites.clear();
        for cell in cells.iter_mut() {
            let p = potential(cell.terrain, cell.resource);
            if p > 0.0 {
                cell.tooltip.push_str(&format!(" | energy {p:.1} MW"));
                self.sites.push((cell.x, cell.y, p));
            }
        }
        Ok(())
    }

    fn show(&self, cells: &CellGrid) -> ModuleView {
        let mut lines = vec![
            format!("Candidate sites: {} of {}", self.sites.len(), cells.len()),
            format!("Total potential: {:.1} MW", self.total_potential()),
        ];
        let best = self
            .sites
            .iter()
            .max_by(|a, b| a.2.total_cmp(&b.2));
        if let Some((x, y, p)) = best {
            lines.push(format!("Best site: ({x},{y}) at {p:.1} MW"));
        }
        ModuleView {
            title: "Energy".to_string(),
            lines,
        }
    }
}
