#![deny(warnings)]

//! Host/module boundary for independently developed city modules.
//!
//! A [`ModuleRegistry`] owns the shared [`CellGrid`] and hands it to each
//! registered [`CityModule`] as an explicit read/write handle during
//! initialization. Which built-in modules are loaded can be driven by a YAML
//! manifest.

pub mod comms;
pub mod energy;

pub use comms::CommsModule;
pub use energy::EnergyModule;

use city_core::CellGrid;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Rendered output of a module, the headless stand-in for its window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModuleView {
    /// Heading, usually the module's display name.
    pub title: String,
    /// Body text, one entry per line.
    pub lines: Vec<String>,
}

impl fmt::Display for ModuleView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// A pluggable city module.
pub trait CityModule {
    /// Unique name used for lookup.
    fn name(&self) -> &str;

    /// Called once with the shared map. Modules may annotate cells.
    fn initialize(&mut self, cells: &mut CellGrid) -> Result<(), ModuleError>;

    fn show(&self, cells: &CellGrid) -> ModuleView;
}

#[derive(Debug, Error, PartialEq)]
pub enum ModuleError {
    #[error("module already registered: {0}")]
    DuplicateName(String),
    #[error("unknown module: {0}")]
    UnknownModule(String),
    #[error("module {0} has not been initialized")]
    NotInitialized(String),
    #[error("module {module} failed to initialize: {reason}")]
    Init { module: String, reason: String },
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}

/// Manifest entry selecting a built-in module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    /// Built-in id, e.g. `energy`.
    pub id: String,
    /// Disabled entries are skipped; defaults to `true`.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    modules: Vec<ModuleMeta>,
}

/// Parses a manifest of the form `modules: [{ id: energy }, ...]`.
pub fn parse_manifest(text: &str) -> Result<Vec<ModuleMeta>, ModuleError> {
    let manifest: Manifest =
        serde_yaml::from_str(text).map_err(|e| ModuleError::InvalidManifest(e.to_string()))?;
    Ok(manifest.modules)
}

/// Instantiates a built-in module by id.
pub fn builtin(id: &str) -> Option<Box<dyn CityModule>> {
    match id {
        energy::NAME => Some(Box::new(EnergyModule::default())),
        comms::NAME => Some(Box::new(CommsModule::default())),
        _ => None,
    }
}

struct Entry {
    module: Box<dyn CityModule>,
    initialized: bool,
}

/// Registry of modules sharing one cell grid.
pub struct ModuleRegistry {
    cells: CellGrid,
    entries: Vec<Entry>,
}

impl ModuleRegistry {
    pub fn new(cells: CellGrid) -> Self {
        Self {
            cells,
            entries: Vec::new(),
        }
    }

    /// Registers the enabled built-ins listed in a YAML manifest.
    pub fn from_manifest(text: &str, cells: CellGrid) -> Result<Self, ModuleError> {
        let mut registry = Self::new(cells);
        for meta in parse_manifest(text)?.into_iter().filter(|m| m.enabled) {
            let module =
                builtin(&meta.id).ok_or_else(|| ModuleError::UnknownModule(meta.id.clone()))?;
            registry.register(module)?;
        }
        Ok(registry)
    }

    pub fn cells(&self) -> &CellGrid {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut CellGrid {
        &mut self.cells
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.module.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn register(&mut self, module: Box<dyn CityModule>) -> Result<(), ModuleError> {
        let name = module.name().to_string();
        if self.entries.iter().any(|e| e.module.name() == name) {
            return Err(ModuleError::DuplicateName(name));
        }
        info!(module = %name, "module registered");
        self.entries.push(Entry {
            module,
            initialized: false,
        });
        Ok(())
    }

    /// Initializes every module not yet initialized, in registration order.
    /// Returns how many were initialized by this call.
    pub fn initialize_all(&mut self) -> Result<usize, ModuleError> {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|e| !e.initialized) {
            entry.module.initialize(&mut self.cells)?;
            entry.initialized = true;
            debug!(module = entry.module.name(), "module initialized");
            count += 1;
        }
        Ok(count)
    }

    pub fn show(&self, name: &str) -> Result<ModuleView, ModuleError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.module.name() == name)
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))?;
        if !entry.initialized {
            return Err(ModuleError::NotInitialized(name.to_string()));
        }
        Ok(entry.module.show(&self.cells))
    }
}
