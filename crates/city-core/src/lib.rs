#![deny(warnings)]

//! Core domain models for the city simulation.
//!
//! Resource extraction and storage, utility networks, the shared cell map,
//! scenario configuration, and validation helpers guarding basic invariants.

pub mod cells;
pub mod resources;
pub mod utilities;

pub use cells::{Cell, CellGrid, TerrainType};
pub use resources::{
    ExtractionFacility, ResourceDeposit, ResourceMarket, ResourceStorage, ResourceType,
};
pub use utilities::{
    BuildingId, ConnectionPolicy, ResidentialBuilding, UtilityNetwork, UtilityService,
    UtilityType,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Map dimensions and generation seed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
        }
    }
}

/// An extraction facility and the deposit it works.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub name: String,
    pub resource: ResourceType,
    /// Deposit capacity in units.
    pub capacity: f64,
    /// Base units extracted per tick.
    pub extraction_rate: f64,
    /// Fraction of extracted units delivered, in [0, 1].
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
    pub max_workers: u32,
    /// Workers hired at start (capped at `max_workers`).
    #[serde(default)]
    pub workers: u32,
}

fn default_efficiency() -> f64 {
    1.0
}

/// Utility networks and their maintenance budget.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilityConfig {
    pub capacities: BTreeMap<UtilityType, f64>,
    pub budget: Decimal,
    pub maintenance_cost: Decimal,
    /// Days between maintenance payments.
    pub maintenance_interval_days: u32,
    pub policy: ConnectionPolicy,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            capacities: [
                (UtilityType::Electricity, 5_000.0),
                (UtilityType::Water, 400.0),
                (UtilityType::Gas, 2_500.0),
                (UtilityType::Internet, 10_000.0),
            ]
            .into_iter()
            .collect(),
            budget: Decimal::new(50_000, 0),
            maintenance_cost: Decimal::new(1_500, 0),
            maintenance_interval_days: 30,
            policy: ConnectionPolicy::AsIs,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildingConfig {
    pub id: u32,
    pub address: String,
    pub residents: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CitizenConfig {
    pub name: String,
    pub monthly_income: Decimal,
    #[serde(default)]
    pub wallet: Decimal,
    /// Employed by the municipality and paid from the city budget.
    #[serde(default)]
    pub public_sector: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompanyConfig {
    pub name: String,
    pub monthly_revenue: Decimal,
    #[serde(default)]
    pub employees: u32,
    #[serde(default)]
    pub subsidised: bool,
}

/// Municipal finance parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceConfig {
    pub opening_balance: Decimal,
    /// Share of citizen income collected as tax, in [0, 1].
    pub income_tax_rate: Decimal,
    /// Share of company revenue collected as tax, in [0, 1].
    pub corporate_tax_rate: Decimal,
    /// Monthly salary paid to each public-sector citizen.
    pub public_salary: Decimal,
    /// Monthly subsidy paid to each subsidised company.
    pub subsidy_amount: Decimal,
    /// Days between finance runs.
    pub interval_days: u32,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            opening_balance: Decimal::new(100_000, 0),
            income_tax_rate: Decimal::new(10, 2),
            corporate_tax_rate: Decimal::new(15, 2),
            public_salary: Decimal::new(2_400, 0),
            subsidy_amount: Decimal::new(5_000, 0),
            interval_days: 30,
        }
    }
}

/// Complete scenario description. Every section falls back to defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    pub name: String,
    pub start_date: NaiveDate,
    /// Seed for deterministic map generation.
    pub seed: u64,
    pub map: MapConfig,
    pub storage_capacity: f64,
    /// Unit prices; resources not listed keep the default market price.
    pub prices: BTreeMap<ResourceType, Decimal>,
    pub facilities: Vec<FacilityConfig>,
    pub utilities: UtilityConfig,
    pub buildings: Vec<BuildingConfig>,
    pub finance: FinanceConfig,
    pub citizens: Vec<CitizenConfig>,
    pub companies: Vec<CompanyConfig>,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            name: "Newtown".to_string(),
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            seed: 42,
            map: MapConfig::default(),
            storage_capacity: 100_000.0,
            prices: BTreeMap::new(),
            facilities: vec![FacilityConfig {
                name: "North Quarry".to_string(),
                resource: ResourceType::Stone,
                capacity: 20_000.0,
                extraction_rate: 100.0,
                efficiency: 0.9,
                max_workers: 10,
                workers: 2,
            }],
            utilities: UtilityConfig::default(),
            buildings: vec![BuildingConfig {
                id: 1,
                address: "1 Market Street".to_string(),
                residents: 40,
            }],
            finance: FinanceConfig::default(),
            citizens: vec![CitizenConfig {
                name: "Ada".to_string(),
                monthly_income: Decimal::new(3_000, 0),
                wallet: Decimal::new(1_000, 0),
                public_sector: true,
            }],
            companies: vec![CompanyConfig {
                name: "Stoneworks".to_string(),
                monthly_revenue: Decimal::new(40_000, 0),
                employees: 12,
                subsidised: false,
            }],
        }
    }
}

impl CityConfig {
    /// Market built from the default table overridden by `prices`.
    pub fn market(&self) -> ResourceMarket {
        let mut market = ResourceMarket::default();
        for (resource, price) in &self.prices {
            market.set_price(*resource, *price);
        }
        market
    }

    pub fn utility_service(&self) -> UtilityService {
        UtilityService::new(
            &self.utilities.capacities,
            self.utilities.budget,
            self.utilities.maintenance_cost,
            self.utilities.policy,
        )
    }

    pub fn extraction_facilities(&self) -> Vec<ExtractionFacility> {
        self.facilities
            .iter()
            .map(|f| {
                let deposit = ResourceDeposit::new(f.resource, f.capacity, f.extraction_rate);
                let mut facility =
                    ExtractionFacility::new(f.name.clone(), deposit, f.efficiency, f.max_workers);
                for _ in 0..f.workers {
                    if !facility.hire_worker() {
                        break;
                    }
                }
                facility
            })
            .collect()
    }

    pub fn residential_buildings(&self) -> Vec<ResidentialBuilding> {
        self.buildings
            .iter()
            .map(|b| ResidentialBuilding::new(BuildingId(b.id), b.address.clone(), b.residents))
            .collect()
    }
}

/// Validation errors for scenario invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Name fields must not be blank.
    #[error("blank name in {0}")]
    EmptyName(&'static str),
    /// Capacities and rates must be finite and >= 0.
    #[error("invalid quantity for {0}")]
    InvalidQuantity(String),
    /// Efficiency must be within [0, 1].
    #[error("efficiency must be within [0,1] for facility {0}")]
    InvalidEfficiency(String),
    /// Monetary values must be non-negative.
    #[error("negative monetary value for {0}")]
    NegativeMoney(&'static str),
    /// Tax rates must be within [0, 1].
    #[error("tax rate must be within [0,1]")]
    InvalidTaxRate,
    /// Periodic intervals must be at least one day.
    #[error("interval must be >= 1 day for {0}")]
    ZeroInterval(&'static str),
    /// Map must have at least one cell.
    #[error("map must be at least 1x1")]
    EmptyMap,
    /// Building identifiers must be unique.
    #[error("duplicate building id: {0}")]
    DuplicateBuilding(u32),
}

fn check_quantity(label: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidQuantity(label.to_string()));
    }
    Ok(())
}

/// Validate a facility definition.
pub fn validate_facility(f: &FacilityConfig) -> Result<(), ValidationError> {
    if f.name.trim().is_empty() {
        return Err(ValidationError::EmptyName("facility"));
    }
    check_quantity(&f.name, f.capacity)?;
    check_quantity(&f.name, f.extraction_rate)?;
    if !(0.0..=1.0).contains(&f.efficiency) {
        return Err(ValidationError::InvalidEfficiency(f.name.clone()));
    }
    Ok(())
}

/// Validate utility capacities, budget and schedule.
pub fn validate_utilities(u: &UtilityConfig) -> Result<(), ValidationError> {
    for (utility, capacity) in &u.capacities {
        check_quantity(utility.name(), *capacity)?;
    }
    if u.budget < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("utility budget"));
    }
    if u.maintenance_cost < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("maintenance cost"));
    }
    if u.maintenance_interval_days == 0 {
        return Err(ValidationError::ZeroInterval("maintenance"));
    }
    Ok(())
}

/// Validate finance parameters.
pub fn validate_finance(f: &FinanceConfig) -> Result<(), ValidationError> {
    for rate in [f.income_tax_rate, f.corporate_tax_rate] {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(ValidationError::InvalidTaxRate);
        }
    }
    if f.opening_balance < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("opening balance"));
    }
    if f.public_salary < Decimal::ZERO || f.subsidy_amount < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("payment"));
    }
    if f.interval_days == 0 {
        return Err(ValidationError::ZeroInterval("finance"));
    }
    Ok(())
}

/// Validate the whole scenario, including cross-entity uniqueness.
pub fn validate_config(cfg: &CityConfig) -> Result<(), ValidationError> {
    if cfg.name.trim().is_empty() {
        return Err(ValidationError::EmptyName("city"));
    }
    if cfg.map.width == 0 || cfg.map.height == 0 {
        return Err(ValidationError::EmptyMap);
    }
    check_quantity("storage", cfg.storage_capacity)?;
    if cfg.prices.values().any(|p| *p < Decimal::ZERO) {
        return Err(ValidationError::NegativeMoney("market price"));
    }
    for f in &cfg.facilities {
        validate_facility(f)?;
    }
    validate_utilities(&cfg.utilities)?;
    validate_finance(&cfg.finance)?;

    let mut ids = BTreeSet::new();
    for b in &cfg.buildings {
        if !ids.insert(b.id) {
            return Err(ValidationError::DuplicateBuilding(b.id));
        }
    }
    for c in &cfg.citizens {
        if c.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("citizen"));
        }
        if c.monthly_income < Decimal::ZERO || c.wallet < Decimal::ZERO {
            return Err(ValidationError::NegativeMoney("citizen"));
        }
    }
    for c in &cfg.companies {
        if c.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("company"));
        }
        if c.monthly_revenue < Decimal::ZERO {
            return Err(ValidationError::NegativeMoney("company revenue"));
        }
    }
    Ok(())
}
