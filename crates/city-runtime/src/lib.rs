#![deny(warnings)]

//! ECS runtime for the city simulation.
//!
//! The city lives in a `bevy_ecs` [`World`] as a handful of resources. One
//! run of the schedule advances the clock by one day, works the extraction
//! facilities, and on their intervals pays utility maintenance and runs the
//! municipal finances. Observable changes are published as [`CityEvent`]s
//! in an [`EventLog`] that callers drain.

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use chrono::{Days, NaiveDate};
use city_core::{
    validate_config, BuildingId, CityConfig, ExtractionFacility, ResidentialBuilding,
    ResourceMarket, ResourceStorage, ResourceType, UtilityService, UtilityType, ValidationError,
};
use city_econ::{
    Budget, Citizen, Company, FinancialTransaction, TaxPolicy, TradeError, TransactionKind,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Simulation date. Day 0 is the scenario start.
#[derive(Resource, Debug, Clone)]
pub struct Clock {
    /// Ticks run so far.
    pub day: u32,
    /// Calendar date of the current tick.
    pub date: NaiveDate,
}

#[derive(Resource, Debug, Clone)]
pub struct CityName(pub String);

/// Facilities worked by the extraction system, in scenario order.
#[derive(Resource, Debug, Clone)]
pub struct Extraction(pub Vec<ExtractionFacility>);

/// Warehouse plus the price table used for trade.
#[derive(Resource, Debug, Clone)]
pub struct Stockpile {
    pub storage: ResourceStorage,
    pub market: ResourceMarket,
}

#[derive(Resource, Debug, Clone)]
pub struct Utilities(pub UtilityService);

#[derive(Resource, Debug, Clone)]
pub struct Housing(pub Vec<ResidentialBuilding>);

#[derive(Resource, Debug, Clone)]
pub struct Treasury {
    pub budget: Budget,
    pub policy: TaxPolicy,
    /// Paid to each public-sector citizen per finance run.
    pub public_salary: Decimal,
    /// Paid to each subsidised company per finance run.
    pub subsidy_amount: Decimal,
}

#[derive(Resource, Debug, Clone)]
pub struct Population {
    pub citizens: Vec<Citizen>,
    pub companies: Vec<Company>,
}

/// Periodic task intervals, in days.
#[derive(Resource, Debug, Clone, Copy)]
pub struct Intervals {
    pub maintenance_days: u32,
    pub finance_days: u32,
}

/// A change worth telling subscribers about.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum CityEvent {
    /// A facility's output went into storage.
    Extracted {
        day: u32,
        facility: String,
        resource: ResourceType,
        amount: f64,
    },
    /// A facility was skipped because its output would not fit.
    StorageFull {
        day: u32,
        facility: String,
        needed: f64,
        available: f64,
    },
    /// A deposit ran out during the tick.
    DepositDepleted {
        day: u32,
        facility: String,
    },
    /// Maintenance was paid from the utility budget.
    MaintenancePerformed {
        day: u32,
        remaining_budget: Decimal,
    },
    /// Maintenance was due but the utility budget could not cover it.
    MaintenanceSkipped {
        day: u32,
        budget: Decimal,
    },
    /// A building was offered to every network.
    BuildingConnected {
        building: BuildingId,
        /// `false` when at least one network refused the building.
        complete: bool,
        utilities: Vec<UtilityType>,
    },
    /// Workforce after a successful hire.
    WorkerHired {
        facility: String,
        workers: u32,
    },
    /// Any ledger entry: taxes, payroll, subsidies, trade, funding.
    Transaction(FinancialTransaction),
}

/// Events accumulated since the last drain.
#[derive(Resource, Debug, Default)]
pub struct EventLog(Vec<CityEvent>);

impl EventLog {
    pub fn push(&mut self, event: CityEvent) {
        self.0.push(event);
    }

    pub fn drain(&mut self) -> Vec<CityEvent> {
        std::mem::take(&mut self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// KPI summary of the city at a point in time.
#[derive(Clone, Debug, Serialize)]
pub struct CitySnapshot {
    pub name: String,
    pub date: NaiveDate,
    pub days_run: u32,
    pub treasury_balance: Decimal,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub utility_budget: Decimal,
    pub stored: BTreeMap<ResourceType, f64>,
    pub storage_used: f64,
    pub network_utilization: BTreeMap<UtilityType, f64>,
    pub active_facilities: usize,
    pub transactions_retained: usize,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scenario yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Reads and validates a YAML scenario.
pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<CityConfig, ScenarioError> {
    let text = std::fs::read_to_string(path)?;
    parse_scenario(&text)
}

pub fn parse_scenario(text: &str) -> Result<CityConfig, ScenarioError> {
    let cfg: CityConfig = serde_yaml::from_str(text)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

fn advance_clock(mut clock: ResMut<Clock>) {
    clock.day += 1;
    if let Some(next) = clock.date.checked_add_days(Days::new(1)) {
        clock.date = next;
    }
}

fn extraction_system(
    clock: Res<Clock>,
    mut sites: ResMut<Extraction>,
    mut stock: ResMut<Stockpile>,
    mut log: ResMut<EventLog>,
) {
    let day = clock.day;
    for facility in sites.0.iter_mut() {
        let needed = facility.potential_yield();
        if needed <= 0.0 {
            continue;
        }
        let available = stock.storage.available_space();
        if needed > available {
            log.push(CityEvent::StorageFull {
                day,
                facility: facility.name.clone(),
                needed,
                available,
            });
            continue;
        }
        let resource = facility.resource_type();
        let amount = facility.operate();
        if stock.storage.add_resource(resource, amount) {
            log.push(CityEvent::Extracted {
                day,
                facility: facility.name.clone(),
                resource,
                amount,
            });
        } else {
            warn!(facility = %facility.name, amount, "extracted output did not fit in storage");
            log.push(CityEvent::StorageFull {
                day,
                facility: facility.name.clone(),
                needed: amount,
                available: stock.storage.available_space(),
            });
        }
        if facility.deposit().is_depleted() {
            info!(facility = %facility.name, day, "deposit depleted");
            log.push(CityEvent::DepositDepleted {
                day,
                facility: facility.name.clone(),
            });
        }
    }
}

fn maintenance_system(
    clock: Res<Clock>,
    intervals: Res<Intervals>,
    mut utilities: ResMut<Utilities>,
    mut log: ResMut<EventLog>,
) {
    if clock.day % intervals.maintenance_days != 0 {
        return;
    }
    let day = clock.day;
    if utilities.0.perform_maintenance() {
        log.push(CityEvent::MaintenancePerformed {
            day,
            remaining_budget: utilities.0.budget(),
        });
    } else {
        log.push(CityEvent::MaintenanceSkipped {
            day,
            budget: utilities.0.budget(),
        });
    }
}

fn finance_system(
    clock: Res<Clock>,
    intervals: Res<Intervals>,
    mut treasury: ResMut<Treasury>,
    mut population: ResMut<Population>,
    mut log: ResMut<EventLog>,
) {
    if clock.day % intervals.finance_days != 0 {
        return;
    }
    let date = clock.date;
    let treasury = &mut *treasury;
    let population = &mut *population;

    for citizen in population.citizens.iter_mut().filter(|c| !c.public_sector) {
        citizen.receive_income();
    }
    let salaries =
        treasury
            .budget
            .pay_salaries(&mut population.citizens, treasury.public_salary, date);
    let subsidies =
        treasury
            .budget
            .pay_subsidies(&mut population.companies, treasury.subsidy_amount, date);
    let taxes = treasury.budget.collect_taxes(
        &mut population.citizens,
        &population.companies,
        &treasury.policy,
        date,
    );
    for tx in [salaries, subsidies, taxes].into_iter().flatten() {
        log.push(CityEvent::Transaction(tx));
    }
    info!(%date, balance = %treasury.budget.balance(), "finances settled");
}

/// A running city: ECS world plus the daily schedule.
pub struct CitySim {
    world: World,
    schedule: Schedule,
}

/// Builds the world from a validated scenario and connects its buildings.
pub fn init_city(cfg: &CityConfig) -> Result<CitySim, ValidationError> {
    validate_config(cfg)?;
    let mut world = World::new();
    world.insert_resource(Clock {
        day: 0,
        date: cfg.start_date,
    });
    world.insert_resource(CityName(cfg.name.clone()));
    world.insert_resource(Extraction(cfg.extraction_facilities()));
    world.insert_resource(Stockpile {
        storage: ResourceStorage::new(cfg.storage_capacity),
        market: cfg.market(),
    });
    world.insert_resource(Utilities(cfg.utility_service()));
    world.insert_resource(Housing(Vec::new()));
    world.insert_resource(Treasury {
        budget: Budget::new(cfg.finance.opening_balance),
        policy: TaxPolicy::from(&cfg.finance),
        public_salary: cfg.finance.public_salary,
        subsidy_amount: cfg.finance.subsidy_amount,
    });
    world.insert_resource(Population {
        citizens: cfg.citizens.iter().map(Citizen::from).collect(),
        companies: cfg.companies.iter().map(Company::from).collect(),
    });
    world.insert_resource(Intervals {
        maintenance_days: cfg.utilities.maintenance_interval_days,
        finance_days: cfg.finance.interval_days,
    });
    world.insert_resource(EventLog::default());

    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            advance_clock,
            extraction_system,
            maintenance_system,
            finance_system,
        )
            .chain(),
    );

    let mut sim = CitySim { world, schedule };
    for building in cfg.residential_buildings() {
        sim.add_building(building);
    }
    info!(city = %cfg.name, "city initialized");
    Ok(sim)
}

/// Runs `ticks` daily ticks and returns the resulting snapshot.
pub fn run_ticks(sim: &mut CitySim, ticks: u32) -> CitySnapshot {
    for _ in 0..ticks {
        sim.schedule.run(&mut sim.world);
    }
    debug!(ticks, "ticks complete");
    sim.snapshot()
}

impl CitySim {
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn clock(&self) -> &Clock {
        self.world.resource::<Clock>()
    }

    pub fn drain_events(&mut self) -> Vec<CityEvent> {
        self.world.resource_mut::<EventLog>().drain()
    }

    fn publish(&mut self, event: CityEvent) {
        self.world.resource_mut::<EventLog>().push(event);
    }

    /// Adds a building and connects it to every utility. Returns `false` on
    /// a duplicate id or if any network refused it.
    pub fn add_building(&mut self, building: ResidentialBuilding) -> bool {
        if self
            .world
            .resource::<Housing>()
            .0
            .iter()
            .any(|b| b.id == building.id)
        {
            return false;
        }
        let (complete, utilities) = {
            let mut service = self.world.resource_mut::<Utilities>();
            let complete = service.0.connect_building_to_utilities(&building);
            (complete, service.0.connected_utilities(building.id))
        };
        self.publish(CityEvent::BuildingConnected {
            building: building.id,
            complete,
            utilities,
        });
        self.world.resource_mut::<Housing>().0.push(building);
        complete
    }

    /// Hires one worker at the facility with the given index.
    pub fn hire_worker(&mut self, facility: usize) -> bool {
        let hired = {
            let mut sites = self.world.resource_mut::<Extraction>();
            sites
                .0
                .get_mut(facility)
                .and_then(|f| f.hire_worker().then(|| (f.name.clone(), f.workers())))
        };
        match hired {
            Some((facility, workers)) => {
                self.publish(CityEvent::WorkerHired { facility, workers });
                true
            }
            None => false,
        }
    }

    pub fn export(
        &mut self,
        resource: ResourceType,
        amount: f64,
    ) -> Result<FinancialTransaction, TradeError> {
        let date = self.clock().date;
        let tx = self
            .world
            .resource_scope(|world, mut stock: Mut<Stockpile>| {
                let stock = &mut *stock;
                let mut treasury = world.resource_mut::<Treasury>();
                city_econ::export_resource(
                    &mut stock.storage,
                    &stock.market,
                    &mut treasury.budget,
                    resource,
                    amount,
                    date,
                )
            })?;
        self.publish(CityEvent::Transaction(tx.clone()));
        Ok(tx)
    }

    pub fn import(
        &mut self,
        resource: ResourceType,
        amount: f64,
    ) -> Result<FinancialTransaction, TradeError> {
        let date = self.clock().date;
        let tx = self
            .world
            .resource_scope(|world, mut stock: Mut<Stockpile>| {
                let stock = &mut *stock;
                let mut treasury = world.resource_mut::<Treasury>();
                city_econ::import_resource(
                    &mut stock.storage,
                    &stock.market,
                    &mut treasury.budget,
                    resource,
                    amount,
                    date,
                )
            })?;
        self.publish(CityEvent::Transaction(tx.clone()));
        Ok(tx)
    }

    /// Moves money from the treasury into the utility maintenance budget.
    pub fn fund_utilities(&mut self, amount: Decimal) -> Option<FinancialTransaction> {
        let date = self.clock().date;
        let tx = self.world.resource_mut::<Treasury>().budget.withdraw(
            TransactionKind::Withdrawal,
            amount,
            date,
            "Utility maintenance funding",
        )?;
        self.world.resource_mut::<Utilities>().0.fund(amount);
        self.publish(CityEvent::Transaction(tx.clone()));
        Some(tx)
    }

    pub fn snapshot(&self) -> CitySnapshot {
        let clock = self.world.resource::<Clock>();
        let treasury = self.world.resource::<Treasury>();
        let stock = self.world.resource::<Stockpile>();
        let utilities = self.world.resource::<Utilities>();
        let sites = self.world.resource::<Extraction>();
        let capacity = stock.storage.capacity();
        CitySnapshot {
            name: self.world.resource::<CityName>().0.clone(),
            date: clock.date,
            days_run: clock.day,
            treasury_balance: treasury.budget.balance(),
            total_income: treasury.budget.total_income(),
            total_expenses: treasury.budget.total_expenses(),
            utility_budget: utilities.0.budget(),
            stored: stock.storage.iter().collect(),
            storage_used: if capacity > 0.0 {
                stock.storage.total_stored() / capacity
            } else {
                0.0
            },
            network_utilization: utilities
                .0
                .networks()
                .map(|n| (n.utility_type, n.utilization()))
                .collect(),
            active_facilities: sites
                .0
                .iter()
                .filter(|f| f.deposit().is_active() && !f.deposit().is_depleted())
                .count(),
            transactions_retained: treasury.budget.history_len(),
        }
    }
}
