#![deny(warnings)]

//! Headless CLI: load a scenario, run the city for a number of days and
//! print the resulting KPIs.

use anyhow::{Context, Result};
use city_core::{validate_config, CellGrid, CityConfig};
use city_modkit::ModuleRegistry;
use city_runtime::CityEvent;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<String>,
    days: Option<u32>,
    json: bool,
    modules: bool,
    modules_manifest: Option<String>,
    version: bool,
}

/// Module selection used when no manifest is given.
const DEFAULT_MANIFEST: &str = "modules:\n  - id: energy\n  - id: comms\n";

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--days" => args.days = it.next().and_then(|s| s.parse().ok()),
            "--json" => args.json = true,
            "--modules" => args.modules = true,
            "--modules-manifest" => {
                args.modules_manifest = it.next();
                args.modules = true;
            }
            "--version" => args.version = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

fn load_config(path: Option<&str>) -> Result<CityConfig> {
    match path {
        Some(p) => city_runtime::load_scenario(p).with_context(|| format!("loading scenario {p}")),
        None => {
            let cfg = CityConfig::default();
            validate_config(&cfg)?;
            Ok(cfg)
        }
    }
}

fn show_modules(cfg: &CityConfig, manifest: Option<&str>) -> Result<()> {
    let text = match manifest {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading manifest {p}"))?,
        None => DEFAULT_MANIFEST.to_string(),
    };
    let grid = CellGrid::generate(cfg.map.width, cfg.map.height, cfg.seed);
    let mut registry = ModuleRegistry::from_manifest(&text, grid)?;
    registry.initialize_all()?;
    for name in registry.names() {
        print!("{}", registry.show(name)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    if args.version {
        println!("cli {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_SHA"));
        return Ok(());
    }
    info!(scenario = ?args.scenario, days = ?args.days, "starting CLI");

    let cfg = load_config(args.scenario.as_deref())?;
    let mut sim = city_runtime::init_city(&cfg)?;
    let snap = city_runtime::run_ticks(&mut sim, args.days.unwrap_or(30));

    let events = sim.drain_events();
    let shortages = events
        .iter()
        .filter(|e| matches!(e, CityEvent::StorageFull { .. }))
        .count();
    let depleted = events
        .iter()
        .filter(|e| matches!(e, CityEvent::DepositDepleted { .. }))
        .count();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        println!(
            "City {} | {} | days: {} | facilities active: {}",
            snap.name, snap.date, snap.days_run, snap.active_facilities
        );
        println!(
            "KPI | treasury: ${} | income: ${} | expenses: ${} | utility budget: ${} | storage: {:.1}%",
            snap.treasury_balance,
            snap.total_income,
            snap.total_expenses,
            snap.utility_budget,
            snap.storage_used * 100.0
        );
        for (resource, amount) in &snap.stored {
            println!("  {:<8} {:>12.1}", resource.name(), amount);
        }
        for (utility, load) in &snap.network_utilization {
            println!("  {:<12} {:>6.1}% load", utility.name(), load * 100.0);
        }
        println!(
            "Events | total: {} | storage full: {} | depleted: {}",
            events.len(),
            shortages,
            depleted
        );
    }

    if args.modules {
        show_modules(&cfg, args.modules_manifest.as_deref())?;
    }
    Ok(())
}
