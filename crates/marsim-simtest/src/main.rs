//! Mars colony containment harness
//!
//! Builds a synthetic colony in-process and checks the containment model:
//! scripted colonist scenarios, a seeded random-move sweep that audits the
//! forest after every step, save/load, and listener isolation.
//!
//! Usage:
//!   cargo run -p marsim-simtest
//!   cargo run -p marsim-simtest -- --verbose --seed 7 --steps 5000

use std::path::PathBuf;

use clap::Parser;
use marsim_core::constants::mars;
use marsim_core::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Headless checks for the unit containment model
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print passing checks and debug logs
    #[arg(short, long)]
    verbose: bool,
    /// Seed for the random-move sweep
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Number of random moves to apply
    #[arg(long, default_value_t = 2000)]
    steps: usize,
    /// JSON model configuration used for the sweep
    #[arg(long)]
    config: Option<PathBuf>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn check(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

fn main() {
    let args = Args::parse();
    let config = match load_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };
    marsim_core::logging::init(args.verbose || config.verbose_logging);
    println!("=== Mars Colony Containment Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration
    results.extend(validate_config());

    // 2. Scripted colonist scenarios
    results.extend(validate_scenarios());

    // 3. Random move sweep
    let (sweep_results, colony, sites) = random_sweep(&config, args.seed, args.steps);
    results.extend(sweep_results);

    // 4. Save/load of the swept colony
    results.extend(validate_persistence(&colony, &sites));

    // 5. Listener isolation and deferred moves
    results.extend(validate_listeners());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<LocationConfig, String> {
    let Some(path) = path else {
        return Ok(LocationConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    LocationConfig::from_json(&json).map_err(|errors| {
        let reasons: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        format!("invalid config {}: {}", path.display(), reasons.join("; "))
    })
}

fn describe<T: std::fmt::Debug>(result: &LocationResult<T>) -> String {
    match result {
        Ok(v) => format!("{:?}", v),
        Err(e) => format!("error: {}", e),
    }
}

/// Degrees of latitude covering `metres` on Mars.
fn lat_offset(metres: f64) -> f64 {
    metres / 1000.0 / mars::RADIUS_KM.to_radians()
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config() -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let defaults = LocationConfig::default();
    results.push(TestResult::check(
        "config_defaults_valid",
        defaults.validate().is_empty(),
        format!("vicinity radius {} km", defaults.vicinity_radius_km),
    ));

    let parsed = LocationConfig::from_json(r#"{ "vicinity_radius_km": 0.5, "max_containment_depth": 32 }"#);
    results.push(TestResult::check(
        "config_json_parses",
        matches!(&parsed, Ok(c) if c.max_containment_depth == Some(32)),
        format!("{:?}", parsed.map(|c| c.vicinity_radius_km)),
    ));

    let rejected = LocationConfig::from_json(r#"{ "vicinity_radius_km": -1.0 }"#);
    results.push(TestResult::check(
        "config_negative_radius_rejected",
        rejected.is_err(),
        format!("{:?}", rejected.err()),
    ));

    results
}

// ── 2. Scenarios ────────────────────────────────────────────────────────

struct Scene {
    model: ColonyModel,
    sites: SettlementSites,
    garages: GarageRegistry,
    settlement: UnitId,
    anchor: Coordinates,
}

impl Scene {
    fn new() -> LocationResult<Self> {
        let anchor = Coordinates::new(-4.59, 137.44);
        let mut model = ColonyModel::default();
        let settlement = model.spawn_unit(
            UnitKind::Settlement,
            "Schiaparelli Point",
            anchor,
            None,
            &Collaborators::new(&Nowhere, &Nowhere),
        )?;
        let sites = model.settlement_sites()?;
        Ok(Self {
            model,
            sites,
            garages: GarageRegistry::new(),
            settlement,
            anchor,
        })
    }

    fn spawn(&mut self, kind: UnitKind, name: &str, container: Option<UnitId>) -> LocationResult<UnitId> {
        let collab = Collaborators::new(&self.sites, &self.garages);
        self.model
            .spawn_unit(kind, name, self.anchor, container, &collab)
    }

    fn set_container(&mut self, unit: UnitId, container: Option<UnitId>) -> LocationResult<()> {
        let collab = Collaborators::new(&self.sites, &self.garages);
        self.model.set_container(unit, container, &collab)
    }
}

fn validate_scenarios() -> Vec<TestResult> {
    println!("--- Scenarios ---");
    let mut results = Vec::new();

    for (name, outcome) in [
        ("scenario_suit_up", scenario_suit_up()),
        ("scenario_walk_out", scenario_walk_out()),
        ("scenario_garage", scenario_garage()),
        ("scenario_detach", scenario_detach()),
    ] {
        results.push(match outcome {
            Ok(detail) => TestResult::check(name, true, detail),
            Err(detail) => TestResult::check(name, false, detail),
        });
    }

    results
}

fn expect(cond: bool, what: &str) -> Result<(), String> {
    if cond {
        Ok(())
    } else {
        Err(what.to_string())
    }
}

fn scenario_suit_up() -> Result<String, String> {
    let mut scene = Scene::new().map_err(|e| e.to_string())?;
    let s = scene.settlement;
    let person = scene.spawn(UnitKind::Person, "Ada", Some(s)).map_err(|e| e.to_string())?;
    let suit = scene
        .spawn(UnitKind::Equipment(EquipmentType::EvaSuit), "EVA Suit 001", Some(s))
        .map_err(|e| e.to_string())?;
    scene.set_container(person, Some(suit)).map_err(|e| e.to_string())?;

    let state = scene.model.location_state(person);
    expect(
        state == Ok(LocationState::InsideEvaSuit),
        &format!("person state {}", describe(&state)),
    )?;
    Ok("person inside settlement -> inside EVA suit".into())
}

fn scenario_walk_out() -> Result<String, String> {
    let mut scene = Scene::new().map_err(|e| e.to_string())?;
    let s = scene.settlement;
    let person = scene.spawn(UnitKind::Person, "Ada", Some(s)).map_err(|e| e.to_string())?;
    let suit = scene
        .spawn(UnitKind::Equipment(EquipmentType::EvaSuit), "EVA Suit 001", Some(s))
        .map_err(|e| e.to_string())?;
    scene.set_container(suit, Some(person)).map_err(|e| e.to_string())?;
    scene
        .set_container(person, Some(UnitId::SURFACE))
        .map_err(|e| e.to_string())?;
    let fifty_metres = Coordinates::new(scene.anchor.latitude + lat_offset(50.0), scene.anchor.longitude);
    let collab = Collaborators::new(&scene.sites, &scene.garages);
    scene
        .model
        .set_coordinates(person, fifty_metres, &collab)
        .map_err(|e| e.to_string())?;

    let state = scene.model.location_state(person);
    expect(
        state == Ok(LocationState::OutsideSettlementVicinity),
        &format!("person state {}", describe(&state)),
    )?;
    expect(scene.model.is_outside(person) == Ok(true), "person not outside")?;
    expect(scene.model.is_outside(suit) == Ok(true), "worn suit not outside")?;
    Ok("suited person 50 m out is in the settlement vicinity".into())
}

fn scenario_garage() -> Result<String, String> {
    let mut scene = Scene::new().map_err(|e| e.to_string())?;
    let s = scene.settlement;
    let garage = scene.spawn(UnitKind::Building, "Garage", Some(s)).map_err(|e| e.to_string())?;
    let rover = scene.spawn(UnitKind::Vehicle, "Explorer 1", Some(s)).map_err(|e| e.to_string())?;
    let person = scene.spawn(UnitKind::Person, "Ada", Some(rover)).map_err(|e| e.to_string())?;
    scene.garages.add_garage(garage, 1);
    scene
        .garages
        .park(scene.model.registry(), rover, garage)
        .map_err(|e| e.to_string())?;

    let parked = scene
        .model
        .is_in_vehicle_in_garage(person, &Collaborators::new(&scene.sites, &scene.garages));
    expect(parked == Ok(true), &format!("parked check {}", describe(&parked)))?;

    scene
        .set_container(rover, Some(UnitId::SURFACE))
        .map_err(|e| e.to_string())?;
    let parked = scene
        .model
        .is_in_vehicle_in_garage(person, &Collaborators::new(&scene.sites, &scene.garages));
    expect(parked == Ok(false), &format!("after leaving {}", describe(&parked)))?;
    let released = scene.garages.release_departed(scene.model.registry());
    expect(released == vec![rover], &format!("released {:?}", released))?;
    Ok("garaged rover passenger detected, cleared after departure".into())
}

fn scenario_detach() -> Result<String, String> {
    let mut scene = Scene::new().map_err(|e| e.to_string())?;
    let s = scene.settlement;
    let person = scene.spawn(UnitKind::Person, "Ada", Some(s)).map_err(|e| e.to_string())?;
    scene.set_container(person, None).map_err(|e| e.to_string())?;

    let coords = scene.model.coordinates(person);
    expect(coords == Ok(scene.anchor), &format!("coordinates {}", describe(&coords)))?;
    let state = scene.model.location_state(person);
    expect(
        state == Ok(LocationState::Unknown),
        &format!("state {}", describe(&state)),
    )?;
    Ok("detached person keeps settlement position, state unknown".into())
}

// ── 3. Random sweep ─────────────────────────────────────────────────────

#[derive(Default)]
struct SweepStats {
    moves: usize,
    cycles_rejected: usize,
    repositions: usize,
    garage_changes: usize,
    garage_releases: usize,
    violations: Vec<String>,
    cycle_changed_graph: usize,
}

fn build_colony(
    config: &LocationConfig,
    rng: &mut StdRng,
) -> LocationResult<(ColonyModel, GarageRegistry, Vec<UnitId>, Vec<UnitId>)> {
    let nowhere = Collaborators::new(&Nowhere, &Nowhere);
    let mut model = ColonyModel::new(config.clone());
    let mut settlements = Vec::new();
    for name in ["Schiaparelli Point", "Mariner Base", "Olympus Outpost"] {
        let at = Coordinates::new(rng.gen_range(-30.0..30.0), rng.gen_range(-180.0..180.0));
        settlements.push(model.spawn_unit(UnitKind::Settlement, name, at, None, &nowhere)?);
    }
    let sites = model.settlement_sites()?;
    let mut garages = GarageRegistry::new();
    let collab = Collaborators::new(&sites, &Nowhere);

    let mut units = settlements.clone();
    let mut vehicles = Vec::new();
    for (i, &s) in settlements.iter().enumerate() {
        let garage = model.spawn_unit(UnitKind::Building, format!("Garage {}", i), Coordinates::default(), Some(s), &collab)?;
        garages.add_garage(garage, 2);
        units.push(garage);
        for v in 0..2 {
            let rover = model.spawn_unit(UnitKind::Vehicle, format!("Rover {}-{}", i, v), Coordinates::default(), Some(s), &collab)?;
            vehicles.push(rover);
            units.push(rover);
        }
        for p in 0..4 {
            units.push(model.spawn_unit(UnitKind::Person, format!("Colonist {}-{}", i, p), Coordinates::default(), Some(s), &collab)?);
        }
        units.push(model.spawn_unit(UnitKind::Robot, format!("Bot {}", i), Coordinates::default(), Some(s), &collab)?);
        for kind in [
            EquipmentType::EvaSuit,
            EquipmentType::EvaSuit,
            EquipmentType::Bag,
            EquipmentType::Barrel,
            EquipmentType::GasCanister,
            EquipmentType::SpecimenBox,
        ] {
            units.push(model.spawn_unit(UnitKind::Equipment(kind), kind_name(kind), Coordinates::default(), Some(s), &collab)?);
        }
    }
    Ok((model, garages, units, vehicles))
}

fn kind_name(kind: EquipmentType) -> &'static str {
    match kind {
        EquipmentType::EvaSuit => "EVA Suit",
        EquipmentType::Bag => "Bag",
        EquipmentType::Barrel => "Barrel",
        EquipmentType::GasCanister => "Gas Canister",
        EquipmentType::SpecimenBox => "Specimen Box",
    }
}

fn random_sweep(config: &LocationConfig, seed: u64, steps: usize) -> (Vec<TestResult>, ColonyModel, SettlementSites) {
    println!("--- Random sweep (seed {}, {} steps) ---", seed, steps);
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed);

    let (mut model, mut garages, units, vehicles) = match build_colony(config, &mut rng) {
        Ok(built) => built,
        Err(e) => {
            results.push(TestResult::check("sweep_build", false, e.to_string()));
            return (results, ColonyModel::default(), SettlementSites::default());
        }
    };
    let sites = match model.settlement_sites() {
        Ok(sites) => sites,
        Err(e) => {
            results.push(TestResult::check("sweep_sites", false, e.to_string()));
            return (results, model, SettlementSites::default());
        }
    };
    results.push(TestResult::check(
        "sweep_build",
        true,
        format!("{} units, {} settlements", model.unit_count(), sites.len()),
    ));

    let mut stats = SweepStats::default();
    let mut targets: Vec<Option<UnitId>> = units.iter().copied().map(Some).collect();
    targets.push(Some(UnitId::SURFACE));
    targets.push(None);

    for step in 0..steps {
        let roll: f64 = rng.gen();
        let collab = Collaborators::new(&sites, &garages);
        if roll < 0.75 {
            let (Some(&unit), Some(&target)) = (units.choose(&mut rng), targets.choose(&mut rng)) else {
                break;
            };
            let before = model.records();
            match model.set_container(unit, target, &collab) {
                Ok(()) => stats.moves += 1,
                Err(LocationError::CyclicContainment { .. }) => {
                    stats.cycles_rejected += 1;
                    if model.records() != before {
                        stats.cycle_changed_graph += 1;
                    }
                }
                Err(e) => stats.violations.push(format!("step {}: move {} -> {:?}: {}", step, unit, target, e)),
            }
        } else if roll < 0.9 {
            // Anything not inside another unit can be driven or walked.
            let free: Vec<UnitId> = units
                .iter()
                .copied()
                .filter(|&u| matches!(model.container(u), Ok(None) | Ok(Some(UnitId::SURFACE))))
                .collect();
            if let Some(&unit) = free.choose(&mut rng) {
                let here = model.coordinates(unit).unwrap_or_default();
                let step_deg = lat_offset(rng.gen_range(0.0..2000.0));
                let there = Coordinates::new(here.latitude + step_deg, here.longitude);
                match model.set_coordinates(unit, there, &collab) {
                    Ok(()) => stats.repositions += 1,
                    Err(e) => stats.violations.push(format!("step {}: reposition {}: {}", step, unit, e)),
                }
            }
        } else if let Some(&rover) = vehicles.choose(&mut rng) {
            stats.garage_changes += 1;
            if garages.unpark(rover).is_none() {
                let garage_ids: Vec<UnitId> = model.registry().ids_of_kind(UnitKind::Building);
                if let Some(&garage) = garage_ids.choose(&mut rng) {
                    // Rovers away from that garage's settlement are refused.
                    if let Err(e) = garages.park(model.registry(), rover, garage) {
                        log::debug!("rover {} not parked in {}: {}", rover, garage, e);
                    }
                }
            }
        }
        stats.garage_releases += garages.release_departed(model.registry()).len();

        if let Err(e) = model.check_invariants(&Collaborators::new(&sites, &garages)) {
            stats.violations.push(format!("step {}: {}", step, e));
            break;
        }
    }

    log::info!(
        "sweep done: {} moves, {} cycles rejected, {} repositions, {} rovers released from garages",
        stats.moves,
        stats.cycles_rejected,
        stats.repositions,
        stats.garage_releases
    );
    results.push(TestResult::check(
        "sweep_invariants_hold",
        stats.violations.is_empty(),
        match stats.violations.first() {
            None => format!(
                "{} moves, {} cycles rejected, {} repositions, {} garage changes",
                stats.moves, stats.cycles_rejected, stats.repositions, stats.garage_changes
            ),
            Some(first) => format!("{} violations, first: {}", stats.violations.len(), first),
        },
    ));
    results.push(TestResult::check(
        "sweep_cycles_leave_graph_unchanged",
        stats.cycle_changed_graph == 0,
        format!("{} of {} rejected moves altered the graph", stats.cycle_changed_graph, stats.cycles_rejected),
    ));

    let tops_ok = units.iter().all(|&u| match model.top_container(u) {
        Ok(Some(top)) => matches!(model.container(top), Ok(None) | Ok(Some(UnitId::SURFACE))) || top.is_surface(),
        Ok(None) => true,
        Err(_) => false,
    });
    results.push(TestResult::check(
        "sweep_top_containers_terminate",
        tops_ok,
        "every top container sits on the surface or nowhere",
    ));

    let predicates_ok = units.iter().all(|&u| {
        let inside = model.is_inside(u);
        let outside = model.is_outside(u);
        match (inside, outside) {
            (Ok(i), Ok(o)) => !(i && o),
            _ => false,
        }
    });
    results.push(TestResult::check(
        "sweep_inside_outside_exclusive",
        predicates_ok,
        "no unit is both inside and outside",
    ));

    (results, model, sites)
}

// ── 4. Persistence ──────────────────────────────────────────────────────

/// `sites` must be the oracle the colony was last classified against.
fn validate_persistence(colony: &ColonyModel, sites: &SettlementSites) -> Vec<TestResult> {
    println!("--- Save/load ---");
    let mut results = Vec::new();

    let mut buffer = Vec::new();
    if let Err(e) = save_colony(&mut buffer, colony) {
        results.push(TestResult::check("save_colony", false, e.to_string()));
        return results;
    }
    results.push(TestResult::check(
        "save_colony",
        true,
        format!("{} bytes", buffer.len()),
    ));

    match load_colony(buffer.as_slice(), &Collaborators::new(sites, &Nowhere)) {
        Ok(loaded) => {
            let same = loaded.records().ok() == colony.records().ok();
            results.push(TestResult::check(
                "load_colony_roundtrip",
                same,
                format!("{} units restored", loaded.unit_count()),
            ));
        }
        Err(e) => results.push(TestResult::check("load_colony_roundtrip", false, e.to_string())),
    }

    results
}

// ── 5. Listeners ────────────────────────────────────────────────────────

fn validate_listeners() -> Vec<TestResult> {
    println!("--- Listeners ---");
    let mut results = Vec::new();

    let outcome = (|| -> LocationResult<(usize, usize, bool)> {
        let collab = Collaborators::new(&Nowhere, &Nowhere);
        let mut model = ColonyModel::default();
        let base = model.spawn_unit(UnitKind::Settlement, "Base", Coordinates::default(), None, &collab)?;
        let ada = model.spawn_unit(UnitKind::Person, "Ada", Coordinates::default(), Some(base), &collab)?;
        let suit = model.spawn_unit(
            UnitKind::Equipment(EquipmentType::EvaSuit),
            "EVA Suit",
            Coordinates::default(),
            Some(base),
            &collab,
        )?;

        model.subscribe(ada, |_: &ColonyModel, _: &UnitEvent| -> Result<(), ListenerFault> {
            panic!("display crashed")
        })?;
        let queue = model.move_queue();
        model.subscribe(ada, move |_: &ColonyModel, e: &UnitEvent| -> Result<(), ListenerFault> {
            if e.kind == UnitEventKind::ContainerChanged(Some(UnitId::SURFACE)) {
                queue.push(suit, Some(e.unit));
            }
            Ok(())
        })?;

        model.set_container(ada, Some(UnitId::SURFACE), &collab)?;
        let faults = model.take_listener_faults().len();
        let report = model.time_passing(&collab);
        let worn = model.container(suit)? == Some(ada);
        Ok((faults, report.applied, worn))
    })();

    match outcome {
        Ok((faults, applied, worn)) => {
            results.push(TestResult::check(
                "listener_panic_isolated",
                faults > 0,
                format!("{} faults recorded", faults),
            ));
            results.push(TestResult::check(
                "listener_deferred_move",
                applied == 1 && worn,
                format!("{} deferred moves applied", applied),
            ));
        }
        Err(e) => results.push(TestResult::check("listener_setup", false, e.to_string())),
    }

    results
}
