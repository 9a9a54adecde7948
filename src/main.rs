use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shoal::nav::{
    region_map_ascii, AgentId, AgentProfile, Cell, CellRect, CellTerrain, Danger, DoorState, MapId,
    MapNavigation, NavConfig, NavWorld, PathEndMode, PathFailure, Target, TerrainGrid, TerrainSource,
    TraverseMode, TraverseParams,
};

/// Headless driver: build navigation for one map and hammer it with queries.
#[derive(Parser, Debug)]
#[command(name = "shoal", version, about = "Region-based liquid navigation driver")]
struct Args {
    /// ASCII map file (see TerrainGrid::from_ascii for glyphs)
    #[arg(long)]
    map: Option<PathBuf>,

    /// Width of the generated map when no --map is given
    #[arg(long, default_value_t = 96)]
    width: i32,

    /// Height of the generated map when no --map is given
    #[arg(long, default_value_t = 96)]
    height: i32,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// RON navigation config; defaults are used when missing or invalid
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random CanReach/FindPath pairs to run
    #[arg(long, default_value_t = 500)]
    queries: usize,

    /// Random terrain changes and door toggles to apply after the queries
    #[arg(long, default_value_t = 0)]
    churn: usize,

    /// Print the region map at the end
    #[arg(long)]
    dump: bool,
}

fn setup_file_logging() -> Option<String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shoal=info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let log_dir = PathBuf::from("logs");
    let file = match fs::create_dir_all(&log_dir) {
        Ok(()) => {
            cleanup_old_logs(&log_dir, 25);
            let now = chrono::Local::now();
            let log_filename = format!("shoal_{}.log", now.format("%Y%m%d_%H%M%S"));
            let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();
            // Single file per run, never rotated
            let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, &log_filename);
            Some((fmt::layer().with_writer(file_appender).with_ansi(false), log_path_str))
        }
        Err(e) => {
            eprintln!("Failed to create logs directory: {e}");
            None
        }
    };
    let (file_layer, log_path) = file.unzip();

    tracing_subscriber::registry().with(filter).with(file_layer).with(stdout_layer).init();

    log_path
}

fn cleanup_old_logs(log_dir: &Path, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("shoal") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Oldest first
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

/// Open water with deep channels, rock outcrops and walled basins whose only
/// openings are doors.
fn generate_map(width: i32, height: i32, rng: &mut StdRng) -> TerrainGrid {
    let mut terrain = TerrainGrid::new(width, height, CellTerrain::shallow());

    for _ in 0..(width * height / 300).max(1) {
        let z = rng.random_range(0..height);
        let x0 = rng.random_range(0..width);
        let len = rng.random_range(4..=(width / 3).max(4));
        terrain.fill_rect(CellRect::from_size(Cell::new(x0, z), len, 2), CellTerrain::deep());
    }

    for _ in 0..(width * height / 60).max(1) {
        let cell = Cell::new(rng.random_range(0..width), rng.random_range(0..height));
        let rock = if rng.random_bool(0.2) { CellTerrain::destroyable() } else { CellTerrain::wall() };
        terrain.fill_rect(CellRect::from_size(cell, rng.random_range(1..=3), rng.random_range(1..=3)), rock);
    }

    for _ in 0..(width * height / 800).max(1) {
        let w = rng.random_range(5..=12);
        let h = rng.random_range(5..=12);
        let min = Cell::new(rng.random_range(0..width), rng.random_range(0..height));
        let outer = CellRect::from_size(min, w, h);
        let inner = outer.expanded_by(-1);
        for cell in outer.cells().filter(|&c| !inner.contains(c)) {
            terrain.set(cell, CellTerrain::wall());
        }
        let door = Cell::new(min.x + w / 2, min.z);
        terrain.set(door, CellTerrain::door(rng.random_bool(0.5)));
    }

    for _ in 0..(width * height / 400).max(1) {
        let cell = Cell::new(rng.random_range(0..width), rng.random_range(0..height));
        let danger = if rng.random_bool(0.3) { Danger::Deadly } else { Danger::Some };
        terrain.fill_rect(CellRect::from_size(cell, 3, 3), CellTerrain::shallow().with_danger(danger));
    }

    terrain
}

fn load_map(path: &Path) -> Result<TerrainGrid, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    TerrainGrid::from_ascii(&text).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
}

fn random_navigable(nav: &MapNavigation<TerrainGrid>, rng: &mut StdRng) -> Option<Cell> {
    let dims = nav.terrain().dims();
    (0..256)
        .map(|_| Cell::new(rng.random_range(0..dims.width), rng.random_range(0..dims.height)))
        .find(|&c| nav.costs().class_at(c).is_navigable())
}

fn random_params(rng: &mut StdRng) -> TraverseParams {
    const MODES: [TraverseMode; 6] = [
        TraverseMode::ByAgent,
        TraverseMode::PassDoors,
        TraverseMode::NoPassClosedDoors,
        TraverseMode::NoPassClosedDoorsOrDeepLiquid,
        TraverseMode::PassAllDestroyableThings,
        TraverseMode::PassAllDestroyableThingsNotDeepLiquid,
    ];
    let profile = AgentProfile { can_open_doors: rng.random_bool(0.5), can_swim_deep: rng.random_bool(0.5) };
    let danger = if rng.random_bool(0.7) { Danger::None } else { Danger::Some };
    TraverseParams::for_agent(
        AgentId(rng.random_range(0..16)),
        profile,
        MODES[rng.random_range(0..MODES.len())],
        danger,
        rng.random_bool(0.1),
    )
}

#[derive(Default)]
struct QueryTally {
    reachable: usize,
    paths: usize,
    path_cells: usize,
    disconnected: usize,
    other_failures: usize,
}

fn run_queries(nav: &mut MapNavigation<TerrainGrid>, rng: &mut StdRng, count: usize) -> QueryTally {
    let mut tally = QueryTally::default();
    for _ in 0..count {
        let (Some(from), Some(to)) = (random_navigable(nav, rng), random_navigable(nav, rng)) else {
            warn!("[NAV] No navigable cells found for a query");
            break;
        };
        let params = random_params(rng);
        let mode = if rng.random_bool(0.2) { PathEndMode::Touch } else { PathEndMode::OnCell };
        let target = Target::Cell(to);

        if nav.can_reach(from, &target, mode, &params) {
            tally.reachable += 1;
        }
        match nav.find_path(from, &target, mode, &params) {
            Ok(path) => {
                tally.paths += 1;
                tally.path_cells += path.len();
            }
            Err(PathFailure::NoRoute(shoal::nav::NoRouteReason::RegionsDisconnected)) => tally.disconnected += 1,
            Err(_) => tally.other_failures += 1,
        }
    }
    tally
}

fn run_churn(nav: &mut MapNavigation<TerrainGrid>, rng: &mut StdRng, count: usize) {
    let dims = nav.terrain().dims();
    let mut doors = 0usize;
    for _ in 0..count {
        let cell = Cell::new(rng.random_range(0..dims.width), rng.random_range(0..dims.height));
        let current = nav.terrain().terrain_at(cell);
        let result = match current.door {
            Some(door) => {
                doors += 1;
                nav.terrain_mut().set_door(cell, Some(DoorState { open: !door.open }));
                nav.notify_door_toggled(cell)
            }
            None => {
                let next = if current.is_liquid() { CellTerrain::wall() } else { CellTerrain::shallow() };
                nav.terrain_mut().set(cell, next);
                nav.notify_terrain_changed(cell)
            }
        };
        if let Err(e) = result {
            warn!("[NAV] Churn at {} failed: {}", cell, e);
        }
        if let (Some(from), Some(to)) = (random_navigable(nav, rng), random_navigable(nav, rng)) {
            nav.can_reach(from, &Target::Cell(to), PathEndMode::OnCell, &TraverseParams::pass_all());
        }
    }
    info!("[NAV] Churn: {} changes ({} door toggles)", count, doors);
}

fn run(args: Args) -> Result<(), String> {
    let config = match &args.config {
        Some(path) => NavConfig::load_or_default(path),
        None => NavConfig::default(),
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let terrain = match &args.map {
        Some(path) => load_map(path)?,
        None => {
            if args.width <= 0 || args.height <= 0 {
                return Err(format!("invalid map size {}x{}", args.width, args.height));
            }
            generate_map(args.width, args.height, &mut rng)
        }
    };

    let map = MapId(0);
    let mut world = NavWorld::new(config);
    let started = Instant::now();
    world.on_map_loaded(map, terrain).map_err(|e| e.to_string())?;
    info!("[NAV] Initial build took {:?}", started.elapsed());

    let nav = world.map_mut(map).map_err(|e| e.to_string())?;

    let started = Instant::now();
    let tally = run_queries(nav, &mut rng, args.queries);
    let elapsed = started.elapsed();
    info!(
        "[NAV] {} queries in {:?}: {} reachable, {} paths (avg {:.1} cells), {} disconnected, {} other failures",
        args.queries,
        elapsed,
        tally.reachable,
        tally.paths,
        if tally.paths > 0 { tally.path_cells as f64 / tally.paths as f64 } else { 0.0 },
        tally.disconnected,
        tally.other_failures
    );

    if args.churn > 0 {
        let started = Instant::now();
        run_churn(nav, &mut rng, args.churn);
        info!("[NAV] Churn took {:?}", started.elapsed());
    }

    for line in nav.stats().to_string().lines() {
        info!("[NAV] {}", line);
    }
    if args.dump {
        println!("{}", region_map_ascii(nav.regions()));
    }

    world.on_map_about_to_unload(map).map_err(|e| e.to_string())?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let log_file = setup_file_logging();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Shoal navigation driver                                 ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Log file: {:<45} ║", log_file.as_deref().unwrap_or("(stdout only)"));
    println!("╚══════════════════════════════════════════════════════════╝");

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[NAV] {}", e);
            ExitCode::FAILURE
        }
    }
}
