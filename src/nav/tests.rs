//! End-to-end behaviour of a map's navigation: reachability and paths agree,
//! incremental updates match fresh builds, and the lifecycle gates queries.

use super::*;

fn load(text: &str) -> MapNavigation<TerrainGrid> {
    MapNavigation::load(TerrainGrid::from_ascii(text).unwrap(), NavConfig::default())
}

fn anyone() -> TraverseParams {
    TraverseParams::pass_all()
}

fn on_cell(x: i32, z: i32) -> Target {
    Target::Cell(Cell::new(x, z))
}

/// 10×10 open water split by a wall at x = 5 with a single gap at (5, 5).
fn gap_map() -> MapNavigation<TerrainGrid> {
    let mut terrain = TerrainGrid::new(10, 10, CellTerrain::shallow());
    for z in 0..10 {
        if z != 5 {
            terrain.set(Cell::new(5, z), CellTerrain::wall());
        }
    }
    MapNavigation::load(terrain, NavConfig::default())
}

#[test]
fn test_gap_is_reachable_and_path_uses_it() {
    let mut nav = gap_map();
    assert!(nav.can_reach(Cell::new(0, 0), &on_cell(9, 9), PathEndMode::OnCell, &anyone()));

    let path = nav.find_path(Cell::new(0, 0), &on_cell(9, 9), PathEndMode::OnCell, &anyone()).unwrap();
    assert_eq!(path.start(), Some(Cell::new(0, 0)));
    assert_eq!(path.end(), Some(Cell::new(9, 9)));
    assert!(path.contains(Cell::new(5, 5)));
    for pair in path.cells.windows(2) {
        assert!(pair[0].is_adjacent_8(pair[1]));
        assert!(nav.cost_at(pair[1]) != IMPASSABLE);
    }
}

#[test]
fn test_closing_the_gap_disconnects_both_halves() {
    let mut nav = gap_map();
    assert!(nav.can_reach(Cell::new(0, 0), &on_cell(9, 9), PathEndMode::OnCell, &anyone()));

    nav.terrain_mut().set(Cell::new(5, 5), CellTerrain::wall());
    nav.notify_terrain_changed(Cell::new(5, 5)).unwrap();

    assert!(!nav.can_reach(Cell::new(0, 0), &on_cell(9, 9), PathEndMode::OnCell, &anyone()));
    let searches_before = nav.stats().searches;
    let err = nav.find_path(Cell::new(0, 0), &on_cell(9, 9), PathEndMode::OnCell, &anyone()).unwrap_err();
    assert_eq!(err, PathFailure::NoRoute(NoRouteReason::RegionsDisconnected));
    assert_eq!(nav.stats().searches, searches_before, "no cell search for a disconnected target");

    let left = nav.region_at(Cell::new(0, 0)).unwrap().id;
    let right = nav.region_at(Cell::new(9, 9)).unwrap().id;
    assert_ne!(left, right);
    assert!(nav.regions().neighbours(left).all(|n| n != right));
}

#[test]
fn test_touch_ends_beside_a_blocking_object() {
    let mut nav = load(
        "
        ........
        ........
        ........
        ...##...
        ...##...
        ........
        ........
        ........
        ",
    );
    let footprint = CellRect::from_size(Cell::new(3, 3), 2, 2);
    let target = Target::Thing(ThingTarget { position: Cell::new(3, 3), footprint, interaction_cell: None });

    let path = nav.find_path(Cell::new(0, 0), &target, PathEndMode::Touch, &anyone()).unwrap();
    let end = path.end().unwrap();
    assert!(!footprint.contains(end));
    assert!(footprint.cells().any(|c| c.is_adjacent_8(end)));
    assert!(nav.can_reach(Cell::new(0, 0), &target, PathEndMode::Touch, &anyone()));
    assert!(!nav.can_reach(Cell::new(0, 0), &target, PathEndMode::OnCell, &anyone()));
}

#[test]
fn test_touch_footprint_running_off_the_map() {
    let mut nav = MapNavigation::load(TerrainGrid::new(8, 8, CellTerrain::shallow()), NavConfig::default());
    let footprint = CellRect::new(Cell::new(6, 6), Cell::new(i32::MAX, 7));
    let target = Target::Thing(ThingTarget { position: Cell::new(6, 6), footprint, interaction_cell: None });

    assert!(nav.can_reach(Cell::new(0, 0), &target, PathEndMode::Touch, &anyone()));
    let path = nav.find_path(Cell::new(0, 0), &target, PathEndMode::Touch, &anyone()).unwrap();
    let end = path.end().unwrap();
    assert!(!footprint.contains(end));
    assert!(footprint.axis_distance(end).0 <= 1 && footprint.axis_distance(end).1 <= 1);

    let off_map = CellRect::new(Cell::new(i32::MAX - 1, 0), Cell::new(i32::MAX, 3));
    let target = Target::Thing(ThingTarget { position: off_map.min, footprint: off_map, interaction_cell: None });
    assert!(!nav.can_reach(Cell::new(0, 0), &target, PathEndMode::Touch, &anyone()));
    assert_eq!(
        nav.find_path(Cell::new(0, 0), &target, PathEndMode::Touch, &anyone()),
        Err(PathFailure::Invalid(NavError::EmptyFootprint))
    );
}

#[test]
fn test_interaction_cell_without_one_is_an_input_error() {
    let mut nav = load("....\n");
    let target = Target::Thing(ThingTarget::single(Cell::new(3, 0)));
    assert!(!nav.can_reach(Cell::new(0, 0), &target, PathEndMode::InteractionCell, &anyone()));
    assert_eq!(
        nav.find_path(Cell::new(0, 0), &target, PathEndMode::InteractionCell, &anyone()),
        Err(PathFailure::Invalid(NavError::MissingInteractionCell))
    );

    let target = Target::Thing(ThingTarget::single(Cell::new(3, 0)).with_interaction_cell(Cell::new(2, 0)));
    let path = nav.find_path(Cell::new(0, 0), &target, PathEndMode::InteractionCell, &anyone()).unwrap();
    assert_eq!(path.end(), Some(Cell::new(2, 0)));
}

#[test]
fn test_bad_start_and_out_of_bounds_are_input_errors() {
    let mut nav = load("..#\n...\n");
    assert_eq!(
        nav.find_path(Cell::new(2, 0), &on_cell(0, 0), PathEndMode::OnCell, &anyone()),
        Err(PathFailure::Invalid(NavError::StartNotNavigable(Cell::new(2, 0))))
    );
    assert_eq!(
        nav.find_path(Cell::new(0, 0), &on_cell(7, 7), PathEndMode::OnCell, &anyone()),
        Err(PathFailure::Invalid(NavError::OutOfBounds(Cell::new(7, 7))))
    );
    assert!(!nav.can_reach(Cell::new(-1, 0), &on_cell(0, 0), PathEndMode::OnCell, &anyone()));
    assert_eq!(nav.notify_terrain_changed(Cell::new(3, 0)), Err(NavError::OutOfBounds(Cell::new(3, 0))));
}

#[test]
fn test_clear_cache_for_agent_re_evaluates() {
    let mut nav = load(
        "
        ..~..
        ..~..
        ..~..
        ",
    );
    let x = AgentInfo { id: AgentId(1), position: Cell::new(0, 1), profile: AgentProfile::default() };
    let target = on_cell(4, 1);
    let ask = |nav: &mut MapNavigation<TerrainGrid>, agent: &AgentInfo| {
        nav.can_reach_agent(agent, &target, PathEndMode::OnCell, Danger::None, false, TraverseMode::ByAgent)
    };

    assert!(!ask(&mut nav, &x));
    assert!(!ask(&mut nav, &x));
    assert_eq!(nav.stats().reach.searches, 1, "second answer came from the cache");

    nav.clear_cache_for(AgentId(1));
    assert!(!ask(&mut nav, &x));
    assert_eq!(nav.stats().reach.searches, 2, "cleared answer was recomputed");

    let swimmer = AgentInfo { profile: AgentProfile { can_swim_deep: true, ..x.profile }, ..x };
    nav.clear_cache_for(AgentId(1));
    assert!(ask(&mut nav, &swimmer));
}

#[test]
fn test_door_toggle_changes_reachability_without_rebuild() {
    let mut nav = load(
        "
        ..#..
        ..D..
        ..#..
        ",
    );
    let walker = TraverseParams::with_mode(TraverseMode::NoPassClosedDoors, Danger::None);
    assert!(!nav.can_reach(Cell::new(0, 0), &on_cell(4, 0), PathEndMode::OnCell, &walker));
    let generation = nav.stats().generation;

    nav.terrain_mut().set_door(Cell::new(2, 1), Some(DoorState { open: true }));
    nav.notify_door_toggled(Cell::new(2, 1)).unwrap();

    assert!(nav.can_reach(Cell::new(0, 0), &on_cell(4, 0), PathEndMode::OnCell, &walker));
    let path = nav.find_path(Cell::new(0, 0), &on_cell(4, 0), PathEndMode::OnCell, &walker).unwrap();
    assert!(path.contains(Cell::new(2, 1)));
    assert_eq!(nav.stats().generation, generation, "door toggles never rebuild regions");
}

#[test]
fn test_removing_a_door_is_a_terrain_change() {
    let mut nav = load("..D..\n");
    let generation = nav.stats().generation;
    nav.terrain_mut().set(Cell::new(2, 0), CellTerrain::wall());
    nav.notify_door_toggled(Cell::new(2, 0)).unwrap();
    assert!(!nav.can_reach(Cell::new(0, 0), &on_cell(4, 0), PathEndMode::OnCell, &anyone()));
    assert!(nav.stats().generation > generation);
}

#[test]
fn test_bulk_writes_defer_rebuilds() {
    let mut nav = gap_map();
    nav.set_rebuild_enabled(false).unwrap();
    assert_eq!(nav.state(), NavState::DisabledForBulkWrite);

    nav.terrain_mut().set(Cell::new(5, 5), CellTerrain::wall());
    nav.notify_terrain_changed(Cell::new(5, 5)).unwrap();
    assert_eq!(nav.cost_at(Cell::new(5, 5)), IMPASSABLE, "costs are never deferred");
    assert!(nav.region_at(Cell::new(5, 5)).is_some(), "regions are stale until re-enabled");

    nav.set_rebuild_enabled(true).unwrap();
    assert_eq!(nav.state(), NavState::Ready);
    assert!(nav.region_at(Cell::new(5, 5)).is_none());
    assert!(!nav.can_reach(Cell::new(0, 0), &on_cell(9, 9), PathEndMode::OnCell, &anyone()));
}

#[test]
fn test_lifecycle_gates_queries() {
    let mut nav = MapNavigation::new(TerrainGrid::new(4, 4, CellTerrain::shallow()), NavConfig::default());
    assert_eq!(nav.state(), NavState::Constructing);
    assert!(!nav.can_reach(Cell::new(0, 0), &on_cell(3, 3), PathEndMode::OnCell, &anyone()));
    assert_eq!(
        nav.find_path(Cell::new(0, 0), &on_cell(3, 3), PathEndMode::OnCell, &anyone()),
        Err(PathFailure::Invalid(NavError::NotReady(NavState::Constructing)))
    );

    nav.finalize().unwrap();
    assert_eq!(nav.state(), NavState::Ready);
    assert_eq!(nav.finalize(), Err(NavError::NotReady(NavState::Ready)));
    assert!(nav.can_reach(Cell::new(0, 0), &on_cell(3, 3), PathEndMode::OnCell, &anyone()));

    nav.tear_down();
    assert_eq!(nav.state(), NavState::TornDown);
    assert!(nav.region_at(Cell::new(0, 0)).is_none());
    assert_eq!(
        nav.find_path(Cell::new(0, 0), &on_cell(3, 3), PathEndMode::OnCell, &anyone()),
        Err(PathFailure::Invalid(NavError::TornDown))
    );
    assert_eq!(nav.notify_terrain_changed(Cell::new(0, 0)), Err(NavError::TornDown));
}

#[test]
fn test_invalid_config_falls_back_to_default() {
    let config = NavConfig { section_size: 0, ..Default::default() };
    let nav = MapNavigation::load(TerrainGrid::new(3, 3, CellTerrain::shallow()), config);
    assert_eq!(nav.config(), &NavConfig::default());
    assert_eq!(nav.state(), NavState::Ready);
}

#[test]
fn test_background_search_is_invalidated_by_terrain_changes() {
    let mut nav = MapNavigation::load(TerrainGrid::new(20, 20, CellTerrain::shallow()), NavConfig::default());
    nav.begin_background_search(Cell::new(0, 0), &on_cell(19, 19), PathEndMode::OnCell, &anyone()).unwrap();
    assert!(matches!(nav.step_background_search(1), SearchStatus::InProgress { .. }));

    nav.terrain_mut().set(Cell::new(10, 10), CellTerrain::wall());
    nav.notify_terrain_changed(Cell::new(10, 10)).unwrap();
    assert_eq!(nav.step_background_search(100), SearchStatus::Failed(NoRouteReason::Invalidated));
    assert!(!nav.has_background_search());
}

#[test]
fn test_background_search_is_invalidated_by_deferred_rebuild() {
    let mut terrain = TerrainGrid::new(10, 10, CellTerrain::shallow());
    terrain.set(Cell::new(8, 4), CellTerrain::shallow().with_danger(Danger::Some));
    let mut nav = MapNavigation::load(terrain, NavConfig::default());
    let careful = TraverseParams::with_mode(TraverseMode::PassDoors, Danger::None);

    nav.set_rebuild_enabled(false).unwrap();
    nav.terrain_mut().set(Cell::new(5, 4), CellTerrain::wall());
    nav.notify_terrain_changed(Cell::new(5, 4)).unwrap();
    nav.begin_background_search(Cell::new(0, 0), &on_cell(8, 4), PathEndMode::OnCell, &careful).unwrap();
    nav.set_rebuild_enabled(true).unwrap();

    assert_eq!(nav.step_background_search(1000), SearchStatus::Failed(NoRouteReason::Invalidated));
    assert!(!nav.has_background_search());

    let foreground = nav.find_path(Cell::new(0, 0), &on_cell(8, 4), PathEndMode::OnCell, &careful).unwrap();
    assert_eq!(foreground.end(), Some(Cell::new(8, 4)));

    nav.begin_background_search(Cell::new(0, 0), &on_cell(8, 4), PathEndMode::OnCell, &careful).unwrap();
    let background = loop {
        match nav.step_background_search(64) {
            SearchStatus::InProgress { .. } => {}
            SearchStatus::Found(path) => break path,
            SearchStatus::Failed(reason) => panic!("background search failed: {reason:?}"),
        }
    };
    assert_eq!(background.cost, foreground.cost);
}

#[test]
fn test_background_search_runs_beside_foreground_queries() {
    let mut nav = MapNavigation::load(TerrainGrid::new(20, 20, CellTerrain::shallow()), NavConfig::default());
    nav.begin_background_search(Cell::new(0, 0), &on_cell(19, 19), PathEndMode::OnCell, &anyone()).unwrap();
    assert!(matches!(nav.step_background_search(3), SearchStatus::InProgress { .. }));

    let foreground = nav.find_path(Cell::new(0, 19), &on_cell(19, 0), PathEndMode::OnCell, &anyone()).unwrap();
    assert_eq!(foreground.end(), Some(Cell::new(19, 0)));

    let background = loop {
        match nav.step_background_search(8) {
            SearchStatus::InProgress { .. } => {}
            SearchStatus::Found(path) => break path,
            SearchStatus::Failed(reason) => panic!("background search failed: {reason:?}"),
        }
    };
    assert_eq!(background.end(), Some(Cell::new(19, 19)));
    assert!(!nav.cancel_background_search());
}

#[test]
fn test_map_edge_reachability() {
    let mut nav = load(
        "
        #####
        #...#
        #.#.#
        #...#
        ##.##
        ",
    );
    assert!(nav.can_reach_map_edge(Cell::new(1, 1), &anyone()));
    nav.terrain_mut().set(Cell::new(2, 4), CellTerrain::wall());
    nav.notify_terrain_changed(Cell::new(2, 4)).unwrap();
    assert!(!nav.can_reach_map_edge(Cell::new(1, 1), &anyone()));
}

fn random_terrain(rng: &mut fastrand::Rng, width: i32, height: i32) -> TerrainGrid {
    let mut terrain = TerrainGrid::new(width, height, CellTerrain::shallow());
    for cell in terrain.dims().cells().collect::<Vec<_>>() {
        terrain.set(cell, random_cell(rng));
    }
    terrain
}

fn random_cell(rng: &mut fastrand::Rng) -> CellTerrain {
    match rng.u8(0..20) {
        0..=3 => CellTerrain::wall(),
        4 | 5 => CellTerrain::deep(),
        6 => CellTerrain::door(rng.bool()),
        7 => CellTerrain::shallow().with_danger(Danger::Some),
        8 => CellTerrain::destroyable(),
        _ => CellTerrain::shallow(),
    }
}

fn random_params(rng: &mut fastrand::Rng) -> TraverseParams {
    let modes = [
        TraverseMode::ByAgent,
        TraverseMode::PassDoors,
        TraverseMode::NoPassClosedDoors,
        TraverseMode::NoPassClosedDoorsOrDeepLiquid,
        TraverseMode::PassAllDestroyableThings,
    ];
    let profile = AgentProfile { can_open_doors: rng.bool(), can_swim_deep: rng.bool() };
    let danger = if rng.bool() { Danger::None } else { Danger::Some };
    TraverseParams::with_mode(modes[rng.usize(0..modes.len())], danger).with_profile(profile)
}

fn random_passable(rng: &mut fastrand::Rng, nav: &MapNavigation<TerrainGrid>) -> Cell {
    loop {
        let dims = nav.terrain().dims();
        let cell = Cell::new(rng.i32(0..dims.width), rng.i32(0..dims.height));
        if nav.costs().class_at(cell).is_navigable() {
            return cell;
        }
    }
}

#[test]
fn test_reachability_and_paths_agree_on_random_maps() {
    for seed in [5u64, 23, 808] {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut nav = MapNavigation::load(random_terrain(&mut rng, 30, 30), NavConfig::default());

        for _ in 0..60 {
            let from = random_passable(&mut rng, &nav);
            let to = random_passable(&mut rng, &nav);
            let params = random_params(&mut rng);
            let reach = nav.can_reach(from, &on_cell(to.x, to.z), PathEndMode::OnCell, &params);
            match nav.find_path(from, &on_cell(to.x, to.z), PathEndMode::OnCell, &params) {
                Ok(path) => {
                    assert!(reach, "seed {seed}: path {from} -> {to} without reachability");
                    assert_eq!(path.end(), Some(to));
                }
                Err(PathFailure::NoRoute(NoRouteReason::RegionsDisconnected)) => assert!(!reach),
                Err(other) => panic!("seed {seed}: {from} -> {to} reachable but {other:?}"),
            }
        }
    }
}

#[test]
fn test_incremental_updates_answer_like_a_fresh_build() {
    for seed in [11u64, 42] {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut nav = MapNavigation::load(random_terrain(&mut rng, 30, 30), NavConfig::default());

        for round in 0..10 {
            for _ in 0..8 {
                let cell = Cell::new(rng.i32(0..30), rng.i32(0..30));
                let terrain = random_cell(&mut rng);
                nav.terrain_mut().set(cell, terrain);
                nav.notify_terrain_changed(cell).unwrap();
            }

            let mut fresh = MapNavigation::load(nav.terrain().clone(), NavConfig::default());
            for _ in 0..20 {
                let from = random_passable(&mut rng, &fresh);
                let to = random_passable(&mut rng, &fresh);
                let params = random_params(&mut rng);
                let target = on_cell(to.x, to.z);
                assert_eq!(
                    nav.can_reach(from, &target, PathEndMode::OnCell, &params),
                    fresh.can_reach(from, &target, PathEndMode::OnCell, &params),
                    "seed {seed} round {round}: {from} -> {to} with {params:?}"
                );
            }
        }
    }
}
