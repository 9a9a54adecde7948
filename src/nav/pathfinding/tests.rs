//! Tests for the cell-level search: step costs, corner handling, budgets and
//! the incremental begin/step/cancel cycle used by background searches.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::*;
use crate::nav::cost_grid::CostRules;
use crate::nav::goal::{PathEndMode, PathGoal, Target};
use crate::nav::regions::RegionCoordinator;
use crate::nav::terrain::{CellTerrain, TerrainGrid, TerrainSource};
use crate::nav::traverse::{TraverseMode, TraverseParams};
use crate::nav::types::{Danger, Direction};

struct Fixture {
    config: NavConfig,
    costs: MovementCostGrid,
    store: RegionStore,
}

impl Fixture {
    fn new(terrain: &TerrainGrid, config: NavConfig) -> Self {
        let mut costs = MovementCostGrid::new(terrain.dims(), CostRules::from(&config));
        costs.rebuild_all(terrain);
        let mut store = RegionStore::new(terrain.dims());
        RegionCoordinator::new(terrain.dims(), &config).rebuild_all(&costs, &mut store);
        Self { config, costs, store }
    }

    fn ascii(text: &str) -> Self {
        Self::new(&TerrainGrid::from_ascii(text).unwrap(), NavConfig::default())
    }

    fn grid(&self) -> SearchGrid<'_> {
        SearchGrid { costs: &self.costs, regions: &self.store, config: &self.config }
    }

    fn goal(&self, x: i32, z: i32) -> PathGoal {
        PathGoal::resolve(&Target::Cell(Cell::new(x, z)), PathEndMode::OnCell, &self.costs).unwrap()
    }

    fn find(&self, from: (i32, i32), to: (i32, i32), params: &TraverseParams) -> Result<NavPath, NoRouteReason> {
        let mut pf = GridPathfinder::new(self.costs.dims());
        pf.find_path(Cell::from(from), &self.goal(to.0, to.1), params, &self.grid())
    }
}

fn anyone() -> TraverseParams {
    TraverseParams::with_mode(TraverseMode::PassDoors, Danger::Deadly)
}

fn assert_contiguous(path: &NavPath) {
    for pair in path.cells.windows(2) {
        assert!(pair[0].is_adjacent_8(pair[1]), "{} -> {} is not a step", pair[0], pair[1]);
    }
}

#[test]
fn test_straight_line_cost() {
    let f = Fixture::new(&TerrainGrid::new(8, 3, CellTerrain::shallow()), NavConfig::default());
    let path = f.find((0, 1), (5, 1), &anyone()).unwrap();
    assert_eq!(path.len(), 6);
    assert_eq!(path.cost, 50);
    assert_eq!(path.start(), Some(Cell::new(0, 1)));
    assert_eq!(path.end(), Some(Cell::new(5, 1)));
}

#[test]
fn test_diagonal_steps_cost_fourteen() {
    let f = Fixture::new(&TerrainGrid::new(6, 6, CellTerrain::shallow()), NavConfig::default());
    let path = f.find((0, 0), (3, 3), &anyone()).unwrap();
    assert_eq!(path.cells, vec![Cell::new(0, 0), Cell::new(1, 1), Cell::new(2, 2), Cell::new(3, 3)]);
    assert_eq!(path.cost, 42);
}

#[test]
fn test_no_corner_cutting() {
    let f = Fixture::ascii(
        "
        ...
        #..
        ...
        ",
    );
    let path = f.find((0, 0), (1, 1), &anyone()).unwrap();
    assert_eq!(path.len(), 3, "must step around the wall corner: {:?}", path.cells);
    assert_contiguous(&path);
}

#[test]
fn test_start_on_goal_is_a_one_cell_path() {
    let f = Fixture::ascii("...\n");
    let path = f.find((1, 0), (1, 0), &anyone()).unwrap();
    assert_eq!(path.cells, vec![Cell::new(1, 0)]);
    assert_eq!(path.cost, 0);
}

#[test]
fn test_closed_door_costs_extra_to_open() {
    let closed = Fixture::ascii("..D..\n");
    let open = Fixture::ascii("..d..\n");
    let opener = TraverseParams::with_mode(TraverseMode::PassDoors, Danger::None);
    let through_closed = closed.find((0, 0), (4, 0), &opener).unwrap();
    let through_open = open.find((0, 0), (4, 0), &opener).unwrap();
    assert_eq!(through_closed.cost - through_open.cost, 10 * closed.config.closed_door_extra_cost as u64);
}

#[test]
fn test_closed_door_refuses_walkers() {
    let f = Fixture::ascii("..D..\n");
    let walker = TraverseParams::with_mode(TraverseMode::NoPassClosedDoors, Danger::None);
    assert_eq!(f.find((0, 0), (4, 0), &walker), Err(NoRouteReason::FrontierExhausted));
}

#[test]
fn test_bashing_through_tracked_obstacles() {
    let terrain = TerrainGrid::from_ascii("..%..\n").unwrap();
    let config = NavConfig { track_destroyable_obstacles: true, ..Default::default() };
    let f = Fixture::new(&terrain, config);

    assert!(f.find((0, 0), (4, 0), &anyone()).is_err());
    let basher = TraverseParams::with_mode(TraverseMode::PassAllDestroyableThings, Danger::None);
    let path = f.find((0, 0), (4, 0), &basher).unwrap();
    assert!(path.contains(Cell::new(2, 0)));
}

#[test]
fn test_budget_exhaustion_is_no_route() {
    let terrain = TerrainGrid::new(30, 30, CellTerrain::shallow());
    let f = Fixture::new(&terrain, NavConfig { max_expanded_nodes: 5, ..Default::default() });
    assert!(matches!(
        f.find((0, 0), (29, 29), &anyone()),
        Err(NoRouteReason::BudgetExhausted { expanded: 6 })
    ));
}

#[test]
fn test_identical_queries_give_identical_paths() {
    let f = Fixture::ascii(
        "
        ..........
        ..........
        ...####...
        ..........
        ..........
        ",
    );
    let first = f.find((0, 2), (9, 2), &anyone()).unwrap();
    let mut pf = GridPathfinder::new(f.costs.dims());
    for _ in 0..3 {
        let again = pf.find_path(Cell::new(0, 2), &f.goal(9, 2), &anyone(), &f.grid()).unwrap();
        assert_eq!(again, first);
    }
}

#[test]
fn test_incremental_search_matches_one_shot() {
    let f = Fixture::ascii(
        "
        ....#.....
        .##.#.##..
        .#..#..#..
        .#.....#..
        ...#...#..
        ",
    );
    let one_shot = f.find((0, 0), (9, 4), &anyone()).unwrap();

    let mut pf = GridPathfinder::new(f.costs.dims());
    pf.begin(Cell::new(0, 0), &f.goal(9, 4), &anyone(), &f.grid());
    let mut steps = 0;
    let path = loop {
        match pf.step(&f.grid(), 2) {
            SearchStatus::InProgress { .. } => steps += 1,
            SearchStatus::Found(path) => break path,
            SearchStatus::Failed(reason) => panic!("search failed: {reason:?}"),
        }
    };
    assert!(steps > 1);
    assert!(!pf.is_active());
    assert_eq!(path.cells, one_shot.cells);
    assert_eq!(path.cost, one_shot.cost);
}

#[test]
fn test_cancel_releases_the_search() {
    let f = Fixture::new(&TerrainGrid::new(20, 20, CellTerrain::shallow()), NavConfig::default());
    let mut pf = GridPathfinder::new(f.costs.dims());
    pf.begin(Cell::new(0, 0), &f.goal(19, 19), &anyone(), &f.grid());
    assert!(matches!(pf.step(&f.grid(), 1), SearchStatus::InProgress { .. }));
    assert!(pf.cancel());
    assert!(!pf.is_active());
    assert_eq!(pf.step(&f.grid(), 10), SearchStatus::Failed(NoRouteReason::Cancelled));
    assert!(!pf.cancel());
}

/// Plain Dijkstra over the same 4-connected costs.
fn reference_cost(costs: &MovementCostGrid, from: Cell, to: Cell) -> Option<u64> {
    let dims = costs.dims();
    let mut best = vec![u64::MAX; dims.area()];
    let mut heap = BinaryHeap::new();
    best[dims.index(from)] = 0;
    heap.push(Reverse((0u64, from)));
    while let Some(Reverse((d, cell))) = heap.pop() {
        if cell == to {
            return Some(d);
        }
        if d > best[dims.index(cell)] {
            continue;
        }
        for dir in Direction::CARDINAL {
            let next = cell.step(dir);
            if !costs.is_passable(next) {
                continue;
            }
            let nd = d + costs.cost_at(next) as u64 * 10;
            let slot = &mut best[dims.index(next)];
            if nd < *slot {
                *slot = nd;
                heap.push(Reverse((nd, next)));
            }
        }
    }
    None
}

#[test]
fn test_costs_are_optimal_on_random_maps() {
    for seed in [1u64, 2, 99] {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut terrain = TerrainGrid::new(16, 16, CellTerrain::shallow());
        for cell in terrain.dims().cells().collect::<Vec<_>>() {
            match rng.u8(0..10) {
                0 | 1 => terrain.set(cell, CellTerrain::wall()),
                2 => terrain.set(cell, CellTerrain::deep()),
                _ => true,
            };
        }
        let config = NavConfig { allow_diagonal: false, ..Default::default() };
        let f = Fixture::new(&terrain, config);
        let params = anyone();

        for _ in 0..20 {
            let a = Cell::new(rng.i32(0..16), rng.i32(0..16));
            let b = Cell::new(rng.i32(0..16), rng.i32(0..16));
            if !f.costs.is_passable(a) || !f.costs.is_passable(b) {
                continue;
            }
            let expected = reference_cost(&f.costs, a, b);
            let found = f.find((a.x, a.z), (b.x, b.z), &params);
            match (expected, found) {
                (Some(cost), Ok(path)) => {
                    assert_eq!(path.cost, cost, "seed {seed}: {a} -> {b}");
                    assert_contiguous(&path);
                }
                (None, Err(_)) => {}
                (expected, found) => panic!("seed {seed}: {a} -> {b}: {expected:?} vs {found:?}"),
            }
        }
    }
}
