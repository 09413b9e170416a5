//! # Planner モジュール
//!
//! 防衛側の支配円をラスタライズした脅威コスト場と、その上での侵入者経路探索を提供します。
//!
//! ## 処理の流れ
//!
//! 1. **コスト場構築**: 各セル中心がいずれかの支配円内なら `base_cost + threat_penalty`
//! 2. **ゴール領域抽出**: 保護区域の円内にあるすべてのセル
//! 3. **A\*探索**: 8近傍、斜め移動は √2 倍、ゴール領域のうち最も安く到達できるセルを目標
//!
//! コスト場は毎ステップ全面的に再構築します。

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::models::{
    common::{Circle, Point, WorldState},
    config::{GridCell, GridConfig},
    geometry::dominance_circle,
};

/// 脅威コスト場（行優先）
#[derive(Debug, Clone, PartialEq)]
pub struct CostGrid {
    config: GridConfig,
    costs: Vec<f64>,
}

impl CostGrid {
    /// 全セルを基本コストで埋めたコスト場
    pub fn uniform(config: GridConfig) -> Self {
        Self {
            costs: vec![config.base_cost; config.cell_count()],
            config,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.config.width
    }

    pub fn height(&self) -> usize {
        self.config.height
    }

    fn index(&self, cell: GridCell) -> Option<usize> {
        (cell.row < self.config.height && cell.col < self.config.width)
            .then(|| cell.row * self.config.width + cell.col)
    }

    /// セルのコスト。グリッド外はNone
    pub fn cost(&self, cell: GridCell) -> Option<f64> {
        self.index(cell).map(|index| self.costs[index])
    }

    pub fn set_cost(&mut self, cell: GridCell, cost: f64) {
        if let Some(index) = self.index(cell) {
            self.costs[index] = cost;
        }
    }

    /// 脅威セル（いずれかの支配円内）か
    pub fn is_threat(&self, cell: GridCell) -> bool {
        self.cost(cell).is_some_and(|cost| cost > self.config.base_cost)
    }

    pub fn threat_cell_count(&self) -> usize {
        self.costs.iter().filter(|&&cost| cost > self.config.base_cost).count()
    }

    /// 全セル中の最小コスト（A*ヒューリスティックの尺度）
    pub fn min_cost(&self) -> f64 {
        self.costs.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// 経路探索の結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    pub found: bool,
    /// 開始セルから目標セルまでのセル列（開始セルを含む）
    pub path: Vec<GridCell>,
    pub total_cost: f64,
}

impl PathResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            path: Vec::new(),
            total_cost: 0.0,
        }
    }
}

/// 脅威コスト場を構築
///
/// 各セル中心のワールド座標がいずれかの防衛側の支配円内にあれば脅威セルとします
/// （二値判定、距離による重み付けなし）。侵入者と一致する防衛側や、
/// 無限半径の支配円は無視します。
pub fn build_cost_grid(world: &WorldState, grid_config: &GridConfig, speed_ratio: f64) -> CostGrid {
    let circles: Vec<Circle> = world
        .defenders
        .iter()
        .filter_map(|defender| dominance_circle(&defender.position, &world.intruder.position, speed_ratio).ok())
        .filter(|circle| !circle.is_unbounded())
        .collect();

    let mut grid = CostGrid::uniform(*grid_config);
    let threat_cost = grid_config.base_cost + grid_config.threat_penalty;

    for row in 0..grid_config.height {
        for col in 0..grid_config.width {
            let cell = GridCell::new(row, col);
            let center = grid_config.cell_to_world(cell);
            if circles.iter().any(|circle| circle.contains_point(&center)) {
                grid.set_cost(cell, threat_cost);
            }
        }
    }

    grid
}

/// 保護区域の円内に中心があるすべてのセル
///
/// 区域がセルより小さく該当セルがない場合のみ、区域中心を含むセルを返します。
pub fn goal_region(zone: &Circle, grid_config: &GridConfig) -> Vec<GridCell> {
    let low = grid_config.world_to_cell_clamped(&Point::new(zone.center.x - zone.radius, zone.center.y - zone.radius));
    let high = grid_config.world_to_cell_clamped(&Point::new(zone.center.x + zone.radius, zone.center.y + zone.radius));

    let cells: Vec<GridCell> = (low.row..=high.row)
        .flat_map(|row| (low.col..=high.col).map(move |col| GridCell::new(row, col)))
        .filter(|cell| zone.contains_point(&grid_config.cell_to_world(*cell)))
        .collect();

    if cells.is_empty() {
        return grid_config.world_to_cell(&zone.center).into_iter().collect();
    }
    cells
}

/// A* のオープンリスト要素
#[derive(Debug, Clone, Copy, PartialEq)]
struct OpenNode {
    cell: GridCell,
    g_cost: f64,
    h_cost: f64,
    f_cost: f64,
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeapは最大ヒープのため逆順: f昇順 → h昇順 → セル昇順
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
            .then(other.h_cost.partial_cmp(&self.h_cost).unwrap_or(Ordering::Equal))
            .then(other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

fn neighbors(cell: GridCell, width: usize, height: usize) -> impl Iterator<Item = (GridCell, bool)> {
    NEIGHBOR_OFFSETS.iter().filter_map(move |&(dr, dc)| {
        let row = cell.row.checked_add_signed(dr)?;
        let col = cell.col.checked_add_signed(dc)?;
        (row < height && col < width).then(|| (GridCell::new(row, col), dr != 0 && dc != 0))
    })
}

fn cell_distance(a: GridCell, b: GridCell) -> f64 {
    let dr = a.row as f64 - b.row as f64;
    let dc = a.col as f64 - b.col as f64;
    (dr * dr + dc * dc).sqrt()
}

/// 8近傍A*でゴール領域内の最安セルへの経路を探索
///
/// セルへ進入するコストはそのセルのコスト（斜め移動は √2 倍）です。
/// ヒューリスティックは最も近いゴールセルまでのユークリッド距離に最小セルコストを掛けた値で、
/// 最初に取り出されたゴールセルが最安となります。
pub fn find_path(start: GridCell, goal_region: &[GridCell], cost_grid: &CostGrid) -> PathResult {
    let width = cost_grid.width();
    let height = cost_grid.height();

    if cost_grid.cost(start).is_none() {
        return PathResult::not_found();
    }

    let goals: HashSet<GridCell> = goal_region
        .iter()
        .copied()
        .filter(|cell| cost_grid.cost(*cell).is_some_and(f64::is_finite))
        .collect();
    if goals.is_empty() {
        return PathResult::not_found();
    }
    if goals.contains(&start) {
        return PathResult {
            found: true,
            path: vec![start],
            total_cost: 0.0,
        };
    }

    let scale = cost_grid.min_cost().max(0.0);
    let heuristic = |cell: GridCell| -> f64 {
        goals
            .iter()
            .map(|goal| cell_distance(cell, *goal))
            .fold(f64::INFINITY, f64::min)
            * scale
    };

    let index = |cell: GridCell| cell.row * width + cell.col;
    let mut g_scores = vec![f64::INFINITY; width * height];
    let mut came_from: Vec<Option<GridCell>> = vec![None; width * height];
    let mut closed = vec![false; width * height];
    let mut open_set = BinaryHeap::new();

    let start_h = heuristic(start);
    g_scores[index(start)] = 0.0;
    open_set.push(OpenNode {
        cell: start,
        g_cost: 0.0,
        h_cost: start_h,
        f_cost: start_h,
    });

    while let Some(current) = open_set.pop() {
        let current_index = index(current.cell);
        if closed[current_index] {
            continue;
        }
        closed[current_index] = true;

        if goals.contains(&current.cell) {
            return PathResult {
                found: true,
                path: reconstruct_path(current.cell, &came_from, width),
                total_cost: current.g_cost,
            };
        }

        for (neighbor, diagonal) in neighbors(current.cell, width, height) {
            let neighbor_index = index(neighbor);
            if closed[neighbor_index] {
                continue;
            }

            let cell_cost = cost_grid.cost(neighbor).unwrap_or(f64::INFINITY);
            if !cell_cost.is_finite() {
                continue;
            }

            let step_cost = if diagonal { cell_cost * std::f64::consts::SQRT_2 } else { cell_cost };
            let tentative_g = current.g_cost + step_cost;

            if tentative_g < g_scores[neighbor_index] {
                g_scores[neighbor_index] = tentative_g;
                came_from[neighbor_index] = Some(current.cell);

                let h_cost = heuristic(neighbor);
                open_set.push(OpenNode {
                    cell: neighbor,
                    g_cost: tentative_g,
                    h_cost,
                    f_cost: tentative_g + h_cost,
                });
            }
        }
    }

    PathResult::not_found()
}

fn reconstruct_path(goal: GridCell, came_from: &[Option<GridCell>], width: usize) -> Vec<GridCell> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(parent) = came_from[current.row * width + current.col] {
        path.push(parent);
        current = parent;
    }

    path.reverse();
    path
}

/// 経路上で開始セルと異なる最初のセルのワールド座標
pub fn next_waypoint(result: &PathResult, grid_config: &GridConfig) -> Option<Point> {
    if !result.found {
        return None;
    }
    let start = result.path.first()?;
    result
        .path
        .iter()
        .find(|cell| *cell != start)
        .map(|cell| grid_config.cell_to_world(*cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::AgentState;
    use crate::models::config::WorldBounds;

    fn grid(size: usize, half: f64) -> GridConfig {
        GridConfig::new(size, size, WorldBounds::square(half), 1.0, 1000.0)
    }

    #[test]
    fn test_cost_grid_marks_threat_cells_binary() {
        let config = GridConfig::new(10, 10, WorldBounds::square(5.0), 1.0, 1000.0);
        let world = WorldState::new(
            vec![AgentState::at(Point::new(0.0, 0.0)), AgentState::at(Point::new(0.2, 0.0))],
            AgentState::at(Point::new(3.0, 0.0)),
            Circle::new(Point::new(-2.0, 0.0), 1.0),
        );

        let costs = build_cost_grid(&world, &config, 0.5);

        // 防衛側付近のセルは脅威、重なっても加算しない
        let near_defender = config.world_to_cell(&Point::new(0.1, 0.1)).unwrap();
        assert_eq!(costs.cost(near_defender), Some(1001.0));
        let far_corner = GridCell::new(9, 9);
        assert_eq!(costs.cost(far_corner), Some(1.0));
        assert!(costs.threat_cell_count() > 0);
        assert_eq!(costs.min_cost(), 1.0);
    }

    #[test]
    fn test_cost_grid_skips_degenerate_and_unbounded() {
        let config = grid(4, 2.0);
        let world = WorldState::new(
            vec![AgentState::at(Point::new(1.0, 1.0))],
            AgentState::at(Point::new(1.0, 1.0)),
            Circle::new(Point::ZERO, 1.0),
        );

        assert_eq!(build_cost_grid(&world, &config, 0.5).threat_cell_count(), 0);

        let world = WorldState::new(
            vec![AgentState::at(Point::new(-1.0, 1.0))],
            AgentState::at(Point::new(1.0, 1.0)),
            Circle::new(Point::ZERO, 1.0),
        );
        assert_eq!(build_cost_grid(&world, &config, 1.0).threat_cell_count(), 0);
    }

    #[test]
    fn test_goal_region_covers_whole_zone() {
        let config = grid(40, 20.0);
        let region = goal_region(&Circle::new(Point::ZERO, 2.0), &config);

        // 中心 (±0.5|±1.5, ±0.5|±1.5) のうち半径2以内: 4 + 8 = 12 セル
        assert_eq!(region.len(), 12);
        for cell in &region {
            assert!(config.cell_to_world(*cell).magnitude() <= 2.0);
        }
    }

    #[test]
    fn test_goal_region_small_zone_falls_back_to_center_cell() {
        let config = grid(10, 5.0);
        let region = goal_region(&Circle::new(Point::new(0.0, 0.0), 0.1), &config);

        assert_eq!(region, vec![GridCell::new(5, 5)]);
    }

    #[test]
    fn test_find_path_diagonal_on_uniform_grid() {
        let costs = CostGrid::uniform(grid(5, 2.5));
        let result = find_path(GridCell::new(0, 0), &[GridCell::new(4, 4)], &costs);

        assert!(result.found);
        assert_eq!(result.path.len(), 5);
        assert_eq!(result.path[0], GridCell::new(0, 0));
        assert_eq!(*result.path.last().unwrap(), GridCell::new(4, 4));
        assert!((result.total_cost - 4.0 * std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_find_path_picks_cheapest_goal_cell() {
        let mut costs = CostGrid::uniform(grid(7, 3.5));
        // 近いゴールは脅威セル、遠いゴールは安全
        costs.set_cost(GridCell::new(3, 4), 500.0);
        let goals = [GridCell::new(3, 4), GridCell::new(3, 0)];

        let result = find_path(GridCell::new(3, 3), &goals, &costs);

        assert!(result.found);
        assert_eq!(*result.path.last().unwrap(), GridCell::new(3, 0));
        assert!((result.total_cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_find_path_avoids_threat_wall() {
        let mut costs = CostGrid::uniform(grid(7, 3.5));
        for row in 0..6 {
            costs.set_cost(GridCell::new(row, 3), 1000.0);
        }

        let result = find_path(GridCell::new(0, 0), &[GridCell::new(0, 6)], &costs);

        assert!(result.found);
        assert!(result.path.iter().all(|cell| !costs.is_threat(*cell)));
        assert!(result.path.contains(&GridCell::new(6, 3)));
    }

    #[test]
    fn test_find_path_enclosed_start_fails() {
        let mut costs = CostGrid::uniform(grid(3, 1.5));
        for row in 0..3 {
            for col in 0..3 {
                if (row, col) != (1, 0) {
                    costs.set_cost(GridCell::new(row, col), f64::INFINITY);
                }
            }
        }

        let result = find_path(GridCell::new(1, 0), &[GridCell::new(1, 2)], &costs);
        assert!(!result.found);
        assert!(result.path.is_empty());
    }

    #[test]
    fn test_find_path_start_inside_goal_region() {
        let costs = CostGrid::uniform(grid(3, 1.5));
        let result = find_path(GridCell::new(1, 1), &[GridCell::new(1, 1)], &costs);

        assert!(result.found);
        assert_eq!(result.path, vec![GridCell::new(1, 1)]);
        assert_eq!(result.total_cost, 0.0);
        assert_eq!(next_waypoint(&result, costs.config()), None);
    }

    #[test]
    fn test_next_waypoint_is_first_step() {
        let config = grid(5, 2.5);
        let result = find_path(GridCell::new(2, 0), &[GridCell::new(2, 4)], &CostGrid::uniform(config));

        assert_eq!(next_waypoint(&result, &config), Some(Point::new(-1.0, 0.0)));
    }
}
