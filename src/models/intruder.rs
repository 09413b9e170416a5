//! # Intruder モジュール
//!
//! 侵入者の行動方針を提供します。
//!
//! - [`SmartIntruder`]: 脅威コスト場上のA*経路に沿って保護区域を目指す
//! - [`DirectIntruder`]: 脅威を無視して保護区域中心へ直進する
//!
//! 経路が見つからない場合、`SmartIntruder` は最寄りの防衛側へ半速で接近し
//! 包囲の隙間を作ろうとします（防衛側がいなければ区域中心へ直進）。

use serde::{Deserialize, Serialize};

use crate::models::{
    common::{Point, WorldState},
    config::{GridConfig, SimConfig},
    planner::{build_cost_grid, find_path, goal_region, next_waypoint, PathResult},
    traits::IEvaderPolicy,
};

/// 経路なし時に最寄りの防衛側へ接近する速度倍率
const FALLBACK_SPEED_FACTOR: f64 = 0.5;

/// シナリオで選択可能な侵入者の方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaderPolicyKind {
    #[default]
    Smart,
    Direct,
}

impl EvaderPolicyKind {
    /// 設定から方針の実体を生成
    pub fn build(&self, grid_config: GridConfig, sim_config: &SimConfig) -> Box<dyn IEvaderPolicy> {
        match self {
            EvaderPolicyKind::Smart => Box::new(SmartIntruder::new(
                grid_config,
                sim_config.intruder_speed,
                sim_config.speed_ratio(),
            )),
            EvaderPolicyKind::Direct => Box::new(DirectIntruder::new(sim_config.intruder_speed)),
        }
    }
}

/// 侵入者速度の決定根拠
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VelocitySource {
    /// A*経路の次のウェイポイントへ
    PlannedPath,
    /// 既にゴール領域内のため区域中心へ
    GoalRegion,
    /// 経路なし、最寄りの防衛側へ半速
    FallbackNearestDefender,
    /// 経路なし、防衛側不在のため区域中心へ
    FallbackGoal,
    /// 直進方針
    Direct,
}

impl VelocitySource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, VelocitySource::FallbackNearestDefender | VelocitySource::FallbackGoal)
    }
}

/// 侵入者の1ステップ分の意思決定
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaderDecision {
    pub velocity: Point,
    pub source: VelocitySource,
    /// 計画経路（A*を使用しない方針ではNone）
    pub path: Option<PathResult>,
}

/// 経路探索に失敗した場合の速度
///
/// # 引数
///
/// * `world` - 現在のワールド
/// * `max_speed` - 侵入者の最大速度
///
/// # 戻り値
///
/// 最寄りの防衛側へ向かう半速の速度、防衛側がいなければ区域中心へ向かう全速の速度
pub fn fallback_velocity(world: &WorldState, max_speed: f64) -> (Point, VelocitySource) {
    let position = world.intruder.position;

    match world.nearest_defender() {
        Some((index, _)) => (
            position.toward(&world.defenders[index].position, max_speed * FALLBACK_SPEED_FACTOR),
            VelocitySource::FallbackNearestDefender,
        ),
        None => (
            position.toward(&world.protected_zone.center, max_speed),
            VelocitySource::FallbackGoal,
        ),
    }
}

/// 脅威回避型の侵入者
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartIntruder {
    grid_config: GridConfig,
    max_speed: f64,
    /// 脅威コスト場の構築に用いる速度比 k
    speed_ratio: f64,
}

impl SmartIntruder {
    pub fn new(grid_config: GridConfig, max_speed: f64, speed_ratio: f64) -> Self {
        Self {
            grid_config,
            max_speed,
            speed_ratio,
        }
    }

    pub fn grid_config(&self) -> &GridConfig {
        &self.grid_config
    }

    /// 現在のワールドに対する計画経路
    pub fn plan(&self, world: &WorldState) -> PathResult {
        let cost_grid = build_cost_grid(world, &self.grid_config, self.speed_ratio);
        let start = self.grid_config.world_to_cell_clamped(&world.intruder.position);
        let goals = goal_region(&world.protected_zone, &self.grid_config);

        find_path(start, &goals, &cost_grid)
    }
}

impl IEvaderPolicy for SmartIntruder {
    fn name(&self) -> &'static str {
        "smart"
    }

    fn decide(&self, world: &WorldState) -> EvaderDecision {
        let path = self.plan(world);
        let position = world.intruder.position;

        if !path.found {
            let (velocity, source) = fallback_velocity(world, self.max_speed);
            return EvaderDecision {
                velocity,
                source,
                path: Some(path),
            };
        }

        let (target, source) = match next_waypoint(&path, &self.grid_config) {
            Some(waypoint) => (waypoint, VelocitySource::PlannedPath),
            None => (world.protected_zone.center, VelocitySource::GoalRegion),
        };

        EvaderDecision {
            velocity: position.toward(&target, self.max_speed),
            source,
            path: Some(path),
        }
    }

    fn max_speed(&self) -> f64 {
        self.max_speed
    }
}

/// 保護区域中心へ直進する侵入者
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectIntruder {
    max_speed: f64,
}

impl DirectIntruder {
    pub fn new(max_speed: f64) -> Self {
        Self { max_speed }
    }
}

impl IEvaderPolicy for DirectIntruder {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn decide(&self, world: &WorldState) -> EvaderDecision {
        EvaderDecision {
            velocity: world
                .intruder
                .position
                .toward(&world.protected_zone.center, self.max_speed),
            source: VelocitySource::Direct,
            path: None,
        }
    }

    fn max_speed(&self) -> f64 {
        self.max_speed
    }
}
