use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::models::{
    common::{Circle, Point, WorldState},
    config::SimConfig,
    geometry::{closest_point_on_segment, dominance_circle, segment_circle_intersection},
};

/// 防衛側の戦術状態
///
/// 各防衛側につき1つ保持され、ステップをまたいで持続します。
/// Interceptは終端状態で、一度遷移すると離脱しません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlState {
    /// 既定の姿勢。支配円をゴール・侵入者間の線分へ寄せる
    #[default]
    Travel,
    /// 支配円が保護区域の境界に届いた後の協調配置
    Engage,
    /// 迎撃機会が幾何的に保証された（終端）
    Intercept,
}

/// 状態遷移の判断に使う、1ステップ分の幾何的事実
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefenderGeometry {
    /// 自身の支配円
    pub dominance: Circle,
    /// 侵入者→ゴール中心の線分と支配円の交点（侵入者に最も近いもの）
    pub interception_point: Option<Point>,
    /// 支配円が保護区域の境界と交わるか
    pub touches_zone: bool,
}

impl DefenderGeometry {
    /// 現在のスナップショットから幾何的事実を評価
    ///
    /// # 戻り値
    ///
    /// 防衛側と侵入者が同一位置の場合は `SimError::DegenerateGeometry`
    pub fn evaluate(defender_pos: &Point, world: &WorldState, speed_ratio: f64) -> Result<Self, SimError> {
        let intruder_pos = world.intruder.position;
        let goal_center = world.protected_zone.center;
        let dominance = dominance_circle(defender_pos, &intruder_pos, speed_ratio)?;

        Ok(Self {
            dominance,
            interception_point: segment_circle_intersection(&intruder_pos, &goal_center, &dominance),
            touches_zone: dominance.intersects_boundary(&world.protected_zone),
        })
    }
}

/// 状態遷移関数（優先度の高い順に評価）
///
/// 1. Intercept → Intercept（終端）
/// 2. 侵入者→ゴール中心の線分が支配円と交わる → Intercept
/// 3. 支配円が保護区域の境界と交わる → Engage
/// 4. それ以外 → Travel
pub fn next_control_state(current: ControlState, facts: &DefenderGeometry) -> ControlState {
    if current == ControlState::Intercept {
        return ControlState::Intercept;
    }
    if facts.interception_point.is_some() {
        return ControlState::Intercept;
    }
    if facts.touches_zone {
        ControlState::Engage
    } else {
        ControlState::Travel
    }
}

/// 支配円上でゴール・侵入者線分に最も近い点（Travel/Engageの目標点）
///
/// 無限半径円（k=1）の場合は、防衛側位置を線分へ射影した点を返します。
pub fn engagement_target(dominance: &Circle, defender_pos: &Point, goal_center: &Point, intruder_pos: &Point) -> Point {
    if dominance.is_unbounded() {
        return closest_point_on_segment(goal_center, intruder_pos, defender_pos);
    }

    let foot = closest_point_on_segment(goal_center, intruder_pos, &dominance.center);
    let offset = foot - dominance.center;
    let distance = offset.magnitude();

    if distance > dominance.radius {
        dominance.center + offset * (dominance.radius / distance)
    } else {
        foot
    }
}

/// Travel状態の速度: 目標点へ最大速度で向かう
pub fn travel_velocity(defender_pos: &Point, target: &Point, max_speed: f64) -> Point {
    defender_pos.toward(target, max_speed)
}

/// Engage状態の局所損失
///
/// L(p) = |p - T|² + w_repel · Σ max(0, ε - |p - q_j|)²
pub fn engage_loss(position: &Point, target: &Point, others: &[Point], config: &SimConfig) -> f64 {
    let attraction = (*position - *target).dot(&(*position - *target));
    let repulsion: f64 = others
        .iter()
        .map(|other| (config.epsilon - position.distance_to(other)).max(0.0).powi(2))
        .sum();

    attraction + config.w_repel * repulsion
}

/// `engage_loss` の解析的勾配
///
/// 位置が一致する防衛側（距離0）は方向が定義できないため寄与しません。
pub fn engage_gradient(position: &Point, target: &Point, others: &[Point], config: &SimConfig) -> Point {
    let mut gradient = (*position - *target) * 2.0;

    for other in others {
        let separation = position.distance_to(other);
        if separation <= 0.0 || separation >= config.epsilon {
            continue;
        }
        let away = (*position - *other) * (1.0 / separation);
        gradient = gradient - away * (2.0 * config.w_repel * (config.epsilon - separation));
    }

    gradient
}

/// Engage状態の速度: 勾配降下1ステップ分の変位を最大速度でクリップ
pub fn engage_velocity(position: &Point, target: &Point, others: &[Point], config: &SimConfig) -> Point {
    let gradient = engage_gradient(position, target, others, config);
    (-gradient * config.learning_rate).clamp_magnitude(config.defender_speed)
}

/// Intercept状態の速度: 迎撃点へ最大速度で向かう
///
/// Interceptは持続するため迎撃点が失われることがあり、その場合は停止します。
pub fn intercept_velocity(defender_pos: &Point, interception_point: Option<Point>, max_speed: f64) -> Point {
    match interception_point {
        Some(aim) => defender_pos.toward(&aim, max_speed),
        None => Point::ZERO,
    }
}

/// 1防衛側分の制御出力
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DefenderCommand {
    /// 速度指令（大きさは defender_speed 以下）
    pub velocity: Point,
    /// 遷移後の状態
    pub state: ControlState,
    /// 評価に使用した支配円（退化時はNone）
    pub dominance: Option<Circle>,
}

/// 1防衛側の状態遷移と速度合成
///
/// スナップショットと設定のみの純粋関数です。防衛側と侵入者が一致する
/// 退化ケースでは、状態を据え置いて速度ゼロを返します。
pub fn defender_command(world: &WorldState, index: usize, current: ControlState, config: &SimConfig) -> DefenderCommand {
    let position = world.defenders[index].position;
    let intruder_pos = world.intruder.position;
    let goal_center = world.protected_zone.center;

    let facts = match DefenderGeometry::evaluate(&position, world, config.speed_ratio()) {
        Ok(facts) => facts,
        Err(_) => {
            return DefenderCommand {
                velocity: Point::ZERO,
                state: current,
                dominance: None,
            };
        }
    };

    let state = next_control_state(current, &facts);
    let velocity = match state {
        ControlState::Travel => {
            let target = engagement_target(&facts.dominance, &position, &goal_center, &intruder_pos);
            travel_velocity(&position, &target, config.defender_speed)
        }
        ControlState::Engage => {
            let target = engagement_target(&facts.dominance, &position, &goal_center, &intruder_pos);
            let others: Vec<Point> = world
                .defenders
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .map(|(_, defender)| defender.position)
                .collect();
            engage_velocity(&position, &target, &others, config)
        }
        ControlState::Intercept => {
            intercept_velocity(&position, facts.interception_point, config.defender_speed)
        }
    };

    DefenderCommand {
        velocity,
        state,
        dominance: Some(facts.dominance),
    }
}

/// 全防衛側の制御出力を計算
///
/// 各防衛側は同じスナップショットから独立に評価されるため、
/// 結果は評価順序に依存しません。`states` が防衛側より短い場合、不足分はTravelとして扱います。
pub fn defender_commands(world: &WorldState, states: &[ControlState], config: &SimConfig) -> Vec<DefenderCommand> {
    (0..world.defenders.len())
        .map(|index| {
            let current = states.get(index).copied().unwrap_or_default();
            defender_command(world, index, current, config)
        })
        .collect()
}
