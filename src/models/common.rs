use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// 2次元ベクトル（位置・速度の両方に使用）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 2点間のユークリッド距離
    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// 自身から相手への方位角（ラジアン）
    pub fn angle_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// ベクトルの長さ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    /// 単位ベクトル化（ゼロベクトルはそのまま返す）
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            Self::new(self.x / mag, self.y / mag)
        } else {
            *self
        }
    }

    pub fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn midpoint(&self, other: &Point) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// 大きさを上限でクリップ（方向は保持）
    pub fn clamp_magnitude(&self, max_magnitude: f64) -> Self {
        let mag = self.magnitude();
        if mag > max_magnitude {
            let factor = max_magnitude / mag;
            Self::new(self.x * factor, self.y * factor)
        } else {
            *self
        }
    }

    /// `target` へ向かう大きさ `speed` のベクトル。到達済みならゼロ
    pub fn toward(&self, target: &Point, speed: f64) -> Self {
        (*target - *self).normalize() * speed
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl Neg for Point {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// 円
///
/// 半径 `f64::INFINITY` は速度比 k=1 の垂直二等分線（退化ケース）を表す番兵値です。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    /// 垂直二等分線を表す無限半径の円か
    pub fn is_unbounded(&self) -> bool {
        self.radius.is_infinite()
    }

    /// 点が円の内部（境界含む）にあるか。無限半径円は常にfalse
    pub fn contains_point(&self, point: &Point) -> bool {
        if self.is_unbounded() {
            return false;
        }
        self.center.distance_to(point) <= self.radius
    }

    /// 2つの円周が交わる（接する場合を含む）か
    ///
    /// 一方がもう一方を完全に内包する場合、円周同士は交わらないためfalse。
    pub fn intersects_boundary(&self, other: &Circle) -> bool {
        if self.is_unbounded() || other.is_unbounded() {
            return false;
        }
        let distance = self.center.distance_to(&other.center);
        distance <= self.radius + other.radius && distance >= (self.radius - other.radius).abs()
    }
}

/// エージェントの状態（位置と速度）
///
/// 速度の上限は生成側（コントローラ・プランナー）が保証します。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentState {
    pub position: Point,
    pub velocity: Point,
}

impl AgentState {
    pub fn new(position: Point, velocity: Point) -> Self {
        Self { position, velocity }
    }

    /// 静止状態で配置
    pub fn at(position: Point) -> Self {
        Self::new(position, Point::ZERO)
    }

    /// 陽的オイラー法で1ステップ進めた新しい状態を返す
    pub fn advanced(&self, velocity: Point, dt: f64) -> Self {
        Self::new(self.position + velocity * dt, velocity)
    }
}

/// 保護区域（実行中は固定）
pub type ProtectedZone = Circle;

/// ワールドのスナップショット
///
/// 各ステップで新しい値を生成し、既存のスナップショットは変更しません。
/// 防衛側の数は実行中一定です。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldState {
    pub defenders: Vec<AgentState>,
    pub intruder: AgentState,
    pub protected_zone: ProtectedZone,
}

impl WorldState {
    pub fn new(defenders: Vec<AgentState>, intruder: AgentState, protected_zone: ProtectedZone) -> Self {
        Self {
            defenders,
            intruder,
            protected_zone,
        }
    }

    /// 侵入者から保護区域中心までの距離
    pub fn intruder_distance_to_goal(&self) -> f64 {
        self.intruder.position.distance_to(&self.protected_zone.center)
    }

    /// 侵入者に最も近い防衛側のインデックスと距離
    pub fn nearest_defender(&self) -> Option<(usize, f64)> {
        self.defenders
            .iter()
            .enumerate()
            .map(|(index, defender)| (index, defender.position.distance_to(&self.intruder.position)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// 速度指令を積分した次のスナップショットを生成
    ///
    /// `defender_velocities` の長さは防衛側の数と一致している必要があります。
    pub fn advance(&self, defender_velocities: &[Point], intruder_velocity: Point, dt: f64) -> Self {
        debug_assert_eq!(defender_velocities.len(), self.defenders.len());

        let defenders = self
            .defenders
            .iter()
            .zip(defender_velocities)
            .map(|(defender, velocity)| defender.advanced(*velocity, dt))
            .collect();

        Self {
            defenders,
            intruder: self.intruder.advanced(intruder_velocity, dt),
            protected_zone: self.protected_zone,
        }
    }
}
