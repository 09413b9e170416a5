// 基本的なデータ型とベクトル演算
pub mod common;

// シミュレーション・グリッド・時間進行の設定
pub mod config;

// 支配円と幾何述語
pub mod geometry;

// 侵入者方針のインターフェース（trait）定義
pub mod traits;

// 各エージェントモデルの実装
pub mod defender;
pub mod planner;
pub mod intruder;

// 便利な re-export
pub use common::*;
pub use config::{ClockConfig, GridCell, GridConfig, SimConfig, WorldBounds};
pub use traits::*;
pub use defender::{defender_commands, ControlState, DefenderCommand, DefenderGeometry};
pub use planner::{build_cost_grid, find_path, goal_region, next_waypoint, CostGrid, PathResult};
pub use intruder::{DirectIntruder, EvaderDecision, EvaderPolicyKind, SmartIntruder, VelocitySource};
