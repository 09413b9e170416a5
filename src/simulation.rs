//! # Simulation モジュール
//!
//! 防衛ゲームの中核となるシミュレーションエンジンを提供します。
//!
//! 固定時間刻み（Δt）のループで、侵入者の方針と各防衛側のコントローラを
//! 同一スナップショットから評価し、陽的オイラー法で積分します。
//!
//! ## シミュレーション処理順序
//!
//! 各時間刻みにおいて、以下の順序で処理が実行されます：
//!
//! 1. **侵入者処理**: 脅威コスト場上の経路探索による速度決定
//! 2. **防衛側処理**: 状態遷移と速度合成（1と同じスナップショットを参照）
//! 3. **積分**: 全エージェントの位置を更新した新しいスナップショットを生成
//! 4. **終了判定**: 侵入者勝利 → 防衛側勝利 → タイムアウト → 膠着 の優先順
//!
//! ## 使用例
//!
//! ```no_run
//! use defgame::scenario::ScenarioConfig;
//!
//! let config = ScenarioConfig::from_file("scenarios/baseline.yaml")?;
//! let mut engine = config.build_engine(1)?;
//!
//! let result = engine.run(|snapshot| {
//!     println!("t={:.2} states={:?}", snapshot.state.elapsed, snapshot.state.states);
//! });
//! println!("{}", result.winner);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, trace, warn};

use crate::error::{SimError, SimResult};
use crate::models::{
    defender::{defender_commands, ControlState, DefenderCommand},
    geometry::coverage_arc,
    intruder::{EvaderDecision, EvaderPolicyKind},
    traits::IEvaderPolicy,
    ClockConfig, GridConfig, Point, SimConfig, WorldState,
};

/// 勝者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Winner {
    Defenders,
    Intruder,
    Stalemate,
    Timeout,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Winner::Defenders => "DEFENDERS",
            Winner::Intruder => "INTRUDER",
            Winner::Stalemate => "STALEMATE",
            Winner::Timeout => "TIMEOUT",
        };
        f.write_str(label)
    }
}

/// シミュレーション結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub winner: Winner,
    pub time_elapsed: f64,
    /// 防衛側勝利時は防衛側・侵入者間、それ以外は侵入者・区域中心間の距離
    pub final_distance: f64,
    pub reason: String,
}

impl SimulationResult {
    fn new(winner: Winner, time_elapsed: f64, final_distance: f64, reason: impl Into<String>) -> Self {
        Self {
            winner,
            time_elapsed,
            final_distance,
            reason: reason.into(),
        }
    }
}

/// ステップ間で持ち越される状態
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationState {
    pub step: u64,
    /// 経過時間 = step × dt
    pub elapsed: f64,
    pub world: WorldState,
    /// 防衛側ごとの戦術状態（防衛側と同じ順序）
    pub states: Vec<ControlState>,
}

impl SimulationState {
    pub fn initial(world: WorldState) -> Self {
        let states = vec![ControlState::Travel; world.defenders.len()];
        Self {
            step: 0,
            elapsed: 0.0,
            world,
            states,
        }
    }
}

/// 防衛側の状態遷移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub defender: usize,
    pub from: ControlState,
    pub to: ControlState,
}

/// 1ステップの出力
///
/// 描画などの外部処理は `run` のオブザーバーでこの値を受け取ります。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSnapshot {
    /// 積分後の状態
    pub state: SimulationState,
    /// 積分前のスナップショットに対する防衛側の指令
    pub commands: Vec<DefenderCommand>,
    /// 侵入者の意思決定（速度の根拠と計画経路）
    pub evader: EvaderDecision,
    pub transitions: Vec<StateTransition>,
}

/// 終了条件の判定
///
/// # 引数
///
/// * `world` - 積分後のワールド
/// * `elapsed` - 経過時間
/// * `clock` - 時間進行設定
///
/// # 戻り値
///
/// 終了していれば結果。優先順位は 侵入者 > 防衛側 > タイムアウト > 膠着。
pub fn evaluate_end_conditions(world: &WorldState, elapsed: f64, clock: &ClockConfig) -> Option<SimulationResult> {
    let zone_radius = world.protected_zone.radius;
    let goal_distance = world.intruder_distance_to_goal();

    if goal_distance <= clock.intruder_win_ratio * zone_radius {
        return Some(SimulationResult::new(
            Winner::Intruder,
            elapsed,
            goal_distance,
            "侵入者が保護区域に到達",
        ));
    }

    if let Some((index, distance)) = world.nearest_defender() {
        if distance <= clock.defender_win_distance {
            return Some(SimulationResult::new(
                Winner::Defenders,
                elapsed,
                distance,
                format!("防衛側{}が侵入者を捕捉", index),
            ));
        }
    }

    if elapsed >= clock.max_simulation_time {
        return Some(SimulationResult::new(
            Winner::Timeout,
            elapsed,
            goal_distance,
            "最大シミュレーション時間に到達",
        ));
    }

    if elapsed >= clock.stalemate_time && goal_distance > clock.stalemate_distance_ratio * zone_radius {
        return Some(SimulationResult::new(
            Winner::Stalemate,
            elapsed,
            goal_distance,
            "侵入者が保護区域に接近できず膠着",
        ));
    }

    None
}

fn ensure_finite(label: &str, point: &Point) -> SimResult<()> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(SimError::NonFiniteState(format!("{} = ({}, {})", label, point.x, point.y)))
    }
}

pub struct SimulationEngine {
    pub sim_config: SimConfig,
    pub clock: ClockConfig,
    pub state: SimulationState,
    pub verbose_level: u8,
    policy: Box<dyn IEvaderPolicy>,
}

impl SimulationEngine {
    /// エンジンを構築
    ///
    /// 設定が不正な場合は `SimError::Configuration` を返し、ループは開始しません。
    pub fn new(
        world: WorldState,
        sim_config: SimConfig,
        grid_config: GridConfig,
        clock: ClockConfig,
        policy: EvaderPolicyKind,
        verbose_level: u8,
    ) -> SimResult<Self> {
        sim_config.validate()?;
        grid_config.validate()?;
        clock.validate()?;

        let zone = &world.protected_zone;
        if !(zone.radius > 0.0) || !zone.radius.is_finite() || !zone.center.is_finite() {
            return Err(SimError::Configuration(
                "protected zone radius must be positive and finite".to_string(),
            ));
        }
        let positions_finite = world.intruder.position.is_finite()
            && world.defenders.iter().all(|defender| defender.position.is_finite());
        if !positions_finite {
            return Err(SimError::Configuration("agent positions must be finite".to_string()));
        }

        Ok(Self::with_policy(
            world,
            sim_config,
            clock,
            policy.build(grid_config, &sim_config),
            verbose_level,
        ))
    }

    /// 任意の侵入者方針でエンジンを構築（設定検証は呼び出し側の責任）
    pub fn with_policy(
        world: WorldState,
        sim_config: SimConfig,
        clock: ClockConfig,
        policy: Box<dyn IEvaderPolicy>,
        verbose_level: u8,
    ) -> Self {
        Self {
            sim_config,
            clock,
            state: SimulationState::initial(world),
            verbose_level,
            policy,
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// 1ステップ分の遷移（純粋関数）
    ///
    /// 侵入者と防衛側は同じ `state.world` から評価されます。
    /// 速度または積分後の位置が非有限値になった場合は `SimError::NonFiniteState`。
    pub fn step(&self, state: &SimulationState) -> SimResult<StepSnapshot> {
        let world = &state.world;

        let evader = self.policy.decide(world);
        ensure_finite("intruder velocity", &evader.velocity)?;

        let commands = defender_commands(world, &state.states, &self.sim_config);
        for (index, command) in commands.iter().enumerate() {
            ensure_finite(&format!("defender {} velocity", index), &command.velocity)?;
        }

        let velocities: Vec<Point> = commands.iter().map(|command| command.velocity).collect();
        let next_world = world.advance(&velocities, evader.velocity, self.clock.dt);

        ensure_finite("intruder position", &next_world.intruder.position)?;
        for (index, defender) in next_world.defenders.iter().enumerate() {
            ensure_finite(&format!("defender {} position", index), &defender.position)?;
        }

        let transitions = state
            .states
            .iter()
            .zip(&commands)
            .enumerate()
            .filter(|(_, (from, command))| **from != command.state)
            .map(|(defender, (from, command))| StateTransition {
                defender,
                from: *from,
                to: command.state,
            })
            .collect();

        let step = state.step + 1;
        Ok(StepSnapshot {
            state: SimulationState {
                step,
                elapsed: step as f64 * self.clock.dt,
                world: next_world,
                states: commands.iter().map(|command| command.state).collect(),
            },
            commands,
            evader,
            transitions,
        })
    }

    /// 終了条件を満たすまでループを実行
    ///
    /// 各ステップの出力は `observer` に渡されます。内部エラーは伝播せず、
    /// 理由付きの膠着として終了します。
    pub fn run<F>(&mut self, mut observer: F) -> SimulationResult
    where
        F: FnMut(&StepSnapshot),
    {
        let max_steps = self.clock.max_steps();

        info!(
            defenders = self.state.world.defenders.len(),
            intruder_policy = self.policy.name(),
            speed_ratio = self.sim_config.speed_ratio(),
            dt = self.clock.dt,
            max_simulation_time = self.clock.max_simulation_time,
            "SIMULATION_START: シミュレーション実行開始"
        );

        let result = loop {
            if self.state.step >= max_steps {
                break SimulationResult::new(
                    Winner::Timeout,
                    self.state.elapsed,
                    self.state.world.intruder_distance_to_goal(),
                    "ステップ数の上限に到達",
                );
            }

            let snapshot = match self.step(&self.state) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(
                        step = self.state.step,
                        elapsed = self.state.elapsed,
                        error = %e,
                        "SIMULATION_FAULT: 内部エラーにより膠着として終了します"
                    );
                    break SimulationResult::new(
                        Winner::Stalemate,
                        self.state.elapsed,
                        self.state.world.intruder_distance_to_goal(),
                        format!("内部エラー: {}", e),
                    );
                }
            };

            self.log_step(&snapshot);
            observer(&snapshot);

            let outcome = evaluate_end_conditions(&snapshot.state.world, snapshot.state.elapsed, &self.clock);
            self.state = snapshot.state;

            if let Some(result) = outcome {
                break result;
            }
        };

        info!(
            winner = %result.winner,
            time_elapsed = result.time_elapsed,
            final_distance = result.final_distance,
            steps = self.state.step,
            reason = %result.reason,
            "SIMULATION_END: シミュレーション完了"
        );

        result
    }

    fn log_step(&self, snapshot: &StepSnapshot) {
        let state = &snapshot.state;
        let zone = &state.world.protected_zone;

        for transition in &snapshot.transitions {
            let command = &snapshot.commands[transition.defender];
            let covered_arc = command
                .dominance
                .filter(|_| transition.to == ControlState::Engage)
                .map(|dominance| coverage_arc(&dominance, zone));

            info!(
                defender = transition.defender,
                from = ?transition.from,
                to = ?transition.to,
                elapsed = state.elapsed,
                covered_arc = ?covered_arc,
                "DEFENDER_STATE_TRANSITION: 防衛側の戦術状態が遷移しました"
            );
        }

        for (index, command) in snapshot.commands.iter().enumerate() {
            if command.dominance.is_none() {
                warn!(
                    defender = index,
                    elapsed = state.elapsed,
                    "DEFENDER_DEGENERATE_GEOMETRY: 防衛側と侵入者が同一位置のため停止します"
                );
            }
        }

        if snapshot.evader.source.is_fallback() && self.verbose_level > 1 {
            debug!(
                source = ?snapshot.evader.source,
                elapsed = state.elapsed,
                "INTRUDER_FALLBACK: 経路が見つからないため代替行動を取ります"
            );
        }

        if self.verbose_level > 2 {
            trace!(
                "時刻: {:.2}秒 (ステップ: {}) 侵入者: ({:.2}, {:.2})",
                state.elapsed,
                state.step,
                state.world.intruder.position.x,
                state.world.intruder.position.y
            );
        }

        if state.step % 100 == 0 && self.verbose_level > 0 {
            let progress = (state.elapsed / self.clock.max_simulation_time) * 100.0;
            info!(
                "進行状況: {:.1}% ({:.1}/{:.1}秒) 区域中心までの距離: {:.2}",
                progress,
                state.elapsed,
                self.clock.max_simulation_time,
                state.world.intruder_distance_to_goal()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentState, Circle, WorldBounds};

    fn zone() -> Circle {
        Circle::new(Point::ZERO, 2.0)
    }

    fn clock() -> ClockConfig {
        ClockConfig {
            dt: 0.1,
            max_simulation_time: 30.0,
            stalemate_time: 25.0,
            ..ClockConfig::default()
        }
    }

    fn grid() -> GridConfig {
        GridConfig::new(40, 40, WorldBounds::square(20.0), 1.0, 1000.0)
    }

    fn world(defenders: &[Point], intruder: Point) -> WorldState {
        WorldState::new(
            defenders.iter().copied().map(AgentState::at).collect(),
            AgentState::at(intruder),
            zone(),
        )
    }

    #[test]
    fn test_defender_capture_wins() {
        let w = world(&[Point::new(5.0, 0.0)], Point::new(5.3, 0.0));
        let result = evaluate_end_conditions(&w, 1.0, &clock()).unwrap();

        assert_eq!(result.winner, Winner::Defenders);
        assert!((result.final_distance - 0.3).abs() < 1e-9);
        assert_eq!(result.time_elapsed, 1.0);
    }

    #[test]
    fn test_intruder_reaching_zone_wins() {
        let w = world(&[Point::new(10.0, 10.0)], Point::new(1.5, 0.0));
        let result = evaluate_end_conditions(&w, 3.0, &clock()).unwrap();

        assert_eq!(result.winner, Winner::Intruder);
        assert!((result.final_distance - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_intruder_win_takes_priority_over_capture() {
        let w = world(&[Point::new(1.4, 0.0)], Point::new(1.5, 0.0));
        let result = evaluate_end_conditions(&w, 3.0, &clock()).unwrap();

        assert_eq!(result.winner, Winner::Intruder);
    }

    #[test]
    fn test_stalemate_requires_distance_after_stalemate_time() {
        let w = world(&[Point::new(-10.0, 0.0)], Point::new(7.0, 0.0));

        assert!(evaluate_end_conditions(&w, 24.9, &clock()).is_none());
        let result = evaluate_end_conditions(&w, 25.0, &clock()).unwrap();
        assert_eq!(result.winner, Winner::Stalemate);

        // 区域付近で粘っている場合は膠着としない
        let near = world(&[Point::new(-10.0, 0.0)], Point::new(5.0, 0.0));
        assert!(evaluate_end_conditions(&near, 25.0, &clock()).is_none());
    }

    #[test]
    fn test_timeout_beats_stalemate() {
        let w = world(&[Point::new(-10.0, 0.0)], Point::new(7.0, 0.0));
        let result = evaluate_end_conditions(&w, 30.0, &clock()).unwrap();

        assert_eq!(result.winner, Winner::Timeout);
    }

    #[test]
    fn test_new_rejects_invalid_configuration() {
        let mut sim = SimConfig::default();
        sim.defender_speed = 0.0;
        let result = SimulationEngine::new(
            world(&[], Point::new(10.0, 0.0)),
            sim,
            grid(),
            clock(),
            EvaderPolicyKind::Smart,
            0,
        );
        assert!(matches!(result, Err(SimError::Configuration(_))));

        let mut bad_grid = grid();
        bad_grid.height = 0;
        let result = SimulationEngine::new(
            world(&[], Point::new(10.0, 0.0)),
            SimConfig::default(),
            bad_grid,
            clock(),
            EvaderPolicyKind::Smart,
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_step_is_pure_and_advances_clock() {
        let engine = SimulationEngine::new(
            world(&[Point::new(-5.0, 5.0)], Point::new(10.0, 0.0)),
            SimConfig::default(),
            grid(),
            clock(),
            EvaderPolicyKind::Direct,
            0,
        )
        .unwrap();

        let first = engine.step(&engine.state).unwrap();
        let again = engine.step(&engine.state).unwrap();

        assert_eq!(first, again);
        assert_eq!(first.state.step, 1);
        assert!((first.state.elapsed - 0.1).abs() < 1e-12);
        assert!((first.state.world.intruder.position - Point::new(9.6, 0.0)).magnitude() < 1e-12);
        assert_eq!(engine.state.step, 0);
    }

    #[test]
    fn test_direct_intruder_run_ends_with_intruder_win() {
        let mut engine = SimulationEngine::new(
            world(&[], Point::new(10.0, 0.0)),
            SimConfig::default(),
            grid(),
            clock(),
            EvaderPolicyKind::Direct,
            0,
        )
        .unwrap();

        let mut observed = 0;
        let result = engine.run(|_| observed += 1);

        assert_eq!(result.winner, Winner::Intruder);
        assert!(result.final_distance <= 1.8);
        // 10 - 1.8 = 8.2m を 0.4m/ステップで進む
        assert_eq!(observed, 21);
        assert_eq!(engine.state.step, 21);
    }

    #[test]
    fn test_non_finite_velocity_degrades_to_stalemate() {
        struct BrokenPolicy;

        impl IEvaderPolicy for BrokenPolicy {
            fn name(&self) -> &'static str {
                "broken"
            }

            fn decide(&self, _world: &WorldState) -> EvaderDecision {
                EvaderDecision {
                    velocity: Point::new(f64::NAN, 0.0),
                    source: crate::models::VelocitySource::Direct,
                    path: None,
                }
            }

            fn max_speed(&self) -> f64 {
                1.0
            }
        }

        let mut engine = SimulationEngine::with_policy(
            world(&[Point::new(-5.0, 0.0)], Point::new(10.0, 0.0)),
            SimConfig::default(),
            clock(),
            Box::new(BrokenPolicy),
            0,
        );

        let result = engine.run(|_| panic!("no step should be observed"));
        assert_eq!(result.winner, Winner::Stalemate);
        assert!(result.reason.contains("intruder velocity"));
        assert_eq!(engine.state.step, 0);
    }
}
