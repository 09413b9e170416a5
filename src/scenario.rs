use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ScenarioError, SimError};
use crate::models::{
    AgentState, Circle, ClockConfig, EvaderPolicyKind, GridConfig, Point, SimConfig, WorldBounds, WorldState,
};
use crate::simulation::SimulationEngine;

/// シナリオメタデータ
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

fn default_intruder_win_ratio() -> f64 {
    ClockConfig::default().intruder_win_ratio
}

fn default_stalemate_distance_ratio() -> f64 {
    ClockConfig::default().stalemate_distance_ratio
}

/// シミュレーション設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    pub stalemate_time_s: f64,
    pub defender_win_distance_m: f64,
    #[serde(default = "default_intruder_win_ratio")]
    pub intruder_win_ratio: f64,
    #[serde(default = "default_stalemate_distance_ratio")]
    pub stalemate_distance_ratio: f64,
}

/// エージェント性能・制御パラメータ
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentsConfig {
    pub defender_speed_mps: f64,
    pub intruder_speed_mps: f64,
    pub learning_rate: f64,
    pub w_repel: f64,
    pub epsilon_m: f64,
}

/// 世界設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorldConfig {
    pub region_rect: RegionRect,
    pub grid: GridSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegionRect {
    pub xmin_m: f64,
    pub xmax_m: f64,
    pub ymin_m: f64,
    pub ymax_m: f64,
}

/// 脅威グリッドの分解能とコスト
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GridSettings {
    pub width: usize,
    pub height: usize,
    pub base_cost: f64,
    pub threat_penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Position2D {
    pub x_m: f64,
    pub y_m: f64,
}

impl Position2D {
    pub fn new(x_m: f64, y_m: f64) -> Self {
        Self { x_m, y_m }
    }

    pub fn to_point(&self) -> Point {
        Point::new(self.x_m, self.y_m)
    }
}

/// 保護区域設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProtectedZoneConfig {
    pub center: Position2D,
    pub radius_m: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DefenderConfig {
    pub id: String,
    pub pos: Position2D,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IntruderConfig {
    pub pos: Position2D,
    #[serde(default)]
    pub policy: EvaderPolicyKind,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub agents: AgentsConfig,
    pub world: WorldConfig,
    pub protected_zone: ProtectedZoneConfig,
    pub defenders: Vec<DefenderConfig>,
    pub intruder: IntruderConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;

        Self::from_yaml(&contents)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ScenarioError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.sim_config().validate()?;
        self.grid_config().validate()?;
        self.clock_config().validate()?;

        if !(self.protected_zone.radius_m > 0.0) {
            return Err(validation("protected zone radius_m must be positive"));
        }

        // 保護区域の中心は脅威グリッドの領域内に置く
        if !self.grid_config().world_bounds.contains(&self.protected_zone.center.to_point()) {
            return Err(validation("protected zone center outside region bounds"));
        }

        let mut ids: Vec<&str> = self.defenders.iter().map(|d| d.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(validation(&format!("duplicate defender id {}", pair[0])));
        }

        Ok(())
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig::new(
            self.agents.learning_rate,
            self.agents.defender_speed_mps,
            self.agents.intruder_speed_mps,
            self.agents.w_repel,
            self.agents.epsilon_m,
        )
    }

    pub fn grid_config(&self) -> GridConfig {
        let rect = &self.world.region_rect;
        let grid = &self.world.grid;
        GridConfig::new(
            grid.width,
            grid.height,
            WorldBounds::new(rect.xmin_m, rect.xmax_m, rect.ymin_m, rect.ymax_m),
            grid.base_cost,
            grid.threat_penalty,
        )
    }

    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig {
            dt: self.sim.dt_s,
            max_simulation_time: self.sim.t_max_s,
            stalemate_time: self.sim.stalemate_time_s,
            defender_win_distance: self.sim.defender_win_distance_m,
            intruder_win_ratio: self.sim.intruder_win_ratio,
            stalemate_distance_ratio: self.sim.stalemate_distance_ratio,
        }
    }

    /// 初期ワールド（全エージェント静止）
    pub fn initial_world(&self) -> WorldState {
        WorldState::new(
            self.defenders.iter().map(|d| AgentState::at(d.pos.to_point())).collect(),
            AgentState::at(self.intruder.pos.to_point()),
            Circle::new(self.protected_zone.center.to_point(), self.protected_zone.radius_m),
        )
    }

    /// シナリオからシミュレーションエンジンを構築
    pub fn build_engine(&self, verbose_level: u8) -> Result<SimulationEngine, ScenarioError> {
        Ok(SimulationEngine::new(
            self.initial_world(),
            self.sim_config(),
            self.grid_config(),
            self.clock_config(),
            self.intruder.policy,
            verbose_level,
        )?)
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒", self.sim.t_max_s);
        println!("膠着判定時間: {:.1}秒", self.sim.stalemate_time_s);
        println!("捕捉距離: {:.2}m", self.sim.defender_win_distance_m);
        println!();

        let rect = &self.world.region_rect;
        println!("=== 世界設定 ===");
        println!(
            "領域: x[{:.1}, {:.1}] y[{:.1}, {:.1}]",
            rect.xmin_m, rect.xmax_m, rect.ymin_m, rect.ymax_m
        );
        println!(
            "脅威グリッド: {}x{} (基本コスト: {}, 脅威ペナルティ: {})",
            self.world.grid.width, self.world.grid.height, self.world.grid.base_cost, self.world.grid.threat_penalty
        );
        println!(
            "保護区域: ({:.1}, {:.1}) 半径 {:.1}m",
            self.protected_zone.center.x_m, self.protected_zone.center.y_m, self.protected_zone.radius_m
        );
        println!();

        println!("=== 防衛側 ===");
        println!(
            "速度: {:.2}m/s (速度比 k = {:.3})",
            self.agents.defender_speed_mps,
            self.sim_config().speed_ratio()
        );
        for defender in &self.defenders {
            println!("  {}: ({:.1}, {:.1})", defender.id, defender.pos.x_m, defender.pos.y_m);
        }
        println!();

        println!("=== 侵入者 ===");
        println!("速度: {:.2}m/s", self.agents.intruder_speed_mps);
        println!("方針: {:?}", self.intruder.policy);
        println!("初期位置: ({:.1}, {:.1})", self.intruder.pos.x_m, self.intruder.pos.y_m);
    }
}

fn validation(message: &str) -> ScenarioError {
    ScenarioError::Validation(SimError::Configuration(message.to_string()))
}

/// 組み込みのデモシナリオ
pub mod presets {
    use super::*;

    /// プリセット名の一覧
    pub const PRESET_NAMES: [&str; 9] = [
        "intercept_success",
        "intruder_breakthrough",
        "engage_cooperative",
        "travel_positioning",
        "fast_intruder_breakthrough",
        "single_defender_overwhelmed",
        "smart_pathfinding_around_defenders",
        "close_call_near_miss",
        "actual_stalemate",
    ];

    pub fn preset_names() -> &'static [&'static str] {
        &PRESET_NAMES
    }

    /// 名前からプリセットシナリオを生成
    pub fn preset(name: &str) -> Result<ScenarioConfig, ScenarioError> {
        let scenario = match name {
            "intercept_success" => base(
                name,
                "防衛側の迎撃戦術による防衛成功",
                &[(12.0, 6.0), (8.0, -8.0), (-10.0, 2.0)],
                (20.0, 15.0),
                (3.5, 4.0),
                15.0,
            ),
            "intruder_breakthrough" => base(
                name,
                "経路探索による侵入者の突破",
                &[(15.0, 10.0), (-8.0, -8.0)],
                (18.0, -12.0),
                (2.5, 4.5),
                20.0,
            ),
            "engage_cooperative" => base(
                name,
                "Engage状態を経由した協調迎撃",
                &[(17.0, 5.0), (-8.0, 11.0), (-13.0, -11.0)],
                (15.0, 15.0),
                (3.0, 3.8),
                18.0,
            ),
            "travel_positioning" => base(
                name,
                "Travel状態からの再配置と迎撃",
                &[(3.0, 19.0), (13.0, 13.0), (-11.0, 17.0)],
                (12.0, 20.0),
                (3.0, 4.0),
                25.0,
            ),
            "fast_intruder_breakthrough" => {
                let mut scenario = base(
                    name,
                    "配置の悪い防衛側を高速な侵入者が突破",
                    &[(15.0, 15.0), (-10.0, -10.0)],
                    (20.0, 5.0),
                    (2.0, 6.0),
                    15.0,
                );
                scenario.sim.defender_win_distance_m = 0.8;
                scenario
            }
            "single_defender_overwhelmed" => base(
                name,
                "単独の防衛側が高速な侵入者に突破される",
                &[(8.0, 8.0)],
                (18.0, -12.0),
                (3.0, 4.5),
                12.0,
            ),
            "smart_pathfinding_around_defenders" => base(
                name,
                "防衛陣形を迂回する経路探索（陣形が迎撃）",
                &[(10.0, 0.0), (0.0, 10.0), (-10.0, 0.0)],
                (22.0, 22.0),
                (2.8, 5.0),
                18.0,
            ),
            "close_call_near_miss" => {
                let mut scenario = base(
                    name,
                    "捕捉距離0.3mでの僅差の迎撃",
                    &[(12.0, 8.0), (8.0, -12.0)],
                    (25.0, 2.0),
                    (3.8, 4.0),
                    20.0,
                );
                scenario.sim.defender_win_distance_m = 0.3;
                scenario
            }
            "actual_stalemate" => {
                let mut scenario = base(
                    name,
                    "遠方の防衛側と低速な侵入者による膠着",
                    &[(20.0, 10.0), (20.0, -10.0), (-25.0, 0.0)],
                    (28.0, 0.0),
                    (1.0, 1.5),
                    12.0,
                );
                scenario.sim.stalemate_time_s = 10.0;
                // 全エージェントを領域内に収める
                scenario.world.region_rect = RegionRect {
                    xmin_m: -30.0,
                    xmax_m: 30.0,
                    ymin_m: -30.0,
                    ymax_m: 30.0,
                };
                scenario.world.grid.width = 60;
                scenario.world.grid.height = 60;
                scenario
            }
            _ => return Err(ScenarioError::UnknownPreset(name.to_string())),
        };

        scenario.validate()?;
        Ok(scenario)
    }

    fn base(
        name: &str,
        description: &str,
        defenders: &[(f64, f64)],
        intruder: (f64, f64),
        (defender_speed, intruder_speed): (f64, f64),
        t_max_s: f64,
    ) -> ScenarioConfig {
        let clock = ClockConfig::default();
        let agents = SimConfig::default();

        ScenarioConfig {
            meta: ScenarioMeta {
                version: "1.0".to_string(),
                name: name.to_string(),
                description: description.to_string(),
            },
            sim: SimulationConfig {
                dt_s: clock.dt,
                t_max_s,
                stalemate_time_s: clock.stalemate_time,
                defender_win_distance_m: clock.defender_win_distance,
                intruder_win_ratio: clock.intruder_win_ratio,
                stalemate_distance_ratio: clock.stalemate_distance_ratio,
            },
            agents: AgentsConfig {
                defender_speed_mps: defender_speed,
                intruder_speed_mps: intruder_speed,
                learning_rate: agents.learning_rate,
                w_repel: agents.w_repel,
                epsilon_m: agents.epsilon,
            },
            world: WorldConfig {
                region_rect: RegionRect {
                    xmin_m: -20.0,
                    xmax_m: 20.0,
                    ymin_m: -20.0,
                    ymax_m: 20.0,
                },
                grid: GridSettings {
                    width: 40,
                    height: 40,
                    base_cost: 1.0,
                    threat_penalty: 1000.0,
                },
            },
            protected_zone: ProtectedZoneConfig {
                center: Position2D::new(0.0, 0.0),
                radius_m: 2.0,
            },
            defenders: defenders
                .iter()
                .enumerate()
                .map(|(index, &(x, y))| DefenderConfig {
                    id: format!("D{}", index + 1),
                    pos: Position2D::new(x, y),
                })
                .collect(),
            intruder: IntruderConfig {
                pos: Position2D::new(intruder.0, intruder.1),
                policy: EvaderPolicyKind::Smart,
            },
        }
    }
}
