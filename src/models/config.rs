use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::models::common::Point;

/// エージェント制御パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Engage状態の勾配降下ステップ幅
    pub learning_rate: f64,
    /// 防衛側の最大速度
    pub defender_speed: f64,
    /// 侵入者の最大速度
    pub intruder_speed: f64,
    /// 防衛側同士の反発ペナルティの重み
    pub w_repel: f64,
    /// 反発が働く防衛側間距離
    pub epsilon: f64,
}

impl SimConfig {
    pub fn new(learning_rate: f64, defender_speed: f64, intruder_speed: f64, w_repel: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            defender_speed,
            intruder_speed,
            w_repel,
            epsilon,
        }
    }

    /// 速度比 k = defender_speed / intruder_speed
    pub fn speed_ratio(&self) -> f64 {
        self.defender_speed / self.intruder_speed
    }

    pub fn validate(&self) -> SimResult<()> {
        if !is_positive(self.defender_speed) {
            return Err(SimError::Configuration("defender_speed must be finite and positive".to_string()));
        }
        if !is_positive(self.intruder_speed) {
            return Err(SimError::Configuration("intruder_speed must be finite and positive".to_string()));
        }
        if !is_non_negative(self.learning_rate) {
            return Err(SimError::Configuration("learning_rate must be finite and non-negative".to_string()));
        }
        if !is_non_negative(self.w_repel) || !is_non_negative(self.epsilon) {
            return Err(SimError::Configuration(
                "w_repel and epsilon must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new(0.8, 2.0, 4.0, 2.0, 0.3)
    }
}

/// ワールド座標の矩形領域
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl WorldBounds {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self { xmin, xmax, ymin, ymax }
    }

    /// 原点中心、±half_size の正方形
    pub fn square(half_size: f64) -> Self {
        Self::new(-half_size, half_size, -half_size, half_size)
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.xmin && point.x <= self.xmax && point.y >= self.ymin && point.y <= self.ymax
    }
}

/// 脅威グリッドのセル（行・列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

impl GridCell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// 脅威グリッドの設定
///
/// 連続座標とセル座標の対応を定義します。行はy方向、列はx方向です。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    pub world_bounds: WorldBounds,
    pub base_cost: f64,
    pub threat_penalty: f64,
}

impl GridConfig {
    pub fn new(width: usize, height: usize, world_bounds: WorldBounds, base_cost: f64, threat_penalty: f64) -> Self {
        Self {
            width,
            height,
            world_bounds,
            base_cost,
            threat_penalty,
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SimError::Configuration("grid dimensions must be non-zero".to_string()));
        }
        let b = &self.world_bounds;
        if !(b.xmin < b.xmax) || !(b.ymin < b.ymax) {
            return Err(SimError::Configuration("invalid world bounds".to_string()));
        }
        if !(self.base_cost > 0.0) {
            return Err(SimError::Configuration("base_cost must be positive".to_string()));
        }
        if !(self.threat_penalty >= 0.0) {
            return Err(SimError::Configuration("threat_penalty must be non-negative".to_string()));
        }
        Ok(())
    }

    pub fn cell_width(&self) -> f64 {
        (self.world_bounds.xmax - self.world_bounds.xmin) / self.width as f64
    }

    pub fn cell_height(&self) -> f64 {
        (self.world_bounds.ymax - self.world_bounds.ymin) / self.height as f64
    }

    /// セル中心のワールド座標
    pub fn cell_to_world(&self, cell: GridCell) -> Point {
        Point::new(
            self.world_bounds.xmin + (cell.col as f64 + 0.5) * self.cell_width(),
            self.world_bounds.ymin + (cell.row as f64 + 0.5) * self.cell_height(),
        )
    }

    /// ワールド座標を含むセル。領域外ならNone
    pub fn world_to_cell(&self, point: &Point) -> Option<GridCell> {
        if !self.world_bounds.contains(point) {
            return None;
        }
        Some(self.world_to_cell_clamped(point))
    }

    /// ワールド座標に最も近いセル（領域外の点は境界セルへ丸める）
    pub fn world_to_cell_clamped(&self, point: &Point) -> GridCell {
        let col = ((point.x - self.world_bounds.xmin) / self.cell_width()).floor();
        let row = ((point.y - self.world_bounds.ymin) / self.cell_height()).floor();

        GridCell::new(
            clamp_index(row, self.height),
            clamp_index(col, self.width),
        )
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn clamp_index(value: f64, len: usize) -> usize {
    if value.is_nan() || value < 0.0 {
        0
    } else {
        (value as usize).min(len.saturating_sub(1))
    }
}

/// 時間進行と終了判定の設定
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// 固定時間刻み（秒）
    pub dt: f64,
    pub max_simulation_time: f64,
    pub stalemate_time: f64,
    /// 防衛側がこの距離以内に侵入者を捉えたら勝利
    pub defender_win_distance: f64,
    /// 侵入者勝利半径 = intruder_win_ratio × 保護区域半径
    pub intruder_win_ratio: f64,
    /// 膠着判定距離 = stalemate_distance_ratio × 保護区域半径
    pub stalemate_distance_ratio: f64,
}

impl ClockConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !is_positive(self.dt) {
            return Err(SimError::Configuration("dt must be finite and positive".to_string()));
        }
        if !is_positive(self.max_simulation_time) {
            return Err(SimError::Configuration("max_simulation_time must be finite and positive".to_string()));
        }
        if !is_non_negative(self.stalemate_time) || !is_non_negative(self.defender_win_distance) {
            return Err(SimError::Configuration(
                "stalemate_time and defender_win_distance must be finite and non-negative".to_string(),
            ));
        }
        if !is_non_negative(self.intruder_win_ratio) || !is_non_negative(self.stalemate_distance_ratio) {
            return Err(SimError::Configuration(
                "intruder_win_ratio and stalemate_distance_ratio must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// ループの上限ステップ数
    pub fn max_steps(&self) -> u64 {
        (self.max_simulation_time / self.dt).ceil() as u64 + 1
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            dt: 0.05,
            max_simulation_time: 30.0,
            stalemate_time: 25.0,
            defender_win_distance: 0.5,
            intruder_win_ratio: 0.9,
            stalemate_distance_ratio: 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridConfig {
        GridConfig::new(10, 10, WorldBounds::square(5.0), 1.0, 100.0)
    }

    #[test]
    fn test_speed_ratio() {
        let config = SimConfig::new(0.1, 2.0, 4.0, 1.0, 0.1);
        assert_eq!(config.speed_ratio(), 0.5);
    }

    #[test]
    fn test_sim_config_rejects_non_positive_speed() {
        let mut config = SimConfig::default();
        config.defender_speed = 0.0;
        assert!(matches!(config.validate(), Err(SimError::Configuration(_))));

        let mut config = SimConfig::default();
        config.intruder_speed = -1.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.intruder_speed = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sim_config_rejects_nan_weights() {
        let mut config = SimConfig::default();
        config.w_repel = f64::NAN;
        assert!(matches!(config.validate(), Err(SimError::Configuration(_))));

        let mut config = SimConfig::default();
        config.epsilon = f64::NAN;
        assert!(config.validate().is_err());

        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_grid_config_rejects_zero_dimensions() {
        let mut config = grid();
        config.width = 0;
        assert!(matches!(config.validate(), Err(SimError::Configuration(_))));
        assert!(grid().validate().is_ok());
    }

    #[test]
    fn test_cell_world_mapping() {
        let config = grid();

        assert_eq!(config.cell_to_world(GridCell::new(0, 0)), Point::new(-4.5, -4.5));
        assert_eq!(config.world_to_cell(&Point::new(0.2, -0.2)), Some(GridCell::new(4, 5)));
        // 上端は最後のセルに含める
        assert_eq!(config.world_to_cell(&Point::new(5.0, 5.0)), Some(GridCell::new(9, 9)));
        assert_eq!(config.world_to_cell(&Point::new(7.0, 0.0)), None);
    }

    #[test]
    fn test_clamped_mapping_for_outside_points() {
        let config = grid();

        assert_eq!(config.world_to_cell_clamped(&Point::new(25.0, 0.1)), GridCell::new(5, 9));
        assert_eq!(config.world_to_cell_clamped(&Point::new(-25.0, -25.0)), GridCell::new(0, 0));
    }

    #[test]
    fn test_clock_max_steps() {
        let clock = ClockConfig::default();
        assert_eq!(clock.max_steps(), 601);
    }

    #[test]
    fn test_clock_rejects_non_finite_ratios() {
        assert!(ClockConfig::default().validate().is_ok());

        let clock = ClockConfig {
            intruder_win_ratio: f64::NAN,
            ..ClockConfig::default()
        };
        assert!(matches!(clock.validate(), Err(SimError::Configuration(_))));

        let clock = ClockConfig {
            stalemate_distance_ratio: f64::NAN,
            ..ClockConfig::default()
        };
        assert!(clock.validate().is_err());

        let clock = ClockConfig {
            stalemate_distance_ratio: -1.0,
            ..ClockConfig::default()
        };
        assert!(clock.validate().is_err());

        let clock = ClockConfig {
            max_simulation_time: f64::INFINITY,
            ..ClockConfig::default()
        };
        assert!(clock.validate().is_err());
    }
}
