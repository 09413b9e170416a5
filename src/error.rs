//! # Error モジュール
//!
//! シミュレーションコアとシナリオ読み込みで使用するエラー型を定義します。

use std::path::PathBuf;
use thiserror::Error;

/// シミュレーションコアのエラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// 防衛側と侵入者が同一位置にあり、支配円が定義できない
    #[error("退化した幾何: 防衛側と侵入者の位置が一致しています")]
    DegenerateGeometry,

    /// 設定値が不正（起動時に即座に失敗させる）
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// 制御・経路計画の出力に NaN/無限大が含まれた
    #[error("数値異常: {0}")]
    NonFiniteState(String),
}

pub type SimResult<T> = std::result::Result<T, SimError>;

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    Validation(#[from] SimError),

    #[error("不明なプリセット: {0}")]
    UnknownPreset(String),
}
