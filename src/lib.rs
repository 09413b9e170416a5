//! # defgame
//!
//! 支配円（アポロニウスの円）に基づく防衛ゲームシミュレータ。
//!
//! - [`models`]: 幾何計算、防衛側コントローラ、脅威コスト場と経路探索、侵入者の方針
//! - [`simulation`]: 固定時間刻みのシミュレーションループと終了判定
//! - [`scenario`]: YAMLシナリオと組み込みプリセット
//! - [`logging`]: tracingによるログ出力の初期化

pub mod error;
pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;

pub use error::{ScenarioError, SimError, SimResult};
