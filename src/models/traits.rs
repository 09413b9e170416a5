use crate::models::common::WorldState;
use crate::models::intruder::EvaderDecision;

/// 侵入者の行動方針のインターフェース
///
/// 実装はスナップショットのみから速度を決定する純粋関数であること。
pub trait IEvaderPolicy {
    /// 方針名（ログ・サマリー表示用）
    fn name(&self) -> &'static str;

    /// 現在のワールドから侵入者の速度指令を決定
    fn decide(&self, world: &WorldState) -> EvaderDecision;

    /// 侵入者の最大速度
    fn max_speed(&self) -> f64;
}
