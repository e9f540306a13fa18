use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rayon::prelude::*;

use crate::aggregate::HighWaterState;
use crate::dispatch::validate_range;
use crate::error::ScanError;
use crate::trajectory;

/// 一括検証の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    /// 計算した数の総数
    pub total_checked: u64,
    /// 最高記録（同値なら小さい数が残る）
    pub high_water: HighWaterState,
}

/// [lower, upper) の最高記録を Rayon で一括計算する。
/// ワーカープール・制御信号・途中経過はなく、結果は到着順に依存しない。
/// プール経由の走査結果と突き合わせる基準値として使う。
pub fn scan_range_parallel(lower: &BigUint, upper: &BigUint) -> Result<VerifyResult, ScanError> {
    validate_range(lower, upper)?;
    let width = (upper - lower).to_u64().ok_or_else(|| ScanError::RangeTooWide {
        lower: lower.clone(),
        upper: upper.clone(),
    })?;

    let high_water = (0..width)
        .into_par_iter()
        .map(|offset| trajectory::run_lean(&(lower + offset)))
        .fold(HighWaterState::default, |mut hw, record| {
            hw.observe(&record);
            hw
        })
        .reduce(HighWaterState::default, merge_leftmost);

    Ok(VerifyResult {
        total_checked: width,
        high_water,
    })
}

/// 左（小さい数の側）を優先して2つの記録を合わせる
fn merge_leftmost(mut left: HighWaterState, right: HighWaterState) -> HighWaterState {
    if right.max_steps_number.is_some()
        && (left.max_steps_number.is_none() || right.max_steps > left.max_steps)
    {
        left.max_steps = right.max_steps;
        left.max_steps_number = right.max_steps_number;
    }
    if right.max_stone_number.is_some()
        && (left.max_stone_number.is_none() || right.max_stone > left.max_stone)
    {
        left.max_stone = right.max_stone;
        left.max_stone_number = right.max_stone_number;
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_range() {
        let result = scan_range_parallel(&BigUint::from(1u64), &BigUint::from(10u64)).unwrap();
        assert_eq!(result.total_checked, 9);
        // 1..10 では 9 が最長 (19 ステップ)、最大の石は 7 と 9 の 52 で 7 が先
        assert_eq!(result.high_water.max_steps, 19);
        assert_eq!(result.high_water.max_steps_number, Some(BigUint::from(9u64)));
        assert_eq!(result.high_water.max_stone, BigUint::from(52u64));
        assert_eq!(result.high_water.max_stone_number, Some(BigUint::from(7u64)));
    }

    #[test]
    fn test_empty_range() {
        let n = BigUint::from(5u64);
        let result = scan_range_parallel(&n, &n).unwrap();
        assert_eq!(result.total_checked, 0);
        assert_eq!(result.high_water, HighWaterState::default());
    }

    #[test]
    fn test_merge_prefers_left_on_tie() {
        let mut a = HighWaterState::default();
        a.max_steps = 5;
        a.max_steps_number = Some(BigUint::from(2u64));
        let mut b = HighWaterState::default();
        b.max_steps = 5;
        b.max_steps_number = Some(BigUint::from(9u64));
        assert_eq!(merge_leftmost(a, b).max_steps_number, Some(BigUint::from(2u64)));
    }
}
