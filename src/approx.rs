//! 多倍長整数 → f64 の近似変換。
//!
//! グラフ表示用の近似値にのみ使う。f64 の範囲を超える値は f64::MAX に飽和させる。

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::error::LossyConversion;

/// 比率計算で分母を収めるビット幅
const RATIO_BITS: u64 = 64;

/// 正確に（丸めを除いて）f64 へ変換する。範囲外なら LossyConversion。
pub fn try_to_f64(n: &BigUint) -> Result<f64, LossyConversion> {
    n.to_f64()
        .filter(|v| v.is_finite())
        .ok_or(LossyConversion { bits: n.bits() })
}

/// f64 へ変換し、範囲外なら f64::MAX に飽和させる。
pub fn to_f64_saturating(n: &BigUint) -> f64 {
    match try_to_f64(n) {
        Ok(v) => v,
        Err(err) => {
            tracing::trace!(bits = err.bits, "saturating stone to f64::MAX");
            f64::MAX
        }
    }
}

/// value / max を [0, 1] の f64 で返す。
/// 両辺を同じだけ右シフトしてから変換するので、値そのものが飽和する大きさでも比率は保たれる。
pub fn ratio(value: &BigUint, max: &BigUint) -> f64 {
    if max.is_zero() {
        return 0.0;
    }
    let shift = max.bits().saturating_sub(RATIO_BITS);
    let num = to_f64_saturating(&(value >> shift));
    let den = to_f64_saturating(&(max >> shift));
    (num / den).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    #[test]
    fn test_small_values_exact() {
        assert_eq!(try_to_f64(&BigUint::from(9232u64)), Ok(9232.0));
        assert_eq!(to_f64_saturating(&BigUint::one()), 1.0);
    }

    #[test]
    fn test_huge_value_saturates() {
        let huge = BigUint::one() << 2000u32;
        let err = try_to_f64(&huge).unwrap_err();
        assert_eq!(err.bits, 2001);
        assert_eq!(to_f64_saturating(&huge), f64::MAX);
    }

    #[test]
    fn test_ratio_of_huge_values() {
        let max = BigUint::one() << 5000u32;
        let half = BigUint::one() << 4999u32;
        assert_eq!(ratio(&half, &max), 0.5);
        assert_eq!(ratio(&max, &max), 1.0);
    }

    #[test]
    fn test_ratio_zero_max() {
        assert_eq!(ratio(&BigUint::one(), &BigUint::zero()), 0.0);
    }
}
