use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use std::ops::ControlFlow;

use crate::approx;
use crate::config::StreamConfig;
use crate::error::TrajectoryError;

/// ストリーミング軌道の進捗スナップショット。
/// 先頭の石から現在の石までの全履歴を3通りの表現で持つ。
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// 開始値
    pub number: BigUint,
    /// 各石の f64 近似（範囲外は f64::MAX に飽和）
    pub stones: Vec<f64>,
    /// 各石 / 最大石 ∈ [0, 1]
    pub scaled: Vec<f64>,
    /// 各石の10進文字列
    pub digits: Vec<String>,
    /// 直前の石より大きければ true（先頭は常に false）
    pub upward: Vec<bool>,
    /// ここまでのステップ数
    pub steps: u64,
    /// 3n+1 の回数
    pub up_moves: u64,
    /// ÷2 の回数
    pub down_moves: u64,
    /// ここまでの最大石
    pub max_stone: BigUint,
    /// 最大石の f64 近似
    pub max_stone_approx: f64,
    /// 1 に到達したか
    pub terminated: bool,
}

impl ProgressReport {
    /// 上昇ステップの割合 (%)
    pub fn up_percentage(&self) -> f64 {
        let total = self.up_moves + self.down_moves;
        if total == 0 {
            return 0.0;
        }
        self.up_moves as f64 / total as f64 * 100.0
    }

    /// 報告時点の石の数（開始値を含む）
    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }
}

/// 範囲走査用の要約。履歴を持たない。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryRecord {
    pub number: BigUint,
    pub steps: u64,
    pub max_stone: BigUint,
    pub max_stone_digits: String,
}

/// ストリーミング実行の最終状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub steps: u64,
    pub up_moves: u64,
    pub down_moves: u64,
    pub max_stone: BigUint,
    /// false なら sink 側で打ち切られた
    pub reached_one: bool,
}

/// 1ステップ適用する。偶数なら ÷2、奇数なら 3n+1。
/// 上昇（3n+1）なら true を返す。
#[inline]
pub fn step(stone: &mut BigUint) -> bool {
    if stone.is_even() {
        *stone >>= 1u32;
        false
    } else {
        *stone *= 3u32;
        *stone += 1u32;
        true
    }
}

/// 計算途中の軌道
struct Trajectory {
    stone: BigUint,
    start: BigUint,
    steps: u64,
    up_moves: u64,
    down_moves: u64,
    max_stone: BigUint,
    history: Vec<BigUint>,
}

impl Trajectory {
    fn new(start: &BigUint) -> Self {
        Trajectory {
            stone: start.clone(),
            start: start.clone(),
            steps: 0,
            up_moves: 0,
            down_moves: 0,
            max_stone: start.clone(),
            history: vec![start.clone()],
        }
    }

    fn advance(&mut self) {
        if step(&mut self.stone) {
            self.up_moves += 1;
        } else {
            self.down_moves += 1;
        }
        self.steps += 1;
        if self.stone > self.max_stone {
            self.max_stone = self.stone.clone();
        }
        self.history.push(self.stone.clone());
    }

    fn report(&self) -> ProgressReport {
        let len = self.history.len();
        let mut stones = Vec::with_capacity(len);
        let mut scaled = Vec::with_capacity(len);
        let mut digits = Vec::with_capacity(len);
        let mut upward = Vec::with_capacity(len);

        for (idx, s) in self.history.iter().enumerate() {
            stones.push(approx::to_f64_saturating(s));
            scaled.push(approx::ratio(s, &self.max_stone));
            digits.push(s.to_string());
            upward.push(idx > 0 && *s > self.history[idx - 1]);
        }

        ProgressReport {
            number: self.start.clone(),
            stones,
            scaled,
            digits,
            upward,
            steps: self.steps,
            up_moves: self.up_moves,
            down_moves: self.down_moves,
            max_stone: self.max_stone.clone(),
            max_stone_approx: approx::to_f64_saturating(&self.max_stone),
            terminated: self.stone.is_one(),
        }
    }

    fn outcome(self) -> StreamOutcome {
        StreamOutcome {
            reached_one: self.stone.is_one(),
            steps: self.steps,
            up_moves: self.up_moves,
            down_moves: self.down_moves,
            max_stone: self.max_stone,
        }
    }
}

/// 1 に到達するまで反復し、report_frequency ステップごとと終端で sink にレポートを渡す。
/// 終端と周期が重なったステップでは1回だけ渡す。
/// start = 1 はステップ 0 の終端レポートを1回だけ渡す。
///
/// sink が Break を返すとそこで打ち切り、その時点の結果を返す。
/// 収束しない入力に対しては停止しない。
pub fn run_streaming<F>(
    start: &BigUint,
    config: &StreamConfig,
    mut sink: F,
) -> Result<StreamOutcome, TrajectoryError>
where
    F: FnMut(ProgressReport) -> ControlFlow<()>,
{
    if start.is_zero() {
        return Err(TrajectoryError::ZeroStart);
    }
    let frequency = config.report_frequency.get();
    let mut trajectory = Trajectory::new(start);

    if trajectory.stone.is_one() {
        let _ = sink(trajectory.report());
        return Ok(trajectory.outcome());
    }

    while !trajectory.stone.is_one() {
        if let Some(limit) = config.max_history {
            if trajectory.history.len() >= limit {
                return Err(TrajectoryError::HistoryLimit { limit });
            }
        }

        trajectory.advance();

        if trajectory.steps % frequency == 0 || trajectory.stone.is_one() {
            if sink(trajectory.report()).is_break() {
                break;
            }
        }
    }

    Ok(trajectory.outcome())
}

/// 履歴を持たずに要約だけ計算する。
/// u64 に収まる入力は u128 演算で回し、オーバーフローしたら BigUint に切り替える。
///
/// start は 1 以上であること（0 は ÷2 で 0 に留まり停止しない）。
pub fn run_lean(start: &BigUint) -> SummaryRecord {
    assert!(!start.is_zero(), "run_lean requires n >= 1");

    let (steps, max_stone) = match start.to_u64() {
        Some(n) => lean_u128(n),
        None => lean_big(start.clone(), 0, start.clone()),
    };

    SummaryRecord {
        number: start.clone(),
        steps,
        max_stone_digits: max_stone.to_string(),
        max_stone,
    }
}

fn lean_u128(n: u64) -> (u64, BigUint) {
    let overflow_limit = (u128::MAX - 1) / 3;
    let mut current = n as u128;
    let mut max = current;
    let mut steps = 0u64;

    while current != 1 {
        if current % 2 == 0 {
            current >>= 1;
        } else if current <= overflow_limit {
            current = current * 3 + 1;
        } else {
            return lean_big(BigUint::from(current), steps, BigUint::from(max));
        }
        steps += 1;
        if current > max {
            max = current;
        }
    }

    (steps, BigUint::from(max))
}

fn lean_big(mut stone: BigUint, mut steps: u64, mut max: BigUint) -> (u64, BigUint) {
    while !stone.is_one() {
        step(&mut stone);
        steps += 1;
        if stone > max {
            max = stone.clone();
        }
    }
    (steps, max)
}
