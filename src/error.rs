use num_bigint::BigUint;
use std::io;
use thiserror::Error;

/// 範囲走査の開始前に検出されるエラー。
/// いずれも作業を一切ディスパッチする前に返る。
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("upper bound {upper} is below lower bound {lower}")]
    InvalidRange { lower: BigUint, upper: BigUint },
    #[error("range bounds must be at least 1")]
    ZeroBound,
    #[error("worker pool must have at least one worker")]
    EmptyPool,
    #[error("range [{lower}, {upper}) has more than u64::MAX values")]
    RangeTooWide { lower: BigUint, upper: BigUint },
    #[error("failed to spawn scan thread")]
    Spawn(#[from] io::Error),
}

/// 単一値の軌道計算エラー
#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("trajectory start must be at least 1")]
    ZeroStart,
    #[error("trajectory exceeded the history limit of {limit} stones")]
    HistoryLimit { limit: usize },
    #[error("failed to spawn trajectory thread")]
    Spawn(#[from] io::Error),
}

/// 多倍長整数が f64 の範囲に収まらない。
/// 表示用の近似値にしか使われないので、呼び出し側には飽和値として返り、致命的にはならない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value with {bits} bits does not fit in f64")]
pub struct LossyConversion {
    pub bits: u64,
}
