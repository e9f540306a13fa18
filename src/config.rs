use std::num::NonZeroU64;

/// 旧来の固定ワーカー数。環境によらず一律なので、既定値には使わない。
pub const LEGACY_POOL_SIZE: usize = 300;

/// 単一値ストリーミングの設定
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// 何ステップごとに進捗レポートを出すか
    pub report_frequency: NonZeroU64,
    /// 保持する石列の上限（None なら無制限）
    pub max_history: Option<usize>,
}

impl StreamConfig {
    pub fn every(report_frequency: NonZeroU64) -> Self {
        StreamConfig {
            report_frequency,
            ..Self::default()
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            report_frequency: NonZeroU64::new(100).unwrap_or(NonZeroU64::MIN),
            max_history: None,
        }
    }
}

/// 範囲走査の設定
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// ワーカー数
    pub pool_size: usize,
    /// 結果チャネルの容量
    pub results_capacity: usize,
    /// 何件完了ごとに集計スナップショットを出すか
    pub aggregate_cadence: NonZeroU64,
    /// 数ごとの (n, steps) 点列を記録するか
    pub record_lengths: bool,
}

impl ScanConfig {
    pub fn with_pool_size(pool_size: usize) -> Self {
        ScanConfig {
            pool_size,
            ..Self::default()
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            pool_size: rayon::current_num_threads(),
            results_capacity: 100_000,
            aggregate_cadence: NonZeroU64::new(1000).unwrap_or(NonZeroU64::MIN),
            record_lengths: true,
        }
    }
}
