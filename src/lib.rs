//! コラッツ (3n+1) 過程の探索エンジン
//!
//! 多倍長整数1つの軌道を間引きスナップショット付きでストリーミングする経路と、
//! 連続範囲をワーカープールで並行に走査して最高記録を集計する経路を持つ。
//!
//! 範囲走査のデータの流れ:
//! ディスパッチャ → (無バッファ分配チャネル) → ワーカープール → (深いバッファの結果チャネル)
//! → 集約器 → 表示側。ディスパッチャは完了バリアで「全件処理」と「全ワーカー停止」の
//! 2段階を待ってから終了を報告する。

pub mod aggregate;
pub mod approx;
pub mod barrier;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod single;
pub mod trajectory;
pub mod verify;
pub mod worker;

pub use aggregate::{AggregateSnapshot, HighWaterState, SequencePoint};
pub use barrier::CompletionBarrier;
pub use config::{ScanConfig, StreamConfig, LEGACY_POOL_SIZE};
pub use control::{ControlHandle, ControlSignal};
pub use dispatch::{start_range, validate_range, DispatchReport, Dispatcher, RangeOutcome, RangeScan};
pub use error::{LossyConversion, ScanError, TrajectoryError};
pub use single::{start_single, SingleRun};
pub use trajectory::{run_lean, run_streaming, ProgressReport, StreamOutcome, SummaryRecord};
pub use verify::{scan_range_parallel, VerifyResult};
