//! 範囲走査のディスパッチャ。
//!
//! [lower, upper) の各値を無バッファの分配チャネルに送り、完了バリアで全件の処理を待ってから
//! ワーカーに停止信号を送り、全員の停止をもう一度バリアで待つ。
//! Stop を受けた場合も残りの値を飛ばすだけで、2段階の停止手順は必ず最後まで行う。

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::aggregate::{AggregateSnapshot, Aggregator, HighWaterState, SequencePoint};
use crate::barrier::CompletionBarrier;
use crate::config::ScanConfig;
use crate::control::{self, ControlGate, ControlHandle, Gate};
use crate::error::ScanError;
use crate::trajectory::SummaryRecord;
use crate::worker::WorkerPool;

/// upper < lower なら InvalidRange、どちらかが 0 なら ZeroBound。
pub fn validate_range(lower: &BigUint, upper: &BigUint) -> Result<(), ScanError> {
    if upper < lower {
        return Err(ScanError::InvalidRange {
            lower: lower.clone(),
            upper: upper.clone(),
        });
    }
    if lower.is_zero() || upper.is_zero() {
        return Err(ScanError::ZeroBound);
    }
    Ok(())
}

/// ディスパッチの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// 実際に送った値の数
    pub dispatched: u64,
    /// Stop で打ち切ったか
    pub stopped: bool,
    /// ワーカーが処理した件数の合計
    pub handled: u64,
}

/// 1回の範囲走査ぶんのワーカープールと分配チャネルを持つ。
/// dispatch で使い切り、使い回さない。
pub struct Dispatcher {
    work: Sender<BigUint>,
    barrier: Arc<CompletionBarrier>,
    gate: ControlGate,
    pool: WorkerPool,
}

impl Dispatcher {
    /// pool_size 本のワーカーを起動する。結果は results に流れる。
    pub fn new(
        pool_size: usize,
        results: Sender<SummaryRecord>,
        gate: ControlGate,
    ) -> Result<Self, ScanError> {
        if pool_size == 0 {
            return Err(ScanError::EmptyPool);
        }
        let (work, work_rx) = bounded(0);
        let barrier = Arc::new(CompletionBarrier::new());
        let pool = WorkerPool::spawn(pool_size, work_rx, results, Arc::clone(&barrier))?;
        Ok(Dispatcher {
            work,
            barrier,
            gate,
            pool,
        })
    }

    /// [lower, upper) を昇順にディスパッチし、全件の処理と全ワーカーの停止を待って返る。
    /// 範囲が不正ならワーカーを止めてからエラーを返す（値は1つも送らない）。
    pub fn dispatch(mut self, lower: &BigUint, upper: &BigUint) -> Result<DispatchReport, ScanError> {
        if let Err(err) = validate_range(lower, upper) {
            self.pool.shutdown();
            return Err(err);
        }

        let mut n = lower.clone();
        let mut dispatched = 0u64;
        let mut stopped = false;

        while n < *upper {
            if self.gate.before_dispatch() == Gate::Stop {
                tracing::info!(next = %n, dispatched, "scan stopped by control signal");
                stopped = true;
                break;
            }
            self.barrier.register(1);
            // 無バッファなので手の空いたワーカーが受け取るまでここでブロックする
            if self.work.send(n.clone()).is_err() {
                self.barrier.ack();
                tracing::warn!(next = %n, "no worker left to receive work");
                break;
            }
            dispatched += 1;
            n += 1u32;
        }
        // 以降の信号は届かないので、送った側に false を返させる
        drop(self.gate);

        // 1段目: 送った値が全て処理されるまで
        self.barrier.wait();
        // 2段目: 全ワーカーが停止を確認するまで
        let handled = self.pool.shutdown();

        Ok(DispatchReport {
            dispatched,
            stopped,
            handled,
        })
    }
}

/// 範囲走査の最終結果
#[derive(Debug, Clone)]
pub struct RangeOutcome {
    pub planned: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub stopped: bool,
    pub high_water: HighWaterState,
    /// ScanConfig::record_lengths が false なら空
    pub lengths: Vec<SequencePoint>,
}

/// 実行中の範囲走査
pub struct RangeScan {
    snapshots: Receiver<AggregateSnapshot>,
    control: ControlHandle,
    handle: JoinHandle<Result<RangeOutcome, ScanError>>,
}

impl RangeScan {
    /// 集計スナップショット。最終スナップショット（finished = true）の後に閉じる。
    pub fn snapshots(&self) -> &Receiver<AggregateSnapshot> {
        &self.snapshots
    }

    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// 走査の終了を待つ。
    /// 自前の制御ハンドルは先に手放すので、一時停止中に他のハンドルも全て落ちていれば Stop 扱いになる。
    pub fn wait(self) -> Result<RangeOutcome, ScanError> {
        let RangeScan { control, handle, .. } = self;
        drop(control);
        match handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// [lower, upper) の範囲走査を別スレッドで開始する。
/// 引数の検証はスレッドを起動する前に行う。
pub fn start_range(
    lower: BigUint,
    upper: BigUint,
    config: &ScanConfig,
) -> Result<RangeScan, ScanError> {
    validate_range(&lower, &upper)?;
    if config.pool_size == 0 {
        return Err(ScanError::EmptyPool);
    }

    let (control, gate) = control::channel();
    let (snapshot_tx, snapshots) = unbounded();
    let config = config.clone();
    let handle = thread::Builder::new()
        .name("collatz-dispatcher".into())
        .spawn(move || run_scan(lower, upper, config, gate, snapshot_tx))?;

    Ok(RangeScan {
        snapshots,
        control,
        handle,
    })
}

fn run_scan(
    lower: BigUint,
    upper: BigUint,
    config: ScanConfig,
    gate: ControlGate,
    snapshots: Sender<AggregateSnapshot>,
) -> Result<RangeOutcome, ScanError> {
    let planned = (&upper - &lower).to_u64().unwrap_or(u64::MAX);
    tracing::info!(%lower, %upper, planned, workers = config.pool_size, "range scan started");

    let (results_tx, results_rx) = bounded(config.results_capacity);
    let aggregator = Aggregator::new(
        results_rx,
        snapshots,
        config.aggregate_cadence,
        planned,
        config.record_lengths,
    );
    let aggregator = thread::Builder::new()
        .name("collatz-aggregator".into())
        .spawn(move || aggregator.run())?;

    // results_tx はワーカーに渡り、全ワーカーの終了で結果チャネルが閉じる
    let report = Dispatcher::new(config.pool_size, results_tx, gate)?.dispatch(&lower, &upper)?;

    let aggregate = match aggregator.join() {
        Ok(aggregate) => aggregate,
        Err(panic) => std::panic::resume_unwind(panic),
    };

    tracing::info!(
        dispatched = report.dispatched,
        completed = aggregate.completed,
        stopped = report.stopped,
        "range scan complete"
    );

    Ok(RangeOutcome {
        planned,
        dispatched: report.dispatched,
        completed: aggregate.completed,
        stopped: report.stopped,
        high_water: aggregate.high_water,
        lengths: aggregate.lengths,
    })
}
