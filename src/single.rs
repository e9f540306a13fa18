//! 単一値のストリーミング実行。
//! ワーカープールを通さず、専用スレッドから報告チャネルへ直接レポートを流す。

use crossbeam_channel::{bounded, Receiver};
use num_bigint::BigUint;
use num_traits::Zero;
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};

use crate::config::StreamConfig;
use crate::error::TrajectoryError;
use crate::trajectory::{self, ProgressReport, StreamOutcome};

/// 実行中の単一値ストリーム
pub struct SingleRun {
    reports: Receiver<ProgressReport>,
    handle: JoinHandle<Result<StreamOutcome, TrajectoryError>>,
}

impl SingleRun {
    /// レポートの受信口。terminated = true のレポートが最後で、その後に閉じる。
    pub fn reports(&self) -> &Receiver<ProgressReport> {
        &self.reports
    }

    /// 計算の終了を待つ。受信口を先に落とすとその時点で計算は打ち切られる。
    pub fn wait(self) -> Result<StreamOutcome, TrajectoryError> {
        let SingleRun { reports, handle } = self;
        drop(reports);
        match handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// number の軌道計算を別スレッドで開始する。
/// 報告チャネルは無バッファで、表示側が受け取るまで計算は進まない。
pub fn start_single(number: BigUint, config: &StreamConfig) -> Result<SingleRun, TrajectoryError> {
    if number.is_zero() {
        return Err(TrajectoryError::ZeroStart);
    }

    let (tx, reports) = bounded(0);
    let config = config.clone();
    let handle = thread::Builder::new()
        .name("collatz-single".into())
        .spawn(move || {
            tracing::debug!(%number, every = config.report_frequency.get(), "single trajectory started");
            let outcome = trajectory::run_streaming(&number, &config, |report| {
                match tx.send(report) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => {
                        tracing::debug!("report receiver dropped; cancelling trajectory");
                        ControlFlow::Break(())
                    }
                }
            })?;
            tracing::debug!(steps = outcome.steps, "single trajectory finished");
            Ok(outcome)
        })?;

    Ok(SingleRun { reports, handle })
}
