//! ワーカーとワーカープール。
//!
//! 全ワーカーが1本の分配チャネルと1本の結果チャネルを共有する。
//! 各ワーカーは専用の停止チャネルを持ち、停止を受けたら完了バリアに ack して抜ける。

use crossbeam_channel::{bounded, select, Receiver, Sender};
use num_bigint::BigUint;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::barrier::CompletionBarrier;
use crate::trajectory::{self, SummaryRecord};

/// 1本のワーカースレッドへのハンドル
pub struct Worker {
    id: usize,
    shutdown: Sender<()>,
    handle: JoinHandle<u64>,
}

impl Worker {
    /// ワーカーを起動する。
    /// 値を受けたら要約を計算して results に送り、バリアに ack する。
    /// 停止信号を受けたらバリアに ack して終了する（再開はしない）。
    pub fn spawn(
        id: usize,
        work: Receiver<BigUint>,
        results: Sender<SummaryRecord>,
        barrier: Arc<CompletionBarrier>,
    ) -> io::Result<Self> {
        let (shutdown, stop) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name(format!("collatz-worker-{id}"))
            .spawn(move || run_worker(id, work, stop, results, barrier))?;
        Ok(Worker {
            id,
            shutdown,
            handle,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

fn run_worker(
    id: usize,
    work: Receiver<BigUint>,
    stop: Receiver<()>,
    results: Sender<SummaryRecord>,
    barrier: Arc<CompletionBarrier>,
) -> u64 {
    let mut handled = 0u64;
    loop {
        select! {
            recv(work) -> msg => match msg {
                Ok(n) => {
                    let record = trajectory::run_lean(&n);
                    handled += 1;
                    if results.send(record).is_err() {
                        tracing::warn!(worker = id, number = %n, "results channel closed; dropping summary");
                    }
                    barrier.ack();
                }
                Err(_) => {
                    tracing::debug!(worker = id, handled, "distribution channel closed");
                    break;
                }
            },
            recv(stop) -> msg => {
                // Sender が落ちただけ（起動失敗時の後始末）なら ack は登録されていない
                if msg.is_ok() {
                    barrier.ack();
                }
                tracing::debug!(worker = id, handled, "worker stopped");
                break;
            }
        }
    }
    handled
}

/// 固定サイズのワーカープール。走査ごとに作り直し、走査の終わりに shutdown で解体する。
pub struct WorkerPool {
    workers: Vec<Worker>,
    barrier: Arc<CompletionBarrier>,
}

impl WorkerPool {
    /// size 本のワーカーを起動する。results の元の Sender はここで手放すので、
    /// 全ワーカーが終了した時点で結果チャネルは閉じる。
    pub fn spawn(
        size: usize,
        work: Receiver<BigUint>,
        results: Sender<SummaryRecord>,
        barrier: Arc<CompletionBarrier>,
    ) -> io::Result<Self> {
        let workers = (0..size)
            .map(|id| Worker::spawn(id, work.clone(), results.clone(), Arc::clone(&barrier)))
            .collect::<io::Result<Vec<_>>>()?;
        tracing::debug!(size, "worker pool started");
        Ok(WorkerPool { workers, barrier })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// 全ワーカーに停止信号を送り、全員の ack を待ってからスレッドを回収する。
    /// 呼ぶ前に値処理フェーズのバリアを待ち切っていること。
    /// 戻り値はワーカーごとの処理件数の合計。
    pub fn shutdown(self) -> u64 {
        debug_assert_eq!(self.barrier.outstanding(), 0, "shutdown overlaps the processing phase");

        for worker in &self.workers {
            self.barrier.register(1);
            if worker.shutdown.send(()).is_err() {
                // 既に抜けたワーカーは ack できないので代わりに戻す
                tracing::warn!(worker = worker.id, "worker exited before shutdown");
                self.barrier.ack();
            }
        }
        self.barrier.wait();

        let mut handled = 0u64;
        for worker in self.workers {
            match worker.handle.join() {
                Ok(n) => handled += n,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        tracing::debug!(handled, "worker pool torn down");
        handled
    }
}
