//! 完了バリア（カウント式の合流点）。
//!
//! register で未完了数を増やし、ack で減らす。wait は未完了数が 0 に戻るまでブロックする。
//! 範囲走査では「値の処理」と「停止の確認」の2フェーズで使うが、
//! 同時に両方の用途には使わない（1フェーズ目を待ち切ってから2フェーズ目を登録する）。

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct CompletionBarrier {
    outstanding: Mutex<u64>,
    drained: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// n 単位の未完了を登録する
    pub fn register(&self, n: u64) {
        *self.outstanding.lock() += n;
    }

    /// 1単位の完了を通知する。登録数を超える ack はプログラムの誤り。
    pub fn ack(&self) {
        let mut outstanding = self.outstanding.lock();
        assert!(*outstanding > 0, "completion barrier acknowledged more than registered");
        *outstanding -= 1;
        if *outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// 未完了数が 0 になるまで待つ。タイムアウトはない。
    pub fn wait(&self) {
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 {
            self.drained.wait(&mut outstanding);
        }
    }

    pub fn outstanding(&self) -> u64 {
        *self.outstanding.lock()
    }
}
