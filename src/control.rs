//! 範囲走査の制御信号（一時停止 / 再開 / 1件送り / 中止）。
//!
//! 表示側が ControlHandle から非同期に送り、ディスパッチャだけが ControlGate で受ける。

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Pause,
    Resume,
    Step,
    Stop,
}

/// 制御信号の送信側。clone して複数箇所から送れる。
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<ControlSignal>,
}

impl ControlHandle {
    /// 信号を送る。走査が既に終わっていれば false（信号は捨てられたのではなく届かなかった）。
    pub fn send(&self, signal: ControlSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    pub fn pause(&self) -> bool {
        self.send(ControlSignal::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(ControlSignal::Resume)
    }

    pub fn step(&self) -> bool {
        self.send(ControlSignal::Step)
    }

    pub fn stop(&self) -> bool {
        self.send(ControlSignal::Stop)
    }
}

/// ディスパッチの可否
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Stop,
}

/// ディスパッチャ側の受信口と一時停止状態
#[derive(Debug)]
pub struct ControlGate {
    rx: Receiver<ControlSignal>,
    paused: bool,
}

/// 制御チャネルを作る
pub fn channel() -> (ControlHandle, ControlGate) {
    let (tx, rx) = unbounded();
    (ControlHandle { tx }, ControlGate { rx, paused: false })
}

impl ControlGate {
    /// 各値を送る直前に呼ぶ。
    ///
    /// 実行中は溜まっている信号をブロックせずに処理する。
    /// 一時停止中は Resume / Step / Stop が来るまでブロックする。
    /// Step はちょうど1件を通して一時停止状態に戻る（実行中に来た場合も同じ）。
    /// 一時停止中に送信側が全て落ちたら再開できないので Stop とみなす。
    pub fn before_dispatch(&mut self) -> Gate {
        loop {
            let signal = if self.paused {
                match self.rx.recv() {
                    Ok(signal) => signal,
                    Err(_) => {
                        tracing::warn!("control handles dropped while paused; stopping scan");
                        return Gate::Stop;
                    }
                }
            } else {
                match self.rx.try_recv() {
                    Ok(signal) => signal,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                        return Gate::Proceed
                    }
                }
            };

            tracing::debug!(?signal, paused = self.paused, "control signal");
            match signal {
                ControlSignal::Pause => self.paused = true,
                ControlSignal::Resume => self.paused = false,
                ControlSignal::Step => {
                    self.paused = true;
                    return Gate::Proceed;
                }
                ControlSignal::Stop => return Gate::Stop,
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}
