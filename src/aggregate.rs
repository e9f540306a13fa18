//! 結果の集約と最高記録（high-water mark）の追跡。

use crossbeam_channel::{Receiver, Sender};
use num_bigint::BigUint;
use std::num::NonZeroU64;

use crate::approx;
use crate::trajectory::SummaryRecord;

/// 1回の範囲走査を通しての最高記録。
/// 同値の場合は先に届いた記録が残る（到着順はワーカー間で非決定的）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighWaterState {
    /// 最大ステップ数
    pub max_steps: u64,
    /// 最大ステップ数を出した数
    pub max_steps_number: Option<BigUint>,
    /// 最大の石
    pub max_stone: BigUint,
    /// 最大の石を出した数
    pub max_stone_number: Option<BigUint>,
}

impl HighWaterState {
    /// 記録を反映する。どちらかが更新されたら true。
    pub fn observe(&mut self, record: &SummaryRecord) -> bool {
        let mut changed = false;
        if self.max_steps_number.is_none() || record.steps > self.max_steps {
            self.max_steps = record.steps;
            self.max_steps_number = Some(record.number.clone());
            changed = true;
        }
        if self.max_stone_number.is_none() || record.max_stone > self.max_stone {
            self.max_stone = record.max_stone.clone();
            self.max_stone_number = Some(record.number.clone());
            changed = true;
        }
        changed
    }
}

/// 数ごとのステップ数（系列長グラフ用の点）
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePoint {
    pub number: BigUint,
    /// グラフ用。2^53 を超えると丸まり、f64 の範囲外では f64::MAX
    pub number_approx: f64,
    pub steps: u64,
}

/// 表示側へ送る集計スナップショット
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSnapshot {
    pub completed: u64,
    /// 予定総数 (upper - lower)
    pub planned: u64,
    pub high_water: HighWaterState,
    /// 結果チャネルが閉じた後の最終スナップショットなら true
    pub finished: bool,
}

impl AggregateSnapshot {
    /// 完了率 [0, 1]
    pub fn progress(&self) -> f64 {
        if self.planned == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.planned as f64).min(1.0)
    }
}

/// 集約の最終結果
#[derive(Debug, Clone, Default)]
pub struct AggregateOutcome {
    pub completed: u64,
    pub high_water: HighWaterState,
    pub lengths: Vec<SequencePoint>,
}

/// 結果チャネルを読み切るまで集約を続ける。HighWaterState の唯一の書き手。
pub struct Aggregator {
    results: Receiver<SummaryRecord>,
    snapshots: Sender<AggregateSnapshot>,
    cadence: NonZeroU64,
    planned: u64,
    record_lengths: bool,
}

impl Aggregator {
    pub fn new(
        results: Receiver<SummaryRecord>,
        snapshots: Sender<AggregateSnapshot>,
        cadence: NonZeroU64,
        planned: u64,
        record_lengths: bool,
    ) -> Self {
        Aggregator {
            results,
            snapshots,
            cadence,
            planned,
            record_lengths,
        }
    }

    /// cadence 件ごとと completed == planned のときにスナップショットを送り、
    /// チャネルが閉じたら finished = true の最終スナップショットを送って返る。
    pub fn run(self) -> AggregateOutcome {
        let mut outcome = AggregateOutcome::default();
        let mut listening = true;

        for record in self.results.iter() {
            outcome.completed += 1;
            outcome.high_water.observe(&record);
            if self.record_lengths {
                outcome.lengths.push(SequencePoint {
                    number_approx: approx::to_f64_saturating(&record.number),
                    number: record.number,
                    steps: record.steps,
                });
            }

            let due = outcome.completed % self.cadence.get() == 0 || outcome.completed == self.planned;
            if due && listening {
                listening = self.publish(&outcome, false);
            }
        }

        if listening {
            self.publish(&outcome, true);
        }
        tracing::debug!(completed = outcome.completed, "aggregator drained");
        outcome
    }

    fn publish(&self, outcome: &AggregateOutcome, finished: bool) -> bool {
        let snapshot = AggregateSnapshot {
            completed: outcome.completed,
            planned: self.planned,
            high_water: outcome.high_water.clone(),
            finished,
        };
        if self.snapshots.send(snapshot).is_err() {
            // 表示側がいなくても集約は最後まで続ける
            tracing::debug!("snapshot receiver dropped");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};

    fn record(n: u64, steps: u64, max: u64) -> SummaryRecord {
        SummaryRecord {
            number: BigUint::from(n),
            steps,
            max_stone: BigUint::from(max),
            max_stone_digits: max.to_string(),
        }
    }

    #[test]
    fn test_observe_first_arrival_wins_ties() {
        let mut hw = HighWaterState::default();
        assert!(hw.observe(&record(3, 7, 16)));
        assert!(!hw.observe(&record(5, 7, 16)));
        assert_eq!(hw.max_steps_number, Some(BigUint::from(3u64)));
        assert_eq!(hw.max_stone_number, Some(BigUint::from(3u64)));

        assert!(hw.observe(&record(7, 16, 52)));
        assert_eq!(hw.max_steps, 16);
        assert_eq!(hw.max_stone, BigUint::from(52u64));
    }

    #[test]
    fn test_observe_start_one() {
        let mut hw = HighWaterState::default();
        hw.observe(&record(1, 0, 1));
        assert_eq!(hw.max_steps, 0);
        assert_eq!(hw.max_steps_number, Some(BigUint::from(1u64)));
    }

    #[test]
    fn test_snapshot_cadence() {
        let (tx, rx) = bounded(16);
        let (snap_tx, snap_rx) = unbounded();
        let aggregator = Aggregator::new(rx, snap_tx, NonZeroU64::new(3).unwrap(), 7, true);

        for n in 1..=7u64 {
            tx.send(record(n, n, n)).unwrap();
        }
        drop(tx);

        let outcome = aggregator.run();
        assert_eq!(outcome.completed, 7);
        assert_eq!(outcome.lengths.len(), 7);

        let snaps: Vec<_> = snap_rx.iter().collect();
        let completed: Vec<u64> = snaps.iter().map(|s| s.completed).collect();
        // 3, 6, 7(=planned), 最終
        assert_eq!(completed, vec![3, 6, 7, 7]);
        assert!(snaps.last().unwrap().finished);
        assert_eq!(snaps.last().unwrap().progress(), 1.0);
    }

    #[test]
    fn test_lengths_keep_exact_numbers() {
        // 2^60 + 1 は f64 では 2^60 に丸まる
        let n = (BigUint::from(1u64) << 60u32) + 1u32;
        let (tx, rx) = bounded(1);
        let (snap_tx, _snap_rx) = unbounded();
        let aggregator = Aggregator::new(rx, snap_tx, NonZeroU64::new(1).unwrap(), 1, true);
        tx.send(SummaryRecord {
            number: n.clone(),
            steps: 60,
            max_stone: n.clone(),
            max_stone_digits: n.to_string(),
        })
        .unwrap();
        drop(tx);

        let outcome = aggregator.run();
        let point = &outcome.lengths[0];
        assert_eq!(point.number, n);
        assert_eq!(point.number.to_string(), "1152921504606846977");
        assert_eq!(point.number_approx, 2f64.powi(60));
    }

    #[test]
    fn test_runs_without_snapshot_receiver() {
        let (tx, rx) = bounded(4);
        let (snap_tx, snap_rx) = unbounded();
        drop(snap_rx);
        let aggregator = Aggregator::new(rx, snap_tx, NonZeroU64::new(1).unwrap(), 2, false);
        tx.send(record(2, 1, 2)).unwrap();
        tx.send(record(3, 7, 16)).unwrap();
        drop(tx);

        let outcome = aggregator.run();
        assert_eq!(outcome.completed, 2);
        assert!(outcome.lengths.is_empty());
        assert_eq!(outcome.high_water.max_steps, 7);
    }
}
