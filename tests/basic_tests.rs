use collatz_scan::*;
use num_bigint::BigUint;
use std::num::NonZeroU64;
use std::ops::ControlFlow;

/// ストリーミングで全レポートを集めるヘルパー
fn stream(n: u64, every: u64) -> (Vec<ProgressReport>, StreamOutcome) {
    let config = StreamConfig::every(NonZeroU64::new(every).unwrap());
    let mut reports = Vec::new();
    let outcome = run_streaming(&BigUint::from(n), &config, |r| {
        reports.push(r);
        ControlFlow::Continue(())
    })
    .unwrap();
    (reports, outcome)
}

fn expected_report_count(steps: u64, every: u64) -> usize {
    if steps == 0 {
        1
    } else {
        steps.div_ceil(every) as usize
    }
}

// ===== 既知の軌道 =====

#[test]
fn test_trajectory_6() {
    let (reports, outcome) = stream(6, 100);
    assert_eq!(reports.len(), 1);
    let last = &reports[0];

    let expected: Vec<String> = [6, 3, 10, 5, 16, 8, 4, 2, 1].iter().map(|v| v.to_string()).collect();
    assert_eq!(last.digits, expected);
    assert_eq!(last.steps, 8);
    assert_eq!(
        last.upward,
        vec![false, false, true, false, true, false, false, false, false]
    );
    assert_eq!(last.max_stone, BigUint::from(16u64));
    assert_eq!(last.max_stone_approx, 16.0);
    assert_eq!(last.stones, vec![6.0, 3.0, 10.0, 5.0, 16.0, 8.0, 4.0, 2.0, 1.0]);
    assert_eq!(last.scaled[4], 1.0);
    assert_eq!(last.scaled[8], 1.0 / 16.0);
    assert!(last.terminated);
    assert_eq!(last.number, BigUint::from(6u64));
    assert_eq!(outcome.steps, 8);
}

#[test]
fn test_trajectory_27() {
    let (reports, outcome) = stream(27, 1000);
    assert_eq!(outcome.steps, 111);
    assert_eq!(outcome.max_stone, BigUint::from(9232u64));
    assert_eq!(outcome.up_moves + outcome.down_moves, 111);
    assert_eq!(outcome.up_moves, 41);
    assert!(outcome.reached_one);
    assert_eq!(reports.last().unwrap().len(), 112);

    let lean = run_lean(&BigUint::from(27u64));
    assert_eq!(lean.steps, 111);
    assert_eq!(lean.max_stone, BigUint::from(9232u64));
    assert_eq!(lean.max_stone_digits, "9232");
}

#[test]
fn test_trajectory_1() {
    let (reports, outcome) = stream(1, 3);
    assert_eq!(reports.len(), 1);
    assert!(reports[0].terminated);
    assert_eq!(outcome.steps, 0);

    let lean = run_lean(&BigUint::from(1u64));
    assert_eq!(lean.steps, 0);
    assert_eq!(lean.max_stone, BigUint::from(1u64));
}

// ===== レポートの間引き =====

#[test]
fn test_report_count_6() {
    // 8 ステップ: f=3 → 3, 6, 8 / f=4 → 4, 8（終端と重なっても1回）
    let steps = |every| stream(6, every).0.iter().map(|r| r.steps).collect::<Vec<_>>();
    assert_eq!(steps(3), vec![3, 6, 8]);
    assert_eq!(steps(4), vec![4, 8]);
    assert_eq!(steps(8), vec![8]);
    assert_eq!(steps(1), (1..=8).collect::<Vec<_>>());
}

#[test]
fn test_report_count_matches_formula() {
    for n in 1u64..200 {
        for every in [1u64, 2, 3, 7, 10, 50] {
            let (reports, outcome) = stream(n, every);
            assert_eq!(
                reports.len(),
                expected_report_count(outcome.steps, every),
                "n={}, every={}",
                n,
                every
            );
            assert_eq!(reports.iter().filter(|r| r.terminated).count(), 1, "n={}", n);
            assert!(reports.last().unwrap().terminated);
        }
    }
}

#[test]
fn test_reports_are_prefixes() {
    let (reports, _) = stream(97, 10);
    for pair in reports.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.len() < b.len());
        assert_eq!(a.digits[..], b.digits[..a.len()]);
        assert!(a.max_stone <= b.max_stone);
    }
}

// ===== 向きフラグ =====

#[test]
fn test_direction_flags() {
    for n in 1u64..300 {
        let (reports, _) = stream(n, 1000);
        let last = reports.last().unwrap();
        assert!(!last.upward[0]);
        for i in 1..last.len() {
            let prev: BigUint = last.digits[i - 1].parse().unwrap();
            let cur: BigUint = last.digits[i].parse().unwrap();
            assert_eq!(last.upward[i], cur > prev, "n={}, i={}", n, i);
        }
    }
}

// ===== lean と streaming の一致 =====

#[test]
fn test_lean_matches_streaming() {
    for n in 1u64..1000 {
        let lean = run_lean(&BigUint::from(n));
        for every in [1u64, 5, 64] {
            let (_, outcome) = stream(n, every);
            assert_eq!(lean.steps, outcome.steps, "n={}, every={}", n, every);
            assert_eq!(lean.max_stone, outcome.max_stone, "n={}, every={}", n, every);
        }
    }
}

#[test]
fn test_lean_idempotent() {
    for n in [1u64, 2, 27, 97, 871, 77_031, 837_799] {
        let big = BigUint::from(n);
        let first = run_lean(&big);
        for _ in 0..5 {
            assert_eq!(run_lean(&big), first);
        }
    }
}

#[test]
fn test_all_below_bound_terminate() {
    // 経験的な上限: 10万未満は 350 ステップ以内に 1 に着く
    for n in 1u64..100_000 {
        let record = run_lean(&BigUint::from(n));
        assert!(record.steps <= 350, "n={} took {} steps", n, record.steps);
    }
}
