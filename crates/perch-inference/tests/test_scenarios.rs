//! End-to-end behaviour of each test on small known inputs

mod common;

use common::{ramp, two_by_two};
use perch_core::Error;
use perch_inference::{
    spearman, ChiSquareTest, LogisticRegression, MannWhitney, ModelSpec, TestKind, TestResult,
};
use perch_frame::Table;
use polars::prelude::{df, NamedFrom};
use proptest::prelude::*;

#[test]
fn test_risk_reward_association() {
    let result: TestResult = ChiSquareTest::new().test(&two_by_two([[40, 10], [5, 45]])).unwrap().into();
    assert_eq!(result.kind(), TestKind::Independence);
    assert!(result.statistic() > 0.0);
    assert!(result.p_value() < 0.05);
}

#[test]
fn test_independent_table_not_significant() {
    let result = ChiSquareTest::new().test(&two_by_two([[20, 20], [21, 19]])).unwrap();
    assert!(result.p_value > 0.5);
    assert!(result.effect.magnitude < 0.1);
}

#[test]
fn test_rank_sum_same_distribution() {
    let x = ramp(15, 1.0, 2.0);
    let y = ramp(15, 2.0, 2.0);
    let result = MannWhitney::new().test(&x, &y).unwrap();
    assert!(result.p_value > 0.05);
    assert_eq!((result.n1, result.n2), (15, 15));
}

#[test]
fn test_rank_sum_shifted() {
    let x = ramp(20, 0.0, 1.0);
    let y = ramp(20, 15.0, 1.0);
    let result = MannWhitney::new().test(&x, &y).unwrap();
    assert!(result.p_value < 0.001);
    assert!(result.effect.magnitude > 0.8);
}

#[test]
fn test_small_groups_skipped() {
    let err = MannWhitney::new().test(&ramp(5, 0.0, 1.0), &ramp(30, 0.0, 1.0)).unwrap_err();
    assert!(matches!(err, Error::InsufficientSample { actual: 5, .. }));
    assert!(err.is_recoverable());
}

#[test]
fn test_spearman_negative_association() {
    let x = ramp(30, 0.0, 1.0);
    let y: Vec<f64> = x.iter().map(|v| 100.0 - v * v).collect();
    let result = spearman(&x, &y).unwrap();
    assert!((result.rho + 1.0).abs() < 1e-12);
}

#[test]
fn test_logistic_non_convergence_is_recoverable() {
    let frame = df![
        "y" => [0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
        "x" => ramp(6, 0.0, 1.0),
    ]
    .unwrap();
    let table = Table::new("t", frame);
    let result = LogisticRegression::new()
        .with_max_iterations(1)
        .fit(&table, &ModelSpec::new("y").numeric("x"));
    match result {
        Err(Error::ModelFit(warning)) => assert!(warning.to_string().contains("converge")),
        other => panic!("expected a model-fit warning, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn prop_chi_square_conservation(a in 1u64..100, b in 1u64..100, c in 1u64..100, d in 1u64..100) {
        let result = ChiSquareTest::new().test(&two_by_two([[a, b], [c, d]])).unwrap();
        let expected: f64 = result.expected.iter().flatten().sum();
        prop_assert!((expected - (a + b + c + d) as f64).abs() < 1e-9);
        prop_assert!(result.effect.magnitude >= 0.0 && result.effect.magnitude <= 1.0);
    }
}
