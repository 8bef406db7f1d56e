// 统计模块集成测试
//
// - 置信区间、t 检验、异常值、趋势、样本量评估的公开接口
// - 聚合函数与统计函数的一致性
// - 性质测试: percentile(V, 50) == median(V)，矩状态合并

use datacore::stats::{
    analyze_trend, confidence_interval, detect_outliers, descriptive, t_test,
    validate_sample_size, EffectSize, MomentState, Reliability, SampleContext, TrendDirection,
};
use datacore::AggregateRegistry;
use proptest::prelude::*;

#[test]
fn test_confidence_interval_example() {
    let ci = confidence_interval(&[9.0, 10.0, 11.0, 12.0, 13.0], 0.95).unwrap();
    assert_eq!(ci.mean, 11.0);
    assert!(ci.margin > 0.0);
    assert!((ci.upper - 11.0 - (11.0 - ci.lower)).abs() < 1e-12);
    assert_eq!(ci.sample_size, 5);
}

#[test]
fn test_t_test_against_itself() {
    let samples: [&[f64]; 3] = [
        &[1.0, 2.0, 3.0],
        &[10.0, 10.5, 9.5, 11.0, 8.0, 12.0],
        &[-3.0, 4.0, 100.0, 0.0],
    ];
    for s in samples {
        let r = t_test(s, s).unwrap();
        assert!(r.t_statistic.abs() < 1e-12);
        assert!(!r.significant);
        assert_eq!(r.effect_size, EffectSize::Negligible);
    }
}

#[test]
fn test_t_test_exact_p_value() {
    // 两组各 6 个值，均值差 1，合并方差 3.5 → t ≈ 0.9258，df = 10
    let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let b = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
    let r = t_test(&a, &b).unwrap();
    assert_eq!(r.degrees_of_freedom, 10);
    assert!((r.t_statistic - 0.9258).abs() < 1e-3);
    // 精确 t 分布下 p ≈ 0.3764
    assert!((r.p_value - 0.3764).abs() < 2e-3);
    assert!(!r.significant);
}

#[test]
fn test_outlier_example() {
    let report = detect_outliers(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
    assert_eq!(report.outliers, vec![100.0]);
}

#[test]
fn test_trend_on_growth_series() {
    let t = analyze_trend(&[100.0, 110.0, 125.0, 130.0, 150.0, 160.0]);
    assert_eq!(t.trend, TrendDirection::Increasing);
    assert!(t.r_squared > 0.9);
    assert!(t.confidence > 90.0);

    assert_eq!(analyze_trend(&[1.0]).trend, TrendDirection::Unknown);
}

#[test]
fn test_sample_size_contexts() {
    let r = validate_sample_size(40, SampleContext::Platform);
    assert_eq!(r.reliability, Reliability::Low);
    assert!(r.warning.unwrap().contains("50"));

    let r = validate_sample_size(40, SampleContext::General);
    assert_eq!(r.reliability, Reliability::Medium);
    assert!(r.warning.is_none());
}

#[test]
fn test_registry_uses_population_std() {
    let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    let registry = AggregateRegistry::builtin();
    assert_eq!(registry.apply("std", &values).unwrap(), Some(2.0));
    assert_eq!(registry.apply("variance", &values).unwrap(), Some(4.0));
    // 样本标准差不同
    assert!((descriptive::sample_std(&values).unwrap() - 2.138).abs() < 1e-3);
}

fn finite_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6f64..1.0e6, 1..80)
}

proptest! {
    #[test]
    fn prop_p50_equals_median(values in finite_values()) {
        let p50 = descriptive::percentile(&values, 50.0).unwrap();
        let median = descriptive::median(&values).unwrap();
        prop_assert!((p50 - median).abs() <= 1e-9 * median.abs().max(1.0));
    }

    #[test]
    fn prop_moment_merge_matches_union(left in finite_values(), right in finite_values()) {
        let merged = MomentState::from_values(&left).merge(&MomentState::from_values(&right));
        let union: Vec<f64> = left.iter().chain(right.iter()).copied().collect();
        let direct = MomentState::from_values(&union);

        prop_assert_eq!(merged.count, direct.count);
        prop_assert!((merged.mean - direct.mean).abs() <= 1e-6 * direct.mean.abs().max(1.0));
        let var_merged = merged.variance().unwrap();
        let var_direct = direct.variance().unwrap();
        prop_assert!((var_merged - var_direct).abs() <= 1e-6 * var_direct.abs().max(1.0));
        prop_assert_eq!(merged.min, direct.min);
        prop_assert_eq!(merged.max, direct.max);
    }

    #[test]
    fn prop_outliers_lie_outside_fences(values in finite_values()) {
        let report = detect_outliers(&values).unwrap();
        for v in &values {
            let flagged = report.outliers.contains(v);
            let outside = *v < report.lower_fence || *v > report.upper_fence;
            prop_assert_eq!(flagged, outside);
        }
    }
}
