//! 统计模块
//!
//! - 描述性统计 (聚合器与立方体共用)
//! - Welford 矩状态 (可合并)
//! - 置信区间、双样本 t 检验、Cohen's d
//! - Tukey 异常值、线性趋势、样本量评估

pub mod descriptive;
pub mod distribution;
pub mod inference;
pub mod moments;
pub mod outliers;
pub mod sample;
pub mod trend;

pub use descriptive::{mean, median, percentile, population_std, sample_std};
pub use inference::{
    confidence_interval, t_test, ConfidenceInterval, EffectSize, Significance, TTestResult,
};
pub use moments::MomentState;
pub use outliers::{detect_outliers, OutlierReport};
pub use sample::{validate_sample_size, Reliability, SampleAdequacy, SampleContext};
pub use trend::{analyze_trend, TrendAnalysis, TrendDirection, TrendStrength};
