//! 统计推断
//!
//! - 置信区间: mean ± z·(s/√n)，z 查表；小样本下会低估不确定性
//! - 双样本 t 检验: 合并方差，df = nA + nB − 2，p 值取自精确的 t 分布
//! - Cohen's d 效应量

use super::descriptive::{mean, sample_variance};
use super::distribution::{student_t_two_tailed, z_for_confidence};
use crate::utils::value::round2;
use crate::{AnalyticsError, Result};
use serde::Serialize;

// ═══════════════════════════════════════════════════════════════════════════
// 置信区间
// ═══════════════════════════════════════════════════════════════════════════

/// 置信区间
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    pub level: f64,
    pub std_dev: f64,
    pub sample_size: usize,
}

/// 计算均值的置信区间
///
/// 标准差使用样本公式 (N − 1)；单个值时边际为 0。
pub fn confidence_interval(values: &[f64], level: f64) -> Result<ConfidenceInterval> {
    let m = mean(values).ok_or_else(|| {
        AnalyticsError::InsufficientData("confidence interval needs at least 1 value".into())
    })?;
    let n = values.len();
    let std_dev = sample_variance(values).map(f64::sqrt).unwrap_or(0.0);
    let z = z_for_confidence(level);
    let margin = z * std_dev / (n as f64).sqrt();

    Ok(ConfidenceInterval {
        mean: m,
        lower: m - margin,
        upper: m + margin,
        margin,
        level: if level > 1.0 { level / 100.0 } else { level },
        std_dev,
        sample_size: n,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// t 检验
// ═══════════════════════════════════════════════════════════════════════════

/// 显著性档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    /// p < 0.001
    VeryHigh,
    /// p < 0.01
    High,
    /// p < 0.05
    Significant,
    NotSignificant,
}

impl Significance {
    pub fn from_p(p: f64) -> Self {
        if p < 0.001 {
            Significance::VeryHigh
        } else if p < 0.01 {
            Significance::High
        } else if p < 0.05 {
            Significance::Significant
        } else {
            Significance::NotSignificant
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Significance::VeryHigh => "p < 0.001",
            Significance::High => "p < 0.01",
            Significance::Significant => "p < 0.05",
            Significance::NotSignificant => "not significant",
        }
    }
}

/// Cohen's d 定性分档
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSize {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectSize {
    /// |d| < 0.2 / 0.5 / 0.8 分界
    pub fn from_d(d: f64) -> Self {
        let d = d.abs();
        if d < 0.2 {
            EffectSize::Negligible
        } else if d < 0.5 {
            EffectSize::Small
        } else if d < 0.8 {
            EffectSize::Medium
        } else {
            EffectSize::Large
        }
    }
}

/// t 检验结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TTestResult {
    pub t_statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub significant: bool,
    pub significance: Significance,
    pub cohens_d: f64,
    pub effect_size: EffectSize,
    pub mean_a: f64,
    pub mean_b: f64,
    pub mean_difference: f64,
}

/// 合并方差双样本 t 检验
///
/// 每组至少 2 个值。两组方差都为 0 时：均值相同 t = 0，否则 t = ±∞。
pub fn t_test(sample_a: &[f64], sample_b: &[f64]) -> Result<TTestResult> {
    let (na, nb) = (sample_a.len(), sample_b.len());
    if na < 2 || nb < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "t-test needs at least 2 values per sample (got {} and {})",
            na, nb
        )));
    }

    let mean_a = mean(sample_a).unwrap_or(0.0);
    let mean_b = mean(sample_b).unwrap_or(0.0);
    let var_a = sample_variance(sample_a).unwrap_or(0.0);
    let var_b = sample_variance(sample_b).unwrap_or(0.0);

    let df = na + nb - 2;
    let pooled_var = ((na - 1) as f64 * var_a + (nb - 1) as f64 * var_b) / df as f64;
    let pooled_sd = pooled_var.sqrt();
    let standard_error = (pooled_var * (1.0 / na as f64 + 1.0 / nb as f64)).sqrt();
    let diff = mean_a - mean_b;

    let t_statistic = if standard_error > 0.0 {
        diff / standard_error
    } else if diff == 0.0 {
        0.0
    } else {
        diff.signum() * f64::INFINITY
    };

    let p_value = student_t_two_tailed(t_statistic, df as f64);
    let cohens_d = if pooled_sd > 0.0 { diff / pooled_sd } else { 0.0 };
    let significance = Significance::from_p(p_value);

    Ok(TTestResult {
        t_statistic,
        degrees_of_freedom: df,
        p_value,
        significant: significance != Significance::NotSignificant,
        significance,
        cohens_d: round2(cohens_d),
        effect_size: EffectSize::from_d(cohens_d),
        mean_a,
        mean_b,
        mean_difference: diff,
    })
}
