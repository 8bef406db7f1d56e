//! 趋势分析
//!
//! 以下标为 x 的最小二乘线性回归。

use serde::Serialize;

/// 最少数据点
pub const MIN_TREND_POINTS: usize = 3;

/// |相对斜率| 低于该值视为平稳
const STABLE_RELATIVE_SLOPE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
    None,
}

impl TrendStrength {
    /// R² ≥ 0.7 强，≥ 0.4 中，≥ 0.1 弱
    pub fn from_r_squared(r2: f64) -> Self {
        if r2 >= 0.7 {
            TrendStrength::Strong
        } else if r2 >= 0.4 {
            TrendStrength::Moderate
        } else if r2 >= 0.1 {
            TrendStrength::Weak
        } else {
            TrendStrength::None
        }
    }
}

/// 回归结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub trend: TrendDirection,
    pub strength: TrendStrength,
    /// 0 - 100，取 R² 的百分比
    pub confidence: f64,
    pub points: usize,
}

impl TrendAnalysis {
    fn unknown(points: usize) -> Self {
        Self {
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
            trend: TrendDirection::Unknown,
            strength: TrendStrength::None,
            confidence: 0.0,
            points,
        }
    }

    /// 第 `index` 个点的拟合值
    pub fn predict(&self, index: f64) -> f64 {
        self.intercept + self.slope * index
    }
}

/// 对序列做线性回归
///
/// 少于 3 个点时返回 `Unknown`，置信度为 0。
pub fn analyze_trend(series: &[f64]) -> TrendAnalysis {
    let n = series.len();
    if n < MIN_TREND_POINTS {
        return TrendAnalysis::unknown(n);
    }

    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = series.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    // 常数序列: 完全由水平线解释
    let r_squared = if syy == 0.0 {
        1.0
    } else {
        ((sxy * sxy) / (sxx * syy)).clamp(0.0, 1.0)
    };

    let scale = if mean_y.abs() > f64::EPSILON {
        mean_y.abs()
    } else {
        1.0
    };
    let trend = if (slope / scale).abs() < STABLE_RELATIVE_SLOPE {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    TrendAnalysis {
        slope,
        intercept,
        r_squared,
        trend,
        strength: TrendStrength::from_r_squared(r_squared),
        confidence: (r_squared * 100.0).round(),
        points: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_increase() {
        let t = analyze_trend(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((t.slope - 1.0).abs() < 1e-12);
        assert!((t.intercept - 1.0).abs() < 1e-12);
        assert!((t.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(t.trend, TrendDirection::Increasing);
        assert_eq!(t.strength, TrendStrength::Strong);
        assert_eq!(t.confidence, 100.0);
        assert!((t.predict(5.0) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_decrease() {
        let t = analyze_trend(&[50.0, 41.0, 30.0, 22.0, 9.0]);
        assert!(t.slope < 0.0);
        assert_eq!(t.trend, TrendDirection::Decreasing);
    }

    #[test]
    fn test_flat_series() {
        let t = analyze_trend(&[7.0, 7.0, 7.0, 7.0]);
        assert_eq!(t.slope, 0.0);
        assert_eq!(t.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_too_few_points() {
        let t = analyze_trend(&[1.0, 2.0]);
        assert_eq!(t.trend, TrendDirection::Unknown);
        assert_eq!(t.confidence, 0.0);
        assert_eq!(t.points, 2);
    }

    #[test]
    fn test_noisy_is_weak() {
        let t = analyze_trend(&[5.0, 1.0, 6.0, 2.0, 7.0, 1.0, 6.0]);
        assert!(t.r_squared < 0.4);
    }
}
