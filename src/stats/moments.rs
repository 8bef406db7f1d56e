//! Welford 在线矩统计
//!
//! 数值稳定的增量均值 / 方差，并支持两个状态的精确合并
//! (Chan 并行公式)。立方体叶子用它保存可合并的度量状态，
//! 部分维度查询时合并各分支而不是对分支结果取平均。

use serde::{Deserialize, Serialize};

/// 单变量矩状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentState {
    /// 数据点数量
    pub count: u64,
    /// 累加和
    pub sum: f64,
    /// 均值
    pub mean: f64,
    /// M2 = Σ(x - mean)²
    pub m2: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MomentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: &[f64]) -> Self {
        let mut state = Self::new();
        for &v in values {
            state.update(v);
        }
        state
    }

    /// 增量更新
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;

        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);

        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    /// 合并两个状态
    pub fn merge(&self, other: &MomentState) -> MomentState {
        if self.count == 0 {
            return other.clone();
        }
        if other.count == 0 {
            return self.clone();
        }

        let n1 = self.count as f64;
        let n2 = other.count as f64;
        let n = n1 + n2;
        let delta = other.mean - self.mean;

        MomentState {
            count: self.count + other.count,
            sum: self.sum + other.sum,
            mean: (self.mean * n1 + other.mean * n2) / n,
            m2: self.m2 + other.m2 + delta * delta * n1 * n2 / n,
            min: match (self.min, other.min) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
            max: match (self.max, other.max) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// 方差 (总体)
    pub fn variance(&self) -> Option<f64> {
        (self.count > 0).then(|| self.m2 / self.count as f64)
    }

    /// 标准差 (总体)
    pub fn std(&self) -> Option<f64> {
        self.variance().map(|v| v.max(0.0).sqrt())
    }

    /// 方差 (样本)
    pub fn sample_variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::descriptive;

    #[test]
    fn test_matches_two_pass() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let state = MomentState::from_values(&values);

        assert_eq!(state.count, 8);
        assert_eq!(state.sum, 40.0);
        assert!((state.mean().unwrap() - 5.0).abs() < 1e-12);
        assert!((state.std().unwrap() - descriptive::population_std(&values).unwrap()).abs() < 1e-12);
        assert_eq!(state.min, Some(2.0));
        assert_eq!(state.max, Some(9.0));
    }

    #[test]
    fn test_merge_equals_union() {
        let left = [1.0, 2.0, 3.0];
        let right = [10.0, 20.0];
        let all = [1.0, 2.0, 3.0, 10.0, 20.0];

        let merged = MomentState::from_values(&left).merge(&MomentState::from_values(&right));
        let direct = MomentState::from_values(&all);

        assert_eq!(merged.count, direct.count);
        assert!((merged.mean - direct.mean).abs() < 1e-12);
        assert!((merged.m2 - direct.m2).abs() < 1e-9);
        assert_eq!(merged.min, Some(1.0));
        assert_eq!(merged.max, Some(20.0));
    }

    #[test]
    fn test_merge_with_empty() {
        let state = MomentState::from_values(&[5.0]);
        assert_eq!(state.merge(&MomentState::new()), state);
        assert_eq!(MomentState::new().merge(&state), state);
        assert_eq!(MomentState::new().mean(), None);
        assert_eq!(state.sample_variance(), None);
    }
}
