//! 异常值检测 (Tukey 法)

use super::descriptive::{percentile_sorted, sorted};
use serde::Serialize;

/// Tukey 围栏系数
pub const TUKEY_K: f64 = 1.5;

/// 异常值检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierReport {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    /// 异常值 (保持输入顺序)
    pub outliers: Vec<f64>,
    /// 异常值在输入中的下标
    pub indices: Vec<usize>,
}

impl OutlierReport {
    pub fn count(&self) -> usize {
        self.outliers.len()
    }

    pub fn is_outlier(&self, v: f64) -> bool {
        v < self.lower_fence || v > self.upper_fence
    }
}

/// 标记落在 `[Q1 − 1.5·IQR, Q3 + 1.5·IQR]` 之外的值
///
/// 四分位数使用与聚合器相同的线性插值。输入为空时返回 None。
pub fn detect_outliers(values: &[f64]) -> Option<OutlierReport> {
    let s = sorted(values);
    let q1 = percentile_sorted(&s, 25.0)?;
    let q3 = percentile_sorted(&s, 75.0)?;
    let iqr = q3 - q1;

    let mut report = OutlierReport {
        q1,
        q3,
        iqr,
        lower_fence: q1 - TUKEY_K * iqr,
        upper_fence: q3 + TUKEY_K * iqr,
        outliers: Vec::new(),
        indices: Vec::new(),
    };

    for (i, &v) in values.iter().enumerate() {
        if report.is_outlier(v) {
            report.outliers.push(v);
            report.indices.push(i);
        }
    }
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_high_outlier() {
        let report = detect_outliers(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert_eq!(report.q1, 2.0);
        assert_eq!(report.q3, 4.0);
        assert_eq!(report.lower_fence, -1.0);
        assert_eq!(report.upper_fence, 7.0);
        assert_eq!(report.outliers, vec![100.0]);
        assert_eq!(report.indices, vec![4]);
    }

    #[test]
    fn test_low_and_high() {
        let report = detect_outliers(&[-50.0, 10.0, 11.0, 12.0, 13.0, 14.0, 90.0]).unwrap();
        assert_eq!(report.outliers, vec![-50.0, 90.0]);
    }

    #[test]
    fn test_constant_values() {
        let report = detect_outliers(&[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(report.iqr, 0.0);
        assert_eq!(report.count(), 0);
        assert!(detect_outliers(&[]).is_none());
    }
}
