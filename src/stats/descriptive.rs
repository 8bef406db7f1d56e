//! 描述性统计
//!
//! 聚合器、立方体和统计推断共用的基础函数。输入为空时返回 None。

use std::cmp::Ordering;

/// 升序排序后的副本 (NaN 排在最后)
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Greater));
    out
}

pub fn sum(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    sum(values).map(|s| s / values.len() as f64)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// 分位数 (已排序输入)
///
/// 线性插值: `index = (p / 100) · (n − 1)`
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let p = p.clamp(0.0, 100.0);
    let index = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = index - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    percentile_sorted(&sorted(values), p)
}

/// 中位数 (偶数个时取中间两个的均值)
pub fn median(values: &[f64]) -> Option<f64> {
    let s = sorted(values);
    let n = s.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(s[n / 2])
    } else {
        Some((s[n / 2 - 1] + s[n / 2]) / 2.0)
    }
}

/// 方差 (总体，除以 N)
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / values.len() as f64)
}

pub fn population_std(values: &[f64]) -> Option<f64> {
    population_variance(values).map(f64::sqrt)
}

/// 方差 (样本，除以 N − 1)；少于 2 个值时为 None
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// 众数: 出现次数最多的值，并列时取最先出现者
pub fn mode(values: &[f64]) -> Option<f64> {
    // (值, 次数)，按首次出现顺序
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &v in values {
        match counts.iter_mut().find(|(x, _)| *x == v) {
            Some((_, c)) => *c += 1,
            None => counts.push((v, 1)),
        }
    }

    let mut best: Option<(f64, usize)> = None;
    for (v, c) in counts {
        match best {
            Some((_, bc)) if c <= bc => {}
            _ => best = Some((v, c)),
        }
    }
    best.map(|(v, _)| v)
}

/// 不同数值的个数
pub fn distinct_count(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut s = sorted(values);
    s.dedup();
    Some(s.len() as f64)
}
