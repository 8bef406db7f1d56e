//! 标量转换
//!
//! 记录中的值来自 CSV 导入，同一列里可能混杂数字、数字字符串和空串。
//! 这里集中处理所有「把 JSON 标量当成数字 / 文本 / 日期」的规则，
//! 过滤器、聚合器和时间序列共用同一套语义。

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::cmp::Ordering;

/// 支持的日期格式 (日-月-年优先)
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// 字段是否缺失 (null / 空字符串 / 仅空白)
#[inline]
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// 把标量解析为数字
///
/// 接受 JSON 数字以及数字字符串，字符串允许千分位逗号和末尾 `%`。
/// 非有限值 (NaN / inf) 视为不可解析。
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed
        .strip_suffix('%')
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// 标量的文本形式
///
/// 整数值的浮点数不带 `.0`，这样 `10` 和 `"10"` 在比较时一致。
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", f as i64)),
            _ => Some(n.to_string()),
        },
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// 比较用的规范化文本 (去空白 + 小写)
#[inline]
pub fn normalized_text(value: &Value) -> Option<String> {
    text_value(value).map(|s| s.trim().to_lowercase())
}

/// 解析日期
///
/// 依次尝试 `DATE_FORMATS`，最后退回 RFC 3339 以及带时间部分的 ISO 字符串。
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let raw = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    // "15/03/2025 10:30" 之类带时间的值，只取日期部分
    raw.split(|c: char| c == ' ' || c == 'T')
        .next()
        .filter(|head| head.len() < raw.len())
        .and_then(|head| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
        })
}

/// 保留两位小数
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 整数能被 f64 精确表示的上界 (2^53)
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// 把计算结果转成 JSON 值 (None / 非有限值 → null)
///
/// 整数值输出为 JSON 整数 (`15` 而不是 `15.0`)。
pub fn number_or_null(value: Option<f64>) -> Value {
    match value {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT => {
            Value::from(f as i64)
        }
        Some(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        None => Value::Null,
    }
}

/// 两个存在的标量之间的排序
///
/// 双方都能解析为数字时按数值比较，否则按字符串字典序比较。
pub fn compare_scalars(a: &Value, b: &Value) -> Ordering {
    match (numeric_value(a), numeric_value(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => {
            let left = text_value(a).unwrap_or_default();
            let right = text_value(b).unwrap_or_default();
            left.cmp(&right)
        }
    }
}
