//! 过滤树求值器
//!
//! - AND: 全部子节点为真 (空列表为真)
//! - OR: 任一子节点为真 (空列表为假)
//! - 叶子: 记录字段缺失 / null / 空串时恒为假，与操作符无关，
//!   避免 `not_equals` 之类的否定操作符静默匹配缺失数据

use super::ast::{Condition, FilterNode, Operator};
use crate::utils::value::{is_blank, normalized_text, numeric_value, parse_date};
use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 未知操作符处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownOperatorPolicy {
    /// 永不匹配
    #[default]
    FailClosed,
    /// 视为匹配
    FailOpen,
}

/// 过滤求值器
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEvaluator {
    unknown_policy: UnknownOperatorPolicy,
}

impl FilterEvaluator {
    pub fn new(unknown_policy: UnknownOperatorPolicy) -> Self {
        Self { unknown_policy }
    }

    pub fn unknown_policy(&self) -> UnknownOperatorPolicy {
        self.unknown_policy
    }

    /// 单条记录是否满足过滤树
    pub fn matches(&self, record: &Record, node: &FilterNode) -> bool {
        match node {
            FilterNode::And(children) => children.iter().all(|c| self.matches(record, c)),
            FilterNode::Or(children) => children.iter().any(|c| self.matches(record, c)),
            FilterNode::Leaf(condition) => self.matches_condition(record, condition),
        }
    }

    /// 顶层过滤列表 (隐式 AND)
    pub fn matches_all(&self, record: &Record, filters: &[FilterNode]) -> bool {
        filters.iter().all(|f| self.matches(record, f))
    }

    /// 过滤记录集合，返回引用
    pub fn apply<'a>(&self, records: &'a [Record], filters: &[FilterNode]) -> Vec<&'a Record> {
        if filters.is_empty() {
            return records.iter().collect();
        }
        records
            .iter()
            .filter(|r| self.matches_all(r, filters))
            .collect()
    }

    fn matches_condition(&self, record: &Record, condition: &Condition) -> bool {
        let field = record.get(&condition.column);
        if is_blank(field) {
            return false;
        }
        let field = match field {
            Some(v) => v,
            None => return false,
        };
        let target = &condition.value;

        match &condition.operator {
            Operator::Equals => text_eq(field, target),
            Operator::NotEquals => !text_eq(field, target),
            Operator::Contains => text_test(field, target, |f, t| f.contains(t)),
            Operator::NotContains => !text_test(field, target, |f, t| f.contains(t)),
            Operator::StartsWith => text_test(field, target, |f, t| f.starts_with(t)),
            Operator::EndsWith => text_test(field, target, |f, t| f.ends_with(t)),
            Operator::In => in_set(field, target).unwrap_or(false),
            Operator::NotIn => in_set(field, target).map(|found| !found).unwrap_or(false),
            Operator::GreaterThan => numeric_test(field, target, |f, t| f > t),
            Operator::LessThan => numeric_test(field, target, |f, t| f < t),
            Operator::GreaterThanOrEqual => numeric_test(field, target, |f, t| f >= t),
            Operator::LessThanOrEqual => numeric_test(field, target, |f, t| f <= t),
            Operator::Between => between(field, target),
            Operator::After => date_test(field, target, |f, t| f > t),
            Operator::Before => date_test(field, target, |f, t| f < t),
            Operator::Unknown(name) => {
                log::warn!(
                    "Unknown filter operator '{}' on column '{}' ({:?})",
                    name,
                    condition.column,
                    self.unknown_policy
                );
                self.unknown_policy == UnknownOperatorPolicy::FailOpen
            }
        }
    }
}

#[inline]
fn text_eq(field: &Value, target: &Value) -> bool {
    match (normalized_text(field), normalized_text(target)) {
        (Some(f), Some(t)) => f == t,
        _ => false,
    }
}

#[inline]
fn text_test(field: &Value, target: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    match (normalized_text(field), normalized_text(target)) {
        (Some(f), Some(t)) => test(&f, &t),
        _ => false,
    }
}

/// 集合成员检查；目标不是数组时返回 None (不匹配)
fn in_set(field: &Value, target: &Value) -> Option<bool> {
    let items = target.as_array()?;
    let needle = normalized_text(field)?;
    Some(
        items
            .iter()
            .filter_map(normalized_text)
            .any(|candidate| candidate == needle),
    )
}

#[inline]
fn numeric_test(field: &Value, target: &Value, test: impl Fn(f64, f64) -> bool) -> bool {
    match (numeric_value(field), numeric_value(target)) {
        (Some(f), Some(t)) => test(f, t),
        _ => false,
    }
}

fn between(field: &Value, target: &Value) -> bool {
    let bounds = match target.as_array() {
        Some(b) if b.len() == 2 => b,
        _ => return false,
    };

    // 数值区间优先，其次日期区间
    if let (Some(v), Some(lo), Some(hi)) = (
        numeric_value(field),
        numeric_value(&bounds[0]),
        numeric_value(&bounds[1]),
    ) {
        return v >= lo && v <= hi;
    }
    if let (Some(v), Some(lo), Some(hi)) = (
        parse_date(field),
        parse_date(&bounds[0]),
        parse_date(&bounds[1]),
    ) {
        return v >= lo && v <= hi;
    }
    false
}

#[inline]
fn date_test(
    field: &Value,
    target: &Value,
    test: impl Fn(chrono::NaiveDate, chrono::NaiveDate) -> bool,
) -> bool {
    match (parse_date(field), parse_date(target)) {
        (Some(f), Some(t)) => test(f, t),
        _ => false,
    }
}
