//! 分组聚合
//!
//! 组键 = groupBy 列值用分隔符拼接，缺失值编码为 `"null"`
//! (真实值恰好是字符串 "null" 时会与缺失值合并)。
//! 输出行包含 groupBy 列、`<列>_<函数>` 指标以及 `_count`。

use super::functions::AggregateRegistry;
use crate::utils::value::{is_blank, number_or_null, numeric_value, text_value};
use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// 组键分隔符 (ASCII Unit Separator)
pub const GROUP_KEY_SEPARATOR: &str = "\u{1f}";

/// 缺失值在组键中的占位
pub const NULL_TOKEN: &str = "null";

/// 每组记录数字段
pub const COUNT_FIELD: &str = "_count";

/// 单列上的聚合函数: 一个或多个
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FunctionList {
    One(String),
    Many(Vec<String>),
}

impl FunctionList {
    pub fn names(&self) -> Vec<&str> {
        match self {
            FunctionList::One(name) => vec![name.as_str()],
            FunctionList::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for FunctionList {
    fn from(name: &str) -> Self {
        FunctionList::One(name.to_string())
    }
}

impl From<Vec<&str>> for FunctionList {
    fn from(names: Vec<&str>) -> Self {
        FunctionList::Many(names.into_iter().map(str::to_string).collect())
    }
}

/// 列 → 聚合函数
pub type AggregateSpec = BTreeMap<String, FunctionList>;

/// 指标列名
#[inline]
pub fn metric_name(column: &str, function: &str) -> String {
    format!("{}_{}", column, function)
}

/// 分组聚合器
#[derive(Debug, Clone, Default)]
pub struct GroupAggregator {
    registry: AggregateRegistry,
}

struct Group<'a> {
    /// 组内第一条记录的 groupBy 列原值
    keys: Vec<Value>,
    records: Vec<&'a Record>,
}

impl GroupAggregator {
    pub fn new(registry: AggregateRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AggregateRegistry {
        &self.registry
    }

    /// 组键
    pub fn group_key(record: &Record, group_by: &[String]) -> String {
        group_by
            .iter()
            .map(|col| {
                let value = record.get(col);
                if is_blank(value) {
                    NULL_TOKEN.to_string()
                } else {
                    value.and_then(text_value).unwrap_or_else(|| NULL_TOKEN.to_string())
                }
            })
            .collect::<Vec<_>>()
            .join(GROUP_KEY_SEPARATOR)
    }

    /// 分组并聚合
    ///
    /// 组按首次出现顺序输出。没有 groupBy 列时输出一行汇总。
    pub fn aggregate(
        &self,
        records: &[&Record],
        group_by: &[String],
        aggregates: &AggregateSpec,
    ) -> Vec<Record> {
        if group_by.is_empty() {
            return vec![self.reduce(&[], records, group_by, aggregates)];
        }

        let mut order: Vec<Group<'_>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for &record in records {
            let key = Self::group_key(record, group_by);
            let slot = *index.entry(key).or_insert_with(|| {
                order.push(Group {
                    keys: group_by
                        .iter()
                        .map(|col| match record.get(col) {
                            v if is_blank(v) => Value::Null,
                            Some(v) => v.clone(),
                            None => Value::Null,
                        })
                        .collect(),
                    records: Vec::new(),
                });
                order.len() - 1
            });
            order[slot].records.push(record);
        }

        log::debug!(
            "Grouped {} records into {} groups by {:?}",
            records.len(),
            order.len(),
            group_by
        );

        order
            .iter()
            .map(|g| self.reduce(&g.keys, &g.records, group_by, aggregates))
            .collect()
    }

    fn reduce(
        &self,
        keys: &[Value],
        records: &[&Record],
        group_by: &[String],
        aggregates: &AggregateSpec,
    ) -> Record {
        let mut row = Record::new();
        for (col, value) in group_by.iter().zip(keys) {
            row.insert(col.clone(), value.clone());
        }

        for (column, functions) in aggregates {
            let values = numeric_column(records, column);
            for function in functions.names() {
                let result = match self.registry.apply(function, &values) {
                    Ok(v) => v,
                    Err(e) => {
                        log::warn!("Aggregate on column '{}' skipped: {}", column, e);
                        None
                    }
                };
                row.insert(metric_name(column, function), number_or_null(result));
            }
        }

        row.insert(COUNT_FIELD.to_string(), Value::from(records.len() as u64));
        row
    }
}

/// 列的数值序列 (跳过缺失和不可解析的值，保持输入顺序)
pub fn numeric_column(records: &[&Record], column: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.get(column).and_then(numeric_value))
        .collect()
}
