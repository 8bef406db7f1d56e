//! 时间序列分桶
//!
//! 周期键: daily `2025-03-15` / weekly `2025-W11` (ISO 周) /
//! monthly `2025-03` / quarterly `2025-Q1` / yearly `2025`。
//! 输出按周期起始日期排序，而不是按键字符串排序。

use crate::aggregation::AggregateRegistry;
use crate::utils::value::{number_or_null, numeric_value, parse_date};
use crate::{AnalyticsError, Record, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Granularity {
    /// 周期起始日
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        let start = match self {
            Granularity::Daily => Some(date),
            Granularity::Weekly => {
                let week = date.iso_week();
                NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon)
            }
            Granularity::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Granularity::Quarterly => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1)
            }
            Granularity::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        start.unwrap_or(date)
    }

    /// 周期键
    pub fn period_key(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Daily => date.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Granularity::Monthly => format!("{}-{:02}", date.year(), date.month()),
            Granularity::Quarterly => format!("{}-Q{}", date.year(), date.month0() / 3 + 1),
            Granularity::Yearly => date.year().to_string(),
        }
    }
}

fn default_function() -> String {
    "sum".to_string()
}

/// 时间序列规格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesSpec {
    pub date_column: String,
    pub value_column: String,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default = "default_function")]
    pub function: String,
}

/// 时间桶
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub period: String,
    pub start: NaiveDate,
    /// 桶内记录数
    pub count: usize,
    pub value: Value,
}

/// 分桶结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub granularity: Granularity,
    pub buckets: Vec<TimeBucket>,
    /// 日期无法解析而跳过的记录数
    pub skipped: usize,
}

impl TimeSeries {
    /// 各桶数值 (按时间顺序，null 跳过)，供趋势分析使用
    pub fn values(&self) -> Vec<f64> {
        self.buckets
            .iter()
            .filter_map(|b| b.value.as_f64())
            .collect()
    }

    pub fn to_rows(&self) -> Vec<Record> {
        self.buckets
            .iter()
            .map(|b| {
                let mut row = Record::new();
                row.insert("period".into(), Value::String(b.period.clone()));
                row.insert("start".into(), Value::String(b.start.to_string()));
                row.insert("_count".into(), Value::from(b.count as u64));
                row.insert("value".into(), b.value.clone());
                row
            })
            .collect()
    }
}

/// 按周期分桶并聚合
pub fn bucket_series(
    records: &[&Record],
    spec: &TimeSeriesSpec,
    registry: &AggregateRegistry,
) -> Result<TimeSeries> {
    if spec.date_column.trim().is_empty() || spec.value_column.trim().is_empty() {
        return Err(AnalyticsError::InvalidSpec(
            "time series requires dateColumn and valueColumn".into(),
        ));
    }
    // 未知函数: 分桶照常进行，桶值为 null
    let known = registry.contains(&spec.function);
    if !known {
        log::warn!(
            "Time series on '{}' uses unknown aggregate function '{}', values will be null",
            spec.value_column,
            spec.function
        );
    }

    // 起始日 → (键, 记录数, 数值)
    let mut buckets: BTreeMap<NaiveDate, (String, usize, Vec<f64>)> = BTreeMap::new();
    let mut skipped = 0;

    for record in records {
        let date = match record.get(&spec.date_column).and_then(parse_date) {
            Some(d) => d,
            None => {
                skipped += 1;
                continue;
            }
        };
        let start = spec.granularity.period_start(date);
        let entry = buckets
            .entry(start)
            .or_insert_with(|| (spec.granularity.period_key(date), 0, Vec::new()));
        entry.1 += 1;
        if let Some(x) = record.get(&spec.value_column).and_then(numeric_value) {
            entry.2.push(x);
        }
    }

    if skipped > 0 {
        log::debug!(
            "Time series on '{}' skipped {} records with unparseable dates",
            spec.date_column,
            skipped
        );
    }

    let buckets: Vec<TimeBucket> = buckets
        .into_iter()
        .map(|(start, (period, count, values))| {
            let value = if known {
                registry.apply(&spec.function, &values).ok().flatten()
            } else {
                None
            };
            TimeBucket {
                period,
                start,
                count,
                value: number_or_null(value),
            }
        })
        .collect();

    Ok(TimeSeries {
        granularity: spec.granularity,
        buckets,
        skipped,
    })
}
