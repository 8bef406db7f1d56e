//! 交叉透视表
//!
//! 一次遍历把数值按 (行值, 列值) 分桶，再对每个单元格调用聚合函数。
//! 行 / 列合计在对应的全部数值上重新计算，不是单元格结果的再聚合。

use crate::aggregation::AggregateRegistry;
use crate::utils::value::{compare_scalars, is_blank, number_or_null, numeric_value, text_value};
use crate::{AnalyticsError, Record, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// 合计列名
pub const TOTAL_FIELD: &str = "_total";

/// 行内单元格对象的键: 列值 → 单元格
pub const CELLS_FIELD: &str = "_cells";

fn default_function() -> String {
    "sum".to_string()
}

/// 透视规格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotSpec {
    /// 行维度
    pub rows: String,
    /// 列维度
    pub columns: String,
    /// 度量字段
    pub value: String,
    #[serde(default = "default_function")]
    pub function: String,
}

/// 透视结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotTable {
    pub row_dimension: String,
    pub column_dimension: String,
    pub value_field: String,
    pub function: String,
    pub row_values: Vec<String>,
    pub column_values: Vec<String>,
    /// `cells[i][j]` 对应 `row_values[i]` × `column_values[j]`，无记录时为 null
    pub cells: Vec<Vec<Value>>,
    pub row_totals: Vec<Value>,
    pub column_totals: Vec<Value>,
    pub grand_total: Value,
    /// 行或列维度缺失而被跳过的记录数
    pub skipped: usize,
}

#[derive(Default)]
struct Bucket {
    records: usize,
    values: Vec<f64>,
}

/// 维度值排序: 能解析为数字时按数值
fn sorted_keys(keys: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = keys.collect();
    out.sort_by(|a, b| compare_scalars(&Value::String(a.clone()), &Value::String(b.clone())));
    out
}

impl PivotTable {
    /// 构建透视表
    ///
    /// 行值数 × 列值数超过 `max_cells` 时返回 `ResourceLimit`。
    pub fn build(
        records: &[&Record],
        spec: &PivotSpec,
        registry: &AggregateRegistry,
        max_cells: Option<usize>,
    ) -> Result<Self> {
        if spec.rows.trim().is_empty() || spec.columns.trim().is_empty() {
            return Err(AnalyticsError::InvalidSpec(
                "pivot requires both a row and a column dimension".into(),
            ));
        }
        // 未知函数: 表结构照常构建，所有单元格与合计为 null
        let known = registry.contains(&spec.function);
        if !known {
            log::warn!(
                "Pivot on '{}' uses unknown aggregate function '{}', cells will be null",
                spec.value,
                spec.function
            );
        }

        let mut buckets: HashMap<(String, String), Bucket> = HashMap::new();
        let mut row_values: HashMap<String, Vec<f64>> = HashMap::new();
        let mut column_values: HashMap<String, Vec<f64>> = HashMap::new();
        let mut all_values = Vec::new();
        let mut skipped = 0;

        for record in records {
            let (row_raw, col_raw) = (record.get(&spec.rows), record.get(&spec.columns));
            if is_blank(row_raw) || is_blank(col_raw) {
                skipped += 1;
                continue;
            }
            let (row_key, col_key) = match (row_raw.and_then(text_value), col_raw.and_then(text_value)) {
                (Some(r), Some(c)) => (r, c),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            let x = record.get(&spec.value).and_then(numeric_value);
            let bucket = buckets.entry((row_key.clone(), col_key.clone())).or_default();
            bucket.records += 1;

            let row_bucket = row_values.entry(row_key).or_default();
            let col_bucket = column_values.entry(col_key).or_default();
            if let Some(x) = x {
                bucket.values.push(x);
                row_bucket.push(x);
                col_bucket.push(x);
                all_values.push(x);
            }
        }

        let rows = sorted_keys(row_values.keys().cloned());
        let cols = sorted_keys(column_values.keys().cloned());

        let cell_count = rows.len().saturating_mul(cols.len());
        if let Some(limit) = max_cells {
            if cell_count > limit {
                log::warn!(
                    "Pivot rejected: {} x {} = {} cells exceeds limit {}",
                    rows.len(),
                    cols.len(),
                    cell_count,
                    limit
                );
                return Err(AnalyticsError::ResourceLimit(format!(
                    "pivot of {} cells exceeds limit {}",
                    cell_count, limit
                )));
            }
        }

        let compute = |values: &[f64]| -> Value {
            if !known {
                return Value::Null;
            }
            number_or_null(registry.apply(&spec.function, values).ok().flatten())
        };

        let mut cells = Vec::with_capacity(rows.len());
        for r in &rows {
            let mut line = Vec::with_capacity(cols.len());
            for c in &cols {
                let cell = match buckets.get(&(r.clone(), c.clone())) {
                    Some(bucket) if bucket.records > 0 => compute(&bucket.values),
                    _ => Value::Null,
                };
                line.push(cell);
            }
            cells.push(line);
        }

        let row_totals: Vec<Value> = rows
            .iter()
            .map(|r| compute(row_values.get(r).map(Vec::as_slice).unwrap_or(&[])))
            .collect();
        let column_totals: Vec<Value> = cols
            .iter()
            .map(|c| compute(column_values.get(c).map(Vec::as_slice).unwrap_or(&[])))
            .collect();
        let grand_total = compute(&all_values);

        log::debug!(
            "Pivot {} x {} built from {} records ({} skipped)",
            rows.len(),
            cols.len(),
            records.len(),
            skipped
        );

        Ok(Self {
            row_dimension: spec.rows.clone(),
            column_dimension: spec.columns.clone(),
            value_field: spec.value.clone(),
            function: spec.function.clone(),
            row_values: rows,
            column_values: cols,
            cells,
            row_totals,
            column_totals,
            grand_total,
            skipped,
        })
    }

    pub fn cell(&self, row: &str, column: &str) -> Option<&Value> {
        let i = self.row_values.iter().position(|r| r == row)?;
        let j = self.column_values.iter().position(|c| c == column)?;
        self.cells.get(i).and_then(|line| line.get(j))
    }

    /// 每个行值一行: 行维度列 + `_cells` (列值 → 单元格) + `_total`
    ///
    /// 列值放在独立对象里，任何列值都不会覆盖行标签或合计。
    pub fn to_rows(&self) -> Vec<Record> {
        self.row_values
            .iter()
            .zip(self.cells.iter().zip(&self.row_totals))
            .map(|(row_value, (line, total))| {
                let cells: Record = self
                    .column_values
                    .iter()
                    .cloned()
                    .zip(line.iter().cloned())
                    .collect();
                let mut row = Record::new();
                row.insert(self.row_dimension.clone(), Value::String(row_value.clone()));
                row.insert(CELLS_FIELD.to_string(), Value::Object(cells));
                row.insert(TOTAL_FIELD.to_string(), total.clone());
                row
            })
            .collect()
    }
}
