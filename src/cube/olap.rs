//! OLAP 立方体
//!
//! 按维度声明顺序逐层建树，叶子保存每个度量字段的可合并状态:
//! Welford 矩 (count / sum / mean / M2 / min / max)，
//! 以及仅在配置了 `median` 时保留的该字段数值。原始记录不进入立方体。
//!
//! 部分维度查询时合并所有可达叶子的状态再求度量，
//! 因此 sum / count / avg / std / median 在任意切片上都是精确值。
//!
//! 维度键与 `equals` 过滤使用同一规范化 (去空白 + 小写)，
//! 输出时使用每个键首次出现的原始拼写。

use crate::aggregation::{metric_name, COUNT_FIELD};
use crate::stats::{descriptive, MomentState};
use crate::utils::value::{
    is_blank, normalized_text, number_or_null, numeric_value, round2, text_value,
};
use crate::{AnalyticsError, Record, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// 维度值缺失时的键
pub const CUBE_NULL_KEY: &str = "null";

/// 立方体度量函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureFunction {
    Sum,
    #[serde(alias = "mean")]
    Avg,
    Median,
    Min,
    Max,
    Count,
    #[serde(alias = "stddev")]
    Std,
}

impl MeasureFunction {
    pub fn name(&self) -> &'static str {
        match self {
            MeasureFunction::Sum => "sum",
            MeasureFunction::Avg => "avg",
            MeasureFunction::Median => "median",
            MeasureFunction::Min => "min",
            MeasureFunction::Max => "max",
            MeasureFunction::Count => "count",
            MeasureFunction::Std => "std",
        }
    }
}

/// 度量: 字段 + 函数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub field: String,
    pub function: MeasureFunction,
}

impl Measure {
    pub fn new(field: impl Into<String>, function: MeasureFunction) -> Self {
        Self {
            field: field.into(),
            function,
        }
    }

    /// 输出列名 `<字段>_<函数>`
    pub fn output_name(&self) -> String {
        metric_name(&self.field, self.function.name())
    }
}

/// 立方体规格
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeSpec {
    pub dimensions: Vec<String>,
    pub measures: Vec<Measure>,
    /// 查询切片: 维度 → 值；未出现的维度被汇总
    #[serde(default)]
    pub slice: BTreeMap<String, Value>,
}

impl CubeSpec {
    pub fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(AnalyticsError::InvalidSpec(
                "cube requires at least one dimension".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for dim in &self.dimensions {
            if dim.trim().is_empty() {
                return Err(AnalyticsError::InvalidSpec("empty cube dimension name".into()));
            }
            if !seen.insert(dim.as_str()) {
                return Err(AnalyticsError::InvalidSpec(format!(
                    "duplicate cube dimension '{}'",
                    dim
                )));
            }
        }
        if self.measures.is_empty() {
            return Err(AnalyticsError::InvalidSpec(
                "cube requires at least one measure".into(),
            ));
        }
        for key in self.slice.keys() {
            if !seen.contains(key.as_str()) {
                return Err(AnalyticsError::InvalidSpec(format!(
                    "slice on unknown dimension '{}'",
                    key
                )));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 叶子状态
// ═══════════════════════════════════════════════════════════════════════════

/// 单个字段的可合并状态
#[derive(Debug, Clone, Default, PartialEq)]
struct FieldState {
    moments: MomentState,
    /// 仅 median 需要
    values: Option<Vec<f64>>,
}

impl FieldState {
    fn new(keep_values: bool) -> Self {
        Self {
            moments: MomentState::new(),
            values: keep_values.then(Vec::new),
        }
    }

    fn update(&mut self, x: f64) {
        self.moments.update(x);
        if let Some(values) = self.values.as_mut() {
            values.push(x);
        }
    }

    fn merge_from(&mut self, other: &FieldState) {
        self.moments = self.moments.merge(&other.moments);
        if let (Some(mine), Some(theirs)) = (self.values.as_mut(), other.values.as_ref()) {
            mine.extend_from_slice(theirs);
        }
    }

    fn measure(&self, function: MeasureFunction) -> Option<f64> {
        let m = &self.moments;
        if m.is_empty() {
            return None;
        }
        let value = match function {
            MeasureFunction::Sum => Some(m.sum),
            MeasureFunction::Avg => m.mean(),
            MeasureFunction::Min => m.min,
            MeasureFunction::Max => m.max,
            MeasureFunction::Count => Some(m.count as f64),
            MeasureFunction::Std => m.std(),
            MeasureFunction::Median => self.values.as_deref().and_then(descriptive::median),
        };
        value.map(round2)
    }
}

/// 叶子: 记录数 + 每个度量字段的状态
#[derive(Debug, Clone, Default, PartialEq)]
struct LeafState {
    records: u64,
    fields: BTreeMap<String, FieldState>,
}

impl LeafState {
    fn new(measures: &[Measure]) -> Self {
        let mut fields: BTreeMap<String, FieldState> = BTreeMap::new();
        for m in measures {
            let keep = m.function == MeasureFunction::Median;
            let state = fields
                .entry(m.field.clone())
                .or_insert_with(|| FieldState::new(keep));
            if keep && state.values.is_none() {
                state.values = Some(Vec::new());
            }
        }
        Self { records: 0, fields }
    }

    fn ingest(&mut self, record: &Record) {
        self.records += 1;
        for (field, state) in self.fields.iter_mut() {
            if let Some(x) = record.get(field).and_then(numeric_value) {
                state.update(x);
            }
        }
    }

    fn merge_from(&mut self, other: &LeafState) {
        self.records += other.records;
        for (field, theirs) in &other.fields {
            match self.fields.get_mut(field) {
                Some(mine) => mine.merge_from(theirs),
                None => {
                    self.fields.insert(field.clone(), theirs.clone());
                }
            }
        }
    }

    fn measures(&self, measures: &[Measure]) -> BTreeMap<String, Value> {
        measures
            .iter()
            .map(|m| {
                let value = self.fields.get(&m.field).and_then(|s| s.measure(m.function));
                (m.output_name(), number_or_null(value))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
enum CubeNode {
    Branch(BTreeMap<String, CubeNode>),
    Leaf(LeafState),
}

impl CubeNode {
    fn collect_into(&self, acc: &mut LeafState) {
        match self {
            CubeNode::Leaf(leaf) => acc.merge_from(leaf),
            CubeNode::Branch(children) => {
                for child in children.values() {
                    child.collect_into(acc);
                }
            }
        }
    }

    fn leaf_count(&self) -> usize {
        match self {
            CubeNode::Leaf(_) => 1,
            CubeNode::Branch(children) => children.values().map(CubeNode::leaf_count).sum(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 立方体
// ═══════════════════════════════════════════════════════════════════════════

/// 切片查询结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeQueryResult {
    pub slice: BTreeMap<String, Value>,
    /// 匹配的记录数
    pub count: u64,
    /// 参与合并的叶子数
    pub cells: usize,
    pub measures: BTreeMap<String, Value>,
}

/// 多维立方体
#[derive(Debug, Clone)]
pub struct Cube {
    dimensions: Vec<String>,
    measures: Vec<Measure>,
    root: CubeNode,
    /// 每个维度: 规范化键 → 首次出现的原始拼写
    labels: Vec<BTreeMap<String, String>>,
    records: usize,
}

/// 维度键与显示值
fn dimension_key(record: &Record, dimension: &str) -> (String, String) {
    let value = match record.get(dimension) {
        v if is_blank(v) => None,
        v => v,
    };
    match value.and_then(|v| normalized_text(v).zip(text_value(v))) {
        Some((key, label)) => (key, label.trim().to_string()),
        None => (CUBE_NULL_KEY.to_string(), CUBE_NULL_KEY.to_string()),
    }
}

/// 切片值对应的维度键
fn slice_key(value: &Value) -> String {
    if value.is_null() {
        return CUBE_NULL_KEY.to_string();
    }
    normalized_text(value).unwrap_or_else(|| CUBE_NULL_KEY.to_string())
}

impl Cube {
    /// 构建立方体
    ///
    /// `max_records` 限制输入规模，超出时返回 `ResourceLimit`。
    pub fn build(records: &[&Record], spec: &CubeSpec, max_records: Option<usize>) -> Result<Self> {
        spec.validate()?;
        if let Some(limit) = max_records {
            if records.len() > limit {
                log::warn!(
                    "Cube build rejected: {} records exceeds limit {}",
                    records.len(),
                    limit
                );
                return Err(AnalyticsError::ResourceLimit(format!(
                    "cube build over {} records exceeds limit {}",
                    records.len(),
                    limit
                )));
            }
        }

        let template = LeafState::new(&spec.measures);
        let mut root = CubeNode::Branch(BTreeMap::new());
        let mut labels: Vec<BTreeMap<String, String>> = vec![BTreeMap::new(); spec.dimensions.len()];

        for &record in records {
            let mut node = &mut root;
            for (depth, dim) in spec.dimensions.iter().enumerate() {
                let is_last = depth + 1 == spec.dimensions.len();
                let children = match node {
                    CubeNode::Branch(children) => children,
                    CubeNode::Leaf(_) => {
                        return Err(AnalyticsError::InternalError(
                            "cube leaf reached before last dimension".into(),
                        ))
                    }
                };
                let (key, label) = dimension_key(record, dim);
                labels[depth].entry(key.clone()).or_insert(label);
                node = children.entry(key).or_insert_with(|| {
                    if is_last {
                        CubeNode::Leaf(template.clone())
                    } else {
                        CubeNode::Branch(BTreeMap::new())
                    }
                });
            }
            match node {
                CubeNode::Leaf(leaf) => leaf.ingest(record),
                CubeNode::Branch(_) => {
                    return Err(AnalyticsError::InternalError(
                        "cube path did not end at a leaf".into(),
                    ))
                }
            }
        }

        let cube = Self {
            dimensions: spec.dimensions.clone(),
            measures: spec.measures.clone(),
            root,
            labels,
            records: records.len(),
        };
        log::debug!(
            "Cube built: {} records, {} cells over {:?}",
            cube.records,
            cube.root.leaf_count(),
            cube.dimensions
        );
        Ok(cube)
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// 构建时输入的记录数
    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn cell_count(&self) -> usize {
        self.root.leaf_count()
    }

    /// 切片查询
    ///
    /// 切片值不存在时返回 count = 0、度量全为 null 的结果。
    pub fn query(&self, slice: &BTreeMap<String, Value>) -> Result<CubeQueryResult> {
        for key in slice.keys() {
            if !self.dimensions.contains(key) {
                return Err(AnalyticsError::InvalidSpec(format!(
                    "slice on unknown dimension '{}'",
                    key
                )));
            }
        }

        let wanted: Vec<Option<String>> = self
            .dimensions
            .iter()
            .map(|d| slice.get(d).map(slice_key))
            .collect();

        let mut acc = LeafState::new(&self.measures);
        let mut cells = 0;
        Self::descend(&self.root, &wanted, &mut acc, &mut cells);

        Ok(CubeQueryResult {
            slice: slice.clone(),
            count: acc.records,
            cells,
            measures: acc.measures(&self.measures),
        })
    }

    fn descend(node: &CubeNode, wanted: &[Option<String>], acc: &mut LeafState, cells: &mut usize) {
        match node {
            CubeNode::Leaf(leaf) => {
                acc.merge_from(leaf);
                *cells += 1;
            }
            CubeNode::Branch(children) => match wanted.split_first() {
                Some((Some(key), rest)) => {
                    if let Some(child) = children.get(key) {
                        Self::descend(child, rest, acc, cells);
                    }
                }
                Some((None, rest)) => {
                    for child in children.values() {
                        Self::descend(child, rest, acc, cells);
                    }
                }
                None => {
                    node.collect_into(acc);
                    *cells += node.leaf_count();
                }
            },
        }
    }

    /// 展开所有叶子为行: 维度列 + 度量列 + `_count`
    pub fn cells(&self) -> Vec<Record> {
        let mut rows = Vec::new();
        let mut path = Vec::with_capacity(self.dimensions.len());
        self.flatten(&self.root, &mut path, &mut rows);
        rows
    }

    fn flatten(&self, node: &CubeNode, path: &mut Vec<String>, rows: &mut Vec<Record>) {
        match node {
            CubeNode::Leaf(leaf) => {
                let mut row = Record::new();
                for (depth, (dim, key)) in self.dimensions.iter().zip(path.iter()).enumerate() {
                    let value = if key == CUBE_NULL_KEY {
                        Value::Null
                    } else {
                        Value::String(self.label(depth, key).to_string())
                    };
                    row.insert(dim.clone(), value);
                }
                row.extend(leaf.measures(&self.measures));
                row.insert(COUNT_FIELD.to_string(), Value::from(leaf.records));
                rows.push(row);
            }
            CubeNode::Branch(children) => {
                for (key, child) in children {
                    path.push(key.clone());
                    self.flatten(child, path, rows);
                    path.pop();
                }
            }
        }
    }

    fn label<'a>(&'a self, depth: usize, key: &'a str) -> &'a str {
        self.labels
            .get(depth)
            .and_then(|m| m.get(key))
            .map(String::as_str)
            .unwrap_or(key)
    }

    /// 某个维度上出现过的全部值 (按规范化键排序，返回原始拼写)
    pub fn dimension_values(&self, dimension: &str) -> Option<Vec<String>> {
        let depth = self.dimensions.iter().position(|d| d == dimension)?;
        let mut out = BTreeSet::new();
        Self::collect_level(&self.root, depth, &mut out);
        Some(
            out.iter()
                .map(|key| self.label(depth, key).to_string())
                .collect(),
        )
    }

    fn collect_level(node: &CubeNode, depth: usize, out: &mut BTreeSet<String>) {
        if let CubeNode::Branch(children) = node {
            if depth == 0 {
                out.extend(children.keys().cloned());
            } else {
                for child in children.values() {
                    Self::collect_level(child, depth - 1, out);
                }
            }
        }
    }
}
