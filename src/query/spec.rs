//! 过滤规格
//!
//! 上游翻译器输出的结构化查询对象。JSON 字段名使用 camelCase
//! (`groupBy` / `sortBy`)。

use crate::aggregation::{AggregateSpec, FunctionList, SortBy, SortOrder};
use crate::cube::{CubeSpec, PivotSpec, TimeSeriesSpec};
use crate::filter::FilterNode;
use crate::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 可选的分析扩展
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisSpec {
    Pivot(PivotSpec),
    TimeSeries(TimeSeriesSpec),
    Cube(CubeSpec),
}

impl AnalysisSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisSpec::Pivot(_) => "pivot",
            AnalysisSpec::TimeSeries(_) => "time_series",
            AnalysisSpec::Cube(_) => "cube",
        }
    }

    fn columns(&self) -> Vec<&str> {
        match self {
            AnalysisSpec::Pivot(p) => vec![p.rows.as_str(), p.columns.as_str(), p.value.as_str()],
            AnalysisSpec::TimeSeries(t) => vec![t.date_column.as_str(), t.value_column.as_str()],
            AnalysisSpec::Cube(c) => c
                .dimensions
                .iter()
                .map(String::as_str)
                .chain(c.measures.iter().map(|m| m.field.as_str()))
                .collect(),
        }
    }
}

/// 过滤规格
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    /// 顶层过滤列表 (隐式 AND)
    #[serde(default)]
    pub filters: Vec<FilterNode>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregate: AggregateSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    /// ≤ 0 视为不限制
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisSpec>,
}

impl FilterSpec {
    pub fn builder() -> FilterSpecBuilder {
        FilterSpecBuilder::default()
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let spec: FilterSpec = serde_json::from_value(value.clone())
            .map_err(|e| AnalyticsError::InvalidSpec(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// 有效的截断行数
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|n| *n > 0).map(|n| n as usize)
    }

    /// 是否需要分组聚合
    pub fn is_aggregation(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregate.is_empty()
    }

    /// 结构校验
    pub fn validate(&self) -> Result<()> {
        if self.group_by.iter().any(|c| c.trim().is_empty()) {
            return Err(AnalyticsError::InvalidSpec("empty groupBy column".into()));
        }
        if self.aggregate.keys().any(|c| c.trim().is_empty()) {
            return Err(AnalyticsError::InvalidSpec("empty aggregate column".into()));
        }
        for (column, functions) in &self.aggregate {
            if functions.names().is_empty() {
                return Err(AnalyticsError::InvalidSpec(format!(
                    "no aggregate function for column '{}'",
                    column
                )));
            }
        }
        if let Some(sort) = &self.sort_by {
            if sort.column.trim().is_empty() {
                return Err(AnalyticsError::InvalidSpec("empty sortBy column".into()));
            }
        }
        if let Some(analysis) = &self.analysis {
            if self.is_aggregation() {
                return Err(AnalyticsError::InvalidSpec(format!(
                    "{} analysis cannot be combined with groupBy/aggregate",
                    analysis.kind()
                )));
            }
            if let AnalysisSpec::Cube(cube) = analysis {
                cube.validate()?;
            }
        }
        Ok(())
    }

    /// 规格引用的全部列 (去重，保持首次出现顺序)
    pub fn referenced_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |c: &str| {
            if !out.iter().any(|x| x == c) {
                out.push(c.to_string());
            }
        };

        for node in &self.filters {
            node.columns().into_iter().for_each(&mut push);
        }
        self.group_by.iter().for_each(|c| push(c));
        self.aggregate.keys().for_each(|c| push(c));
        // 聚合或分析后排序列是输出列，不属于源数据
        if let Some(sort) = &self.sort_by {
            if !self.is_aggregation() && self.analysis.is_none() {
                push(&sort.column);
            }
        }
        if let Some(analysis) = &self.analysis {
            analysis.columns().into_iter().for_each(&mut push);
        }
        out
    }
}

/// 规格构建器
#[derive(Debug, Default)]
pub struct FilterSpecBuilder {
    spec: FilterSpec,
}

impl FilterSpecBuilder {
    pub fn filter(mut self, node: FilterNode) -> Self {
        self.spec.filters.push(node);
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.spec.group_by.push(column.into());
        self
    }

    /// 追加一个聚合函数；同一列可多次调用
    pub fn aggregate(mut self, column: impl Into<String>, function: impl Into<String>) -> Self {
        let list = self
            .spec
            .aggregate
            .entry(column.into())
            .or_insert_with(|| FunctionList::Many(Vec::new()));
        if let FunctionList::One(existing) = list {
            let first = std::mem::take(existing);
            *list = FunctionList::Many(vec![first]);
        }
        if let FunctionList::Many(names) = list {
            names.push(function.into());
        }
        self
    }

    pub fn sort_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.spec.sort_by = Some(SortBy {
            column: column.into(),
            order,
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn analysis(mut self, analysis: AnalysisSpec) -> Self {
        self.spec.analysis = Some(analysis);
        self
    }

    pub fn build(self) -> Result<FilterSpec> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::{Granularity, Measure, MeasureFunction};
    use crate::filter::Operator;
    use serde_json::json;

    #[test]
    fn test_deserialize_camel_case() {
        let spec = FilterSpec::from_json(&json!({
            "filters": [
                {"column": "platform", "operator": "equals", "value": "Instagram"},
                {"type": "OR", "conditions": [
                    {"column": "likes", "operator": "greater_than", "value": 100},
                    {"column": "comments", "operator": "greater_than", "value": 10}
                ]}
            ],
            "groupBy": ["type"],
            "aggregate": {"likes": "mean", "shares": ["sum", "max"]},
            "sortBy": {"column": "likes_mean", "order": "desc"},
            "limit": 5
        }))
        .unwrap();

        assert_eq!(spec.filters.len(), 2);
        assert_eq!(spec.group_by, vec!["type"]);
        assert_eq!(spec.aggregate["shares"].names(), vec!["sum", "max"]);
        assert_eq!(spec.sort_by.as_ref().unwrap().order, SortOrder::Desc);
        assert_eq!(spec.effective_limit(), Some(5));
        assert_eq!(
            spec.referenced_columns(),
            vec!["platform", "likes", "comments", "type", "shares"]
        );
    }

    #[test]
    fn test_non_positive_limit_means_unlimited() {
        let spec = FilterSpec::builder().limit(0).build().unwrap();
        assert_eq!(spec.effective_limit(), None);
        let spec = FilterSpec::builder().limit(-3).build().unwrap();
        assert_eq!(spec.effective_limit(), None);
    }

    #[test]
    fn test_builder() {
        let spec = FilterSpec::builder()
            .filter(FilterNode::leaf("platform", Operator::Equals, json!("tiktok")).unwrap())
            .group_by("type")
            .aggregate("likes", "mean")
            .aggregate("likes", "max")
            .sort_by("likes_mean", SortOrder::Desc)
            .limit(3)
            .build()
            .unwrap();

        assert_eq!(spec.aggregate["likes"].names(), vec!["mean", "max"]);
        assert!(spec.is_aggregation());
    }

    #[test]
    fn test_analysis_deserialize() {
        let spec = FilterSpec::from_json(&json!({
            "analysis": {"timeSeries": {
                "dateColumn": "date",
                "valueColumn": "likes",
                "granularity": "weekly"
            }}
        }))
        .unwrap();

        match spec.analysis {
            Some(AnalysisSpec::TimeSeries(ts)) => {
                assert_eq!(ts.granularity, Granularity::Weekly);
                assert_eq!(ts.function, "sum");
            }
            other => panic!("unexpected analysis: {:?}", other),
        }
    }

    #[test]
    fn test_validation_errors() {
        assert!(FilterSpec::builder().group_by("").build().is_err());
        assert!(FilterSpec::builder().sort_by(" ", SortOrder::Asc).build().is_err());

        let cube = AnalysisSpec::Cube(CubeSpec {
            dimensions: vec!["platform".into()],
            measures: vec![Measure::new("likes", MeasureFunction::Sum)],
            slice: Default::default(),
        });
        assert!(FilterSpec::builder()
            .group_by("platform")
            .analysis(cube.clone())
            .build()
            .is_err());
        assert!(FilterSpec::builder().analysis(cube).build().is_ok());

        // 结构错误的过滤器在反序列化阶段就被拒绝
        let err = FilterSpec::from_json(&json!({
            "filters": [{"column": "likes", "operator": "between", "value": [1]}]
        }))
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidSpec(_)));
    }
}
