//! 查询结果

use crate::cube::{CubeQueryResult, PivotTable, TimeSeries};
use crate::stats::SampleAdequacy;
use crate::Record;
use serde::Serialize;

/// 结果摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySummary {
    /// 快照中的记录数
    pub original_records: usize,
    /// 过滤后的记录数
    pub filtered_records: usize,
    /// 返回的行数 (排序截断后)
    pub result_count: usize,
    pub processing_time_ms: f64,
    /// 基于过滤后记录数的样本量评估
    pub sample_adequacy: SampleAdequacy,
    pub from_cache: bool,
}

/// 分析扩展的结构化输出
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisOutput {
    Pivot(PivotTable),
    TimeSeries(TimeSeries),
    /// 切片查询结果；全部叶子在 `rows` 中
    Cube(CubeQueryResult),
}

/// 查询结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Record>,
    pub summary: QuerySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisOutput>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
