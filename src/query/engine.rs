//! 查询编排 (processData 入口)
//!
//! 快照获取一次 → 过滤 → 分组聚合或分析扩展 → 排序 → 截断 → 摘要。
//! 缓存与数据存储均由调用方构造后注入。

use super::result::{AnalysisOutput, QueryResult, QuerySummary};
use super::spec::{AnalysisSpec, FilterSpec};
use crate::aggregation::{apply_limit, sort_rows, AggregateRegistry, GroupAggregator};
use crate::cache::QueryResultCache;
use crate::cube::{bucket_series, Cube, PivotTable};
use crate::dataset::RecordStore;
use crate::filter::FilterEvaluator;
use crate::observability::QueryTimer;
use crate::stats::{validate_sample_size, SampleContext};
use crate::utils::config::{AnalyticsConfig, EngineConfig};
use crate::{Record, Result};
use serde_json::Value;
use std::sync::Arc;

/// 查询引擎
///
/// 功能:
/// - 过滤 + 分组聚合
/// - 透视 / 时间序列 / 立方体分析
/// - 查询结果缓存 (可选)
pub struct QueryEngine {
    store: Arc<RecordStore>,
    aggregator: GroupAggregator,
    evaluator: FilterEvaluator,
    result_cache: Option<Arc<QueryResultCache<QueryResult>>>,
    config: EngineConfig,
}

impl QueryEngine {
    /// 创建查询引擎 (内置聚合函数、默认配置、无结果缓存)
    pub fn new(store: Arc<RecordStore>) -> Self {
        let config = EngineConfig::default();
        Self {
            store,
            aggregator: GroupAggregator::default(),
            evaluator: FilterEvaluator::new(config.unknown_operator),
            result_cache: None,
            config,
        }
    }

    /// 按整体配置创建，包含查询结果缓存
    pub fn from_config(store: Arc<RecordStore>, config: &AnalyticsConfig) -> Self {
        Self::new(store)
            .with_config(config.engine.clone())
            .with_result_cache(Arc::new(QueryResultCache::from_config(&config.query_cache)))
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.evaluator = FilterEvaluator::new(config.unknown_operator);
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: AggregateRegistry) -> Self {
        self.aggregator = GroupAggregator::new(registry);
        self
    }

    pub fn with_result_cache(mut self, cache: Arc<QueryResultCache<QueryResult>>) -> Self {
        self.result_cache = Some(cache);
        self
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn registry(&self) -> &AggregateRegistry {
        self.aggregator.registry()
    }

    pub fn result_cache(&self) -> Option<&Arc<QueryResultCache<QueryResult>>> {
        self.result_cache.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 执行过滤规格
    pub fn process_data(&self, spec: &FilterSpec) -> Result<QueryResult> {
        let timer = QueryTimer::start();
        spec.validate()?;

        // 整个查询持有同一个快照
        let snapshot = self.store.get()?;
        let records = snapshot.records();
        let filtered = self.evaluator.apply(records, &spec.filters);

        let (mut rows, analysis, kind) = match &spec.analysis {
            Some(analysis) => self.run_analysis(&filtered, analysis)?,
            None if spec.is_aggregation() => (
                self.aggregator
                    .aggregate(&filtered, &spec.group_by, &spec.aggregate),
                None,
                "aggregate",
            ),
            None => (
                filtered.iter().map(|r| (*r).clone()).collect::<Vec<Record>>(),
                None,
                "filter",
            ),
        };

        if let Some(sort_by) = &spec.sort_by {
            sort_rows(&mut rows, sort_by);
        }
        apply_limit(&mut rows, spec.effective_limit());

        let context = match &spec.analysis {
            Some(AnalysisSpec::TimeSeries(_)) => SampleContext::Trend,
            _ if !spec.group_by.is_empty() => SampleContext::Comparison,
            _ => SampleContext::General,
        };

        crate::record_query!(kind);
        let processing_time_ms = timer.observe();

        let summary = QuerySummary {
            original_records: records.len(),
            filtered_records: filtered.len(),
            result_count: rows.len(),
            processing_time_ms,
            sample_adequacy: validate_sample_size(filtered.len(), context),
            from_cache: false,
        };

        log::debug!(
            "Query ({}) {} → {} records → {} rows in {:.2}ms",
            kind,
            summary.original_records,
            summary.filtered_records,
            summary.result_count,
            processing_time_ms
        );

        Ok(QueryResult {
            rows,
            summary,
            analysis,
        })
    }

    /// 带查询结果缓存的执行
    ///
    /// 键 = SHA-256(规范化查询文本 + 上下文)。没有注入缓存时等同 `process_data`。
    pub fn process_cached(
        &self,
        query_text: &str,
        context: &Value,
        spec: &FilterSpec,
    ) -> Result<QueryResult> {
        let cache = match &self.result_cache {
            Some(cache) => cache,
            None => return self.process_data(spec),
        };

        if let Some(mut hit) = cache.get(query_text, context) {
            crate::record_query!("cached");
            hit.summary.from_cache = true;
            return Ok(hit);
        }

        let result = self.process_data(spec)?;
        cache.put(query_text, context, result.clone());
        Ok(result)
    }

    /// 解析 JSON 规格并执行
    pub fn execute_json(&self, spec: &Value) -> Result<QueryResult> {
        self.process_data(&FilterSpec::from_json(spec)?)
    }

    /// 规格引用但当前快照中不存在的列
    pub fn missing_columns(&self, spec: &FilterSpec) -> Result<Vec<String>> {
        let columns = self.store.get()?.columns();
        Ok(spec
            .referenced_columns()
            .into_iter()
            .filter(|c| !columns.contains(c))
            .collect())
    }

    fn run_analysis(
        &self,
        records: &[&Record],
        analysis: &AnalysisSpec,
    ) -> Result<(Vec<Record>, Option<AnalysisOutput>, &'static str)> {
        match analysis {
            AnalysisSpec::Pivot(spec) => {
                let table =
                    PivotTable::build(records, spec, self.registry(), self.config.max_pivot_cells)?;
                Ok((table.to_rows(), Some(AnalysisOutput::Pivot(table)), "pivot"))
            }
            AnalysisSpec::TimeSeries(spec) => {
                let series = bucket_series(records, spec, self.registry())?;
                Ok((
                    series.to_rows(),
                    Some(AnalysisOutput::TimeSeries(series)),
                    "time_series",
                ))
            }
            AnalysisSpec::Cube(spec) => {
                let cube = Cube::build(records, spec, self.config.max_cube_records)?;
                let slice = cube.query(&spec.slice)?;
                Ok((cube.cells(), Some(AnalysisOutput::Cube(slice)), "cube"))
            }
        }
    }
}
