//! # DATACORE
//!
//! 对话式分析看板的确定性执行核心
//!
//! ## 核心能力
//!
//! - **数据集**: TTL 刷新的内存记录快照 (dataset/)
//! - **过滤器**: 类型化 AND/OR 过滤树求值 (filter/)
//! - **聚合**: 分组 + 可扩展聚合函数注册表 (aggregation/)
//! - **多维分析**: OLAP 立方体 / 交叉透视 / 时间序列分桶 (cube/)
//! - **统计推断**: 置信区间 / t 检验 / 异常值 / 趋势回归 (stats/)
//! - **缓存**: TTL + LRU 通用缓存及三级特化 (cache/)
//!
//! ## 架构设计
//!
//! ```text
//! Filter Specification (上游 NL → 过滤器翻译)
//!     ↓
//! QueryEngine (query/) ← QueryResultCache (cache/)
//!     ↓
//! RecordStore (dataset/) → FilterEvaluator (filter/)
//!     ↓
//! GroupAggregator (aggregation/) | Cube / Pivot / TimeSeries (cube/)
//!     ↓
//! sort → limit → QueryResult
//! ```
//!
//! 执行核心是同步、单线程的；唯一可能阻塞的操作是数据集重新加载。

// ============================================================================
// 外部依赖
// ============================================================================

pub use chrono;
pub use log;
pub use serde;
pub use serde_json;

// ============================================================================
// 内部模块
// ============================================================================

/// 通用 TTL + LRU 缓存及其特化
pub mod cache;

/// 内存数据集快照
pub mod dataset;

/// 过滤树与求值器
pub mod filter;

/// 分组聚合引擎
pub mod aggregation;

/// OLAP 立方体、交叉透视、时间序列
pub mod cube;

/// 统计推断
pub mod stats;

/// 查询编排 (processData 入口)
pub mod query;

/// 工具模块 (配置、标量转换)
pub mod utils;

/// 可观测性模块 (Prometheus)
pub mod observability;

// ============================================================================
// 重导出常用类型
// ============================================================================

pub use aggregation::{AggregateFunction, AggregateRegistry, GroupAggregator};
pub use cache::{CacheStats, CacheStore, CacheSweeper, FilterSpecCache, QueryResultCache};
pub use dataset::{FieldNormalizer, MemorySource, RecordSource, RecordStore, Snapshot};
pub use filter::{Condition, FilterEvaluator, FilterNode, Operator, UnknownOperatorPolicy};
pub use query::{FilterSpec, QueryEngine, QueryResult, QuerySummary};
pub use utils::config::AnalyticsConfig;

/// 单条记录: 列名 → 标量
pub type Record = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// 全局错误类型
// ============================================================================

/// 分析核心错误类型
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        AnalyticsError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for AnalyticsError {
    fn from(e: std::io::Error) -> Self {
        AnalyticsError::IOError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

// ============================================================================
// 测试模块
// ============================================================================
