//! 分组聚合引擎
//!
//! - 聚合函数注册表 (策略对象 + 别名)
//! - 分组聚合 (组键、`<列>_<函数>` 指标、`_count`)
//! - 排序与截断

pub mod functions;
pub mod group;
pub mod sort;

pub use functions::{AggregateFunction, AggregateRegistry, FnAggregate, PercentileAggregate};
pub use group::{
    metric_name, numeric_column, AggregateSpec, FunctionList, GroupAggregator, COUNT_FIELD,
};
pub use sort::{apply_limit, compare_rows, sort_rows, SortBy, SortOrder};
