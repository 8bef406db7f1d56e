//! 多维分析
//!
//! - OLAP 立方体: 维度树 + 可合并度量状态
//! - 交叉透视: 两个维度的单元格矩阵与合计
//! - 时间序列: 按日 / 周 / 月 / 季 / 年分桶
//!
//! 三者都按查询构建，不单独缓存。

pub mod olap;
pub mod pivot;
pub mod timeseries;

pub use olap::{Cube, CubeQueryResult, CubeSpec, Measure, MeasureFunction};
pub use pivot::{PivotSpec, PivotTable};
pub use timeseries::{bucket_series, Granularity, TimeBucket, TimeSeries, TimeSeriesSpec};
