//! 可观测性模块
//!
//! 提供 Prometheus 指标导出、查询延迟追踪以及日志初始化

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::*;
