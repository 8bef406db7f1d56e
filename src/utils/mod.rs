//! 工具模块
//!
//! - 配置管理 (config)
//! - 标量转换与日期解析 (value)

pub mod config;
pub mod value;

pub use config::*;
pub use value::*;
