//! 数据集模块
//!
//! - 数据源 (source) - 外部导入方实现 `RecordSource`
//! - 快照存储 (store) - TTL 刷新、整体替换的内存快照

pub mod source;
pub mod store;

pub use source::*;
pub use store::*;
