//! 缓存层
//!
//! 一套机制，三级特化:
//! - 数据集缓存: 单槽，仅 TTL (dataset::RecordStore 内部使用)
//! - 查询结果缓存: SHA-256(查询 + 上下文) → 完整响应
//! - 过滤规格缓存: 哈希(查询) → 规格，附带诊断用模糊检索
//!
//! 缓存对象显式构造并注入使用方，不存在全局单例。

pub mod filter_cache;
pub mod query_cache;
pub mod store;
pub mod sweeper;

pub use filter_cache::{jaccard, text_similarity, CachedSpec, FilterSpecCache, SimilarSpec};
pub use query_cache::{normalize_query, sha256_hex, QueryResultCache};
pub use store::{CacheEntry, CacheStats, CacheStore, EntryMeta};
pub use sweeper::{sweep_all, CacheSweeper, Sweepable};
