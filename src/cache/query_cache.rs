//! 查询结果缓存
//!
//! 键 = SHA-256(规范化查询文本 + 上下文)，值为完整响应。
//! 完全相同的重复查询直接命中，跳过执行和上游 LLM 调用。

use super::store::{CacheStats, CacheStore};
use crate::utils::config::CacheConfig;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// 键前缀，便于 `invalidate(Some("query:"))`
pub const QUERY_KEY_PREFIX: &str = "query:";

/// 查询文本规范化 (小写 + 去首尾空白)
#[inline]
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// 计算 SHA-256 十六进制摘要
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// 查询结果缓存
pub struct QueryResultCache<V> {
    store: CacheStore<V>,
}

impl<V: Clone> QueryResultCache<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            store: CacheStore::new("query", max_entries, ttl),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl())
    }

    /// 缓存键
    ///
    /// 上下文以 JSON 文本参与哈希；serde_json 的 Map 按键排序，
    /// 因此相同上下文总是得到相同的键。
    pub fn key_for(query: &str, context: &Value) -> String {
        let material = format!("{}\u{1f}{}", normalize_query(query), context);
        format!("{}{}", QUERY_KEY_PREFIX, sha256_hex(&material))
    }

    pub fn get(&self, query: &str, context: &Value) -> Option<V> {
        self.store.get(&Self::key_for(query, context))
    }

    pub fn put(&self, query: &str, context: &Value, value: V) {
        self.store.set(Self::key_for(query, context), value, None);
    }

    pub fn put_with_ttl(&self, query: &str, context: &Value, value: V, ttl: Duration) {
        self.store.set(Self::key_for(query, context), value, Some(ttl));
    }

    pub fn remove(&self, query: &str, context: &Value) -> bool {
        self.store.delete(&Self::key_for(query, context))
    }

    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        self.store.invalidate(pattern)
    }

    pub fn get_stats(&self) -> CacheStats {
        self.store.get_stats()
    }

    pub fn store(&self) -> &CacheStore<V> {
        &self.store
    }
}
