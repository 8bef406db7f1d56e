//! 过滤规格缓存
//!
//! 键 = 规范化查询文本的哈希，值为上游翻译得到的过滤规格。
//! 除精确查找外提供基于 Jaccard 相似度的模糊检索，仅用于诊断，
//! 不会自动替代精确命中。

use super::query_cache::{normalize_query, sha256_hex};
use super::store::{CacheStats, CacheStore};
use crate::query::FilterSpec;
use crate::utils::config::FilterCacheConfig;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

pub const FILTER_KEY_PREFIX: &str = "filter:";

/// 缓存值: 规范化后的原始查询 + 规格
#[derive(Debug, Clone)]
pub struct CachedSpec<S> {
    pub query: String,
    pub spec: S,
}

/// 模糊检索结果
#[derive(Debug, Clone, Serialize)]
pub struct SimilarSpec<S> {
    pub query: String,
    pub similarity: f64,
    pub spec: S,
}

/// 过滤规格缓存
pub struct FilterSpecCache<S = FilterSpec> {
    store: CacheStore<CachedSpec<S>>,
    similarity_threshold: f64,
}

impl<S: Clone> FilterSpecCache<S> {
    pub fn new(max_entries: usize, ttl: Duration, similarity_threshold: f64) -> Self {
        Self {
            store: CacheStore::new("filter", max_entries, ttl),
            similarity_threshold: similarity_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &FilterCacheConfig) -> Self {
        let cache = config.cache();
        Self::new(cache.max_entries, cache.ttl(), config.similarity_threshold)
    }

    pub fn key_for(query: &str) -> String {
        format!("{}{}", FILTER_KEY_PREFIX, sha256_hex(&normalize_query(query)))
    }

    /// 精确查找
    pub fn get(&self, query: &str) -> Option<S> {
        self.store.get(&Self::key_for(query)).map(|cached| cached.spec)
    }

    pub fn put(&self, query: &str, spec: S) {
        let cached = CachedSpec {
            query: normalize_query(query),
            spec,
        };
        self.store.set(Self::key_for(query), cached, None);
    }

    /// 模糊检索近似的已缓存规格 (诊断用)
    ///
    /// 不计入命中统计，不刷新 LRU。结果按相似度降序。
    pub fn find_similar(&self, query: &str, threshold: Option<f64>) -> Vec<SimilarSpec<S>> {
        let threshold = threshold.unwrap_or(self.similarity_threshold);
        let normalized = normalize_query(query);
        let words = word_set(&normalized);

        let mut matches: Vec<SimilarSpec<S>> = self
            .store
            .live_entries()
            .into_iter()
            .filter_map(|(_, cached)| {
                let similarity = jaccard(&words, &word_set(&cached.query));
                (similarity >= threshold).then(|| SimilarSpec {
                    query: cached.query,
                    similarity,
                    spec: cached.spec,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.query.cmp(&b.query))
        });
        matches
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        self.store.invalidate(pattern)
    }

    pub fn get_stats(&self) -> CacheStats {
        self.store.get_stats()
    }

    pub fn store(&self) -> &CacheStore<CachedSpec<S>> {
        &self.store
    }
}

/// 词集合 (按非字母数字字符切分)
fn word_set(text: &str) -> HashSet<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Jaccard 相似度 |A∩B| / |A∪B|，两个空集返回 0
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// 两段文本的词集合 Jaccard 相似度
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let left = normalize_query(a);
    let right = normalize_query(b);
    jaccard(&word_set(&left), &word_set(&right))
}
