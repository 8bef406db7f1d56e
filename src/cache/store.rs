//! 通用 TTL + LRU 缓存
//!
//! 所有缓存层 (数据集 / 查询结果 / 过滤规格) 共用同一套机制:
//! - 惰性过期: `get` 发现过期条目时视为缺失并物理删除
//! - 容量淘汰: 仅在插入新键且已满时淘汰 `last_accessed` 最旧的条目
//! - 后台清扫: `sweep_expired` 与 `get` 使用同一个过期判定 `is_expired_at`
//!
//! 读路径持有 DashMap 分片锁完成「判定 + 克隆」，清扫的 `retain`
//! 需要同一分片的写锁，因此不会删掉一个正在被读取返回的条目。

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    /// 恒等于 `created_at + ttl`
    pub expires_at: Instant,
    pub last_accessed: Instant,
    pub hit_count: u64,
    pub ttl: Duration,
    /// 单调递增的访问序号，LRU 比较用 (Instant 在粗粒度时钟上可能相等)
    access_seq: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration, now: Instant, access_seq: u64) -> Self {
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
            last_accessed: now,
            hit_count: 0,
            ttl,
            access_seq,
        }
    }

    /// 唯一的过期判定，读路径与清扫共用
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// 条目元数据 (不含值)，用于诊断
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_accessed: Instant,
    pub hit_count: u64,
    pub ttl: Duration,
}

/// 内部计数器
#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// 缓存统计快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub max_size: usize,
}

/// TTL + LRU 缓存
pub struct CacheStore<V> {
    /// 指标标签 (dataset / query / filter)
    tier: &'static str,

    entries: DashMap<String, CacheEntry<V>>,

    max_entries: usize,

    default_ttl: Duration,

    access_clock: AtomicU64,

    counters: CacheCounters,

    /// 串行化「检查容量 → 淘汰 → 插入」
    write_lock: Mutex<()>,
}

impl<V: Clone> CacheStore<V> {
    /// 创建新的缓存
    ///
    /// # 参数
    /// - `tier`: 指标中的缓存层名称
    /// - `max_entries`: 最大条目数 (至少为 1)
    /// - `default_ttl`: `set` 未指定 TTL 时使用
    pub fn new(tier: &'static str, max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            tier,
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            default_ttl,
            access_clock: AtomicU64::new(0),
            counters: CacheCounters::default(),
            write_lock: Mutex::new(()),
        }
    }

    #[inline]
    fn next_seq(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn tier(&self) -> &'static str {
        self.tier
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 读取缓存
    ///
    /// 命中时只刷新访问时间和命中次数，不延长过期时间。
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired_at(now) {
                entry.last_accessed = now;
                entry.hit_count += 1;
                entry.access_seq = self.next_seq();
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                crate::record_cache_event!(self.tier, "hit");
                return Some(entry.value.clone());
            }

            // 缓存过期，释放分片锁后删除
            drop(entry);
            if self
                .entries
                .remove_if(key, |_, e| e.is_expired_at(now))
                .is_some()
            {
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                crate::record_cache_event!(self.tier, "expire");
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        crate::record_cache_event!(self.tier, "miss");
        log::debug!("[{}] cache miss: {}", self.tier, key);
        None
    }

    /// 写入缓存 (`ttl = None` 使用默认 TTL)
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Instant::now();

        let _guard = self.write_lock.lock();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            // 先清理过期条目，仍满时才淘汰存活条目
            self.purge_expired(now);
            if self.entries.len() >= self.max_entries {
                self.evict_lru();
            }
        }

        let entry = CacheEntry::new(value, ttl, now, self.next_seq());
        self.entries.insert(key, entry);
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        crate::record_cache_event!(self.tier, "set");
    }

    /// 淘汰最久未访问的条目
    fn evict_lru(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|e| e.value().access_seq)
            .map(|e| e.key().clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            crate::record_cache_event!(self.tier, "evict");
            log::debug!("[{}] evicted LRU entry: {}", self.tier, key);
        }
    }

    /// 删除单个键
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
            crate::record_cache_event!(self.tier, "invalidate");
        }
        removed
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.invalidate(None);
    }

    /// 按子串模式失效，`None` 时清空全部
    ///
    /// 返回删除的条目数。
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        let removed = match pattern {
            None => {
                let count = self.entries.len();
                self.entries.clear();
                count
            }
            Some(pattern) => {
                let before = self.entries.len();
                self.entries.retain(|key, _| !key.contains(pattern));
                before.saturating_sub(self.entries.len())
            }
        };

        if removed > 0 {
            self.counters
                .invalidations
                .fetch_add(removed as u64, Ordering::Relaxed);
            crate::record_cache_event!(self.tier, "invalidate");
            log::info!(
                "[{}] invalidated {} entries (pattern: {:?})",
                self.tier,
                removed,
                pattern
            );
        }
        removed
    }

    /// 主动清理已过期条目，返回清理数量
    pub fn sweep_expired(&self) -> usize {
        self.purge_expired(Instant::now())
    }

    fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            self.counters
                .expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
            crate::record_cache_event!(self.tier, "expire");
            log::debug!("[{}] swept {} expired entries", self.tier, removed);
        }
        removed
    }

    /// 读取但不计入统计、不刷新访问时间
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| !e.is_expired_at(now))
            .map(|e| e.value.clone())
    }

    /// 查看条目元数据 (不计入命中，不刷新访问时间)
    pub fn entry_meta(&self, key: &str) -> Option<EntryMeta> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| !e.is_expired_at(now))
            .map(|e| EntryMeta {
                created_at: e.created_at,
                expires_at: e.expires_at,
                last_accessed: e.last_accessed,
                hit_count: e.hit_count,
                ttl: e.ttl,
            })
    }

    /// 未过期条目的快照 (不计入命中)
    pub fn live_entries(&self) -> Vec<(String, V)> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired_at(now))
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect()
    }

    /// 物理条目数 (可能包含尚未清扫的过期条目)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// 获取缓存统计信息
    pub fn get_stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        CacheStats {
            hits,
            misses,
            sets: self.counters.sets.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            hit_rate: hit_rate(hits, misses),
            size: self.entries.len(),
            max_size: self.max_entries,
        }
    }
}

/// 计算缓存命中率
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    if hits + misses == 0 {
        return 0.0;
    }
    hits as f64 / (hits + misses) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_set_then_get() {
        let cache = CacheStore::new("test", 10, Duration::from_secs(60));

        assert!(cache.get("a").is_none());
        cache.set("a", 1, None);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = CacheStore::new("test", 10, Duration::from_secs(60));
        cache.set("a", "v".to_string(), Some(Duration::from_millis(50)));

        assert_eq!(cache.get("a").as_deref(), Some("v"));

        // 等待缓存过期
        sleep(Duration::from_millis(80));

        assert!(cache.get("a").is_none());
        // 过期条目被物理删除
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get_stats().expirations, 1);
    }

    #[test]
    fn test_lru_evicts_least_recently_accessed() {
        let cache = CacheStore::new("test", 2, Duration::from_secs(60));
        cache.set("old", 1, None);
        cache.set("new", 2, None);

        // 访问最早创建的条目，使 "new" 成为最久未访问
        assert_eq!(cache.get("old"), Some(1));

        cache.set("third", 3, None);

        assert_eq!(cache.get("old"), Some(1));
        assert!(cache.get("new").is_none());
        assert_eq!(cache.get("third"), Some(3));
        assert_eq!(cache.get_stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = CacheStore::new("test", 2, Duration::from_secs(60));
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("a", 10, None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get_stats().evictions, 0);
    }

    #[test]
    fn test_hit_refreshes_access_not_expiry() {
        let cache = CacheStore::new("test", 10, Duration::from_secs(60));
        cache.set("a", 1, Some(Duration::from_secs(5)));

        let before = cache.entry_meta("a").unwrap();
        sleep(Duration::from_millis(5));
        cache.get("a");
        let after = cache.entry_meta("a").unwrap();

        assert_eq!(before.expires_at, after.expires_at);
        assert!(after.last_accessed > before.last_accessed);
        assert_eq!(after.hit_count, 1);
        assert_eq!(after.expires_at, after.created_at + after.ttl);
    }

    #[test]
    fn test_invalidate_pattern() {
        let cache = CacheStore::new("test", 10, Duration::from_secs(60));
        cache.set("query:abc", 1, None);
        cache.set("query:def", 2, None);
        cache.set("filter:abc", 3, None);

        assert_eq!(cache.invalidate(Some("query:")), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate(None), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get_stats().invalidations, 3);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = CacheStore::new("test", 10, Duration::from_secs(60));
        cache.set("a", 1, None);
        cache.set("b", 2, None);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_clear_counts_invalidations() {
        let cache = CacheStore::new("test", 10, Duration::from_secs(60));
        cache.set("a", 1, None);
        cache.set("b", 2, None);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get_stats().invalidations, 2);

        // 空缓存清空不计数
        cache.clear();
        assert_eq!(cache.get_stats().invalidations, 2);
    }

    #[test]
    fn test_full_store_drops_expired_before_evicting() {
        let cache = CacheStore::new("test", 2, Duration::from_secs(60));
        cache.set("a", 1, Some(Duration::from_millis(10)));
        cache.set("b", 2, None);

        sleep(Duration::from_millis(30));
        cache.set("c", 3, None);

        // 过期的 "a" 被清理，存活的 "b" 不被淘汰
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek("b"), Some(2));
        assert_eq!(cache.peek("c"), Some(3));
        let stats = cache.get_stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_sweep_expired() {
        let cache = CacheStore::new("test", 10, Duration::from_secs(60));
        cache.set("short", 1, Some(Duration::from_millis(20)));
        cache.set("long", 2, None);

        sleep(Duration::from_millis(40));

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_stats() {
        let cache = CacheStore::new("test", 5, Duration::from_secs(60));

        cache.get("a");
        cache.set("a", 1, None);
        cache.get("a");
        cache.get("a");

        let stats = cache.get_stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.max_size, 5);
        assert_eq!(stats.hit_rate, 2.0 / 3.0);
    }

    #[test]
    fn test_live_entries_skip_expired() {
        let cache = CacheStore::new("test", 10, Duration::from_secs(60));
        cache.set("a", 1, Some(Duration::from_millis(10)));
        cache.set("b", 2, None);

        sleep(Duration::from_millis(30));

        let live = cache.live_entries();
        assert_eq!(live, vec![("b".to_string(), 2)]);
    }
}
