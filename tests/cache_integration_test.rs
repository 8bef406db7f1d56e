// 缓存层集成测试
//
// 覆盖：
// - 通用存储的 TTL / LRU / 失效语义
// - 查询结果缓存与查询引擎的组合
// - 过滤规格缓存的精确命中与诊断用模糊检索
// - 后台清扫线程与多线程读写

use datacore::cache::{sweep_all, Sweepable};
use datacore::{
    AnalyticsConfig, CacheStore, CacheSweeper, FilterSpec, FilterSpecCache, MemorySource,
    QueryEngine, QueryResultCache, RecordStore,
};
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_set_then_get_and_expiry() {
    init_logger();
    let store: CacheStore<String> = CacheStore::new("test", 10, Duration::from_millis(40));

    store.set("k", "v".to_string(), None);
    assert_eq!(store.get("k"), Some("v".to_string()));

    thread::sleep(Duration::from_millis(80));
    assert_eq!(store.get("k"), None);
    // 读时过期后物理删除
    assert_eq!(store.len(), 0);

    let stats = store.get_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.sets, 1);
}

#[test]
fn test_lru_evicts_least_recently_accessed() {
    let store: CacheStore<u32> = CacheStore::new("test", 3, Duration::from_secs(60));
    store.set("a", 1, None);
    store.set("b", 2, None);
    store.set("c", 3, None);

    // 访问最早创建的 a，使 b 成为最久未访问
    assert_eq!(store.get("a"), Some(1));
    store.set("d", 4, None);

    assert_eq!(store.get("b"), None);
    assert_eq!(store.get("a"), Some(1));
    assert_eq!(store.get("c"), Some(3));
    assert_eq!(store.get("d"), Some(4));
    assert_eq!(store.get_stats().evictions, 1);
    assert_eq!(store.get_stats().size, 3);
}

#[test]
fn test_overwrite_at_capacity_does_not_evict() {
    let store: CacheStore<u32> = CacheStore::new("test", 2, Duration::from_secs(60));
    store.set("a", 1, None);
    store.set("b", 2, None);
    store.set("a", 10, None);

    assert_eq!(store.get("a"), Some(10));
    assert_eq!(store.get("b"), Some(2));
    assert_eq!(store.get_stats().evictions, 0);
}

#[test]
fn test_pattern_invalidation() {
    let store: CacheStore<u32> = CacheStore::new("test", 10, Duration::from_secs(60));
    store.set("query:1", 1, None);
    store.set("query:2", 2, None);
    store.set("filter:1", 3, None);

    assert_eq!(store.invalidate(Some("query:")), 2);
    assert_eq!(store.get("filter:1"), Some(3));
    assert_eq!(store.invalidate(None), 1);
    assert!(store.is_empty());

    let stats = store.get_stats();
    assert_eq!(stats.invalidations, 3);
    assert_eq!(stats.max_size, 10);
}

#[test]
fn test_query_cache_with_engine() {
    init_logger();
    let source = Arc::new(MemorySource::from_json(
        "posts",
        json!([
            {"platform": "Instagram", "likes": 10},
            {"platform": "Facebook", "likes": 5}
        ]),
    ));
    let store = Arc::new(RecordStore::new(Duration::from_secs(300)).with_source(source.clone()));
    let cache = Arc::new(QueryResultCache::new(100, Duration::from_secs(60)));
    let engine = QueryEngine::new(store).with_result_cache(cache.clone());

    let spec = FilterSpec::builder().aggregate("likes", "sum").build().unwrap();
    let ctx = json!({"previous": null});

    let first = engine.process_cached("total likes", &ctx, &spec).unwrap();
    let again = engine.process_cached("TOTAL LIKES", &ctx, &spec).unwrap();
    assert!(again.summary.from_cache);
    assert_eq!(again.rows, first.rows);

    // 失效后重新执行
    assert_eq!(cache.invalidate(Some("query:")), 1);
    let fresh = engine.process_cached("total likes", &ctx, &spec).unwrap();
    assert!(!fresh.summary.from_cache);

    let stats = cache.get_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert!((stats.hit_rate - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_filter_cache_exact_and_similar() {
    let config = AnalyticsConfig::default();
    let cache: FilterSpecCache = FilterSpecCache::from_config(&config.filter_cache);

    let spec = FilterSpec::builder()
        .group_by("platform")
        .aggregate("likes", "mean")
        .build()
        .unwrap();
    cache.put("average likes by platform", spec.clone());

    assert_eq!(cache.get("  Average Likes By Platform"), Some(spec.clone()));
    assert_eq!(cache.get("average likes by type"), None);

    // 相似但不完全相同: 只出现在诊断结果中
    let similar = cache.find_similar("average likes by platform please", Some(0.5));
    assert_eq!(similar.len(), 1);
    assert!((similar[0].similarity - 0.8).abs() < 1e-9);
    assert_eq!(similar[0].spec, spec);

    assert!(cache.find_similar("total shares on tiktok", None).is_empty());

    // 模糊检索不影响命中统计
    let stats = cache.get_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[test]
fn test_sweeper_removes_expired_entries() {
    init_logger();
    let short: Arc<CacheStore<u32>> =
        Arc::new(CacheStore::new("short", 10, Duration::from_millis(20)));
    let long: Arc<QueryResultCache<u32>> =
        Arc::new(QueryResultCache::new(10, Duration::from_secs(60)));

    short.set("a", 1, None);
    short.set("b", 2, None);
    long.put("q", &json!({}), 7);

    let targets: Vec<Arc<dyn Sweepable>> = vec![short.clone(), long.clone()];
    let mut sweeper = CacheSweeper::start(targets, Duration::from_millis(10)).unwrap();
    assert!(sweeper.is_running());

    thread::sleep(Duration::from_millis(150));
    assert_eq!(short.len(), 0);
    assert_eq!(short.get_stats().expirations, 2);
    assert_eq!(long.get("q", &json!({})), Some(7));

    sweeper.stop();
    assert!(!sweeper.is_running());
}

#[test]
fn test_sweep_all_once() {
    let a: Arc<CacheStore<u32>> = Arc::new(CacheStore::new("a", 10, Duration::from_millis(1)));
    let b: Arc<CacheStore<u32>> = Arc::new(CacheStore::new("b", 10, Duration::from_millis(1)));
    a.set("x", 1, None);
    b.set("y", 2, None);
    b.set("z", 3, Some(Duration::from_secs(60)));

    thread::sleep(Duration::from_millis(20));
    let targets: Vec<Arc<dyn Sweepable>> = vec![a, b.clone()];
    assert_eq!(sweep_all(&targets), 2);
    assert_eq!(b.get("z"), Some(3));
}

#[test]
fn test_concurrent_readers_and_writers() {
    let store: Arc<CacheStore<usize>> =
        Arc::new(CacheStore::new("concurrent", 64, Duration::from_secs(60)));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("k{}", (t * 200 + i) % 100);
                    store.set(key.clone(), i, None);
                    let _ = store.get(&key);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = store.get_stats();
    assert!(stats.size <= 64);
    assert_eq!(stats.sets, 1600);
    assert_eq!(stats.hits + stats.misses, 1600);
}
