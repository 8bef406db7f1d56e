//! 数据集快照存储
//!
//! 快照年龄超过 TTL 时同步重新加载全部数据源，整体替换 (一次赋值)。
//! 查询在开始时获取一次 `Arc<Snapshot>` 并在整个执行期间持有，
//! 并发的重新加载不会改动正在被求值的数据。

use super::source::{FieldNormalizer, IdentityNormalizer, RecordSource};
use crate::cache::CacheStore;
use crate::observability::{DATASET_RECORDS, DATASET_RELOAD_TOTAL};
use crate::{AnalyticsError, Record, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 记录来源字段
pub const SOURCE_FIELD: &str = "_source";

const SNAPSHOT_KEY: &str = "dataset";

/// 不可变数据快照
#[derive(Debug)]
pub struct Snapshot {
    records: Vec<Record>,
    loaded_at: Instant,
    loaded_at_utc: DateTime<Utc>,
    sources: Vec<String>,
}

impl Snapshot {
    pub fn new(records: Vec<Record>, sources: Vec<String>) -> Self {
        Self {
            records,
            loaded_at: Instant::now(),
            loaded_at_utc: Utc::now(),
            sources,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at_utc
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// 当前快照出现过的全部列名
    pub fn columns(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect()
    }
}

/// 记录存储
pub struct RecordStore {
    sources: Vec<Arc<dyn RecordSource>>,
    normalizer: Arc<dyn FieldNormalizer>,
    /// 单槽 TTL 缓存
    cache: CacheStore<Arc<Snapshot>>,
    /// 同一时刻只允许一次重新加载
    reload_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sources: Vec::new(),
            normalizer: Arc::new(IdentityNormalizer),
            cache: CacheStore::new("dataset", 1, ttl),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn FieldNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// 获取当前快照 (过期时同步重新加载)
    pub fn get(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.cache.get(SNAPSHOT_KEY) {
            return Ok(snapshot);
        }

        let _guard = self.reload_lock.lock();

        // 等锁期间可能已有其他调用方完成加载
        if let Some(snapshot) = self.cache.peek(SNAPSHOT_KEY) {
            return Ok(snapshot);
        }

        self.reload()
    }

    /// 强制重新加载
    pub fn refresh(&self) -> Result<Arc<Snapshot>> {
        let _guard = self.reload_lock.lock();
        self.reload()
    }

    fn reload(&self) -> Result<Arc<Snapshot>> {
        let start = Instant::now();
        let mut records = Vec::new();
        let mut source_ids = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let source_id = source.source_id().to_string();
            let batch = source.load().map_err(|e| {
                log::error!("Failed to load source {}: {:#}", source_id, e);
                AnalyticsError::SourceError(format!("{}: {}", source_id, e))
            })?;

            records.reserve(batch.len());
            for mut record in batch {
                record.insert(
                    SOURCE_FIELD.to_string(),
                    serde_json::Value::String(source_id.clone()),
                );
                self.normalizer.normalize(&source_id, &mut record);
                records.push(record);
            }
            source_ids.push(source_id);
        }

        let snapshot = Arc::new(Snapshot::new(records, source_ids));
        self.cache.set(SNAPSHOT_KEY, snapshot.clone(), None);

        DATASET_RELOAD_TOTAL.inc();
        DATASET_RECORDS.set(snapshot.len() as i64);
        log::info!(
            "Dataset reloaded: {} records from {} sources in {:?}",
            snapshot.len(),
            snapshot.sources().len(),
            start.elapsed()
        );

        Ok(snapshot)
    }

    /// 丢弃当前快照，下一次 `get` 重新加载
    pub fn invalidate(&self) -> bool {
        self.cache.delete(SNAPSHOT_KEY)
    }

    /// 当前快照年龄 (无有效快照时为 None)
    pub fn snapshot_age(&self) -> Option<Duration> {
        self.cache.peek(SNAPSHOT_KEY).map(|s| s.age())
    }

    pub fn ttl(&self) -> Duration {
        self.cache.default_ttl()
    }

    pub fn cache(&self) -> &CacheStore<Arc<Snapshot>> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemorySource;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    struct CountingSource {
        loads: AtomicUsize,
    }

    impl RecordSource for CountingSource {
        fn source_id(&self) -> &str {
            "counting"
        }

        fn load(&self) -> anyhow::Result<Vec<Record>> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![record(json!({"load": n}))])
        }
    }

    struct FailingSource;

    impl RecordSource for FailingSource {
        fn source_id(&self) -> &str {
            "broken.csv"
        }

        fn load(&self) -> anyhow::Result<Vec<Record>> {
            anyhow::bail!("file not found")
        }
    }

    #[test]
    fn test_stamps_source() {
        let source = Arc::new(MemorySource::new("posts.csv", vec![record(json!({"likes": 1}))]));
        let store = RecordStore::new(Duration::from_secs(60)).with_source(source);

        let snapshot = store.get().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.records()[0].get(SOURCE_FIELD), Some(&json!("posts.csv")));
        assert!(snapshot.columns().contains("likes"));
    }

    #[test]
    fn test_snapshot_reused_within_ttl() {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let store = RecordStore::new(Duration::from_secs(60)).with_source(source.clone());

        let first = store.get().unwrap();
        let second = store.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reload_after_ttl() {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let store = RecordStore::new(Duration::from_millis(20)).with_source(source.clone());

        let first = store.get().unwrap();
        std::thread::sleep(Duration::from_millis(40));
        let second = store.get().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        // 旧快照仍可被持有者完整读取
        assert_eq!(first.records()[0].get("load"), Some(&json!(0)));
        assert_eq!(second.records()[0].get("load"), Some(&json!(1)));
    }

    #[test]
    fn test_normalizer_applied() {
        let source = Arc::new(MemorySource::new("a", vec![record(json!({"Platform": "IG"}))]));
        let normalizer = |_: &str, r: &mut Record| {
            if let Some(v) = r.remove("Platform") {
                r.insert("platform".into(), v);
            }
        };
        let store = RecordStore::new(Duration::from_secs(60))
            .with_source(source)
            .with_normalizer(Arc::new(normalizer));

        let snapshot = store.get().unwrap();
        assert_eq!(snapshot.records()[0].get("platform"), Some(&json!("IG")));
    }

    #[test]
    fn test_source_error() {
        let store = RecordStore::new(Duration::from_secs(60)).with_source(Arc::new(FailingSource));
        let err = store.get().unwrap_err();
        assert!(matches!(err, AnalyticsError::SourceError(ref msg) if msg.contains("broken.csv")));
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let source = Arc::new(MemorySource::new("a", vec![record(json!({"x": 1}))]));
        let store = RecordStore::new(Duration::from_secs(60)).with_source(source.clone());

        assert_eq!(store.get().unwrap().len(), 1);
        source.replace(vec![record(json!({"x": 1})), record(json!({"x": 2}))]);
        assert_eq!(store.get().unwrap().len(), 1);

        assert!(store.invalidate());
        assert!(store.snapshot_age().is_none());
        assert_eq!(store.get().unwrap().len(), 2);
    }
}
