//! Prometheus 指标导出模块
//!
//! 提供执行核心的监控指标，包括：
//! - 查询处理次数与延迟
//! - 各级缓存的命中 / 淘汰 / 失效事件
//! - 数据集快照大小与重新加载次数

use lazy_static::lazy_static;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    /// 全局 Prometheus Registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ═══════════════════════════════════════════════════════════════════
    // 查询指标
    // ═══════════════════════════════════════════════════════════════════

    /// 查询处理总数 (kind = filter / aggregate / pivot / time_series / cube / cached)
    pub static ref QUERY_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("query_total", "Total number of filter specifications processed")
            .namespace("datacore"),
        &["kind"]
    ).expect("Failed to create QUERY_TOTAL metric");

    /// 查询处理延迟 (毫秒)
    pub static ref QUERY_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("query_latency_ms", "Query processing latency in milliseconds")
            .namespace("datacore")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]),
    ).expect("Failed to create QUERY_LATENCY metric");

    // ═══════════════════════════════════════════════════════════════════
    // 缓存指标
    // ═══════════════════════════════════════════════════════════════════

    /// 缓存事件 (tier = dataset / query / filter, event = hit / miss / set / evict / expire / invalidate)
    pub static ref CACHE_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("cache_events_total", "Cache events by tier")
            .namespace("datacore"),
        &["tier", "event"]
    ).expect("Failed to create CACHE_EVENTS metric");

    // ═══════════════════════════════════════════════════════════════════
    // 数据集指标
    // ═══════════════════════════════════════════════════════════════════

    /// 当前快照记录数
    pub static ref DATASET_RECORDS: IntGauge = IntGauge::with_opts(
        Opts::new("dataset_records", "Records in the active dataset snapshot")
            .namespace("datacore"),
    ).expect("Failed to create DATASET_RECORDS metric");

    /// 快照重新加载次数
    pub static ref DATASET_RELOAD_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("dataset_reload_total", "Number of dataset reloads")
            .namespace("datacore"),
    ).expect("Failed to create DATASET_RELOAD_TOTAL metric");
}

/// 注册所有指标 (重复调用安全)
pub fn init_metrics() {
    REGISTRY.register(Box::new(QUERY_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(QUERY_LATENCY.clone())).ok();
    REGISTRY.register(Box::new(CACHE_EVENTS.clone())).ok();
    REGISTRY.register(Box::new(DATASET_RECORDS.clone())).ok();
    REGISTRY.register(Box::new(DATASET_RELOAD_TOTAL.clone())).ok();
}

/// 导出 Prometheus 文本格式
pub fn gather_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        log::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// 查询计时器 (drop 前调用 observe)
pub struct QueryTimer {
    start: std::time::Instant,
}

impl QueryTimer {
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// 记录耗时并返回毫秒数
    pub fn observe(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        QUERY_LATENCY.observe(elapsed_ms);
        elapsed_ms
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 便捷宏
// ═══════════════════════════════════════════════════════════════════════

/// 记录缓存事件
#[macro_export]
macro_rules! record_cache_event {
    ($tier:expr, $event:expr) => {
        $crate::observability::CACHE_EVENTS
            .with_label_values(&[$tier, $event])
            .inc();
    };
}

/// 记录查询
#[macro_export]
macro_rules! record_query {
    ($kind:expr) => {
        $crate::observability::QUERY_TOTAL
            .with_label_values(&[$kind])
            .inc();
    };
}
