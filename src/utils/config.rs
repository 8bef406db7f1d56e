//! 配置管理模块

use crate::filter::UnknownOperatorPolicy;
use crate::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 分析核心总配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default = "default_query_cache")]
    pub query_cache: CacheConfig,
    #[serde(default)]
    pub filter_cache: FilterCacheConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 默认过滤级别，`RUST_LOG` 优先
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// 数据集刷新配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// 快照生存时间 (秒)
    #[serde(default = "default_dataset_ttl")]
    pub ttl_secs: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dataset_ttl(),
        }
    }
}

impl DatasetConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 通用缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 最大条目数 (超出时按 LRU 淘汰)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// 默认 TTL (秒)
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// 后台清扫间隔 (秒)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// 过滤规格缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_filter_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// 模糊相似度阈值 (Jaccard, 0~1)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for FilterCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_filter_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl FilterCacheConfig {
    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.max_entries,
            ttl_secs: self.ttl_secs,
            sweep_interval_secs: self.sweep_interval_secs,
        }
    }
}

/// 执行引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 未知过滤操作符的处理方式
    #[serde(default)]
    pub unknown_operator: UnknownOperatorPolicy,
    /// 立方体构建的最大输入记录数 (None = 不限制)
    #[serde(default)]
    pub max_cube_records: Option<usize>,
    /// 透视表最大单元格数 (None = 不限制)
    #[serde(default = "default_pivot_limit")]
    pub max_pivot_cells: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_operator: UnknownOperatorPolicy::default(),
            max_cube_records: None,
            max_pivot_cells: default_pivot_limit(),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AnalyticsError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AnalyticsError::ConfigError(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn load_default() -> Result<Self> {
        Self::load_from_file("config/analytics.toml")
    }
}

// 默认值函数
fn default_dataset_ttl() -> u64 {
    300
}
fn default_max_entries() -> usize {
    1000
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_filter_ttl() -> u64 {
    86_400
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_similarity_threshold() -> f64 {
    0.8
}
fn default_pivot_limit() -> Option<usize> {
    Some(10_000)
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_query_cache() -> CacheConfig {
    CacheConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AnalyticsConfig::from_toml_str("").unwrap();
        assert_eq!(config.dataset.ttl_secs, 300);
        assert_eq!(config.query_cache.max_entries, 1000);
        assert_eq!(config.filter_cache.similarity_threshold, 0.8);
        assert_eq!(config.engine.unknown_operator, UnknownOperatorPolicy::FailClosed);
        assert_eq!(config.engine.max_pivot_cells, Some(10_000));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_override() {
        let config = AnalyticsConfig::from_toml_str(
            r#"
            [dataset]
            ttl_secs = 30

            [query_cache]
            max_entries = 50

            [engine]
            unknown_operator = "fail_open"
            max_cube_records = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset.ttl(), Duration::from_secs(30));
        assert_eq!(config.query_cache.max_entries, 50);
        assert_eq!(config.query_cache.ttl_secs, 3600);
        assert_eq!(config.engine.unknown_operator, UnknownOperatorPolicy::FailOpen);
        assert_eq!(config.engine.max_cube_records, Some(5000));
        assert_eq!(config.engine.max_pivot_cells, Some(10_000));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[filter_cache]\nsimilarity_threshold = 0.6").unwrap();

        let config = AnalyticsConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.filter_cache.similarity_threshold, 0.6);
    }

    #[test]
    fn test_invalid_toml() {
        let err = AnalyticsConfig::from_toml_str("[dataset\nttl_secs = ").unwrap_err();
        assert!(matches!(err, AnalyticsError::ConfigError(_)));
    }
}
