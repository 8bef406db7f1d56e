//! 聚合函数注册表
//!
//! 函数名 → 策略对象。新增函数通过 `register` 扩展注册表，
//! 不需要修改分发逻辑。

use crate::stats::descriptive;
use crate::utils::value::round2;
use crate::{AnalyticsError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 内置百分位
pub const BUILTIN_PERCENTILES: &[u32] = &[25, 50, 75, 90, 95, 99];

/// 聚合函数
///
/// `values` 已经过数值解析并去掉了 null，按输入迭代顺序排列。
/// 输入为空时应返回 None。
pub trait AggregateFunction: Send + Sync {
    fn name(&self) -> &str;

    fn compute(&self, values: &[f64]) -> Option<f64>;
}

/// 计算函数类型
type ComputeFn = Arc<dyn Fn(&[f64]) -> Option<f64> + Send + Sync>;

/// 闭包实现的聚合函数
#[derive(Clone)]
pub struct FnAggregate {
    name: String,
    compute: ComputeFn,
}

impl FnAggregate {
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&[f64]) -> Option<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compute: Arc::new(compute),
        }
    }
}

impl AggregateFunction for FnAggregate {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, values: &[f64]) -> Option<f64> {
        (self.compute)(values)
    }
}

/// 分位数 (线性插值)
#[derive(Debug, Clone)]
pub struct PercentileAggregate {
    name: String,
    p: f64,
}

impl PercentileAggregate {
    pub fn new(p: u32) -> Self {
        Self {
            name: format!("p{}", p),
            p: p as f64,
        }
    }
}

impl AggregateFunction for PercentileAggregate {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, values: &[f64]) -> Option<f64> {
        descriptive::percentile(values, self.p)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 注册表
// ═══════════════════════════════════════════════════════════════════════════

static BUILTIN_REGISTRY: Lazy<AggregateRegistry> = Lazy::new(AggregateRegistry::with_builtins);

/// 聚合函数注册表
#[derive(Clone)]
pub struct AggregateRegistry {
    functions: HashMap<String, Arc<dyn AggregateFunction>>,
}

impl AggregateRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// 内置函数注册表 (共享实例的克隆)
    pub fn builtin() -> Self {
        BUILTIN_REGISTRY.clone()
    }

    fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register_fn("sum", descriptive::sum);
        registry.register_fn("mean", descriptive::mean);
        registry.register_fn("median", descriptive::median);
        registry.register_fn("min", descriptive::min);
        registry.register_fn("max", descriptive::max);
        // 非空数值个数
        registry.register_fn("count", |v| (!v.is_empty()).then(|| v.len() as f64));
        registry.register_fn("std", descriptive::population_std);
        registry.register_fn("variance", descriptive::population_variance);
        registry.register_fn("mode", descriptive::mode);
        registry.register_fn("range", |v| {
            Some(descriptive::max(v)? - descriptive::min(v)?)
        });
        registry.register_fn("distinctCount", descriptive::distinct_count);
        registry.register_fn("first", |v| v.first().copied());
        registry.register_fn("last", |v| v.last().copied());

        for &p in BUILTIN_PERCENTILES {
            registry.register(Arc::new(PercentileAggregate::new(p)));
        }

        registry
    }

    /// 注册 (同名覆盖)
    pub fn register(&mut self, function: Arc<dyn AggregateFunction>) {
        self.functions.insert(function.name().to_string(), function);
    }

    pub fn register_fn<F>(&mut self, name: &str, compute: F)
    where
        F: Fn(&[f64]) -> Option<f64> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnAggregate::new(name, compute)));
    }

    /// 查找函数，支持别名
    ///
    /// - `avg` / `average` → `mean`
    /// - `stddev` → `std`
    /// - `percentile_N` → `pN`
    /// - `distinct_count` → `distinctCount`
    ///
    /// 内置名大小写不敏感。
    pub fn get(&self, name: &str) -> Option<Arc<dyn AggregateFunction>> {
        if let Some(f) = self.functions.get(name) {
            return Some(f.clone());
        }
        self.functions.get(&canonical_name(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 已注册函数名 (排序)
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// 按名称计算，结果保留两位小数
    ///
    /// 未知函数返回 `UnknownFunction`；输入为空返回 `Ok(None)`。
    pub fn apply(&self, name: &str, values: &[f64]) -> Result<Option<f64>> {
        let function = self
            .get(name)
            .ok_or_else(|| AnalyticsError::UnknownFunction(name.to_string()))?;
        Ok(function
            .compute(values)
            .filter(|v| v.is_finite())
            .map(round2))
    }
}

impl Default for AggregateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for AggregateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "avg" | "average" | "mean" => "mean".to_string(),
        "stddev" | "std_dev" | "std" => "std".to_string(),
        "var" | "variance" => "variance".to_string(),
        "distinct_count" | "distinctcount" => "distinctCount".to_string(),
        other => match other.strip_prefix("percentile_") {
            Some(digits) if digits.parse::<u32>().is_ok() => format!("p{}", digits),
            _ => other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, values: &[f64]) -> Option<f64> {
        AggregateRegistry::builtin().apply(name, values).unwrap()
    }

    #[test]
    fn test_builtin_set() {
        let registry = AggregateRegistry::builtin();
        for name in [
            "sum", "mean", "median", "min", "max", "count", "std", "variance", "mode", "range",
            "p25", "p50", "p75", "p90", "p95", "p99", "distinctCount", "first", "last",
        ] {
            assert!(registry.contains(name), "{}", name);
        }
        assert_eq!(registry.len(), 19);
    }

    #[test]
    fn test_basic_functions() {
        let v = [10.0, 20.0, 30.0, 20.0];
        assert_eq!(apply("sum", &v), Some(80.0));
        assert_eq!(apply("mean", &v), Some(20.0));
        assert_eq!(apply("median", &v), Some(20.0));
        assert_eq!(apply("range", &v), Some(20.0));
        assert_eq!(apply("mode", &v), Some(20.0));
        assert_eq!(apply("count", &v), Some(4.0));
        assert_eq!(apply("distinctCount", &v), Some(3.0));
        assert_eq!(apply("first", &v), Some(10.0));
        assert_eq!(apply("last", &v), Some(20.0));
    }

    #[test]
    fn test_rounding_and_population_std() {
        // 总体标准差: √(2/3) = 0.8164...
        assert_eq!(apply("std", &[1.0, 2.0, 3.0]), Some(0.82));
        assert_eq!(apply("variance", &[1.0, 2.0, 3.0]), Some(0.67));
        assert_eq!(apply("mean", &[1.0, 1.0, 2.0]), Some(1.33));
    }

    #[test]
    fn test_empty_input_is_null() {
        for name in AggregateRegistry::builtin().names() {
            assert_eq!(apply(&name, &[]), None, "{}", name);
        }
    }

    #[test]
    fn test_aliases() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(apply("avg", &v), Some(3.0));
        assert_eq!(apply("stddev", &v), apply("std", &v));
        assert_eq!(apply("percentile_90", &v), Some(4.6));
        assert_eq!(apply("distinct_count", &v), Some(5.0));
        assert!(!AggregateRegistry::builtin().contains("percentile_x"));
    }

    #[test]
    fn test_unknown_function() {
        let err = AggregateRegistry::builtin().apply("geomean", &[1.0]).unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownFunction(name) if name == "geomean"));
    }

    #[test]
    fn test_register_custom() {
        let mut registry = AggregateRegistry::builtin();
        registry.register_fn("sum_squares", |v| {
            (!v.is_empty()).then(|| v.iter().map(|x| x * x).sum())
        });
        assert_eq!(registry.apply("sum_squares", &[1.0, 2.0]).unwrap(), Some(5.0));
        // 共享的内置表不受影响
        assert!(!AggregateRegistry::builtin().contains("sum_squares"));
    }
}
