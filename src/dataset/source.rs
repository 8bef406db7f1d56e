//! 数据源接口
//!
//! CSV 导入和字段规范化由外部协作方完成，这里只定义边界。

use crate::Record;
use parking_lot::RwLock;

/// 记录数据源
pub trait RecordSource: Send + Sync {
    /// 源标识 (写入每条记录的 `_source` 字段)
    fn source_id(&self) -> &str;

    /// 加载全部记录 (可能阻塞)
    fn load(&self) -> anyhow::Result<Vec<Record>>;
}

/// 字段规范化钩子
pub trait FieldNormalizer: Send + Sync {
    fn normalize(&self, source_id: &str, record: &mut Record);
}

/// 不做任何处理的规范化器
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityNormalizer;

impl FieldNormalizer for IdentityNormalizer {
    fn normalize(&self, _source_id: &str, _record: &mut Record) {}
}

/// 闭包形式的规范化器
impl<F> FieldNormalizer for F
where
    F: Fn(&str, &mut Record) + Send + Sync,
{
    fn normalize(&self, source_id: &str, record: &mut Record) {
        self(source_id, record)
    }
}

/// 内存数据源
///
/// 宿主已持有解析好的记录时使用；`replace` 之后的下一次重新加载可见。
pub struct MemorySource {
    id: String,
    records: RwLock<Vec<Record>>,
}

impl MemorySource {
    pub fn new(id: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            id: id.into(),
            records: RwLock::new(records),
        }
    }

    /// 从 JSON 数组构造 (非对象元素被忽略)
    pub fn from_json(id: impl Into<String>, value: serde_json::Value) -> Self {
        let records = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Self::new(id, records)
    }

    /// 替换底层数据
    pub fn replace(&self, records: Vec<Record>) {
        *self.records.write() = records;
    }
}

impl RecordSource for MemorySource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn load(&self) -> anyhow::Result<Vec<Record>> {
        Ok(self.records.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_source_from_json() {
        let source = MemorySource::from_json(
            "posts.csv",
            json!([{"platform": "Instagram"}, 3, {"platform": "Facebook"}]),
        );
        assert_eq!(source.source_id(), "posts.csv");
        assert_eq!(source.load().unwrap().len(), 2);
    }

    #[test]
    fn test_closure_normalizer() {
        let normalizer = |_: &str, record: &mut Record| {
            record.insert("normalized".into(), json!(true));
        };
        let mut record = Record::new();
        normalizer.normalize("a", &mut record);
        assert_eq!(record.get("normalized"), Some(&json!(true)));
    }
}
