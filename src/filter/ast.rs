//! 过滤树 AST 定义
//!
//! 上游翻译器输出的 JSON 通过 `serde(try_from)` 进入这里，构造时即完成
//! 形状校验 (between 元数、in 的数组值、空列名)，求值阶段不再处理畸形节点。

use crate::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ═══════════════════════════════════════════════════════════════════════════
// 操作符
// ═══════════════════════════════════════════════════════════════════════════

/// 叶子条件操作符
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Between,
    After,
    Before,
    /// 无法识别的操作符，求值时按 `UnknownOperatorPolicy` 处理
    Unknown(String),
}

impl Operator {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "equals" | "eq" | "==" => Operator::Equals,
            "not_equals" | "ne" | "!=" => Operator::NotEquals,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "starts_with" => Operator::StartsWith,
            "ends_with" => Operator::EndsWith,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "greater_than" | "gt" | ">" => Operator::GreaterThan,
            "less_than" | "lt" | "<" => Operator::LessThan,
            "greater_than_or_equal" | "gte" | ">=" => Operator::GreaterThanOrEqual,
            "less_than_or_equal" | "lte" | "<=" => Operator::LessThanOrEqual,
            "between" => Operator::Between,
            "after" => Operator::After,
            "before" => Operator::Before,
            _ => Operator::Unknown(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterThanOrEqual => "greater_than_or_equal",
            Operator::LessThanOrEqual => "less_than_or_equal",
            Operator::Between => "between",
            Operator::After => "after",
            Operator::Before => "before",
            Operator::Unknown(name) => name,
        }
    }
}

impl Serialize for Operator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Operator::parse(&name))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 叶子条件
// ═══════════════════════════════════════════════════════════════════════════

/// 叶子条件 {column, operator, value}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    /// 校验并构造
    pub fn new(column: impl Into<String>, operator: Operator, value: Value) -> Result<Self> {
        let column = column.into();
        if column.trim().is_empty() {
            return Err(AnalyticsError::InvalidFilter(
                "condition column must not be empty".into(),
            ));
        }

        match &operator {
            Operator::Between => match &value {
                Value::Array(bounds) if bounds.len() == 2 => {}
                _ => {
                    return Err(AnalyticsError::InvalidFilter(format!(
                        "between on '{}' expects [min, max], got {}",
                        column, value
                    )))
                }
            },
            Operator::In | Operator::NotIn => {
                if !value.is_array() {
                    return Err(AnalyticsError::InvalidFilter(format!(
                        "{} on '{}' expects an array value, got {}",
                        operator.name(),
                        column,
                        value
                    )));
                }
            }
            _ => {}
        }

        Ok(Self {
            column,
            operator,
            value,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 过滤树
// ═══════════════════════════════════════════════════════════════════════════

/// 过滤节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilterNode", into = "RawFilterNode")]
pub enum FilterNode {
    Leaf(Condition),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
}

impl FilterNode {
    pub fn leaf(column: impl Into<String>, operator: Operator, value: Value) -> Result<Self> {
        Condition::new(column, operator, value).map(FilterNode::Leaf)
    }

    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::And(children)
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Or(children)
    }

    /// 从 JSON 值解析 (与反序列化同一套校验)
    pub fn from_json(value: &Value) -> Result<Self> {
        let raw: RawFilterNode = serde_json::from_value(value.clone())
            .map_err(|e| AnalyticsError::InvalidFilter(e.to_string()))?;
        FilterNode::try_from(raw)
    }

    /// 树中引用的全部列名 (去重，保持首次出现顺序)
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterNode::Leaf(c) => {
                if !out.contains(&c.column.as_str()) {
                    out.push(&c.column);
                }
            }
            FilterNode::And(children) | FilterNode::Or(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
        }
    }

    /// 树深度 (叶子为 1)
    pub fn depth(&self) -> usize {
        match self {
            FilterNode::Leaf(_) => 1,
            FilterNode::And(children) | FilterNode::Or(children) => {
                1 + children.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// JSON 线格式
// ═══════════════════════════════════════════════════════════════════════════

/// 组合类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum LogicKind {
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

/// 线格式: 组合节点 `{type|logic, conditions|filters}` 或叶子 `{column, operator, value}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawFilterNode {
    Composite {
        #[serde(alias = "logic", alias = "kind", rename = "type")]
        kind: LogicKind,
        #[serde(alias = "filters", alias = "children", rename = "conditions")]
        conditions: Vec<RawFilterNode>,
    },
    Leaf {
        #[serde(alias = "field")]
        column: String,
        #[serde(alias = "op")]
        operator: Operator,
        #[serde(default)]
        value: Value,
    },
}

impl TryFrom<RawFilterNode> for FilterNode {
    type Error = AnalyticsError;

    fn try_from(raw: RawFilterNode) -> Result<Self> {
        match raw {
            RawFilterNode::Leaf {
                column,
                operator,
                value,
            } => FilterNode::leaf(column, operator, value),
            RawFilterNode::Composite { kind, conditions } => {
                let children = conditions
                    .into_iter()
                    .map(FilterNode::try_from)
                    .collect::<Result<Vec<_>>>()?;
                Ok(match kind {
                    LogicKind::And => FilterNode::And(children),
                    LogicKind::Or => FilterNode::Or(children),
                })
            }
        }
    }
}

impl From<FilterNode> for RawFilterNode {
    fn from(node: FilterNode) -> Self {
        match node {
            FilterNode::Leaf(c) => RawFilterNode::Leaf {
                column: c.column,
                operator: c.operator,
                value: c.value,
            },
            FilterNode::And(children) => RawFilterNode::Composite {
                kind: LogicKind::And,
                conditions: children.into_iter().map(Into::into).collect(),
            },
            FilterNode::Or(children) => RawFilterNode::Composite {
                kind: LogicKind::Or,
                conditions: children.into_iter().map(Into::into).collect(),
            },
        }
    }
}
