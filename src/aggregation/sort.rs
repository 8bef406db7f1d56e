//! 排序与截断

use crate::utils::value::{compare_scalars, is_blank};
use crate::Record;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// 排序条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub column: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }
}

/// 两行在排序列上的比较
///
/// 缺失值无论升降序都排在最后。
pub fn compare_rows(a: &Record, b: &Record, sort_by: &SortBy) -> Ordering {
    let left = a.get(&sort_by.column);
    let right = b.get(&sort_by.column);

    match (is_blank(left), is_blank(right)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match (left, right) {
            (Some(l), Some(r)) => {
                let ord = compare_scalars(l, r);
                match sort_by.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            }
            _ => Ordering::Equal,
        },
    }
}

/// 稳定排序
pub fn sort_rows(rows: &mut [Record], sort_by: &SortBy) {
    rows.sort_by(|a, b| compare_rows(a, b, sort_by));
}

/// 截断；`None` 或 0 表示不限制
pub fn apply_limit(rows: &mut Vec<Record>, limit: Option<usize>) {
    if let Some(n) = limit.filter(|n| *n > 0) {
        rows.truncate(n);
    }
}
