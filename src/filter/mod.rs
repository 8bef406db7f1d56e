//! 过滤模块
//!
//! - AST 结构 (ast.rs) - 校验过的 Leaf / And / Or 树
//! - 求值器 (evaluator.rs) - 递归布尔匹配

pub mod ast;
pub mod evaluator;

pub use ast::*;
pub use evaluator::*;
