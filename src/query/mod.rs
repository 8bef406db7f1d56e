// 查询编排模块
//
// 架构：
// ┌─────────────────────────────────────────────────────────────┐
// │                      Query Layer                            │
// │                                                             │
// │  FilterSpec ──► QueryEngine ◄── QueryResultCache            │
// │                     │                                       │
// │        ┌────────────┼─────────────┐                         │
// │        ▼            ▼             ▼                         │
// │  FilterEvaluator  GroupAggregator  Pivot / TimeSeries / Cube │
// │                     │                                       │
// │                sort → limit → QueryResult                   │
// └─────────────────────────────────────────────────────────────┘

pub mod engine;
pub mod result;
pub mod spec;

pub use engine::QueryEngine;
pub use result::{AnalysisOutput, QueryResult, QuerySummary};
pub use spec::{AnalysisSpec, FilterSpec, FilterSpecBuilder};
