//! 协调模块：分析流水线编排、阶段结果与合并结果
pub mod stage;
pub mod result;
pub mod coordinator;

// 导出核心接口
pub use self::coordinator::AnalysisCoordinator;
pub use self::result::{
    AnalyzeResponse, ConsolidatedResult, IntentAnalysis, RunStatus, StatusReport, TechStackReport,
    DEFAULT_CONFIDENCE,
};
pub use self::stage::{StageFailure, StageOutcome};
