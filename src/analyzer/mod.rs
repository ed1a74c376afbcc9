//! 分析器模块：基于抓取内容的启发式分析
pub mod ux;

pub use self::ux::{
    ContentMetrics, InteractivityMetrics, NavigationMetrics, UxAnalyzer, UxReport, UX_STAGE_CONFIDENCE,
};
