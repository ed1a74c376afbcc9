//! 检测模块：技术栈检测核心逻辑
pub mod detector;

// 导出核心接口
pub use self::detector::{
    DetectedTechnology,
    TechDetector,
    TechnologyStackReport,
    TECHNOLOGY_STAGE_CONFIDENCE,
};
