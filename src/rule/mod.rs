//! 规则模块：负责特征规则的加载、数据模型定义
pub mod model;
pub mod loader;

// 导出核心接口
pub use self::model::{PatternRule, PatternScope, SignatureLibrary, SignatureRule, VersionRule};
pub use self::loader::RuleLoader;
