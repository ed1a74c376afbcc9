//! rsinsight - 网站分析编排流水线
//! URL 规范化与去重、站点生命周期状态机与新鲜度缓存、三个分析阶段并发执行与失败隔离、
//! 技术栈检测、UX 启发式评分以及结果合并持久化

// 导出全局错误类型
pub use self::error::{InsightError, InsightResult};

// 导出配置模块
pub use self::config::{ConfigManager, CustomConfigBuilder, GlobalConfig};

// 导出数据模型
pub use self::model::{
    AnalysisRecord, PageContent, TechnologyFinding, WebsiteRecord, WebsiteStatus,
};

// 导出规则与编译模块核心接口
pub use self::rule::{RuleLoader, SignatureLibrary, SignatureRule};
pub use self::compiler::{CompiledSignatureLibrary, RuleCompiler};

// 导出检测与分析模块核心接口
pub use self::detector::{DetectedTechnology, TechDetector, TechnologyStackReport};
pub use self::analyzer::{UxAnalyzer, UxReport};
pub use self::extractor::HtmlExtractor;
pub use self::utils::{UrlNormalizer, VersionExtractor};

// 导出外部能力接口
pub use self::fetcher::{ContentFetcher, HttpContentFetcher};
pub use self::ai::{ContentAnalysisService, OpenRouterClient};
pub use self::store::{InMemoryRepository, LifecycleStore, Repository, SnapshotManager};

// 导出协调器
pub use self::coordinator::{AnalysisCoordinator, AnalyzeResponse, RunStatus, StatusReport, TechStackReport};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod model;
pub mod utils;
pub mod rule;
pub mod compiler;
pub mod detector;
pub mod analyzer;
pub mod extractor;
pub mod fetcher;
pub mod ai;
pub mod store;
pub mod coordinator;
