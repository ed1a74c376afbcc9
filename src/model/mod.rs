//! 数据模型：站点记录、分析记录、技术发现与抓取内容
//! 仅存储数据，无业务逻辑，支持序列化/反序列化
pub mod website;
pub mod analysis;
pub mod content;

// 导出核心接口
pub use self::website::{WebsiteRecord, WebsiteStatus};
pub use self::analysis::{AnalysisRecord, TechnologyFinding, ANALYSIS_KIND_COMPREHENSIVE, DETECTION_METHOD_AUTOMATED};
pub use self::content::{PageContent, PageLink, PageImage, PageForm, FormInput};
