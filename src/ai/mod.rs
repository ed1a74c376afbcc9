//! 内容分析服务模块
//! 生成式 AI 分析作为外部能力注入，协调器只依赖 `ContentAnalysisService` 特质
pub mod types;
pub mod openrouter;

use async_trait::async_trait;

use crate::error::InsightResult;

pub use self::openrouter::{extract_json_block, OpenRouterClient};
pub use self::types::{ComprehensiveAnalysis, Feature, Intent};

/// 内容分析能力
/// 响应格式错误或传输失败时返回 `InsightError::AnalysisService`
#[async_trait]
pub trait ContentAnalysisService: Send + Sync {
    /// 提取用户意图
    async fn extract_intents(&self, text: &str, url: &str) -> InsightResult<Vec<Intent>>;

    /// 识别站点功能
    async fn identify_features(&self, text: &str, url: &str) -> InsightResult<Vec<Feature>>;

    /// 综合分析
    async fn analyze_content(&self, text: &str, url: &str) -> InsightResult<ComprehensiveAnalysis>;
}
