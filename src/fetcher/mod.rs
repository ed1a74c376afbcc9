//! 内容抓取模块
//! 抓取器作为外部能力注入，协调器只依赖 `ContentFetcher` 特质
pub mod http;

use async_trait::async_trait;

use crate::error::InsightResult;
use crate::model::PageContent;

pub use self::http::HttpContentFetcher;

/// 内容抓取能力：给定 URL 返回结构化页面内容
/// 非 2xx 状态、超时、导航错误均返回 `InsightError::Fetch`
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> InsightResult<PageContent>;
}
