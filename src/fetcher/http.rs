//! 基于 HTTP GET 的内容抓取器（不执行 JavaScript）

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::ContentFetcher;
use crate::config::GlobalConfig;
use crate::error::{InsightError, InsightResult};
use crate::extractor::HtmlExtractor;
use crate::model::PageContent;
use crate::utils::UrlNormalizer;

/// HTTP 内容抓取器
#[derive(Debug, Clone)]
pub struct HttpContentFetcher {
    client: Client,
}

impl HttpContentFetcher {
    pub fn new(config: &GlobalConfig) -> InsightResult<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// 使用外部构建的 reqwest 客户端
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// 将原始 HTML 组装为结构化页面内容
    pub fn build_page(url: &str, status_code: u16, html: String) -> InsightResult<PageContent> {
        let base = Url::parse(url)?;
        let extracted = HtmlExtractor::extract(&html, Some(base));

        Ok(PageContent {
            url: url.to_string(),
            title: extracted.title,
            meta_description: extracted.meta_description,
            meta_keywords: extracted.meta_keywords,
            html_content: html,
            text_content: extracted.text_content,
            links: extracted.links,
            images: extracted.images,
            forms: extracted.forms,
            domain: UrlNormalizer::domain_of(url)?,
            status_code,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> InsightResult<PageContent> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InsightError::Fetch(format!("Failed to load {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InsightError::Fetch(format!(
                "HTTP {}: Failed to load page {}",
                status.as_u16(),
                url
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| InsightError::Fetch(format!("Failed to read body of {}: {}", url, e)))?;
        debug!("Fetched {} ({} bytes, status {})", url, html.len(), status.as_u16());

        Self::build_page(url, status.as_u16(), html)
            .map_err(|e| InsightError::Fetch(format!("Failed to parse {}: {}", url, e)))
    }
}
