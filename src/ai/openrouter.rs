//! OpenRouter 兼容的 Chat Completion 客户端
//! 从模型回复中提取 JSON（支持 ```json 代码块）并反序列化为结构化结果

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::types::{ComprehensiveAnalysis, Feature, Intent};
use super::ContentAnalysisService;
use crate::config::GlobalConfig;
use crate::error::{InsightError, InsightResult};

/// 综合分析输入文本上限（字符）
const COMPREHENSIVE_CONTENT_LIMIT: usize = 10_000;
/// 意图/功能分析输入文本上限（字符）
const FOCUSED_CONTENT_LIMIT: usize = 8_000;

const COMPREHENSIVE_SYSTEM_PROMPT: &str = "You are an expert website analyst. Analyze the provided website content \
and describe its core functions, target audience, business model, user experience and content strategy. \
Respond with a single JSON object that includes a numeric \"confidence_score\" between 0 and 1.";

const INTENT_SYSTEM_PROMPT: &str = "You are a UX researcher. Identify the core user intents the website addresses. \
Respond with a JSON array of objects with fields: intent, description, evidence (array of strings), \
user_journey_stage, priority, confidence.";

const FEATURE_SYSTEM_PROMPT: &str = "You are a product analyst. Identify the features and capabilities the website offers. \
Respond with a JSON array of objects with fields: feature_name, category, description, user_benefit, \
implementation_complexity, evidence (array of strings), confidence.";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// OpenRouter 客户端
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterClient {
    pub fn new(config: &GlobalConfig) -> InsightResult<Self> {
        let client = Client::builder().timeout(config.ai_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.ai_base_url.trim_end_matches('/').to_string(),
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
            max_tokens: config.ai_max_tokens,
            temperature: config.ai_temperature,
        })
    }

    /// 发送一次对话请求，返回模型回复文本
    async fn chat_completion(&self, system_prompt: &str, user_prompt: String) -> InsightResult<String> {
        if self.api_key.is_empty() {
            return Err(InsightError::AnalysisService("AI API key is not configured".to_string()));
        }

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Title", "rsinsight")
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| InsightError::AnalysisService(format!("OpenRouter API error: {}", e)))?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| InsightError::AnalysisService(format!("Malformed completion response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| InsightError::AnalysisService("Completion response has no choices".to_string()))
    }

    async fn structured<T: DeserializeOwned>(
        &self,
        task: &str,
        system_prompt: &str,
        text: &str,
        url: &str,
        limit: usize,
    ) -> InsightResult<T> {
        let user_prompt = format!(
            "Analyze this website content from {}:\n\nWebsite Content:\n{}",
            url,
            truncate_chars(text, limit)
        );
        let reply = self.chat_completion(system_prompt, user_prompt).await?;
        debug!("{} reply received for {} ({} chars)", task, url, reply.len());

        serde_json::from_str(extract_json_block(&reply)).map_err(|e| {
            InsightError::AnalysisService(format!("Failed to parse {} response: {}", task, e))
        })
    }
}

#[async_trait]
impl ContentAnalysisService for OpenRouterClient {
    async fn extract_intents(&self, text: &str, url: &str) -> InsightResult<Vec<Intent>> {
        self.structured("intent extraction", INTENT_SYSTEM_PROMPT, text, url, FOCUSED_CONTENT_LIMIT)
            .await
    }

    async fn identify_features(&self, text: &str, url: &str) -> InsightResult<Vec<Feature>> {
        self.structured("feature identification", FEATURE_SYSTEM_PROMPT, text, url, FOCUSED_CONTENT_LIMIT)
            .await
    }

    async fn analyze_content(&self, text: &str, url: &str) -> InsightResult<ComprehensiveAnalysis> {
        self.structured(
            "comprehensive analysis",
            COMPREHENSIVE_SYSTEM_PROMPT,
            text,
            url,
            COMPREHENSIVE_CONTENT_LIMIT,
        )
        .await
    }
}

/// 从模型回复中截取 JSON 文本
/// 优先取 ```json 代码块，其次取普通 ``` 代码块，否则返回去空白后的全文
pub fn extract_json_block(reply: &str) -> &str {
    for fence in ["```json", "```"] {
        if let Some(start) = reply.find(fence) {
            let body = &reply[start + fence.len()..];
            let end = body.find("```").unwrap_or(body.len());
            return body[..end].trim();
        }
    }
    reply.trim()
}

/// 按字符截断，保证 UTF-8 边界
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
