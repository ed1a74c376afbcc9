//! 分析记录与技术发现记录
//! 两者均在一次分析结束时写入，写入后不可变

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::website::WebsiteStatus;

/// 综合分析类型标记
pub const ANALYSIS_KIND_COMPREHENSIVE: &str = "comprehensive";
/// 技术发现的检测方式标记
pub const DETECTION_METHOD_AUTOMATED: &str = "automated";

/// 一次完整分析的持久化记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    pub analysis_type: String,
    pub status: WebsiteStatus,
    /// 不透明的合并结果
    pub result: serde_json::Value,
    pub confidence_score: f64,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn comprehensive(
        website_id: Uuid,
        result: serde_json::Value,
        confidence_score: f64,
        processing_time_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            website_id,
            analysis_type: ANALYSIS_KIND_COMPREHENSIVE.to_string(),
            status: WebsiteStatus::Completed,
            result,
            confidence_score: confidence_score.clamp(0.0, 1.0),
            processing_time_ms,
            created_at: now,
        }
    }
}

/// 单条技术发现
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyFinding {
    pub id: Uuid,
    pub website_id: Uuid,
    pub analysis_id: Uuid,
    pub category: String,
    pub technology: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub confidence: f64,
    pub detection_method: String,
    pub created_at: DateTime<Utc>,
}
