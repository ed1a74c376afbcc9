//! 合并结果与对外响应结构

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::StageFailure;
use crate::ai::{ComprehensiveAnalysis, Feature, Intent};
use crate::analyzer::UxReport;
use crate::detector::TechnologyStackReport;
use crate::model::{AnalysisRecord, TechnologyFinding, WebsiteRecord, WebsiteStatus};

/// 综合分析缺失置信度时的默认值
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// 单次运行对外可见的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Submitted,
    InProgress,
    Cached,
    Completed,
    Failed,
}

impl From<WebsiteStatus> for RunStatus {
    fn from(status: WebsiteStatus) -> Self {
        match status {
            WebsiteStatus::Pending => RunStatus::Submitted,
            WebsiteStatus::InProgress => RunStatus::InProgress,
            WebsiteStatus::Completed => RunStatus::Completed,
            WebsiteStatus::Failed => RunStatus::Failed,
        }
    }
}

/// 意图/功能阶段输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub analysis_type: String,
    pub confidence_score: f64,
    pub user_intents: Vec<Intent>,
    pub features: Vec<Feature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprehensive_analysis: Option<ComprehensiveAnalysis>,
}

impl IntentAnalysis {
    pub fn new(
        user_intents: Vec<Intent>,
        features: Vec<Feature>,
        comprehensive_analysis: Option<ComprehensiveAnalysis>,
    ) -> Self {
        let confidence_score = comprehensive_analysis
            .as_ref()
            .and_then(|c| c.confidence_score)
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0);
        Self {
            analysis_type: "intent_and_features".to_string(),
            confidence_score,
            user_intents,
            features,
            comprehensive_analysis,
        }
    }
}

/// 一次完整运行的合并结果，按固定字段名合并各阶段输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    pub website_id: Uuid,
    pub url: String,
    pub domain: String,
    pub title: String,
    pub meta_description: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub status: RunStatus,
    pub confidence_score: f64,
    pub intent_analysis: Option<IntentAnalysis>,
    pub technology_stack: Option<TechnologyStackReport>,
    pub user_experience: Option<UxReport>,
    pub failed_stages: Vec<StageFailure>,
}

impl ConsolidatedResult {
    /// 聚合置信度取自综合分析子调用，缺失时为默认值
    pub fn aggregate_confidence(intent_analysis: Option<&IntentAnalysis>) -> f64 {
        intent_analysis
            .and_then(|i| i.comprehensive_analysis.as_ref())
            .and_then(|c| c.confidence_score)
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0)
    }
}

/// `analyze` / `submit` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub website_id: Uuid,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl AnalyzeResponse {
    pub fn submitted(website_id: Uuid) -> Self {
        Self::bare(website_id, RunStatus::Submitted)
    }

    /// 运行中的站点，状态取自存储记录
    pub fn running(record: &WebsiteRecord) -> Self {
        Self::bare(record.id, record.status.into())
    }

    pub fn cached(analysis: &AnalysisRecord) -> Self {
        Self {
            website_id: analysis.website_id,
            status: RunStatus::Cached,
            analysis_id: Some(analysis.id),
            result: Some(analysis.result.clone()),
        }
    }

    pub fn completed(analysis: AnalysisRecord) -> Self {
        Self {
            website_id: analysis.website_id,
            status: RunStatus::Completed,
            analysis_id: Some(analysis.id),
            result: Some(analysis.result),
        }
    }

    fn bare(website_id: Uuid, status: RunStatus) -> Self {
        Self {
            website_id,
            status,
            analysis_id: None,
            result: None,
        }
    }
}

/// `get_status` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub website_id: Uuid,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub status: WebsiteStatus,
    pub last_analyzed: Option<DateTime<Utc>>,
    pub analyses: Vec<AnalysisRecord>,
    pub technologies: Vec<TechnologyFinding>,
}

/// `get_tech_stack` 的响应：最近一次分析的技术发现，按分类分组，分类内按技术名排序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStackReport {
    pub website_id: Uuid,
    pub technologies_by_category: BTreeMap<String, Vec<TechnologyFinding>>,
    pub total_technologies: usize,
}

impl TechStackReport {
    pub fn from_findings(website_id: Uuid, mut findings: Vec<TechnologyFinding>) -> Self {
        findings.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.technology.cmp(&b.technology)));
        let total_technologies = findings.len();
        let mut technologies_by_category: BTreeMap<String, Vec<TechnologyFinding>> = BTreeMap::new();
        for finding in findings {
            technologies_by_category.entry(finding.category.clone()).or_default().push(finding);
        }
        Self {
            website_id,
            technologies_by_category,
            total_technologies,
        }
    }
}
