//! 内容分析服务的结构化输出

use serde::{Deserialize, Serialize};

/// 用户意图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intent {
    pub intent: String,
    pub description: String,
    pub evidence: Vec<String>,
    pub user_journey_stage: String,
    pub priority: String,
    pub confidence: f64,
}

/// 站点功能
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub feature_name: String,
    pub category: String,
    pub description: String,
    pub user_benefit: String,
    pub implementation_complexity: String,
    pub evidence: Vec<String>,
    pub confidence: f64,
}

/// 综合分析：业务模型、目标用户等结构由模型自由给出，仅约定 confidence_score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}
