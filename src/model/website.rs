//! 站点记录与生命周期状态

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InsightError;

/// 站点分析生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebsiteStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl WebsiteStatus {
    /// 状态机合法跳转表
    /// PENDING -> IN_PROGRESS -> COMPLETED | FAILED，
    /// COMPLETED（过期）/ FAILED（重试）可重新进入 IN_PROGRESS
    pub fn can_transition_to(self, next: WebsiteStatus) -> bool {
        use WebsiteStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Completed, InProgress)
                | (Failed, InProgress)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebsiteStatus::Pending => "pending",
            WebsiteStatus::InProgress => "in_progress",
            WebsiteStatus::Completed => "completed",
            WebsiteStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WebsiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebsiteStatus {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(WebsiteStatus::Pending),
            "in_progress" => Ok(WebsiteStatus::InProgress),
            "completed" => Ok(WebsiteStatus::Completed),
            "failed" => Ok(WebsiteStatus::Failed),
            other => Err(InsightError::InvalidInput(format!("未知的站点状态：{}", other))),
        }
    }
}

/// 站点记录，规范化 URL 全局唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteRecord {
    pub id: Uuid,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: WebsiteStatus,
    pub last_analyzed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebsiteRecord {
    /// 新建 PENDING 状态的站点记录
    pub fn new(url: impl Into<String>, domain: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            domain: domain.into(),
            title: None,
            description: None,
            status: WebsiteStatus::Pending,
            last_analyzed: None,
            created_at: now,
            updated_at: now,
        }
    }
}
