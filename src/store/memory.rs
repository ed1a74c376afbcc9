//! 内存仓储实现
//! 所有状态位于同一把读写锁之后，条件插入在写锁内完成

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::Repository;
use crate::error::{InsightError, InsightResult};
use crate::model::{AnalysisRecord, TechnologyFinding, WebsiteRecord, WebsiteStatus};

/// 仓储快照（用于 MessagePack 落盘）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub websites: Vec<WebsiteRecord>,
    pub analyses: Vec<AnalysisRecord>,
    pub findings: Vec<TechnologyFinding>,
}

#[derive(Debug, Default)]
struct MemoryState {
    websites: HashMap<Uuid, WebsiteRecord>,
    // 规范化 URL -> 站点 id
    url_index: HashMap<String, Uuid>,
    // 按写入顺序保存
    analyses: Vec<AnalysisRecord>,
    findings: Vec<TechnologyFinding>,
}

impl MemoryState {
    fn put_website(&mut self, record: &WebsiteRecord) {
        if let Some(previous) = self.websites.get(&record.id) {
            if previous.url != record.url {
                self.url_index.remove(&previous.url);
            }
        }
        self.url_index.insert(record.url.clone(), record.id);
        self.websites.insert(record.id, record.clone());
    }
}

/// 内存仓储
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<MemoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从快照恢复
    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Self {
        let mut state = MemoryState::default();
        for website in &snapshot.websites {
            state.put_website(website);
        }
        state.analyses = snapshot.analyses;
        state.findings = snapshot.findings;
        Self {
            state: RwLock::new(state),
        }
    }

    /// 导出当前全部记录
    pub async fn snapshot(&self) -> RepositorySnapshot {
        let state = self.state.read().await;
        let mut websites: Vec<WebsiteRecord> = state.websites.values().cloned().collect();
        websites.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.url.cmp(&b.url)));
        RepositorySnapshot {
            websites,
            analyses: state.analyses.clone(),
            findings: state.findings.clone(),
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn upsert_website(&self, record: &WebsiteRecord) -> InsightResult<()> {
        self.state.write().await.put_website(record);
        Ok(())
    }

    async fn insert_website_if_absent(&self, record: WebsiteRecord) -> InsightResult<(WebsiteRecord, bool)> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .url_index
            .get(&record.url)
            .and_then(|id| state.websites.get(id))
        {
            return Ok((existing.clone(), false));
        }
        state.put_website(&record);
        Ok((record, true))
    }

    async fn load_website(&self, url: &str) -> InsightResult<Option<WebsiteRecord>> {
        let state = self.state.read().await;
        Ok(state.url_index.get(url).and_then(|id| state.websites.get(id)).cloned())
    }

    async fn load_website_by_id(&self, id: Uuid) -> InsightResult<Option<WebsiteRecord>> {
        Ok(self.state.read().await.websites.get(&id).cloned())
    }

    async fn list_websites(&self, status: Option<WebsiteStatus>) -> InsightResult<Vec<WebsiteRecord>> {
        let state = self.state.read().await;
        let mut websites: Vec<WebsiteRecord> = state
            .websites
            .values()
            .filter(|w| status.map_or(true, |s| w.status == s))
            .cloned()
            .collect();
        websites.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.url.cmp(&b.url)));
        Ok(websites)
    }

    async fn commit_analysis(
        &self,
        website: &WebsiteRecord,
        analysis: &AnalysisRecord,
        findings: &[TechnologyFinding],
    ) -> InsightResult<()> {
        if analysis.website_id != website.id {
            return Err(InsightError::Persistence(format!(
                "analysis {} does not belong to website {}",
                analysis.id, website.id
            )));
        }
        if let Some(orphan) = findings
            .iter()
            .find(|f| f.analysis_id != analysis.id || f.website_id != website.id)
        {
            return Err(InsightError::Persistence(format!(
                "technology finding {} does not belong to analysis {}",
                orphan.id, analysis.id
            )));
        }

        // 校验通过后在同一把写锁内完成全部写入
        let mut state = self.state.write().await;
        state.put_website(website);
        state.analyses.push(analysis.clone());
        state.findings.extend_from_slice(findings);
        Ok(())
    }

    async fn load_analysis_history(&self, website_id: Uuid) -> InsightResult<Vec<AnalysisRecord>> {
        let state = self.state.read().await;
        // 先按写入倒序，再稳定排序，时间相同时后写入者在前
        let mut history: Vec<AnalysisRecord> = state
            .analyses
            .iter()
            .rev()
            .filter(|a| a.website_id == website_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    async fn load_technology_findings(&self, website_id: Uuid) -> InsightResult<Vec<TechnologyFinding>> {
        let state = self.state.read().await;
        Ok(state
            .findings
            .iter()
            .filter(|f| f.website_id == website_id)
            .cloned()
            .collect())
    }
}
