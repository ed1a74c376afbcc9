//! 站点生命周期存储
//! 持有每个规范化 URL 的站点记录，负责状态机校验、新鲜度判断与缓存结果查询。
//! 同一 URL 的读写经由按 URL 划分的异步锁串行化，不同 URL 完全并行。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use super::repository::Repository;
use crate::error::{InsightError, InsightResult};
use crate::model::{AnalysisRecord, TechnologyFinding, WebsiteRecord, WebsiteStatus};
use crate::utils::UrlNormalizer;

/// `admit` 的准入结果
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// 已有运行中的分析
    AlreadyRunning(WebsiteRecord),
    /// 结果仍在新鲜度窗口内，附最近一次综合分析记录
    Fresh(WebsiteRecord, AnalysisRecord),
    /// 已切换为 IN_PROGRESS，调用方负责推进到终态
    Started(WebsiteRecord),
}

type UrlLocks = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// 持有某个 URL 的锁；释放时若已无其他等待者，则从锁表中移除该条目
struct UrlGuard<'a> {
    locks: &'a UrlLocks,
    url: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for UrlGuard<'_> {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(&self.url).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.url);
        }
    }
}

pub struct LifecycleStore {
    repository: Arc<dyn Repository>,
    cache_ttl: Duration,
    persist_timeout: Duration,
    url_locks: UrlLocks,
}

impl LifecycleStore {
    pub fn new(repository: Arc<dyn Repository>, cache_ttl: Duration, persist_timeout: Duration) -> Self {
        Self {
            repository,
            cache_ttl,
            persist_timeout,
            url_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    async fn lock_url(&self, url: &str) -> UrlGuard<'_> {
        let mut guard = UrlGuard {
            locks: &self.url_locks,
            url: url.to_string(),
            held: None,
        };
        let lock = {
            let mut locks = self.url_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(url.to_string()).or_default().clone()
        };
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    /// 为单次持久化调用加超时，超时视为持久化失败
    async fn persist<T, F>(&self, what: &str, fut: F) -> InsightResult<T>
    where
        F: std::future::Future<Output = InsightResult<T>>,
    {
        match tokio::time::timeout(self.persist_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(InsightError::Persistence(msg))) => Err(InsightError::Persistence(msg)),
            Ok(Err(e)) => Err(InsightError::Persistence(format!("{}: {}", what, e))),
            Err(_) => Err(InsightError::Persistence(format!(
                "{} timed out after {}ms",
                what,
                self.persist_timeout.as_millis()
            ))),
        }
    }

    /// 获取或创建站点记录，返回 `(record, is_new)`
    pub async fn get_or_create(&self, url: &str) -> InsightResult<(WebsiteRecord, bool)> {
        let _guard = self.lock_url(url).await;
        self.get_or_create_locked(url).await
    }

    async fn get_or_create_locked(&self, url: &str) -> InsightResult<(WebsiteRecord, bool)> {
        if let Some(existing) = self.persist("load website", self.repository.load_website(url)).await? {
            return Ok((existing, false));
        }
        let candidate = WebsiteRecord::new(url, UrlNormalizer::domain_of(url)?, Utc::now());
        let (record, created) = self
            .persist("insert website", self.repository.insert_website_if_absent(candidate))
            .await?;
        if created {
            debug!("Website record created for {} ({})", record.url, record.id);
        }
        Ok((record, created))
    }

    /// 最近一次成功分析距今不足 TTL
    pub fn is_fresh(record: &WebsiteRecord, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (record.last_analyzed, chrono::Duration::from_std(ttl)) {
            (Some(last), Ok(ttl)) => now.signed_duration_since(last) < ttl,
            // TTL 超出 chrono 可表示范围，视为永不过期
            (Some(_), Err(_)) => true,
            (None, _) => false,
        }
    }

    /// 按存储中的当前状态校验并执行状态跳转
    pub async fn transition(&self, record: &WebsiteRecord, next: WebsiteStatus) -> InsightResult<WebsiteRecord> {
        let _guard = self.lock_url(&record.url).await;
        self.transition_locked(record, next).await
    }

    async fn transition_locked(&self, record: &WebsiteRecord, next: WebsiteStatus) -> InsightResult<WebsiteRecord> {
        let (previous, stored) = self.prepare_transition(record, next).await?;
        self.persist("update website", self.repository.upsert_website(&stored)).await?;
        info!("Website {} transitioned {} -> {}", stored.url, previous, next);
        Ok(stored)
    }

    /// 读取存储中的当前记录并校验跳转，返回 `(原状态, 跳转后的记录)`，不写入
    async fn prepare_transition(
        &self,
        record: &WebsiteRecord,
        next: WebsiteStatus,
    ) -> InsightResult<(WebsiteStatus, WebsiteRecord)> {
        let mut stored = self
            .persist("load website", self.repository.load_website_by_id(record.id))
            .await?
            .ok_or_else(|| InsightError::WebsiteNotFound(record.id.to_string()))?;

        if !stored.status.can_transition_to(next) {
            return Err(InsightError::InvalidTransition {
                from: stored.status,
                to: next,
            });
        }

        let previous = stored.status;
        stored.status = next;
        stored.updated_at = Utc::now();
        Ok((previous, stored))
    }

    /// 准入：在同一把 URL 锁内完成获取/创建、运行中检查、新鲜度检查与切换到 IN_PROGRESS
    pub async fn admit(&self, url: &str, now: DateTime<Utc>) -> InsightResult<Admission> {
        let _guard = self.lock_url(url).await;
        let (record, _) = self.get_or_create_locked(url).await?;

        if record.status == WebsiteStatus::InProgress {
            return Ok(Admission::AlreadyRunning(record));
        }

        if record.status == WebsiteStatus::Completed && Self::is_fresh(&record, now, self.cache_ttl) {
            let latest = self
                .persist("load analysis history", self.repository.load_analysis_history(record.id))
                .await?
                .into_iter()
                .next();
            match latest {
                Some(analysis) => return Ok(Admission::Fresh(record, analysis)),
                None => debug!("Fresh website {} has no analysis history, re-running", record.url),
            }
        }

        let started = self.transition_locked(&record, WebsiteStatus::InProgress).await?;
        Ok(Admission::Started(started))
    }

    /// IN_PROGRESS -> COMPLETED，与本次分析记录及技术发现一并提交
    /// 站点的分析时间取分析记录的创建时间
    pub async fn complete(
        &self,
        record: &WebsiteRecord,
        title: Option<String>,
        description: Option<String>,
        analysis: &AnalysisRecord,
        findings: &[TechnologyFinding],
    ) -> InsightResult<WebsiteRecord> {
        let _guard = self.lock_url(&record.url).await;
        let (previous, mut stored) = self.prepare_transition(record, WebsiteStatus::Completed).await?;
        stored.last_analyzed = Some(analysis.created_at);
        stored.title = title;
        stored.description = description;

        self.persist(
            "commit analysis",
            self.repository.commit_analysis(&stored, analysis, findings),
        )
        .await?;
        info!(
            "Website {} transitioned {} -> {} with analysis {} ({} technology findings)",
            stored.url,
            previous,
            WebsiteStatus::Completed,
            analysis.id,
            findings.len()
        );
        Ok(stored)
    }

    /// IN_PROGRESS -> FAILED
    pub async fn fail(&self, record: &WebsiteRecord) -> InsightResult<WebsiteRecord> {
        self.transition(record, WebsiteStatus::Failed).await
    }

    /// 站点列表（新的在前），可按状态过滤
    pub async fn list(&self, status: Option<WebsiteStatus>) -> InsightResult<Vec<WebsiteRecord>> {
        self.persist("list websites", self.repository.list_websites(status)).await
    }

    /// 分析历史（新的在前）
    pub async fn load_history(&self, website_id: Uuid) -> InsightResult<Vec<AnalysisRecord>> {
        self.persist("load analysis history", self.repository.load_analysis_history(website_id))
            .await
    }

    pub async fn find_by_id(&self, website_id: Uuid) -> InsightResult<Option<WebsiteRecord>> {
        self.persist("load website", self.repository.load_website_by_id(website_id))
            .await
    }

    pub async fn load_findings(&self, website_id: Uuid) -> InsightResult<Vec<TechnologyFinding>> {
        self.persist(
            "load technology findings",
            self.repository.load_technology_findings(website_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRepository;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn store() -> Arc<LifecycleStore> {
        Arc::new(LifecycleStore::new(
            Arc::new(InMemoryRepository::new()),
            DAY,
            Duration::from_secs(5),
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_record() {
        let store = store();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.get_or_create("https://example.com").await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        let mut created = 0;
        for handle in handles {
            let (record, is_new) = handle.await.unwrap();
            ids.push(record.id);
            if is_new {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
    }

    #[tokio::test]
    async fn test_transition_validates_stored_state() {
        let store = store();
        let (record, is_new) = store.get_or_create("https://example.com").await.unwrap();
        assert!(is_new);
        assert_eq!(record.status, WebsiteStatus::Pending);

        let err = store.transition(&record, WebsiteStatus::Completed).await.unwrap_err();
        assert!(matches!(
            err,
            InsightError::InvalidTransition { from: WebsiteStatus::Pending, to: WebsiteStatus::Completed }
        ));

        let running = store.transition(&record, WebsiteStatus::InProgress).await.unwrap();
        let analysis = AnalysisRecord::comprehensive(record.id, json!({}), 0.8, 5, Utc::now());
        let done = store
            .complete(&running, Some("Example".into()), None, &analysis, &[])
            .await
            .unwrap();
        assert_eq!(done.status, WebsiteStatus::Completed);
        assert_eq!(done.title.as_deref(), Some("Example"));
        assert_eq!(done.last_analyzed, Some(analysis.created_at));

        // 传入的是过期副本，校验仍以存储状态为准
        let err = store.transition(&record, WebsiteStatus::Pending).await.unwrap_err();
        assert!(matches!(err, InsightError::InvalidTransition { from: WebsiteStatus::Completed, .. }));

        // 失败后允许重试
        let retry = store.transition(&done, WebsiteStatus::InProgress).await.unwrap();
        let failed = store.fail(&retry).await.unwrap();
        assert_eq!(failed.status, WebsiteStatus::Failed);
        assert!(store.transition(&failed, WebsiteStatus::InProgress).await.is_ok());
    }

    #[test]
    fn test_is_fresh() {
        let now = Utc::now();
        let mut record = WebsiteRecord::new("https://example.com", "example.com", now);
        assert!(!LifecycleStore::is_fresh(&record, now, DAY));

        record.last_analyzed = Some(now - ChronoDuration::hours(23));
        assert!(LifecycleStore::is_fresh(&record, now, DAY));

        record.last_analyzed = Some(now - ChronoDuration::hours(24));
        assert!(!LifecycleStore::is_fresh(&record, now, DAY));
    }

    #[tokio::test]
    async fn test_admit_paths() {
        let store = store();
        let url = "https://example.com";

        let started = match store.admit(url, Utc::now()).await.unwrap() {
            Admission::Started(record) => record,
            other => panic!("unexpected admission: {:?}", other),
        };
        assert_eq!(started.status, WebsiteStatus::InProgress);

        assert!(matches!(
            store.admit(url, Utc::now()).await.unwrap(),
            Admission::AlreadyRunning(_)
        ));

        let now = Utc::now();
        let analysis = AnalysisRecord::comprehensive(started.id, json!({}), 0.8, 5, now);
        store.complete(&started, None, None, &analysis, &[]).await.unwrap();

        match store.admit(url, now + ChronoDuration::hours(1)).await.unwrap() {
            Admission::Fresh(record, latest) => {
                assert_eq!(record.id, started.id);
                assert_eq!(latest.id, analysis.id);
            }
            other => panic!("unexpected admission: {:?}", other),
        }

        // 过期后重新运行
        assert!(matches!(
            store.admit(url, now + ChronoDuration::hours(25)).await.unwrap(),
            Admission::Started(_)
        ));
    }

    #[tokio::test]
    async fn test_history_order() {
        let store = store();
        let (record, _) = store.get_or_create("https://example.com").await.unwrap();
        let now = Utc::now();
        let first = AnalysisRecord::comprehensive(record.id, json!({}), 0.8, 5, now - ChronoDuration::minutes(5));
        let second = AnalysisRecord::comprehensive(record.id, json!({}), 0.8, 5, now);
        for analysis in [&first, &second] {
            let running = store.transition(&record, WebsiteStatus::InProgress).await.unwrap();
            store.complete(&running, None, None, analysis, &[]).await.unwrap();
        }

        let history = store.load_history(record.id).await.unwrap();
        assert_eq!(
            history.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }

    #[tokio::test]
    async fn test_complete_rejected_leaves_no_analysis() {
        let store = store();
        let (record, _) = store.get_or_create("https://example.com").await.unwrap();
        let analysis = AnalysisRecord::comprehensive(record.id, json!({}), 0.8, 5, Utc::now());

        // PENDING 不能直接完成，分析记录也不应落盘
        let err = store.complete(&record, None, None, &analysis, &[]).await.unwrap_err();
        assert!(matches!(err, InsightError::InvalidTransition { from: WebsiteStatus::Pending, .. }));
        assert!(store.load_history(record.id).await.unwrap().is_empty());
    }

    fn tracked_urls(store: &LifecycleStore) -> usize {
        store.url_locks.lock().unwrap().len()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_url_locks_are_released() {
        let store = store();
        for i in 0..100 {
            store.get_or_create(&format!("https://site{}.example.com", i)).await.unwrap();
        }
        assert_eq!(tracked_urls(&store), 0);

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.admit(&format!("https://site{}.example.com", i % 4), Utc::now()).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(tracked_urls(&store), 0);
        assert_eq!(store.list(Some(WebsiteStatus::InProgress)).await.unwrap().len(), 4);
        assert_eq!(store.list(None).await.unwrap().len(), 100);
    }
}
