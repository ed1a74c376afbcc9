//! 分析协调器
//! 规范化输入 → 准入（缓存/运行中判断）→ 抓取 → 三个阶段并发 → 合并 → 持久化 → 推进生命周期

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::result::{
    AnalyzeResponse, ConsolidatedResult, IntentAnalysis, RunStatus, StatusReport, TechStackReport,
};
use super::stage::{StageFailure, StageOutcome, STAGE_INTENT, STAGE_TECHNOLOGY, STAGE_USER_EXPERIENCE};
use crate::ai::ContentAnalysisService;
use crate::analyzer::UxAnalyzer;
use crate::config::GlobalConfig;
use crate::detector::{TechDetector, TechnologyStackReport};
use crate::error::{InsightError, InsightResult};
use crate::fetcher::ContentFetcher;
use crate::model::{
    AnalysisRecord, PageContent, TechnologyFinding, WebsiteRecord, WebsiteStatus, DETECTION_METHOD_AUTOMATED,
};
use crate::store::{Admission, LifecycleStore, Repository};
use crate::utils::UrlNormalizer;

pub struct AnalysisCoordinator {
    fetcher: Arc<dyn ContentFetcher>,
    analysis_service: Arc<dyn ContentAnalysisService>,
    detector: TechDetector,
    ux_analyzer: UxAnalyzer,
    store: LifecycleStore,
    fetch_timeout: Duration,
    ai_timeout: Duration,
}

impl AnalysisCoordinator {
    pub fn new(
        config: &GlobalConfig,
        fetcher: Arc<dyn ContentFetcher>,
        analysis_service: Arc<dyn ContentAnalysisService>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            fetcher,
            analysis_service,
            detector: TechDetector::with_builtin_rules(),
            ux_analyzer: UxAnalyzer::new(),
            store: LifecycleStore::new(repository, config.cache_ttl, config.persist_timeout),
            fetch_timeout: config.fetch_timeout,
            ai_timeout: config.ai_timeout,
        }
    }

    /// 替换技术检测器（自定义特征库）
    pub fn with_detector(mut self, detector: TechDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn store(&self) -> &LifecycleStore {
        &self.store
    }

    /// 分析一个 URL 并等待结果
    /// 分析在独立任务中运行，调用方放弃等待不会中断分析，站点最终仍会进入终态
    pub async fn analyze(self: &Arc<Self>, raw_url: &str) -> InsightResult<AnalyzeResponse> {
        let url = UrlNormalizer::normalize(raw_url)?;
        match self.store.admit(&url, Utc::now()).await? {
            Admission::AlreadyRunning(record) => {
                info!("Analysis already running for {}", url);
                Ok(AnalyzeResponse::running(&record))
            }
            Admission::Fresh(_, analysis) => {
                info!("Returning cached analysis {} for {}", analysis.id, url);
                Ok(AnalyzeResponse::cached(&analysis))
            }
            Admission::Started(record) => {
                let handle = self.spawn_run(record.clone());
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Analysis task for {} aborted: {}", record.url, e);
                        Err(self.mark_failed(&record, InsightError::TaskAborted(e.to_string())).await)
                    }
                }
            }
        }
    }

    /// 提交分析：准入成功后在后台运行，立即返回 `submitted`
    pub async fn submit(self: &Arc<Self>, raw_url: &str) -> InsightResult<AnalyzeResponse> {
        let url = UrlNormalizer::normalize(raw_url)?;
        match self.store.admit(&url, Utc::now()).await? {
            Admission::AlreadyRunning(record) => Ok(AnalyzeResponse::running(&record)),
            Admission::Fresh(_, analysis) => Ok(AnalyzeResponse::cached(&analysis)),
            Admission::Started(record) => {
                let website_id = record.id;
                let url = record.url.clone();
                let handle = self.spawn_run(record);
                tokio::spawn(async move {
                    match handle.await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!("Background analysis of {} failed: {}", url, e),
                        Err(e) => error!("Background analysis task for {} aborted: {}", url, e),
                    }
                });
                Ok(AnalyzeResponse::submitted(website_id))
            }
        }
    }

    fn spawn_run(self: &Arc<Self>, record: WebsiteRecord) -> JoinHandle<InsightResult<AnalyzeResponse>> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.run(record).await })
    }

    /// 查询站点状态与分析历史
    pub async fn get_status(&self, website_id: Uuid) -> InsightResult<StatusReport> {
        let record = self.find_website(website_id).await?;
        let analyses = self.store.load_history(website_id).await?;
        let technologies = self.store.load_findings(website_id).await?;

        Ok(StatusReport {
            website_id: record.id,
            url: record.url,
            domain: record.domain,
            title: record.title,
            status: record.status,
            last_analyzed: record.last_analyzed,
            analyses,
            technologies,
        })
    }

    /// 最近一次分析的技术栈，按分类分组
    pub async fn get_tech_stack(&self, website_id: Uuid) -> InsightResult<TechStackReport> {
        self.find_website(website_id).await?;
        let latest = self.store.load_history(website_id).await?.into_iter().next();
        let findings = match latest {
            Some(analysis) => self
                .store
                .load_findings(website_id)
                .await?
                .into_iter()
                .filter(|f| f.analysis_id == analysis.id)
                .collect(),
            None => Vec::new(),
        };
        Ok(TechStackReport::from_findings(website_id, findings))
    }

    /// 已知站点列表（新的在前），可按状态过滤
    pub async fn list_websites(&self, status: Option<WebsiteStatus>) -> InsightResult<Vec<WebsiteRecord>> {
        self.store.list(status).await
    }

    async fn find_website(&self, website_id: Uuid) -> InsightResult<WebsiteRecord> {
        self.store
            .find_by_id(website_id)
            .await?
            .ok_or_else(|| InsightError::WebsiteNotFound(website_id.to_string()))
    }

    /// 运行一次已准入（IN_PROGRESS）的分析
    async fn run(&self, record: WebsiteRecord) -> InsightResult<AnalyzeResponse> {
        let started = Instant::now();
        info!("Starting analysis of {}", record.url);

        let page = match self.fetch(&record.url).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Fetching {} failed: {}", record.url, e);
                return Err(self.mark_failed(&record, e).await);
            }
        };

        match self.enrich_and_persist(&record, page, started).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!("Analysis of {} failed after fetch: {}", record.url, e);
                Err(self.mark_failed(&record, e.into_analysis()).await)
            }
        }
    }

    /// 记录置为 FAILED；非法跳转优先于原始错误上抛
    async fn mark_failed(&self, record: &WebsiteRecord, cause: InsightError) -> InsightError {
        match self.store.fail(record).await {
            Ok(_) => cause,
            Err(e @ InsightError::InvalidTransition { .. }) => e,
            Err(e) => {
                error!("Failed to mark {} as failed: {}", record.url, e);
                cause
            }
        }
    }

    async fn fetch(&self, url: &str) -> InsightResult<PageContent> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e @ InsightError::Fetch(_))) => Err(e),
            Ok(Err(e)) => Err(InsightError::Fetch(e.to_string())),
            Err(_) => Err(InsightError::Fetch(format!(
                "Timed out after {}ms loading {}",
                self.fetch_timeout.as_millis(),
                url
            ))),
        }
    }

    async fn enrich_and_persist(
        &self,
        record: &WebsiteRecord,
        page: PageContent,
        started: Instant,
    ) -> InsightResult<AnalyzeResponse> {
        let (intent, technology, user_experience) = tokio::join!(
            self.intent_stage(&page),
            async {
                StageOutcome::catch(|| {
                    TechnologyStackReport::from_findings(self.detector.detect(&page.html_content, &record.url))
                })
            },
            async { StageOutcome::catch(|| self.ux_analyzer.analyze(&page)) },
        );

        let (intent, mut failed_stages) = intent;
        let intent_analysis = intent.into_section(STAGE_INTENT, &mut failed_stages);
        let technology_stack = technology.into_section(STAGE_TECHNOLOGY, &mut failed_stages);
        let user_experience = user_experience.into_section(STAGE_USER_EXPERIENCE, &mut failed_stages);

        let now = Utc::now();
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let confidence_score = ConsolidatedResult::aggregate_confidence(intent_analysis.as_ref());

        let consolidated = ConsolidatedResult {
            website_id: record.id,
            url: record.url.clone(),
            domain: page.domain.clone(),
            title: page.title.clone(),
            meta_description: page.meta_description.clone(),
            analysis_timestamp: now,
            processing_time_ms,
            status: RunStatus::Completed,
            confidence_score,
            intent_analysis,
            technology_stack,
            user_experience,
            failed_stages,
        };

        let analysis = AnalysisRecord::comprehensive(
            record.id,
            serde_json::to_value(&consolidated)?,
            confidence_score,
            processing_time_ms,
            now,
        );
        let findings = consolidated
            .technology_stack
            .as_ref()
            .map(|report| Self::materialize_findings(report, &analysis))
            .unwrap_or_default();

        self.store
            .complete(
                record,
                non_empty(page.title),
                non_empty(page.meta_description),
                &analysis,
                &findings,
            )
            .await?;

        info!(
            "Analysis of {} completed in {}ms ({} stage failures)",
            record.url,
            processing_time_ms,
            consolidated.failed_stages.len()
        );
        Ok(AnalyzeResponse::completed(analysis))
    }

    /// 意图/功能阶段：三个子调用并发，各自限时，失败的子调用以空结果合并
    async fn intent_stage(&self, page: &PageContent) -> (StageOutcome<IntentAnalysis>, Vec<StageFailure>) {
        let text = page.text_content.as_str();
        let url = page.url.as_str();
        let service = self.analysis_service.as_ref();

        let (intents, features, comprehensive) = tokio::join!(
            StageOutcome::bounded(self.ai_timeout, service.extract_intents(text, url)),
            StageOutcome::bounded(self.ai_timeout, service.identify_features(text, url)),
            StageOutcome::bounded(self.ai_timeout, service.analyze_content(text, url)),
        );

        let mut failures = Vec::new();
        let user_intents = intents
            .into_section(&format!("{}.user_intents", STAGE_INTENT), &mut failures)
            .unwrap_or_default();
        let features = features
            .into_section(&format!("{}.features", STAGE_INTENT), &mut failures)
            .unwrap_or_default();
        let comprehensive =
            comprehensive.into_section(&format!("{}.comprehensive_analysis", STAGE_INTENT), &mut failures);

        (
            StageOutcome::Succeeded(IntentAnalysis::new(user_intents, features, comprehensive)),
            failures,
        )
    }

    fn materialize_findings(report: &TechnologyStackReport, analysis: &AnalysisRecord) -> Vec<TechnologyFinding> {
        report
            .technologies_by_category
            .iter()
            .flat_map(|(category, techs)| {
                techs.iter().map(move |tech| TechnologyFinding {
                    id: Uuid::new_v4(),
                    website_id: analysis.website_id,
                    analysis_id: analysis.id,
                    category: category.clone(),
                    technology: tech.technology.clone(),
                    version: tech.version.clone(),
                    confidence: tech.confidence,
                    detection_method: DETECTION_METHOD_AUTOMATED.to_string(),
                    created_at: analysis.created_at,
                })
            })
            .collect()
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::{Notify, Semaphore};

    use crate::ai::{ComprehensiveAnalysis, Feature, Intent};
    use crate::config::ConfigManager;
    use crate::model::ANALYSIS_KIND_COMPREHENSIVE;
    use crate::store::InMemoryRepository;

    const PAGE_HTML: &str = r#"<html><head><title>Shop</title>
        <meta name="description" content="Buy things">
        <link rel="stylesheet" href="/css/bootstrap.min.css"></head>
        <body><div id="root" data-framework="react">Hello world. Welcome here.</div>
        <a href="https://example.com/about">About</a></body></html>"#;

    /// 可计数、可阻塞、可失败的抓取器
    struct StubFetcher {
        calls: AtomicUsize,
        entered: Notify,
        gate: Option<Semaphore>,
        fail: bool,
    }

    impl StubFetcher {
        fn ok() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), entered: Notify::new(), gate: None, fail: false })
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                entered: Notify::new(),
                gate: Some(Semaphore::new(0)),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), entered: Notify::new(), gate: None, fail: true })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(16);
            }
        }
    }

    #[async_trait]
    impl ContentFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> InsightResult<PageContent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.map_err(|e| InsightError::Fetch(e.to_string()))?;
            }
            if self.fail {
                return Err(InsightError::Fetch("HTTP 503: Failed to load page".to_string()));
            }
            crate::fetcher::HttpContentFetcher::build_page(url, 200, PAGE_HTML.to_string())
        }
    }

    #[derive(Clone, Copy)]
    enum AiMode {
        Scripted,
        Failing,
        SlowIntents,
    }

    struct StubAnalysisService {
        mode: AiMode,
    }

    impl StubAnalysisService {
        fn arc(mode: AiMode) -> Arc<Self> {
            Arc::new(Self { mode })
        }

        fn check(&self) -> InsightResult<()> {
            match self.mode {
                AiMode::Failing => Err(InsightError::AnalysisService("malformed response".to_string())),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ContentAnalysisService for StubAnalysisService {
        async fn extract_intents(&self, _text: &str, _url: &str) -> InsightResult<Vec<Intent>> {
            self.check()?;
            if let AiMode::SlowIntents = self.mode {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(vec![Intent {
                intent: "buy products".to_string(),
                confidence: 0.9,
                ..Intent::default()
            }])
        }

        async fn identify_features(&self, _text: &str, _url: &str) -> InsightResult<Vec<Feature>> {
            self.check()?;
            Ok(vec![Feature {
                feature_name: "checkout".to_string(),
                ..Feature::default()
            }])
        }

        async fn analyze_content(&self, _text: &str, _url: &str) -> InsightResult<ComprehensiveAnalysis> {
            self.check()?;
            let mut details = serde_json::Map::new();
            details.insert("business_model".to_string(), json!({"type": "ecommerce"}));
            Ok(ComprehensiveAnalysis {
                confidence_score: Some(0.85),
                details,
            })
        }
    }

    /// 提交分析结果失败，其余操作委托内存仓储
    #[derive(Default)]
    struct FailingCommitRepository {
        inner: InMemoryRepository,
    }

    #[async_trait]
    impl Repository for FailingCommitRepository {
        async fn upsert_website(&self, record: &WebsiteRecord) -> InsightResult<()> {
            self.inner.upsert_website(record).await
        }

        async fn insert_website_if_absent(&self, record: WebsiteRecord) -> InsightResult<(WebsiteRecord, bool)> {
            self.inner.insert_website_if_absent(record).await
        }

        async fn load_website(&self, url: &str) -> InsightResult<Option<WebsiteRecord>> {
            self.inner.load_website(url).await
        }

        async fn load_website_by_id(&self, id: Uuid) -> InsightResult<Option<WebsiteRecord>> {
            self.inner.load_website_by_id(id).await
        }

        async fn list_websites(&self, status: Option<WebsiteStatus>) -> InsightResult<Vec<WebsiteRecord>> {
            self.inner.list_websites(status).await
        }

        async fn commit_analysis(
            &self,
            _website: &WebsiteRecord,
            _analysis: &AnalysisRecord,
            findings: &[TechnologyFinding],
        ) -> InsightResult<()> {
            Err(InsightError::Persistence(format!(
                "findings table down ({} rows rejected)",
                findings.len()
            )))
        }

        async fn load_analysis_history(&self, website_id: Uuid) -> InsightResult<Vec<AnalysisRecord>> {
            self.inner.load_analysis_history(website_id).await
        }

        async fn load_technology_findings(&self, website_id: Uuid) -> InsightResult<Vec<TechnologyFinding>> {
            self.inner.load_technology_findings(website_id).await
        }
    }

    fn test_config() -> GlobalConfig {
        ConfigManager::custom()
            .fetch_timeout(Duration::from_secs(5))
            .ai_timeout(Duration::from_millis(100))
            .persist_timeout(Duration::from_secs(5))
            .build()
    }

    fn coordinator(
        config: &GlobalConfig,
        fetcher: Arc<StubFetcher>,
        ai: Arc<StubAnalysisService>,
        repository: Arc<dyn Repository>,
    ) -> Arc<AnalysisCoordinator> {
        Arc::new(AnalysisCoordinator::new(config, fetcher, ai, repository))
    }

    async fn status_of(coordinator: &AnalysisCoordinator, url: &str) -> WebsiteRecord {
        coordinator.store().repository().load_website(url).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_completed_run_persists_analysis_and_findings() {
        let fetcher = StubFetcher::ok();
        let coordinator = coordinator(
            &test_config(),
            fetcher.clone(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        let response = coordinator.analyze("example.com/").await.unwrap();
        assert_eq!(response.status, RunStatus::Completed);
        let result = response.result.unwrap();
        assert_eq!(result["url"], json!("https://example.com"));
        assert_eq!(result["confidence_score"], json!(0.85));
        assert_eq!(result["intent_analysis"]["user_intents"][0]["intent"], json!("buy products"));
        assert_eq!(result["user_experience"]["navigation"]["internal"], json!(1));
        assert_eq!(result["failed_stages"], json!([]));

        let status = coordinator.get_status(response.website_id).await.unwrap();
        assert_eq!(status.status, WebsiteStatus::Completed);
        assert_eq!(status.title.as_deref(), Some("Shop"));
        assert!(status.last_analyzed.is_some());
        assert_eq!(status.analyses.len(), 1);
        assert_eq!(status.analyses[0].analysis_type, ANALYSIS_KIND_COMPREHENSIVE);
        assert_eq!(Some(status.analyses[0].id), response.analysis_id);

        let mut categories: Vec<_> = status.technologies.iter().map(|f| f.category.as_str()).collect();
        categories.sort();
        assert_eq!(categories, vec!["css", "frontend"]);
        assert!(status.technologies.iter().all(|f| f.detection_method == DETECTION_METHOD_AUTOMATED));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_completed_returns_cached_without_fetch() {
        let fetcher = StubFetcher::ok();
        let coordinator = coordinator(
            &test_config(),
            fetcher.clone(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        let first = coordinator.analyze("https://example.com").await.unwrap();
        let second = coordinator.analyze("example.com").await.unwrap();

        assert_eq!(second.status, RunStatus::Cached);
        assert_eq!(second.website_id, first.website_id);
        assert_eq!(second.analysis_id, first.analysis_id);
        assert_eq!(second.result, first.result);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_completed_reruns() {
        let fetcher = StubFetcher::ok();
        let config = ConfigManager::custom().cache_ttl(Duration::ZERO).build();
        let coordinator = coordinator(
            &config,
            fetcher.clone(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        let first = coordinator.analyze("example.com").await.unwrap();
        let second = coordinator.analyze("example.com").await.unwrap();

        assert_eq!(second.status, RunStatus::Completed);
        assert_ne!(second.analysis_id, first.analysis_id);
        assert_eq!(fetcher.calls(), 2);
        let history = coordinator.store().load_history(first.website_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(Some(history[0].id), second.analysis_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_analyze_runs_once() {
        let fetcher = StubFetcher::gated();
        let coordinator = coordinator(
            &test_config(),
            fetcher.clone(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.analyze("example.com").await })
        };
        fetcher.entered.notified().await;

        let second = coordinator.analyze("https://example.com/").await.unwrap();
        assert_eq!(second.status, RunStatus::InProgress);
        assert!(second.result.is_none());

        fetcher.release();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status, RunStatus::Completed);
        assert_eq!(first.website_id, second.website_id);

        assert_eq!(fetcher.calls(), 1);
        let history = coordinator.store().load_history(first.website_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(status_of(&coordinator, "https://example.com").await.status, WebsiteStatus::Completed);
    }

    #[tokio::test]
    async fn test_all_ai_calls_failing_still_completes() {
        let coordinator = coordinator(
            &test_config(),
            StubFetcher::ok(),
            StubAnalysisService::arc(AiMode::Failing),
            Arc::new(InMemoryRepository::new()),
        );

        let response = coordinator.analyze("example.com").await.unwrap();
        assert_eq!(response.status, RunStatus::Completed);

        let result = response.result.unwrap();
        assert_eq!(result["confidence_score"], json!(0.8));
        assert_eq!(result["intent_analysis"]["user_intents"], json!([]));
        assert_eq!(result["intent_analysis"]["features"], json!([]));
        assert!(result["intent_analysis"].get("comprehensive_analysis").is_none());
        assert_eq!(result["failed_stages"].as_array().unwrap().len(), 3);
        assert!(result["technology_stack"].is_object());

        let status = coordinator.get_status(response.website_id).await.unwrap();
        assert_eq!(status.analyses[0].confidence_score, 0.8);
    }

    #[tokio::test]
    async fn test_ai_timeout_is_isolated() {
        let coordinator = coordinator(
            &test_config(),
            StubFetcher::ok(),
            StubAnalysisService::arc(AiMode::SlowIntents),
            Arc::new(InMemoryRepository::new()),
        );

        let response = coordinator.analyze("example.com").await.unwrap();
        assert_eq!(response.status, RunStatus::Completed);

        let result = response.result.unwrap();
        assert_eq!(result["intent_analysis"]["user_intents"], json!([]));
        assert_eq!(result["intent_analysis"]["features"][0]["feature_name"], json!("checkout"));
        assert_eq!(result["confidence_score"], json!(0.85));

        let failed = result["failed_stages"].as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["stage"], json!("intent_analysis.user_intents"));
        assert!(failed[0]["reason"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_fetch_failure_marks_failed_without_records() {
        let coordinator = coordinator(
            &test_config(),
            StubFetcher::failing(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        let err = coordinator.analyze("example.com").await.unwrap_err();
        assert!(matches!(err, InsightError::Fetch(_)));

        let record = status_of(&coordinator, "https://example.com").await;
        assert_eq!(record.status, WebsiteStatus::Failed);
        assert!(record.last_analyzed.is_none());
        assert!(coordinator.store().load_history(record.id).await.unwrap().is_empty());
        assert!(coordinator.store().load_findings(record.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_no_analysis() {
        let coordinator = coordinator(
            &test_config(),
            StubFetcher::ok(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(FailingCommitRepository::default()),
        );

        let err = coordinator.analyze("example.com").await.unwrap_err();
        match err {
            InsightError::Analysis(cause) => assert!(matches!(*cause, InsightError::Persistence(_))),
            other => panic!("unexpected error: {:?}", other),
        }

        let record = status_of(&coordinator, "https://example.com").await;
        assert_eq!(record.status, WebsiteStatus::Failed);
        assert!(record.last_analyzed.is_none());
        assert!(coordinator.store().load_history(record.id).await.unwrap().is_empty());
        assert!(coordinator.store().load_findings(record.id).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_analyze_still_reaches_terminal_state() {
        let fetcher = StubFetcher::gated();
        let coordinator = coordinator(
            &test_config(),
            fetcher.clone(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        let abandoned = tokio::time::timeout(Duration::from_millis(50), coordinator.analyze("example.com")).await;
        assert!(abandoned.is_err());
        fetcher.entered.notified().await;

        fetcher.release();
        let mut record = status_of(&coordinator, "https://example.com").await;
        for _ in 0..200 {
            if record.status == WebsiteStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            record = status_of(&coordinator, "https://example.com").await;
        }
        assert_eq!(record.status, WebsiteStatus::Completed);

        let again = coordinator.analyze("example.com").await.unwrap();
        assert_eq!(again.status, RunStatus::Cached);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_tech_stack_reports_latest_analysis_by_category() {
        let config = ConfigManager::custom().cache_ttl(Duration::ZERO).build();
        let coordinator = coordinator(
            &config,
            StubFetcher::ok(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        let first = coordinator.analyze("example.com").await.unwrap();
        let second = coordinator.analyze("example.com").await.unwrap();

        let report = coordinator.get_tech_stack(first.website_id).await.unwrap();
        assert_eq!(report.website_id, first.website_id);
        assert_eq!(report.total_technologies, 2);
        assert_eq!(
            report.technologies_by_category.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["css", "frontend"]
        );
        assert!(report
            .technologies_by_category
            .values()
            .flatten()
            .all(|f| Some(f.analysis_id) == second.analysis_id));

        let err = coordinator.get_tech_stack(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, InsightError::WebsiteNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_websites_filters_by_status() {
        let coordinator = coordinator(
            &test_config(),
            StubFetcher::failing(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        assert!(coordinator.analyze("broken.example.com").await.is_err());
        coordinator.store().get_or_create("https://queued.example.com").await.unwrap();

        let all = coordinator.list_websites(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let failed = coordinator.list_websites(Some(WebsiteStatus::Failed)).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].url, "https://broken.example.com");
        let pending = coordinator.list_websites(Some(WebsiteStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "https://queued.example.com");
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let fetcher = StubFetcher::ok();
        let coordinator = coordinator(
            &test_config(),
            fetcher.clone(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        assert!(matches!(coordinator.analyze("   ").await, Err(InsightError::InvalidInput(_))));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_status_unknown_website() {
        let coordinator = coordinator(
            &test_config(),
            StubFetcher::ok(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );
        let err = coordinator.get_status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, InsightError::WebsiteNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_runs_in_background() {
        let fetcher = StubFetcher::gated();
        let coordinator = coordinator(
            &test_config(),
            fetcher.clone(),
            StubAnalysisService::arc(AiMode::Scripted),
            Arc::new(InMemoryRepository::new()),
        );

        let submitted = coordinator.submit("example.com").await.unwrap();
        assert_eq!(submitted.status, RunStatus::Submitted);
        assert!(submitted.analysis_id.is_none());

        fetcher.entered.notified().await;
        let again = coordinator.submit("example.com").await.unwrap();
        assert_eq!(again.status, RunStatus::InProgress);

        fetcher.release();
        let mut status = coordinator.get_status(submitted.website_id).await.unwrap();
        for _ in 0..200 {
            if status.status == WebsiteStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = coordinator.get_status(submitted.website_id).await.unwrap();
        }
        assert_eq!(status.status, WebsiteStatus::Completed);
        assert_eq!(status.analyses.len(), 1);
        assert_eq!(fetcher.calls(), 1);
    }
}
