//! 持久化接口：对三类记录的读 / 写 / upsert
//! 存储引擎本身作为外部能力注入

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::InsightResult;
use crate::model::{AnalysisRecord, TechnologyFinding, WebsiteRecord, WebsiteStatus};

#[async_trait]
pub trait Repository: Send + Sync {
    /// 按 id 写入或覆盖站点记录
    async fn upsert_website(&self, record: &WebsiteRecord) -> InsightResult<()>;

    /// 条件插入：URL 不存在时写入并返回 `(record, true)`，
    /// 已存在时不做修改并返回 `(existing, false)`，必须是单个原子操作
    async fn insert_website_if_absent(&self, record: WebsiteRecord) -> InsightResult<(WebsiteRecord, bool)>;

    async fn load_website(&self, url: &str) -> InsightResult<Option<WebsiteRecord>>;

    async fn load_website_by_id(&self, id: Uuid) -> InsightResult<Option<WebsiteRecord>>;

    /// 站点列表，按创建时间倒序，可按状态过滤
    async fn list_websites(&self, status: Option<WebsiteStatus>) -> InsightResult<Vec<WebsiteRecord>>;

    /// 一次运行的提交：站点记录、分析记录与其技术发现在同一事务内写入，
    /// 失败时三者均不落盘
    async fn commit_analysis(
        &self,
        website: &WebsiteRecord,
        analysis: &AnalysisRecord,
        findings: &[TechnologyFinding],
    ) -> InsightResult<()>;

    /// 分析历史，按创建时间倒序
    async fn load_analysis_history(&self, website_id: Uuid) -> InsightResult<Vec<AnalysisRecord>>;

    async fn load_technology_findings(&self, website_id: Uuid) -> InsightResult<Vec<TechnologyFinding>>;
}
