//! 仓储快照管理
//! 仅处理内存仓储的本地序列化（MessagePack）和反序列化

use std::path::Path;

use rmp_serde::{from_slice, Serializer};
use serde::Serialize;
use tracing::debug;

use super::memory::RepositorySnapshot;
use crate::error::{InsightError, InsightResult};

/// 快照管理器
pub struct SnapshotManager;

impl SnapshotManager {
    /// 从本地文件加载快照，文件不存在时返回空快照
    pub async fn load(path: &Path) -> InsightResult<RepositorySnapshot> {
        if !tokio::fs::try_exists(path).await? {
            debug!("Snapshot {} not found, starting empty", path.display());
            return Ok(RepositorySnapshot::default());
        }
        let data = tokio::fs::read(path).await?;

        let snapshot: RepositorySnapshot = from_slice(&data)
            .map_err(|e| InsightError::MsgPack(format!("反序列化失败：{}", e)))?;

        debug!(
            "Snapshot loaded: {} websites, {} analyses, {} findings",
            snapshot.websites.len(),
            snapshot.analyses.len(),
            snapshot.findings.len()
        );
        Ok(snapshot)
    }

    /// 将快照写入本地文件
    pub async fn save(path: &Path, snapshot: &RepositorySnapshot) -> InsightResult<()> {
        let mut data = Vec::new();

        // 结构体以 map 形式编码，可选字段缺省时仍可解码
        snapshot
            .serialize(&mut Serializer::new(&mut data).with_struct_map())
            .map_err(|e| InsightError::MsgPack(format!("序列化失败：{}", e)))?;

        debug!("Snapshot serialized: {} bytes", data.len());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisRecord, TechnologyFinding, WebsiteRecord, DETECTION_METHOD_AUTOMATED};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_save_and_load() {
        let now = Utc::now();
        let website = WebsiteRecord::new("https://example.com", "example.com", now);
        let analysis = AnalysisRecord::comprehensive(website.id, json!({"title": "Example"}), 0.8, 42, now);
        let finding = TechnologyFinding {
            id: Uuid::new_v4(),
            website_id: website.id,
            analysis_id: analysis.id,
            category: "frontend".to_string(),
            technology: "React/Next.js".to_string(),
            version: None,
            confidence: 0.8,
            detection_method: DETECTION_METHOD_AUTOMATED.to_string(),
            created_at: now,
        };
        let snapshot = RepositorySnapshot {
            websites: vec![website],
            analyses: vec![analysis],
            findings: vec![finding],
        };

        let path = std::env::temp_dir().join(format!("rsinsight-{}.msgpack", Uuid::new_v4()));
        SnapshotManager::save(&path, &snapshot).await.unwrap();
        let loaded = SnapshotManager::load(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let path = std::env::temp_dir().join(format!("rsinsight-missing-{}.msgpack", Uuid::new_v4()));
        let loaded = SnapshotManager::load(&path).await.unwrap();
        assert!(loaded.websites.is_empty());
    }
}
