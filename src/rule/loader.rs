//! 特征规则加载管理器
//! 负责加载内置规则库与自定义规则文件

use std::path::Path;
use tracing::debug;

use super::model::SignatureLibrary;
use crate::error::{InsightError, InsightResult};

/// 内置规则库（编译期嵌入）
static BUILTIN_SIGNATURES_JSON: &str = include_str!("../../data/signatures.json");

/// 规则加载管理器
pub struct RuleLoader;

impl RuleLoader {
    /// 加载内置规则库
    pub fn builtin() -> InsightResult<SignatureLibrary> {
        Self::from_json_str(BUILTIN_SIGNATURES_JSON)
    }

    /// 从 JSON 文本解析规则库，并做基础校验
    pub fn from_json_str(json: &str) -> InsightResult<SignatureLibrary> {
        let library: SignatureLibrary = serde_json::from_str(json)?;
        Self::validate(&library)?;
        debug!("Signature library parsed, rule count: {}", library.signatures.len());
        Ok(library)
    }

    /// 从本地 JSON 文件加载自定义规则库
    pub async fn from_file(path: impl AsRef<Path>) -> InsightResult<SignatureLibrary> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        debug!("Loading custom signature file: {}", path.display());
        Self::from_json_str(&json)
    }

    /// 内置规则库 + 自定义规则文件（同名覆盖）
    pub async fn builtin_with_file(path: impl AsRef<Path>) -> InsightResult<SignatureLibrary> {
        let custom = Self::from_file(path).await?;
        Ok(Self::builtin()?.merge(custom))
    }

    fn validate(library: &SignatureLibrary) -> InsightResult<()> {
        for rule in &library.signatures {
            if rule.name.trim().is_empty() || rule.category.trim().is_empty() {
                return Err(InsightError::RuleParse("规则名称或分类为空".to_string()));
            }
            if !(0.0..=1.0).contains(&rule.confidence) {
                return Err(InsightError::RuleParse(format!(
                    "规则 {} 的置信度 {} 超出 [0, 1]",
                    rule.name, rule.confidence
                )));
            }
            if rule.patterns.is_empty() {
                return Err(InsightError::RuleParse(format!("规则 {} 没有匹配模式", rule.name)));
            }
            for pattern in &rule.patterns {
                if pattern.contains.is_some() == pattern.regex.is_some() {
                    return Err(InsightError::RuleParse(format!(
                        "规则 {} 的模式必须且只能设置 contains 或 regex 之一",
                        rule.name
                    )));
                }
            }
        }
        Ok(())
    }
}
