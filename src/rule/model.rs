//! 特征规则数据模型定义
//! 仅存储规则数据，无任何业务逻辑，支持序列化/反序列化

use serde::{Deserialize, Serialize};

/// 模式匹配的数据范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternScope {
    /// 原始 HTML
    #[default]
    Html,
    /// 规范化后的页面 URL
    Url,
}

/// 单条匹配模式：`contains` 子串或 `regex` 正则，二选一
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// 默认忽略大小写
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub scope: PatternScope,
}

/// 版本提取规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRule {
    pub regex: String,
    /// 版本模板，支持 \1 / $1
    #[serde(default = "default_version_template")]
    pub template: String,
}

fn default_version_template() -> String {
    "\\1".to_string()
}

/// 技术特征规则定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRule {
    pub name: String,
    pub category: String,
    /// 标定置信度（0.0 - 1.0），与特征的区分度相关
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Option<String>,
    pub patterns: Vec<PatternRule>,
    #[serde(default)]
    pub version: Option<VersionRule>,
}

/// 完整特征规则库
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureLibrary {
    pub signatures: Vec<SignatureRule>,
}

impl SignatureLibrary {
    /// 合并规则库：同名规则以 `other` 为准，新规则追加到末尾
    pub fn merge(mut self, other: SignatureLibrary) -> Self {
        for rule in other.signatures {
            match self.signatures.iter_mut().find(|r| r.name == rule.name) {
                Some(existing) => *existing = rule,
                None => self.signatures.push(rule),
            }
        }
        self
    }
}
