//! 技术检测器核心：特征库匹配，输出分类、带置信度的技术发现
//! 纯函数：无网络、无状态，仅依赖输入文本

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiler::{CompiledSignature, CompiledSignatureLibrary, RuleCompiler, BUILTIN_COMPILED_LIB};
use crate::error::InsightResult;
use crate::rule::{PatternScope, SignatureLibrary};
use crate::utils::VersionExtractor;

/// 技术栈阶段的固定置信度
pub const TECHNOLOGY_STAGE_CONFIDENCE: f64 = 0.9;

/// 单条技术检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTechnology {
    pub category: String,
    pub technology: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub confidence: f64,
    pub evidence: String,
}

impl fmt::Display for DetectedTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) if !v.is_empty() => write!(f, "{} {}", self.technology, v),
            _ => write!(f, "{}", self.technology),
        }
    }
}

/// 技术栈阶段输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyStackReport {
    pub analysis_type: String,
    pub technologies_by_category: BTreeMap<String, Vec<DetectedTechnology>>,
    pub total_technologies_detected: usize,
    pub confidence_score: f64,
}

impl TechnologyStackReport {
    pub fn from_findings(findings: Vec<DetectedTechnology>) -> Self {
        let total = findings.len();
        Self {
            analysis_type: "technology_stack".to_string(),
            technologies_by_category: TechDetector::group_by_category(findings),
            total_technologies_detected: total,
            confidence_score: TECHNOLOGY_STAGE_CONFIDENCE,
        }
    }
}

/// 技术检测器
#[derive(Debug, Clone)]
pub struct TechDetector {
    compiled_lib: Arc<CompiledSignatureLibrary>,
}

impl Default for TechDetector {
    fn default() -> Self {
        Self::with_builtin_rules()
    }
}

impl TechDetector {
    /// 使用内置特征库创建检测器
    pub fn with_builtin_rules() -> Self {
        Self {
            compiled_lib: BUILTIN_COMPILED_LIB.clone(),
        }
    }

    /// 使用自定义特征库创建检测器
    pub fn with_rules(library: &SignatureLibrary) -> InsightResult<Self> {
        Ok(Self {
            compiled_lib: Arc::new(RuleCompiler::compile(library)?),
        })
    }

    /// 检测技术栈
    /// 每条特征独立匹配，任一模式命中即产出一条发现，输出顺序与特征库定义顺序一致
    pub fn detect(&self, html: &str, url: &str) -> Vec<DetectedTechnology> {
        let html_lower = html.to_lowercase();
        let url_lower = url.to_lowercase();

        let findings: Vec<_> = self
            .compiled_lib
            .signatures
            .iter()
            .filter(|sig| Self::signature_matches(sig, html, &html_lower, url, &url_lower))
            .map(|sig| DetectedTechnology {
                category: sig.category.clone(),
                technology: sig.name.clone(),
                version: Self::extract_version(sig, html),
                confidence: sig.confidence,
                evidence: sig.evidence.clone(),
            })
            .collect();

        debug!("Technology detection on {} found {} technologies", url, findings.len());
        findings
    }

    /// 按分类分组（纯后处理），分类内保持检测顺序
    pub fn group_by_category(
        findings: Vec<DetectedTechnology>,
    ) -> BTreeMap<String, Vec<DetectedTechnology>> {
        let mut grouped: BTreeMap<String, Vec<DetectedTechnology>> = BTreeMap::new();
        for finding in findings {
            grouped.entry(finding.category.clone()).or_default().push(finding);
        }
        grouped
    }

    fn signature_matches(
        sig: &CompiledSignature,
        html: &str,
        html_lower: &str,
        url: &str,
        url_lower: &str,
    ) -> bool {
        sig.patterns.iter().any(|pattern| match pattern.scope {
            PatternScope::Html => pattern.matcher.is_match(html, html_lower),
            PatternScope::Url => pattern.matcher.is_match(url, url_lower),
        })
    }

    fn extract_version(sig: &CompiledSignature, html: &str) -> Option<String> {
        let version = sig.version.as_ref()?;
        let captures = version.regex.captures(html)?;
        VersionExtractor::extract(&version.template, &captures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{PatternRule, SignatureRule};

    #[test]
    fn test_react_and_bootstrap_grouped_by_category() {
        let detector = TechDetector::with_builtin_rules();
        let html = r#"<html><body><div id="root" class="bootstrap">react app</div></body></html>"#;

        let findings = detector.detect(html, "https://example.com");
        assert_eq!(findings.len(), 2);

        let react = findings.iter().find(|f| f.technology == "React/Next.js").unwrap();
        assert_eq!(react.category, "frontend");
        assert_eq!(react.confidence, 0.8);
        let bootstrap = findings.iter().find(|f| f.technology == "Bootstrap").unwrap();
        assert_eq!(bootstrap.category, "css");
        assert_eq!(bootstrap.confidence, 0.9);

        let grouped = TechDetector::group_by_category(findings);
        let keys: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(keys, vec!["css".to_string(), "frontend".to_string()]);
    }

    #[test]
    fn test_case_sensitive_patterns() {
        let detector = TechDetector::with_builtin_rules();
        // gtag 区分大小写
        assert!(detector.detect("<script>GTAG('config')</script>", "https://a.io").is_empty());
        let findings = detector.detect("<script>gtag('config')</script>", "https://a.io");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].technology, "Google Analytics");
        assert_eq!(findings[0].confidence, 0.95);
    }

    #[test]
    fn test_multiple_independent_matches_and_version() {
        let detector = TechDetector::with_builtin_rules();
        let html = r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css">
            <script src="https://js.stripe.com/v3/"></script>
            <script src="https://static.cloudflareinsights.com/beacon.min.js"></script>"#;

        let findings = detector.detect(html, "https://shop.io");
        let names: Vec<_> = findings.iter().map(|f| f.technology.as_str()).collect();
        assert_eq!(names, vec!["Bootstrap", "Cloudflare", "Stripe"]);
        assert_eq!(findings[0].version.as_deref(), Some("5.3.2"));
        assert_eq!(findings[0].to_string(), "Bootstrap 5.3.2");

        let report = TechnologyStackReport::from_findings(findings);
        assert_eq!(report.total_technologies_detected, 3);
        assert_eq!(report.technologies_by_category.len(), 3);
        assert_eq!(report.confidence_score, TECHNOLOGY_STAGE_CONFIDENCE);
    }

    #[test]
    fn test_no_findings_on_plain_markup() {
        let detector = TechDetector::with_builtin_rules();
        assert!(detector.detect("<p>hello world</p>", "https://plain.example").is_empty());
    }

    #[test]
    fn test_custom_rules_with_url_scope() {
        let library = SignatureLibrary {
            signatures: vec![SignatureRule {
                name: "Shopify".to_string(),
                category: "ecommerce".to_string(),
                confidence: 0.85,
                evidence: Some("myshopify domain".to_string()),
                patterns: vec![PatternRule {
                    contains: Some("myshopify.com".to_string()),
                    scope: PatternScope::Url,
                    ..PatternRule::default()
                }],
                version: None,
            }],
        };
        let detector = TechDetector::with_rules(&library).unwrap();

        assert!(detector.detect("myshopify.com", "https://store.example").is_empty());
        let findings = detector.detect("<p></p>", "https://demo.MyShopify.com");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence, "myshopify domain");
    }
}
