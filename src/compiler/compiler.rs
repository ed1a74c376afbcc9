//! 规则编译器核心
//! 仅负责将特征规则编译为可执行的匹配模式

use std::sync::Arc;
use std::time::Instant;
use once_cell::sync::Lazy;
use regex::RegexBuilder;
use tracing::debug;

use super::pattern::{CompiledPattern, CompiledSignature, CompiledSignatureLibrary, CompiledVersion, Matcher};
use crate::error::{InsightError, InsightResult};
use crate::rule::{PatternRule, RuleLoader, SignatureLibrary, SignatureRule};

/// 全局懒加载的内置特征库 - 首次访问时编译，进程内仅一份
pub static BUILTIN_COMPILED_LIB: Lazy<Arc<CompiledSignatureLibrary>> = Lazy::new(|| {
    let library = RuleLoader::builtin().unwrap_or_else(|e| {
        panic!("内置特征规则库解析失败，请检查 data/signatures.json：{}", e);
    });
    let compiled = RuleCompiler::compile(&library).unwrap_or_else(|e| {
        panic!("内置特征规则库编译失败：{}", e);
    });
    Arc::new(compiled)
});

/// 规则编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译规则库
    pub fn compile(library: &SignatureLibrary) -> InsightResult<CompiledSignatureLibrary> {
        let start = Instant::now();
        let signatures = library
            .signatures
            .iter()
            .map(Self::compile_signature)
            .collect::<InsightResult<Vec<_>>>()?;

        debug!(
            "Signature library compiled, {} rules in {:?}",
            signatures.len(),
            start.elapsed()
        );
        Ok(CompiledSignatureLibrary { signatures })
    }

    /// 编译单个技术特征
    fn compile_signature(rule: &SignatureRule) -> InsightResult<CompiledSignature> {
        let patterns = rule
            .patterns
            .iter()
            .map(|p| Self::compile_pattern(&rule.name, p))
            .collect::<InsightResult<Vec<_>>>()?;

        let version = match &rule.version {
            Some(v) => Some(CompiledVersion {
                regex: RegexBuilder::new(&v.regex).case_insensitive(true).build()?,
                template: v.template.clone(),
            }),
            None => None,
        };

        Ok(CompiledSignature {
            name: rule.name.clone(),
            category: rule.category.clone(),
            confidence: rule.confidence,
            evidence: rule
                .evidence
                .clone()
                .unwrap_or_else(|| format!("{} patterns detected", rule.name)),
            patterns,
            version,
        })
    }

    fn compile_pattern(tech_name: &str, pattern: &PatternRule) -> InsightResult<CompiledPattern> {
        let matcher = match (&pattern.contains, &pattern.regex) {
            (Some(needle), None) => Matcher::Contains {
                needle: if pattern.case_sensitive { needle.clone() } else { needle.to_lowercase() },
                case_sensitive: pattern.case_sensitive,
            },
            (None, Some(regex)) => Matcher::Regex(
                RegexBuilder::new(regex)
                    .case_insensitive(!pattern.case_sensitive)
                    .build()?,
            ),
            _ => {
                return Err(InsightError::RuleParse(format!(
                    "规则 {} 的模式必须且只能设置 contains 或 regex 之一",
                    tech_name
                )))
            }
        };

        Ok(CompiledPattern {
            matcher,
            scope: pattern.scope,
        })
    }
}
