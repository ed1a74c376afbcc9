//! 编译后模式模型
//! 规则编译后的可执行结构

use regex::Regex;

use crate::rule::PatternScope;

#[derive(Debug, Clone)]
pub enum Matcher {
    /// 子串匹配；忽略大小写时 needle 已预先转小写
    Contains { needle: String, case_sensitive: bool },
    /// 正则匹配（大小写策略在编译时设定）
    Regex(Regex),
}

impl Matcher {
    /// 匹配判断；`lowered` 为调用方预先转小写的输入，避免每条规则重复转换
    pub fn is_match(&self, input: &str, lowered: &str) -> bool {
        match self {
            Matcher::Contains { needle, case_sensitive: true } => input.contains(needle.as_str()),
            Matcher::Contains { needle, case_sensitive: false } => lowered.contains(needle.as_str()),
            Matcher::Regex(regex) => regex.is_match(input),
        }
    }
}

/// 编译后的单条模式
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub matcher: Matcher,
    pub scope: PatternScope,
}

/// 编译后的版本提取规则
#[derive(Debug, Clone)]
pub struct CompiledVersion {
    pub regex: Regex,
    pub template: String,
}

/// 编译后的技术特征
#[derive(Debug, Clone)]
pub struct CompiledSignature {
    pub name: String,
    pub category: String,
    pub confidence: f64,
    pub evidence: String,
    pub patterns: Vec<CompiledPattern>,
    pub version: Option<CompiledVersion>,
}

/// 编译后的特征库，保持规则定义顺序
#[derive(Debug, Clone, Default)]
pub struct CompiledSignatureLibrary {
    pub signatures: Vec<CompiledSignature>,
}
