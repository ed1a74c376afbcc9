//! UX 启发式分析器
//! 基于结构化页面内容计算导航、内容可读性与交互性指标，纯同步计算

use serde::{Deserialize, Serialize};

use crate::model::PageContent;

/// UX 阶段的固定置信度
pub const UX_STAGE_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationMetrics {
    pub total: usize,
    pub internal: usize,
    pub external: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetrics {
    pub word_count: usize,
    pub readability_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractivityMetrics {
    pub forms_count: usize,
    pub images_count: usize,
    pub has_search: bool,
}

/// UX 阶段输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UxReport {
    pub analysis_type: String,
    pub navigation: NavigationMetrics,
    pub content: ContentMetrics,
    pub interactivity: InteractivityMetrics,
    pub confidence_score: f64,
}

/// UX 启发式分析器
#[derive(Debug, Clone, Copy, Default)]
pub struct UxAnalyzer;

impl UxAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, page: &PageContent) -> UxReport {
        // 链接 href 中包含站点域名即视为内链
        let internal = page
            .links
            .iter()
            .filter(|link| link.href.contains(page.domain.as_str()))
            .count();

        let has_search = page
            .forms
            .iter()
            .any(|form| form.action.to_lowercase().contains("search"));

        UxReport {
            analysis_type: "user_experience".to_string(),
            navigation: NavigationMetrics {
                total: page.links.len(),
                internal,
                external: page.links.len() - internal,
            },
            content: ContentMetrics {
                word_count: page.text_content.split_whitespace().count(),
                readability_score: Self::readability_score(&page.text_content),
            },
            interactivity: InteractivityMetrics {
                forms_count: page.forms.len(),
                images_count: page.images.len(),
                has_search,
            },
            confidence_score: UX_STAGE_CONFIDENCE,
        }
    }

    /// 简易可读性评分：平均句长 10~20 词为 1.0，过短按比例降低，过长线性衰减（下限 0.1）
    /// 句子按 `.` 切分，空白片段不计入
    pub fn readability_score(text: &str) -> f64 {
        let words = text.split_whitespace().count();
        let sentences = text.split('.').filter(|s| !s.trim().is_empty()).count();
        if words == 0 || sentences == 0 {
            return 0.0;
        }

        let avg = words as f64 / sentences as f64;
        let score = if (10.0..=20.0).contains(&avg) {
            1.0
        } else if avg < 10.0 {
            avg / 10.0
        } else {
            (1.0 - (avg - 20.0) / 50.0).max(0.1)
        };
        score.clamp(0.0, 1.0)
    }
}
