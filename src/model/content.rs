//! 抓取结果：结构化页面内容

use serde::{Deserialize, Serialize};

/// 页面链接
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
    #[serde(default)]
    pub title: String,
}

/// 页面图片
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub title: String,
}

/// 表单输入项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInput {
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub required: bool,
}

/// 页面表单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageForm {
    #[serde(default)]
    pub action: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub inputs: Vec<FormInput>,
}

impl Default for PageForm {
    fn default() -> Self {
        Self {
            action: String::new(),
            method: default_method(),
            inputs: Vec::new(),
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// 内容抓取器的输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    #[serde(default)]
    pub meta_keywords: String,
    pub html_content: String,
    pub text_content: String,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
    pub forms: Vec<PageForm>,
    pub domain: String,
    pub status_code: u16,
}
