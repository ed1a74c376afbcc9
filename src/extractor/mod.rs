//! 提取模块：HTML 结构化内容提取
pub mod html_extractor;

pub use self::html_extractor::{ExtractResult, HtmlExtractor};
