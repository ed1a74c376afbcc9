//! 版本提取工具
//! 按版本模板从正则捕获结果中组装技术版本号，支持 \1 与 $1 两种分组引用

use regex::Captures;

/// 版本提取工具类
pub struct VersionExtractor;

impl VersionExtractor {
    /// 按模板提取版本号
    ///
    /// 模板为空、没有任何分组被替换、或替换后仍残留占位符时返回 None
    pub fn extract(template: &str, captures: &Captures) -> Option<String> {
        if template.trim().is_empty() {
            return None;
        }

        let mut version = template.to_string();
        let mut replaced = false;

        // 从高位分组开始替换，避免 \1 误伤 \10
        for group in (1..captures.len()).rev() {
            let value = captures.get(group).map(|m| m.as_str().trim()).unwrap_or("");
            if !value.is_empty() {
                replaced = true;
            }
            version = version
                .replace(&format!("\\{}", group), value)
                .replace(&format!("${}", group), value);
        }

        let version = version.trim();
        if !replaced || version.is_empty() || version.contains('\\') || version.contains('$') {
            return None;
        }
        Some(version.to_string())
    }
}
