//! URL 规范化工具
//! 规范化结果是站点去重与缓存查找的唯一键

use url::Url;

use crate::error::{InsightError, InsightResult};

/// URL 规范化工具类
pub struct UrlNormalizer;

impl UrlNormalizer {
    /// 规范化输入 URL
    ///
    /// 规则：
    /// 1. 去除首尾空白
    /// 2. 缺少 http:// 或 https:// 前缀时补全 https://（前缀判断忽略 ASCII 大小写）
    /// 3. 去除末尾的 `/` 结束符（连续的 `/` 视为同一个结束符，保证幂等）
    /// 4. 协议与主机名转小写，路径、查询串保持原样
    ///
    /// 规范化后为空或无法解析出主机名时返回 `InvalidInput`
    pub fn normalize(raw: &str) -> InsightResult<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InsightError::InvalidInput("URL 为空".to_string()));
        }

        let mut url = if Self::has_http_scheme(trimmed) {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let stripped_len = url.trim_end_matches('/').len();
        url.truncate(stripped_len);

        let parsed = Url::parse(&url)
            .map_err(|e| InsightError::InvalidInput(format!("无法解析URL {}：{}", raw, e)))?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(InsightError::InvalidInput(format!("URL 缺少主机名：{}", raw)));
        }

        Ok(Self::lowercase_authority(&url))
    }

    /// 协议与主机部分转小写；用户信息与 `://` 之后的路径部分不变
    fn lowercase_authority(url: &str) -> String {
        let Some((scheme, rest)) = url.split_once("://") else {
            return url.to_string();
        };
        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        let authority = match authority.rsplit_once('@') {
            Some((userinfo, host)) => format!("{}@{}", userinfo, host.to_ascii_lowercase()),
            None => authority.to_ascii_lowercase(),
        };
        format!("{}://{}{}", scheme.to_ascii_lowercase(), authority, tail)
    }

    /// 提取站点域名（host[:port]）
    pub fn domain_of(normalized: &str) -> InsightResult<String> {
        let parsed = Url::parse(normalized)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| InsightError::InvalidInput(format!("URL 缺少主机名：{}", normalized)))?;
        Ok(match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    fn has_http_scheme(url: &str) -> bool {
        let has_prefix = |prefix: &str| {
            url.get(..prefix.len())
                .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
        };
        has_prefix("http://") || has_prefix("https://")
    }
}
