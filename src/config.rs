//! 全局配置管理,存储所有可配置项

use std::path::PathBuf;
use std::time::Duration;

/// 环境变量前缀
const ENV_PREFIX: &str = "RSINSIGHT_";

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    // 分析结果新鲜度窗口，窗口内直接返回缓存
    pub cache_ttl: Duration,
    // 内容抓取超时，超时即整次分析失败
    pub fetch_timeout: Duration,
    // 单个内容分析子调用超时
    pub ai_timeout: Duration,
    // 单次持久化写入超时
    pub persist_timeout: Duration,
    // 抓取使用的 User-Agent
    pub user_agent: String,
    // 内容分析服务（OpenRouter 兼容接口）
    pub ai_base_url: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub ai_max_tokens: u32,
    pub ai_temperature: f32,
    // 本地快照路径（MessagePack），None 表示纯内存
    pub snapshot_path: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            fetch_timeout: Duration::from_secs(30),
            ai_timeout: Duration::from_secs(120),
            persist_timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ai_base_url: "https://openrouter.ai/api/v1".to_string(),
            ai_api_key: String::new(),
            ai_model: "anthropic/claude-3.5-sonnet".to_string(),
            ai_max_tokens: 4000,
            ai_temperature: 0.7,
            snapshot_path: None,
        }
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }

    /// 从环境变量读取配置，未设置或无法解析的项保留默认值
    /// 支持：RSINSIGHT_AI_API_KEY / RSINSIGHT_AI_BASE_URL / RSINSIGHT_AI_MODEL /
    /// RSINSIGHT_CACHE_TTL_SECS / RSINSIGHT_FETCH_TIMEOUT_SECS / RSINSIGHT_AI_TIMEOUT_SECS /
    /// RSINSIGHT_SNAPSHOT_PATH
    pub fn from_env() -> GlobalConfig {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GlobalConfig {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty());
        let secs = |name: &str| get(name).and_then(|v| v.trim().parse::<u64>().ok()).map(Duration::from_secs);

        let mut builder = CustomConfigBuilder::new();
        if let Some(key) = get("AI_API_KEY") {
            builder = builder.ai_api_key(key);
        }
        if let Some(url) = get("AI_BASE_URL") {
            builder = builder.ai_base_url(url);
        }
        if let Some(model) = get("AI_MODEL") {
            builder = builder.ai_model(model);
        }
        if let Some(ttl) = secs("CACHE_TTL_SECS") {
            builder = builder.cache_ttl(ttl);
        }
        if let Some(timeout) = secs("FETCH_TIMEOUT_SECS") {
            builder = builder.fetch_timeout(timeout);
        }
        if let Some(timeout) = secs("AI_TIMEOUT_SECS") {
            builder = builder.ai_timeout(timeout);
        }
        if let Some(path) = get("SNAPSHOT_PATH") {
            builder = builder.snapshot_path(PathBuf::from(path));
        }
        builder.build()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl Default for CustomConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
        }
    }

    /// 从已有配置继续构建
    pub fn from_config(config: GlobalConfig) -> Self {
        Self { config }
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn ai_timeout(mut self, timeout: Duration) -> Self {
        self.config.ai_timeout = timeout;
        self
    }

    pub fn persist_timeout(mut self, timeout: Duration) -> Self {
        self.config.persist_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn ai_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.ai_base_url = url.into();
        self
    }

    pub fn ai_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ai_api_key = key.into();
        self
    }

    pub fn ai_model(mut self, model: impl Into<String>) -> Self {
        self.config.ai_model = model.into();
        self
    }

    pub fn ai_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.ai_max_tokens = max_tokens;
        self
    }

    pub fn ai_temperature(mut self, temperature: f32) -> Self {
        self.config.ai_temperature = temperature;
        self
    }

    pub fn snapshot_path(mut self, path: PathBuf) -> Self {
        self.config.snapshot_path = Some(path);
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}
