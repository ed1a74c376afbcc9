//! 全局错误类型定义

use thiserror::Error;
use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use url::ParseError as UrlParseError;

use crate::model::WebsiteStatus;

#[derive(Error, Debug)]
pub enum InsightError {
    // 输入相关错误（不重试，直接返回）
    #[error("无效输入：{0}")]
    InvalidInput(String),

    // 内容抓取失败：整次分析中止，站点标记为 FAILED
    #[error("内容抓取失败：{0}")]
    Fetch(String),

    // 单个内容分析子调用失败：仅影响所在阶段
    #[error("内容分析服务调用失败：{0}")]
    AnalysisService(String),

    // 生命周期状态机非法跳转（并发缺陷，致命）
    #[error("非法状态跳转：{from} -> {to}")]
    InvalidTransition { from: WebsiteStatus, to: WebsiteStatus },

    // 抓取成功后的持久化失败
    #[error("持久化失败：{0}")]
    Persistence(String),

    // 抓取成功后非阶段内的失败，包装根因
    #[error("网站分析失败：{0}")]
    Analysis(#[source] Box<InsightError>),

    // 分析任务异常终止（panic 或被取消）
    #[error("分析任务异常终止：{0}")]
    TaskAborted(String),

    #[error("网站记录不存在：{0}")]
    WebsiteNotFound(String),

    // 特征规则相关错误
    #[error("特征规则解析失败：{0}")]
    RuleParse(String),
    #[error("正则编译失败：{0}")]
    RegexCompile(#[from] RegexError),

    // 网络相关错误
    #[error("网络请求失败：{0}")]
    Http(#[from] reqwest::Error),

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    Json(#[from] SerdeJsonError),
    #[error("MessagePack序列化/反序列化失败：{0}")]
    MsgPack(String),

    // 基础错误
    #[error("IO操作失败：{0}")]
    Io(#[from] IoError),
    #[error("URL解析失败：{0}")]
    Url(#[from] UrlParseError),
}

impl InsightError {
    /// 将抓取成功后的失败包装为 `Analysis`，已包装的不重复包装
    pub fn into_analysis(self) -> Self {
        match self {
            err @ InsightError::Analysis(_) => err,
            other => InsightError::Analysis(Box::new(other)),
        }
    }
}

// 全局Result类型
pub type InsightResult<T> = Result<T, InsightError>;
