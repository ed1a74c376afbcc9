//! 阶段结果：成功携带值，失败携带原因，汇总为固定结构

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// 意图/功能阶段
pub const STAGE_INTENT: &str = "intent_analysis";
/// 技术栈阶段
pub const STAGE_TECHNOLOGY: &str = "technology_stack";
/// UX 阶段
pub const STAGE_USER_EXPERIENCE: &str = "user_experience";

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Succeeded(T),
    Failed(String),
}

/// 缺失的阶段（或子调用）及原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: String,
    pub reason: String,
}

impl<T> StageOutcome<T> {
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => StageOutcome::Succeeded(value),
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }

    /// 执行同步阶段，阶段内 panic 记为失败
    pub fn catch(stage: impl FnOnce() -> T) -> Self {
        match panic::catch_unwind(AssertUnwindSafe(stage)) {
            Ok(value) => StageOutcome::Succeeded(value),
            Err(payload) => StageOutcome::Failed(format!("stage panicked: {}", panic_message(payload.as_ref()))),
        }
    }

    /// 带超时执行异步调用，超时与错误均记为失败
    pub async fn bounded<E, F>(limit: Duration, call: F) -> Self
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => Self::from_result(result),
            Err(_) => StageOutcome::Failed(format!("timed out after {}ms", limit.as_millis())),
        }
    }

    /// 取出成功值；失败时记录到 `failures` 并返回 None
    pub fn into_section(self, stage: &str, failures: &mut Vec<StageFailure>) -> Option<T> {
        match self {
            StageOutcome::Succeeded(value) => Some(value),
            StageOutcome::Failed(reason) => {
                warn!("Stage {} failed: {}", stage, reason);
                failures.push(StageFailure {
                    stage: stage.to_string(),
                    reason,
                });
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
