//! 重试驱动 - 流程层
//!
//! 用显式的结果值 + 错误种类驱动重试，取代散落在各处的异常式控制流：
//! - 瞬时错误（网络、限流、5xx、完整性不符）按封顶指数退避重试
//! - 会话过期先单飞续期再重试
//! - 其余种类立即终止
//! - 尝试次数有界，超限后把最后一个错误原样返回

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::services::auth::SessionRenewer;

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 单阶段最大尝试次数（含第一次）
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// 第 n 次失败后的退避时间：base * 2^(n-1)，封顶 max_delay
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// 执行一个操作，按策略重试
///
/// # 参数
/// - `renewer`: 会话续期入口，探测到过期时调用（续期失败直接向上抛）
/// - `attempts`: 跨阶段累计的尝试计数（写入报告）
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    renewer: &dyn SessionRenewer,
    attempts: &AtomicU32,
    op: F,
) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        attempts.fetch_add(1, Ordering::Relaxed);

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        // 会话过期：先续期（单飞），续期失败是致命的
        if err.is_auth_expired() {
            renewer.renew().await?;
        }

        if attempt >= policy.max_attempts {
            warn!("重试次数耗尽 ({}/{}): {}", attempt, policy.max_attempts, err);
            return Err(err);
        }

        let delay = match err.retry_after_hint() {
            Some(hint) => hint.max(policy.backoff(attempt)),
            None => policy.backoff(attempt),
        };
        debug!(
            "尝试 {}/{} 失败, {:?} 后重试: {}",
            attempt, policy.max_attempts, delay, err
        );
        tokio::time::sleep(delay).await;
    }
}
