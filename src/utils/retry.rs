//! 限次重试策略
//!
//! 会话服务和报表下载服务统一使用同一个策略对象，
//! 只对瞬态 UI 错误重试，其余错误立即上抛。

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::warn;

use crate::error;

/// 重试策略（最大次数 + 间隔）
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: usize,
    pause: Duration,
}

impl RetryPolicy {
    /// 创建新的重试策略
    pub fn new(max_attempts: usize, pause: Duration) -> Self {
        // 至少执行一次
        let max_attempts = max_attempts.max(1);
        Self {
            max_attempts,
            pause,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// 执行单个交互，瞬态错误按策略重试
    ///
    /// # 参数
    /// - `description`: 交互描述（用于日志）
    /// - `op`: 要执行的异步操作
    ///
    /// # 返回
    /// 最后一次尝试的结果
    pub async fn run<T, F, Fut>(&self, description: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && error::is_transient(&e) => {
                    warn!(
                        "交互 {} 第 {}/{} 次失败: {}，{}秒后重试",
                        description,
                        attempt,
                        self.max_attempts,
                        e,
                        self.pause.as_secs()
                    );
                    sleep(self.pause).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
