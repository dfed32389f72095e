//! 可选的重试策略
//!
//! 控制器和传输层内部从不重试；需要重试的调用方用 [`RetryPolicy::run`] 包装操作。
//! 只有 `Communication` 和 `Timeout` 错误会被重试。

use crate::error::{ControlError, HardwareError};
use std::time::Duration;
use tracing::debug;

/// 默认最大尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 默认重试间隔
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// 可判断是否值得重试的错误
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for HardwareError {
    fn is_retryable(&self) -> bool {
        HardwareError::is_retryable(self)
    }
}

impl Retryable for ControlError {
    fn is_retryable(&self) -> bool {
        ControlError::is_retryable(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次），至少为 1
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// 不重试
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 执行操作，可重试错误按策略重试，返回最后一次的结果
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    debug!(
                        "Attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, self.max_attempts, e, self.delay
                    );
                    std::thread::sleep(self.delay);
                    attempt += 1;
                },
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}
