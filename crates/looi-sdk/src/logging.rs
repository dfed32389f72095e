//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 输出，过滤规则取自 `RUST_LOG`，未设置时使用给定默认值。
//! 依赖 `log` crate 的第三方库输出由 subscriber 的 `tracing-log` 特性（默认启用）在
//! `try_init` 时安装的 `LogTracer` 转发。

use tracing_subscriber::EnvFilter;

/// 默认日志级别
pub const DEFAULT_LOG_FILTER: &str = "info";

/// 初始化日志（默认 `info`）
///
/// 重复调用是安全的，后续调用不生效。
pub fn init_logger() {
    init_logger_with(DEFAULT_LOG_FILTER);
}

/// 初始化日志，`RUST_LOG` 未设置时使用 `default_filter`（如 `"looi_driver=debug"`）
pub fn init_logger_with(default_filter: &str) {
    if let Err(e) = try_init_logger(default_filter) {
        tracing::debug!("Logger already initialized: {}", e);
    }
}

/// 初始化日志，已有全局 subscriber 时返回错误
pub fn try_init_logger(
    default_filter: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).try_init()?;
    Ok(())
}

/// 初始化日志的便捷宏
///
/// ```no_run
/// looi_sdk::init_logger!();
/// looi_sdk::init_logger!("looi_driver=debug,info");
/// ```
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::logging::init_logger()
    };
    ($filter:expr) => {
        $crate::logging::init_logger_with($filter)
    };
}
