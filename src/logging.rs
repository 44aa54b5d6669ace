//! 日志初始化
//!
//! 按日期滚动写入文件，同时可选输出到控制台。`RUST_LOG` 优先于配置中的日志级别。

use anyhow::Result;
use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// 构造日志过滤器：优先读取 `RUST_LOG`，否则使用配置的级别
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// 初始化日志系统
///
/// 这个函数会：
/// 1. 创建日志目录
/// 2. 设置按日期分割的文件日志
/// 3. 根据配置决定是否同时输出到控制台
///
/// 返回的 guard 控制后台写入线程的生命周期，需要在 `main` 中一直持有。
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;

    let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
    let (file_writer, guard) = non_blocking(file_appender);

    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_writer(io::stdout).with_ansi(true));

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(
            // 文件中不使用颜色
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_names(true),
        )
        .with(console_layer)
        .try_init()?;

    Ok(guard)
}
