//! 日志与追踪系统
//!
//! `RUST_LOG` 优先；否则按配置级别输出本服务与 HTTP 追踪层的事件，
//! 依赖库只保留告警以上。

use crate::config::AppConfig;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// 构建日志过滤器
fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

fn default_directives(level: &str) -> String {
    let level = level.to_lowercase();
    format!("warn,auth_core={level},tower_http={level}")
}

/// 初始化日志与追踪系统
///
/// 重复初始化（例如测试中多次调用）返回错误而不是 panic。
pub fn init_telemetry(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = build_env_filter(&config.logging.level);

    // json 用于生产，pretty 用于本地开发
    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!(
        level = %config.logging.level,
        format = %config.logging.format,
        "Telemetry initialized"
    );

    Ok(())
}
