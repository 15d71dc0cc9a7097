//! 日志初始化 (tracing subscriber)
use tracing_subscriber::{fmt, EnvFilter};

/// 初始化全局日志, `RUST_LOG` 优先, 默认 info
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 重复初始化 (例如测试中) 直接忽略
    let _ = fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .try_init();
}
