//! 可观测性：tracing 订阅器初始化
//!
//! RUST_LOG 未设置时默认 info。日志写 stderr，stdout 留给事件流与 CLI 输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    init_with_default("info");
}

/// 指定 RUST_LOG 缺省时的过滤指令；重复初始化静默忽略
pub fn init_with_default(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
