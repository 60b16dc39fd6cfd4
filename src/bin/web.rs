//! hive-web：编排事件流 + 自托管 Agent 执行端点
//!
//! 启动: cargo run --bin hive-web --features web
//! 任务: curl -N -X POST http://127.0.0.1:3000/api/agents/orchestrator -d '{"task":"Perplexity AI"}'

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;

use hive::config::load_config;
use hive::observability;
use hive::server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });
    let state = AppState::from_config(&cfg).context("Failed to build app state")?;
    let app = create_router(Arc::new(state));

    let port = std::env::var("HIVE_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("hive-web listening on http://{}", addr);
    if cfg.app.agents_base_url.ends_with(&format!(":{}", port)) {
        tracing::info!("Agent endpoints served by this process");
    } else {
        tracing::info!(agents_base_url = %cfg.app.agents_base_url, "Agent endpoints served remotely");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
