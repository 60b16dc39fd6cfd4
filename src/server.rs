//! HTTP 接入层（feature = "web"）
//!
//! - POST /api/agents/orchestrator：{task} → NDJSON 事件流
//! - GET  /api/agents：注册表目录
//! - POST /api/agents/:id：自托管的 Agent 执行端点，{input} → text/plain 流
//! - GET  /api/payment/balance：编排方账户余额（需配置中继）
//! - GET  /api/health
//!
//! 响应体被丢弃即关闭事件接收端，编排在下一个挂起点停止。

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::agents::{AgentRunError, AgentRunner, FirecrawlSearch, NoSearch, SearchProvider};
use crate::config::{env_key, AppConfig};
use crate::core::{build_orchestrator_with_llm, create_llm_from_config, HiveError, Orchestrator, Task};
use crate::ledger::Ledger;
use crate::registry::AgentDescriptor;
use crate::stream::{encode_event, OrchestratorEvent, NDJSON_CONTENT_TYPE};

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub runner: Arc<AgentRunner>,
    pub ledger: Option<Arc<dyn Ledger>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, runner: Arc<AgentRunner>) -> Self {
        let ledger = orchestrator.settlement().ledger().cloned();
        Self {
            orchestrator,
            runner,
            ledger,
        }
    }

    /// 按配置组装：编排器与执行端点共用同一个 LLM 后端
    pub fn from_config(cfg: &AppConfig) -> Result<Self, HiveError> {
        let llm = create_llm_from_config(cfg);
        let orchestrator = Arc::new(build_orchestrator_with_llm(cfg, llm.clone())?);

        let search: Arc<dyn SearchProvider> = match cfg.search.provider_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Arc::new(FirecrawlSearch::new(
                url,
                env_key(&cfg.search.api_key_env),
                cfg.search.timeout_secs,
            )),
            _ => {
                tracing::warn!("No search provider configured, agents will report without sources");
                Arc::new(NoSearch)
            }
        };
        let runner = AgentRunner::new(llm, search)
            .with_max_summary_chars(cfg.search.max_result_chars)
            .with_max_tokens_cap(cfg.llm.agent_max_tokens);

        Ok(Self::new(orchestrator, Arc::new(runner)))
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/agents", get(list_agents))
        .route("/api/agents/orchestrator", post(orchestrate))
        .route("/api/agents/:id", post(run_agent))
        .route("/api/payment/balance", get(payment_balance))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state)
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    task: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentRequest {
    #[serde(default)]
    input: Option<String>,
}

/// GET /api/agents
async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentDescriptor>> {
    Json(state.orchestrator.registry().iter().cloned().collect())
}

/// POST /api/agents/orchestrator：任务为空时 400，不打开事件流
async fn orchestrate(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: StartRequest = serde_json::from_slice(&body).unwrap_or_default();
    let task = match Task::parse(req.task.as_deref().unwrap_or("")) {
        Ok(task) => task,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let handle = state.orchestrator.start(task);
    let lines = stream::unfold(handle.events, |mut events| async move {
        loop {
            let event: OrchestratorEvent = events.recv().await?;
            match encode_event(&event) {
                Ok(line) => return Some((Ok::<_, Infallible>(Bytes::from(line)), events)),
                Err(e) => tracing::error!(kind = event.kind(), "event encode failed: {}", e),
            }
        }
    });

    let mut res = Response::new(Body::from_stream(lines));
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(NDJSON_CONTENT_TYPE),
    );
    res
}

/// POST /api/agents/:id
async fn run_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    body: Bytes,
) -> Response {
    let req: AgentRequest = serde_json::from_slice(&body).unwrap_or_default();
    let input = req.input.unwrap_or_default();

    match state.runner.run(&agent_id, &input).await {
        Ok(text) => {
            let body = Body::from_stream(text.map(|r| r.map(Bytes::from)));
            let mut res = Response::new(body);
            let headers = res.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                header::HeaderValue::from_static("nosniff"),
            );
            res
        }
        Err(AgentRunError::EmptyInput) => json_error(StatusCode::BAD_REQUEST, "Input is required"),
        Err(AgentRunError::UnknownAgent(id)) => {
            json_error(StatusCode::NOT_FOUND, &format!("Unknown agent: {id}"))
        }
        Err(e) => {
            tracing::error!(agent_id = %agent_id, "agent error: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Agent failed. Check your API keys.")
        }
    }
}

/// GET /api/payment/balance
async fn payment_balance(State(state): State<Arc<AppState>>) -> Response {
    let Some(ledger) = &state.ledger else {
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "Ledger relay not configured");
    };
    match ledger.balance().await {
        Ok(balance) => Json(json!({
            "address": state.orchestrator.settlement().wallets().orchestrator(),
            "balance": balance,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("balance lookup failed: {}", e);
            json_error(StatusCode::BAD_GATEWAY, "Failed to fetch balance")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::llm::{LlmClient, Script, ScriptedLlmClient};
    use crate::stream::EventDecoder;

    fn app(scripts: Vec<Script>) -> Router {
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(scripts));
        let mut cfg = AppConfig::default();
        // 指向不存在的端口：Agent 调用失败，编排仍能走完
        cfg.app.agents_base_url = "http://127.0.0.1:9".into();
        let orchestrator = Arc::new(build_orchestrator_with_llm(&cfg, llm.clone()).unwrap());
        let runner = Arc::new(AgentRunner::new(llm, Arc::new(NoSearch)));
        create_router(Arc::new(AppState::new(orchestrator, runner)))
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let res = app(vec![])
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_bytes(res).await, b"OK");
    }

    #[tokio::test]
    async fn test_blank_task_rejected_without_stream() {
        for body in [r#"{"task": "   "}"#, "{}", "not json"] {
            let res = app(vec![]).oneshot(post("/api/agents/orchestrator", body)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            let value: serde_json::Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
            assert_eq!(value, json!({"error": "Task required"}));
        }
    }

    #[tokio::test]
    async fn test_orchestrator_streams_ndjson() {
        let res = app(vec![
            Script::Reply(r#"["web-research"]"#.into()),
            Script::Reply("No usable findings.".into()),
        ])
        .oneshot(post("/api/agents/orchestrator", r#"{"task": "Perplexity AI"}"#))
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            NDJSON_CONTENT_TYPE
        );
        let bytes = body_bytes(res).await;
        let mut decoder = EventDecoder::new();
        let events = decoder.push(&bytes);
        assert_eq!(decoder.dropped(), 0);
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "thinking",
                "plan",
                "hiring",
                "agent_start",
                "agent_error",
                "synthesizing",
                "synthesis_chunk",
                "complete"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_agents() {
        let res = app(vec![])
            .oneshot(Request::builder().uri("/api/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 6);
        assert_eq!(value[0]["id"], "web-research");
        assert_eq!(value[0]["unitCost"], "0.50");
    }

    #[tokio::test]
    async fn test_agent_endpoint_statuses() {
        let res = app(vec![]).oneshot(post("/api/agents/web-research", r#"{"input": ""}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(value, json!({"error": "Input is required"}));

        let res = app(vec![]).oneshot(post("/api/agents/nope", r#"{"input": "x"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app(vec![Script::Fail("401".into())])
            .oneshot(post("/api/agents/web-research", r#"{"input": "x"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let value: serde_json::Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(value, json!({"error": "Agent failed. Check your API keys."}));
    }

    #[tokio::test]
    async fn test_agent_endpoint_streams_text() {
        let res = app(vec![Script::Chunks(vec!["## Key ".into(), "Findings".into()])])
            .oneshot(post("/api/agents/web-research", r#"{"input": "Perplexity AI"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_bytes(res).await, b"## Key Findings");
    }

    #[tokio::test]
    async fn test_balance_without_relay() {
        let res = app(vec![])
            .oneshot(Request::builder().uri("/api/payment/balance").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
