//! 编排状态机：规划 → 逐个雇佣并运行 → 汇总 → 完成
//!
//! 每次状态转移都通过 EventSink 发出一个事件。Agent 严格串行：前一个 Agent 的 agent_done / agent_error
//! 之前，不会出现下一个 Agent 的任何事件，余额与事件顺序因此完全确定。
//! 单个 Agent 的失败只产出 agent_error；只有汇总失败（或其他无恢复路径的故障）会以 error 事件结束。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::session::{OrchestrationPhase, OrchestrationSession, Task};
use crate::core::{EventSink, HiveError};
use crate::invoker::Capability;
use crate::ledger::SettlementAdapter;
use crate::planner::Planner;
use crate::registry::{AgentDescriptor, AgentRegistry, Amount};
use crate::stream::OrchestratorEvent;
use crate::synthesis::{Report, Synthesizer};

/// 规划开始时的提示
pub const THINKING_MESSAGE: &str = "Analyzing task, selecting agents to hire…";
/// 会话无法完成时对外的唯一错误信息
pub const FAILURE_MESSAGE: &str = "Orchestration failed";

/// 一次后台运行：事件接收端、取消 token、运行结果
pub struct RunHandle {
    pub events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    pub cancel: CancellationToken,
    pub join: JoinHandle<Result<OrchestrationSession, HiveError>>,
}

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    planner: Planner,
    settlement: SettlementAdapter,
    invoker: Arc<dyn Capability>,
    synthesizer: Synthesizer,
    initial_allowance: Amount,
    agent_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        planner: Planner,
        settlement: SettlementAdapter,
        invoker: Arc<dyn Capability>,
        synthesizer: Synthesizer,
    ) -> Self {
        Self {
            registry,
            planner,
            settlement,
            invoker,
            synthesizer,
            initial_allowance: Amount::from_cents(1000),
            agent_timeout: Duration::from_secs(180),
        }
    }

    pub fn with_initial_allowance(mut self, allowance: Amount) -> Self {
        self.initial_allowance = allowance;
        self
    }

    /// 单个 Agent 从调用到最后一个片段的总时限
    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn settlement(&self) -> &SettlementAdapter {
        &self.settlement
    }

    /// 在后台任务中运行；丢弃 events 或取消 token 都会让运行在下一个挂起点停止
    pub fn start(self: &Arc<Self>, task: Task) -> RunHandle {
        let (sink, events) = EventSink::channel();
        let cancel = sink.cancel_token();
        let this = Arc::clone(self);
        let join = tokio::spawn(async move { this.run(task, &sink).await });
        RunHandle {
            events,
            cancel,
            join,
        }
    }

    /// 驱动一次完整的编排。返回 Err 时已尽力发出 error 事件（ConsumerGone 除外）
    pub async fn run(&self, task: Task, sink: &EventSink) -> Result<OrchestrationSession, HiveError> {
        let started = Instant::now();
        let mut session = OrchestrationSession::new(task, self.initial_allowance);
        tracing::info!(
            task = %session.task().as_str(),
            allowance = %session.initial_allowance(),
            "orchestration started"
        );

        match self.drive(&mut session, sink).await {
            Ok(()) => {
                tracing::info!(
                    agents_hired = session.hired_count(),
                    total_cost = %session.total_committed(),
                    balance = %session.balance(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "orchestration complete"
                );
                Ok(session)
            }
            Err(HiveError::ConsumerGone) => {
                tracing::info!(phase = ?session.phase(), "consumer gone, orchestration abandoned");
                Err(HiveError::ConsumerGone)
            }
            Err(e) => {
                tracing::error!(phase = ?session.phase(), "orchestration failed: {}", e);
                session.set_phase(OrchestrationPhase::Failed);
                // 消费端可能恰好也已离开
                let _ = sink.emit(OrchestratorEvent::Error {
                    message: FAILURE_MESSAGE.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &mut OrchestrationSession, sink: &EventSink) -> Result<(), HiveError> {
        let task = session.task().clone();

        session.set_phase(OrchestrationPhase::Planning);
        sink.emit(OrchestratorEvent::Thinking {
            message: THINKING_MESSAGE.to_string(),
        })?;
        let plan = sink.guard(self.planner.plan(task.as_str())).await?;
        let agents = plan.agents().to_vec();
        sink.emit(OrchestratorEvent::Plan {
            agents: agents.clone(),
            total_cost: plan.total_cost(&self.registry),
        })?;
        session.set_plan(plan);

        for (index, agent_id) in agents.iter().enumerate() {
            let agent = self
                .registry
                .get(agent_id)
                .ok_or_else(|| HiveError::UnknownAgent(agent_id.clone()))?;
            self.hire(index, agent, session, sink).await?;

            session.set_phase(OrchestrationPhase::Running(index));
            sink.emit(OrchestratorEvent::AgentStart {
                agent_id: agent.id.clone(),
                agent_name: agent.display_name.clone(),
            })?;

            match self.run_agent(agent, task.as_str(), session, sink).await? {
                Ok(()) => {
                    session.finish_run(&agent.id, true);
                    let tx_hash = session
                        .receipts()
                        .last()
                        .map(|r| r.transaction_reference.clone())
                        .unwrap_or_default();
                    sink.emit(OrchestratorEvent::AgentDone {
                        agent_id: agent.id.clone(),
                        agent_name: agent.display_name.clone(),
                        cost: agent.unit_cost,
                        tx_hash,
                    })?;
                }
                Err(e) => {
                    tracing::warn!(agent_id = %agent.id, "agent failed: {}", e);
                    session.finish_run(&agent.id, false);
                    sink.emit(OrchestratorEvent::AgentError {
                        agent_id: agent.id.clone(),
                    })?;
                }
            }
        }

        session.set_phase(OrchestrationPhase::Synthesizing);
        sink.emit(OrchestratorEvent::Synthesizing {
            wallet_balance: session.balance(),
        })?;
        self.synthesize(task.as_str(), session, sink).await?;

        session.set_phase(OrchestrationPhase::Complete);
        sink.emit(OrchestratorEvent::Complete {
            total_cost: session.total_committed(),
            agents_hired: session.hired_count(),
            wallet_balance: session.balance(),
            tx_count: session.receipts().len(),
        })?;
        Ok(())
    }

    /// 付款并记账；扣款在尝试工作之前提交，失败不退款
    async fn hire(
        &self,
        index: usize,
        agent: &AgentDescriptor,
        session: &mut OrchestrationSession,
        sink: &EventSink,
    ) -> Result<(), HiveError> {
        session.set_phase(OrchestrationPhase::Hiring(index));
        let receipt = sink.guard(self.settlement.hire(agent, agent.unit_cost)).await?;
        let change = session.record_hire(receipt.clone());
        sink.emit(OrchestratorEvent::Hiring {
            agent_id: agent.id.clone(),
            agent_name: agent.display_name.clone(),
            icon: agent.icon.clone(),
            cost: receipt.amount,
            tx_hash: receipt.transaction_reference,
            wallet_before: change.before,
            wallet_after: change.after,
            network: receipt.ledger_label,
            explorer_url: receipt.explorer_url,
            real_payment: receipt.is_real_settlement,
            from_address: receipt.from_account,
            to_address: receipt.to_account,
        })?;
        session.confirm_receipt(&agent.id);
        Ok(())
    }

    /// 调用 Agent 并转发片段。外层 Err 只有 ConsumerGone；内层 Err 是该 Agent 的失败
    async fn run_agent(
        &self,
        agent: &AgentDescriptor,
        task: &str,
        session: &mut OrchestrationSession,
        sink: &EventSink,
    ) -> Result<Result<(), HiveError>, HiveError> {
        let started = Instant::now();
        let mut fragments = 0usize;
        let mut bytes = 0usize;

        let attempt = tokio::time::timeout(self.agent_timeout, async {
            let mut stream = sink.guard(self.invoker.invoke(&agent.id, task)).await??;
            while let Some(item) = sink.guard(stream.next()).await? {
                let fragment = item?;
                if fragment.is_empty() {
                    continue;
                }
                fragments += 1;
                bytes += fragment.len();
                session.append_fragment(&agent.id, &fragment);
                sink.emit(OrchestratorEvent::Chunk {
                    agent_id: agent.id.clone(),
                    content: fragment,
                })?;
            }
            Ok::<(), HiveError>(())
        })
        .await;

        let result = match attempt {
            Ok(r) => r,
            Err(_) => Err(HiveError::CapabilityTimeout(agent.id.clone())),
        };

        let outcome = match &result {
            Ok(()) => "ok",
            Err(HiveError::CapabilityTimeout(_)) => "timeout",
            Err(HiveError::ConsumerGone) => "abandoned",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "agent_audit",
            "agent": agent.id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "fragments": fragments,
            "bytes": bytes,
            "duration_ms": started.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit, "agent");

        match result {
            Err(HiveError::ConsumerGone) => Err(HiveError::ConsumerGone),
            other => Ok(other),
        }
    }

    async fn synthesize(
        &self,
        task: &str,
        session: &mut OrchestrationSession,
        sink: &EventSink,
    ) -> Result<(), HiveError> {
        let reports: Vec<Report<'_>> = session
            .succeeded_results()
            .into_iter()
            .map(|r| Report {
                agent_name: self
                    .registry
                    .get(&r.agent_id)
                    .map(|a| a.display_name.as_str())
                    .unwrap_or(r.agent_id.as_str()),
                text: &r.accumulated_text,
            })
            .collect();
        let mut stream = sink.guard(self.synthesizer.stream(task, &reports)).await??;
        drop(reports);

        while let Some(item) = sink.guard(stream.next()).await? {
            let fragment = item?;
            if fragment.is_empty() {
                continue;
            }
            session.append_brief(&fragment);
            sink.emit(OrchestratorEvent::SynthesisChunk { content: fragment })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use futures_util::stream;

    use crate::invoker::FragmentStream;
    use crate::llm::{LlmClient, Script, ScriptedLlmClient};
    use crate::registry::DEFAULT_AGENT_ID;

    #[derive(Clone)]
    enum Behaviour {
        Reply(Vec<&'static str>),
        Reject(u16),
        Abort(Vec<&'static str>),
        Hang,
    }

    #[derive(Default)]
    struct FakeCapability {
        behaviours: HashMap<&'static str, Behaviour>,
    }

    impl FakeCapability {
        fn with(mut self, agent_id: &'static str, behaviour: Behaviour) -> Self {
            self.behaviours.insert(agent_id, behaviour);
            self
        }
    }

    #[async_trait]
    impl Capability for FakeCapability {
        async fn invoke(&self, agent_id: &str, _task: &str) -> Result<FragmentStream, HiveError> {
            let behaviour = self
                .behaviours
                .get(agent_id)
                .cloned()
                .unwrap_or(Behaviour::Reply(vec!["report"]));
            match behaviour {
                Behaviour::Reply(parts) => Ok(Box::pin(stream::iter(
                    parts
                        .into_iter()
                        .map(|p| Ok::<_, HiveError>(p.to_string()))
                        .collect::<Vec<_>>(),
                ))),
                Behaviour::Reject(status) => Err(HiveError::CapabilityUnavailable {
                    agent_id: agent_id.to_string(),
                    status,
                }),
                Behaviour::Abort(parts) => {
                    let mut items: Vec<Result<String, HiveError>> =
                        parts.into_iter().map(|p| Ok(p.to_string())).collect();
                    items.push(Err(HiveError::CapabilityAborted {
                        agent_id: agent_id.to_string(),
                        reason: "reset".into(),
                    }));
                    Ok(Box::pin(stream::iter(items)))
                }
                Behaviour::Hang => Ok(Box::pin(stream::pending::<Result<String, HiveError>>())),
            }
        }
    }

    fn orchestrator(scripts: Vec<Script>, capability: FakeCapability) -> (Orchestrator, Arc<ScriptedLlmClient>) {
        let scripted = Arc::new(ScriptedLlmClient::new(scripts));
        let llm: Arc<dyn LlmClient> = scripted.clone();
        let registry = Arc::new(AgentRegistry::builtin());
        let planner = Planner::new(llm.clone(), registry.clone(), DEFAULT_AGENT_ID).unwrap();
        let orch = Orchestrator::new(
            registry,
            planner,
            SettlementAdapter::simulated(),
            Arc::new(capability),
            Synthesizer::new(llm),
        );
        (orch, scripted)
    }

    async fn run_collect(
        orch: &Orchestrator,
        task: &str,
    ) -> (Result<OrchestrationSession, HiveError>, Vec<OrchestratorEvent>) {
        let (sink, mut rx) = EventSink::channel();
        let result = orch.run(Task::parse(task).unwrap(), &sink).await;
        drop(sink);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        (result, events)
    }

    fn kinds(events: &[OrchestratorEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.kind()).collect()
    }

    #[tokio::test]
    async fn test_two_agents_succeed_in_order() {
        let (orch, _) = orchestrator(
            vec![
                Script::Reply(r#"["due-diligence", "competitor-analysis"]"#.into()),
                Script::Chunks(vec!["**Executive summary.** ".into(), "Strong.".into()]),
            ],
            FakeCapability::default()
                .with("due-diligence", Behaviour::Reply(vec!["## Overview", " ok"]))
                .with("competitor-analysis", Behaviour::Reply(vec!["## Landscape"])),
        );
        let (result, events) = run_collect(&orch, "Perplexity AI").await;
        let session = result.unwrap();

        assert_eq!(
            kinds(&events),
            vec![
                "thinking",
                "plan",
                "hiring",
                "agent_start",
                "chunk",
                "chunk",
                "agent_done",
                "hiring",
                "agent_start",
                "chunk",
                "agent_done",
                "synthesizing",
                "synthesis_chunk",
                "synthesis_chunk",
                "complete",
            ]
        );
        match events.last().unwrap() {
            OrchestratorEvent::Complete {
                total_cost,
                agents_hired,
                wallet_balance,
                tx_count,
            } => {
                assert_eq!(*total_cost, Amount::from_cents(350));
                assert_eq!(*agents_hired, 2);
                assert_eq!(*wallet_balance, Amount::from_cents(650));
                assert_eq!(*tx_count, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.receipts().iter().all(|r| r.confirmed));
        assert_eq!(session.brief(), "**Executive summary.** Strong.");
        assert_eq!(session.phase(), OrchestrationPhase::Complete);
    }

    #[tokio::test]
    async fn test_failed_agent_is_paid_and_excluded_from_synthesis() {
        let (orch, llm) = orchestrator(
            vec![
                Script::Reply(r#"["due-diligence", "competitor-analysis"]"#.into()),
                Script::Reply("brief".into()),
            ],
            FakeCapability::default()
                .with("due-diligence", Behaviour::Reply(vec!["DD-REPORT"]))
                .with("competitor-analysis", Behaviour::Abort(vec!["CA-PARTIAL"])),
        );
        let (result, events) = run_collect(&orch, "Perplexity AI").await;
        let session = result.unwrap();

        assert!(kinds(&events).contains(&"agent_error"));
        assert_eq!(kinds(&events).iter().filter(|k| **k == "agent_done").count(), 1);
        assert_eq!(session.balance(), Amount::from_cents(650));
        assert!(!session.result("competitor-analysis").unwrap().succeeded);
        assert_eq!(
            session.result("competitor-analysis").unwrap().accumulated_text,
            "CA-PARTIAL"
        );

        let synthesis_prompt = &llm.calls()[1][1].content;
        assert!(synthesis_prompt.contains("DD-REPORT"));
        assert!(!synthesis_prompt.contains("CA-PARTIAL"));
    }

    #[tokio::test]
    async fn test_rejected_agent_yields_no_chunks() {
        let (orch, _) = orchestrator(
            vec![
                Script::Reply(r#"["lead-enrichment"]"#.into()),
                Script::Reply("brief".into()),
            ],
            FakeCapability::default().with("lead-enrichment", Behaviour::Reject(500)),
        );
        let (result, events) = run_collect(&orch, "Jane Doe").await;
        assert!(result.is_ok());
        assert_eq!(
            kinds(&events),
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
    async fn test_unparseable_plan_falls_back_to_default() {
        let (orch, _) = orchestrator(
            vec![Script::Reply("no idea".into()), Script::Reply("brief".into())],
            FakeCapability::default(),
        );
        let (result, events) = run_collect(&orch, "wefjk2309").await;
        assert!(result.unwrap().plan().unwrap().is_degraded());
        assert_eq!(
            events[1],
            OrchestratorEvent::Plan {
                agents: vec![DEFAULT_AGENT_ID.to_string()],
                total_cost: Amount::from_cents(50),
            }
        );
        assert_eq!(kinds(&events).iter().filter(|k| **k == "hiring").count(), 1);
        assert_eq!(events.last().map(|e| e.kind()), Some("complete"));
    }

    #[tokio::test]
    async fn test_hung_agent_times_out_as_agent_error() {
        let (orch, _) = orchestrator(
            vec![Script::Reply(r#"["web-research"]"#.into()), Script::Reply("brief".into())],
            FakeCapability::default().with("web-research", Behaviour::Hang),
        );
        let orch = orch.with_agent_timeout(Duration::from_millis(50));
        let (result, events) = run_collect(&orch, "anything").await;
        assert!(result.is_ok());
        assert!(kinds(&events).contains(&"agent_error"));
        assert_eq!(events.last().map(|e| e.kind()), Some("complete"));
    }

    #[tokio::test]
    async fn test_synthesis_failure_ends_with_error_event() {
        let (orch, _) = orchestrator(
            vec![
                Script::Reply(r#"["web-research"]"#.into()),
                Script::Fail("unreachable".into()),
            ],
            FakeCapability::default(),
        );
        let (result, events) = run_collect(&orch, "anything").await;
        assert!(matches!(result, Err(HiveError::SynthesisFailed(_))));
        assert_eq!(
            events.last(),
            Some(&OrchestratorEvent::Error {
                message: FAILURE_MESSAGE.to_string()
            })
        );
        assert!(!kinds(&events).contains(&"complete"));
    }

    #[tokio::test]
    async fn test_dropped_consumer_stops_the_run() {
        let (orch, _) = orchestrator(
            vec![Script::Reply(r#"["web-research"]"#.into())],
            FakeCapability::default().with("web-research", Behaviour::Hang),
        );
        let orch = Arc::new(orch);
        let mut handle = orch.start(Task::parse("anything").unwrap());
        // 读到 agent_start 后离开
        while let Some(ev) = handle.events.recv().await {
            if ev.kind() == "agent_start" {
                break;
            }
        }
        drop(handle.events);
        let result = handle.join.await.unwrap();
        assert!(matches!(result, Err(HiveError::ConsumerGone)));
    }

    #[tokio::test]
    async fn test_cancel_token_stops_the_run() {
        let (orch, _) = orchestrator(
            vec![Script::Reply(r#"["web-research"]"#.into())],
            FakeCapability::default().with("web-research", Behaviour::Hang),
        );
        let handle = Arc::new(orch).start(Task::parse("anything").unwrap());
        handle.cancel.cancel();
        assert!(matches!(handle.join.await.unwrap(), Err(HiveError::ConsumerGone)));
    }
}
