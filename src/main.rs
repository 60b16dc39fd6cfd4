//! hive - 多智能体雇佣编排 CLI
//!
//! 本地模式：按配置组装编排器在进程内运行（Agent 执行端点默认指向 hive-web）。
//! 远程模式：`--remote URL` 把任务提交给运行中的 hive-web，增量解码 NDJSON 响应。
//! Ctrl+C 取消当前运行。

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use hive::config::load_config;
use hive::core::{build_orchestrator, Task};
use hive::observability;
use hive::stream::{encode_event, EventDecoder, OrchestratorEvent, RunView};

/// Hire specialist agents for a task and synthesize their reports
#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Specify alternate configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run against a hive-web server instead of in-process
    #[arg(long, value_name = "URL", env = "HIVE_REMOTE")]
    remote: Option<String>,

    /// Print the raw NDJSON event stream
    #[arg(long)]
    raw: bool,

    /// The task to execute
    #[arg(required = true, num_args = 1..)]
    task: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_with_default("warn");
    let cli = Cli::parse();

    let task = Task::parse(&cli.task.join(" ")).context("Task is empty")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            tracing::info!("Received Ctrl+C, cancelling run");
            ctrl_c.cancel();
        }
    });

    let mut printer = Printer::new(cli.raw);
    match cli.remote {
        Some(url) => run_remote(&url, &task, &mut printer, &cancel).await?,
        None => run_local(cli.config, task, &mut printer, &cancel).await?,
    }
    printer.finish()
}

async fn run_local(
    config: Option<PathBuf>,
    task: Task,
    printer: &mut Printer,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let cfg = load_config(config).context("Failed to load config")?;
    let orchestrator = Arc::new(build_orchestrator(&cfg).context("Failed to build orchestrator")?);

    let mut handle = orchestrator.start(task);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                handle.cancel.cancel();
                break;
            }
            event = handle.events.recv() => match event {
                Some(event) => printer.print(&event)?,
                None => break,
            },
        }
    }
    // 运行结果已通过事件呈现；这里只等待后台任务收尾
    let _ = handle.join.await;
    Ok(())
}

async fn run_remote(
    base_url: &str,
    task: &Task,
    printer: &mut Printer,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let url = format!("{}/api/agents/orchestrator", base_url.trim_end_matches('/'));
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&json!({ "task": task.as_str() }))
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{url} returned {status}: {body}");
    }

    let mut bytes = resp.bytes_stream();
    let mut decoder = EventDecoder::new();
    loop {
        tokio::select! {
            // 丢弃响应体即通知服务端停止
            _ = cancel.cancelled() => break,
            chunk = bytes.next() => match chunk {
                Some(chunk) => {
                    let chunk = chunk.context("Event stream interrupted")?;
                    for event in decoder.push(&chunk) {
                        printer.print(&event)?;
                    }
                }
                None => {
                    if let Some(event) = decoder.finish() {
                        printer.print(&event)?;
                    }
                    break;
                }
            },
        }
    }
    if decoder.dropped() > 0 {
        tracing::warn!(dropped = decoder.dropped(), "skipped malformed event lines");
    }
    Ok(())
}

/// 终端渲染：同时维护 RunView 以判断运行结局
struct Printer {
    raw: bool,
    view: RunView,
    out: std::io::Stdout,
}

impl Printer {
    fn new(raw: bool) -> Self {
        Self {
            raw,
            view: RunView::new(),
            out: std::io::stdout(),
        }
    }

    fn print(&mut self, event: &OrchestratorEvent) -> anyhow::Result<()> {
        self.view.apply(event);
        let mut out = self.out.lock();
        if self.raw {
            out.write_all(encode_event(event)?.as_bytes())?;
            out.flush()?;
            return Ok(());
        }
        match event {
            OrchestratorEvent::Thinking { message } => writeln!(out, "{message}")?,
            OrchestratorEvent::Plan { agents, total_cost } => {
                writeln!(out, "Plan: {} (est. {total_cost})", agents.join(" → "))?
            }
            OrchestratorEvent::Hiring {
                icon,
                agent_name,
                cost,
                tx_hash,
                wallet_before,
                wallet_after,
                network,
                real_payment,
                ..
            } => {
                let kind = if *real_payment { "" } else { ", simulated" };
                writeln!(
                    out,
                    "{icon} Hired {agent_name} for {cost} on {network}{kind}\n   tx {tx_hash}\n   wallet {wallet_before} → {wallet_after}"
                )?
            }
            OrchestratorEvent::AgentStart { agent_name, .. } => {
                writeln!(out, "\n── {agent_name} ──")?
            }
            OrchestratorEvent::Chunk { content, .. }
            | OrchestratorEvent::SynthesisChunk { content } => write!(out, "{content}")?,
            OrchestratorEvent::AgentDone { agent_name, .. } => {
                writeln!(out, "\n✓ {agent_name} done")?
            }
            OrchestratorEvent::AgentError { agent_id } => writeln!(out, "\n✗ {agent_id} failed")?,
            OrchestratorEvent::Synthesizing { wallet_balance } => {
                writeln!(out, "\n══ Executive brief (wallet {wallet_balance}) ══")?
            }
            OrchestratorEvent::Complete {
                total_cost,
                agents_hired,
                wallet_balance,
                tx_count,
            } => writeln!(
                out,
                "\n\nDone: {agents_hired} agents hired, {tx_count} transactions, spent {total_cost}, wallet {wallet_balance}"
            )?,
            OrchestratorEvent::Error { message } => writeln!(out, "\nError: {message}")?,
        }
        out.flush()?;
        Ok(())
    }

    fn finish(self) -> anyhow::Result<()> {
        if let Some(message) = self.view.error {
            bail!(message);
        }
        if self.view.complete.is_none() {
            bail!("Run ended before completion");
        }
        Ok(())
    }
}
