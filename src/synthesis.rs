//! 汇总：把所有成功 Agent 的报告合成一份执行简报
//!
//! 每份报告先按字符截断到 per_agent_chars 再拼接，保证请求体有界。
//! 没有成功报告时照常调用（上下文为空），由推理服务自己说明缺少可用结论。

use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt};

use crate::core::HiveError;
use crate::invoker::FragmentStream;
use crate::llm::{LlmClient, Message};

const SYSTEM_PROMPT: &str = "You synthesize reports from multiple AI agents into one sharp executive brief. \
Prose only. No ## headers. No bullet points. Bold labels like **Executive summary.** to start sections. \
Add genuine synthesis — don't just repeat what each agent said. Pull the thread that connects all the findings. \
Max 280 words.";

/// 单份待汇总的报告
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub agent_name: &'a str,
    pub text: &'a str,
}

/// 按字符截断，不会切断 UTF-8 标量
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
    per_agent_chars: usize,
    max_tokens: u32,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            per_agent_chars: 1800,
            max_tokens: 700,
            request_timeout: Duration::from_secs(60),
            stream_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_per_agent_chars(mut self, chars: usize) -> Self {
        self.per_agent_chars = chars;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeouts(mut self, request: Duration, stream: Duration) -> Self {
        self.request_timeout = request;
        self.stream_timeout = stream;
        self
    }

    /// `=== 名称 ===\n正文` 块，空行分隔
    pub fn context(&self, reports: &[Report<'_>]) -> String {
        reports
            .iter()
            .map(|r| {
                format!(
                    "=== {} ===\n{}",
                    r.agent_name,
                    truncate_chars(r.text, self.per_agent_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn messages(&self, task: &str, reports: &[Report<'_>]) -> Vec<Message> {
        vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!(
                "Task: {}\n\nAgent reports:\n{}\n\nWrite a synthesized executive brief.",
                task,
                self.context(reports)
            )),
        ]
    }

    /// 流式汇总。打开失败返回 Err；流中途出错或超过 stream_timeout 无输出时，以一个 Err 项结束
    pub async fn stream(
        &self,
        task: &str,
        reports: &[Report<'_>],
    ) -> Result<FragmentStream, HiveError> {
        let messages = self.messages(task, reports);
        tracing::debug!(
            model = self.llm.model_name(),
            reports = reports.len(),
            prompt_chars = messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "synthesis request"
        );

        let text = tokio::time::timeout(
            self.request_timeout,
            self.llm.complete_stream(&messages, self.max_tokens),
        )
        .await
        .map_err(|_| {
            HiveError::SynthesisFailed(format!(
                "no response after {}s",
                self.request_timeout.as_secs()
            ))
        })?
        .map_err(|e| HiveError::SynthesisFailed(e.to_string()))?;

        let idle = self.stream_timeout;
        Ok(Box::pin(stream::unfold(
            (text, false),
            move |(mut text, done)| async move {
                if done {
                    return None;
                }
                match tokio::time::timeout(idle, text.next()).await {
                    Err(_) => Some((
                        Err(HiveError::SynthesisFailed(format!(
                            "stream stalled for {}s",
                            idle.as_secs()
                        ))),
                        (text, true),
                    )),
                    Ok(None) => None,
                    Ok(Some(Ok(fragment))) => Some((Ok(fragment), (text, false))),
                    Ok(Some(Err(e))) => {
                        Some((Err(HiveError::SynthesisFailed(e.to_string())), (text, true)))
                    }
                }
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{last_user_content, Script, ScriptedLlmClient};

    #[test]
    fn test_truncate_chars_keeps_scalars_whole() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("🔍🔍🔍", 2), "🔍🔍");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_context_is_bounded_per_agent() {
        let synth = Synthesizer::new(Arc::new(ScriptedLlmClient::default())).with_per_agent_chars(5);
        let long = "x".repeat(50);
        let ctx = synth.context(&[
            Report { agent_name: "Due Diligence Agent", text: &long },
            Report { agent_name: "Web Research Agent", text: "short" },
        ]);
        assert_eq!(
            ctx,
            "=== Due Diligence Agent ===\nxxxxx\n\n=== Web Research Agent ===\nshort"
        );
    }

    #[tokio::test]
    async fn test_stream_forwards_fragments() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Script::Chunks(vec![
            "**Executive summary.** ".into(),
            "Perplexity is growing.".into(),
        ])]));
        let synth = Synthesizer::new(llm.clone());
        let stream = synth
            .stream("Perplexity AI", &[Report { agent_name: "A", text: "r" }])
            .await
            .unwrap();
        let parts: Vec<_> = stream.collect().await;
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.is_ok()));

        let calls = llm.calls();
        let user = last_user_content(&calls[0]).unwrap();
        assert!(user.starts_with("Task: Perplexity AI\n\nAgent reports:\n=== A ===\nr"));
        assert!(user.ends_with("Write a synthesized executive brief."));
    }

    #[tokio::test]
    async fn test_empty_context_still_calls_service() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Script::Reply("No usable findings.".into())]));
        let synth = Synthesizer::new(llm.clone());
        let parts: Vec<_> = synth.stream("t", &[]).await.unwrap().collect().await;
        assert_eq!(parts, vec![Ok("No usable findings.".to_string())]);
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_and_mid_stream_failure() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Script::Fail("unreachable".into()),
            Script::Abort(vec!["partial".into()], "reset".into()),
        ]));
        let synth = Synthesizer::new(llm);
        assert!(matches!(
            synth.stream("t", &[]).await.err(),
            Some(HiveError::SynthesisFailed(_))
        ));

        let parts: Vec<_> = synth.stream("t", &[]).await.unwrap().collect().await;
        assert_eq!(parts[0], Ok("partial".to_string()));
        assert!(matches!(parts[1], Err(HiveError::SynthesisFailed(_))));
        assert_eq!(parts.len(), 2);
    }
}
