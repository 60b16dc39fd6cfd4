//! 事件出口：状态机唯一的输出通道
//!
//! 接收端被丢弃（HTTP 响应体关闭、CLI 退出）或 token 被取消后，emit 返回 ConsumerGone，
//! guard 立刻放弃正在等待的外部调用。不向已关闭的传输继续写入。

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::HiveError;
use crate::stream::OrchestratorEvent;

#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<OrchestratorEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<OrchestratorEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// 新建一对 sink / receiver
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, CancellationToken::new()), rx)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// 发出事件；消费端已离开时返回 ConsumerGone
    pub fn emit(&self, event: OrchestratorEvent) -> Result<(), HiveError> {
        if self.cancel.is_cancelled() {
            return Err(HiveError::ConsumerGone);
        }
        self.tx.send(event).map_err(|_| HiveError::ConsumerGone)
    }

    /// 在消费端仍在时等待 fut；消费端离开或被取消则放弃 fut
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, HiveError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HiveError::ConsumerGone),
            _ = self.tx.closed() => Err(HiveError::ConsumerGone),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_emit_after_receiver_dropped() {
        let (sink, rx) = EventSink::channel();
        sink.emit(OrchestratorEvent::Thinking { message: "x".into() }).unwrap();
        drop(rx);
        assert!(sink.is_closed());
        assert_eq!(
            sink.emit(OrchestratorEvent::Thinking { message: "y".into() }),
            Err(HiveError::ConsumerGone)
        );
    }

    #[tokio::test]
    async fn test_guard_abandons_pending_call_on_close() {
        let (sink, rx) = EventSink::channel();
        let closer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(rx);
        });
        let out = sink.guard(std::future::pending::<()>()).await;
        assert_eq!(out, Err(HiveError::ConsumerGone));
        closer.await.unwrap();
    }

    #[tokio::test]
    async fn test_guard_cancelled_by_token() {
        let (sink, _rx) = EventSink::channel();
        sink.cancel_token().cancel();
        assert_eq!(sink.guard(async { 1 }).await, Err(HiveError::ConsumerGone));
    }

    #[tokio::test]
    async fn test_guard_passes_output_through() {
        let (sink, _rx) = EventSink::channel();
        assert_eq!(sink.guard(async { 42 }).await, Ok(42));
    }
}
