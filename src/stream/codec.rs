//! NDJSON 编解码
//!
//! encode：事件 + '\n'。decode：按 '\n' 切分完整行逐行独立解析，最后一段（可能不完整）留作下一块的前缀。
//! 解析失败的行静默丢弃（只计数与 debug 日志），一行坏控制消息不能毁掉整份报告的重建。

use crate::stream::OrchestratorEvent;

/// 序列化为一行（含结尾换行）
pub fn encode_event(event: &OrchestratorEvent) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

fn parse_line(line: &[u8]) -> Option<OrchestratorEvent> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_slice(line) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, len = line.len(), "dropping malformed event line");
            None
        }
    }
}

/// 逐个交出 buffer 中以 '\n' 结尾的完整行，返回已消费的字节数
fn for_each_line(buffer: &[u8], mut f: impl FnMut(&[u8])) -> usize {
    let mut start = 0;
    while let Some(offset) = buffer[start..].iter().position(|&b| b == b'\n') {
        let end = start + offset;
        f(&buffer[start..end]);
        start = end + 1;
    }
    start
}

/// 一次性解码：返回所有完整行中的事件，以及未消费的剩余字节
pub fn decode(buffer: &[u8]) -> (Vec<OrchestratorEvent>, &[u8]) {
    let mut events = Vec::new();
    let consumed = for_each_line(buffer, |line| events.extend(parse_line(line)));
    (events, &buffer[consumed..])
}

/// 增量解码器：接收任意切分的字节块，跨块保留不完整的尾行
#[derive(Debug, Default)]
pub struct EventDecoder {
    carry: Vec<u8>,
    dropped: usize,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一块字节，返回由此凑齐的事件（按顺序）
    pub fn push(&mut self, chunk: &[u8]) -> Vec<OrchestratorEvent> {
        self.carry.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut dropped = 0;
        let consumed = for_each_line(&self.carry, |line| match parse_line(line) {
            Some(ev) => events.push(ev),
            None if !line.trim_ascii().is_empty() => dropped += 1,
            None => {}
        });
        self.carry.drain(..consumed);
        self.dropped += dropped;
        events
    }

    /// 流结束：尝试解析没有换行结尾的最后一行
    pub fn finish(&mut self) -> Option<OrchestratorEvent> {
        let rest = std::mem::take(&mut self.carry);
        let event = parse_line(&rest);
        if event.is_none() && !rest.trim_ascii().is_empty() {
            self.dropped += 1;
        }
        event
    }

    /// 尚未凑成完整行的字节
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    /// 被丢弃的坏行数
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
