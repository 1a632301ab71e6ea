//! Incremental SSE block parser shared by the POST-SSE and GET-SSE paths.
//!
//! Events arrive as `id:`/`event:`/`data:` text blocks separated by blank
//! lines; chunk boundaries fall anywhere, so the parser buffers until a
//! complete block is available. Comment lines (keep-alives) are discarded.

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Stateful parser fed with raw byte chunks.
#[derive(Debug, Default)]
pub struct SseEventParser {
    buffer: String,
}

impl SseEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(block.trim_end()) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut saw_field = false;

    for line in block.lines() {
        if line.starts_with(':') {
            // Comment line (keep-alive)
            continue;
        }
        if let Some(value) = line.strip_prefix("id: ") {
            event.id = Some(value.to_string());
            saw_field = true;
        } else if let Some(value) = line.strip_prefix("event: ") {
            event.event = Some(value.to_string());
            saw_field = true;
        } else if let Some(value) = line.strip_prefix("data: ") {
            if !event.data.is_empty() {
                event.data.push('\n');
            }
            event.data.push_str(value);
            saw_field = true;
        }
    }

    if saw_field && event.has_data() {
        Some(event)
    } else {
        None
    }
}
