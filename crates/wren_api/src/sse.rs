/// Incremental parser for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across transport chunks are reassembled before decoding.
/// Each completed frame yields its joined `data:` payload; decoding the payload
/// is left to the stream's protocol.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete frame payloads.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.is_empty() {
                if let Some(payload) = self.take_payload() {
                    payloads.push(payload);
                }
                continue;
            }

            self.push_line(&String::from_utf8_lossy(&line));
        }

        payloads
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<String> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    /// True when no partial line or frame is pending.
    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace) && self.data_lines.is_empty()
    }

    /// Drop any unterminated frame, as happens when a stream ends mid-frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.data_lines.clear();
    }

    fn push_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        // `event:`, `id:` and `retry:` carry nothing this client uses.
        if field == "data" {
            self.data_lines.push(value.to_string());
        }
    }

    fn take_payload(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();

        if payload.trim().is_empty() {
            None
        } else {
            Some(payload)
        }
    }
}
