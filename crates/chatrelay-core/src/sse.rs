//! Incremental Server-Sent-Events parser.
//!
//! Bytes go in through [`SseParser::feed`] in whatever chunks the network
//! delivers; complete events come out by iterating the parser. Partial lines
//! stay buffered until their terminator arrives, so a chunk boundary may fall
//! anywhere, including inside a multi-byte character or between the CR and LF
//! of a CRLF pair.
//!
//! Field handling follows the WHATWG event-stream rules: `event`, `data`,
//! `id` and `retry` are recognised, lines starting with `:` are comments,
//! multiple `data` lines are joined with `\n`, and an event is dispatched on a
//! blank line only if it carried data.

use std::collections::VecDeque;

/// The literal `data` payload that ends an OpenAI-style completion stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event` field, if the event was named.
    pub event: Option<String>,
    /// Joined `data` lines.
    pub data: String,
    /// Last event id seen on the stream at dispatch time.
    pub id: Option<String>,
}

impl SseEvent {
    /// Whether this is the end-of-stream sentinel.
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_SENTINEL
    }
}

/// Push bytes in, pull events out.
#[derive(Debug, Default)]
pub struct SseParser {
    line: Vec<u8>,
    pending_cr: bool,
    seen_first_line: bool,
    data: String,
    event: Option<String>,
    last_id: Option<String>,
    retry: Option<u64>,
    ready: VecDeque<SseEvent>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of raw bytes, queueing any events it completes.
    pub fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(),
                b'\r' => {
                    self.end_line();
                    self.pending_cr = true;
                }
                _ => self.line.push(byte),
            }
        }
    }

    /// Signal end of input.
    ///
    /// An unterminated final line is processed, but an event that never saw
    /// its blank-line terminator is discarded.
    pub fn finish(&mut self) {
        if !self.line.is_empty() {
            self.end_line();
        }
        self.data.clear();
        self.event = None;
    }

    /// Reconnection delay announced by the server via `retry`, in milliseconds.
    pub const fn reconnect_interval(&self) -> Option<u64> {
        self.retry
    }

    /// Number of complete events waiting to be pulled.
    pub fn pending(&self) -> usize {
        self.ready.len()
    }

    fn end_line(&mut self) {
        let raw = std::mem::take(&mut self.line);
        let mut line = String::from_utf8_lossy(&raw).into_owned();

        if !self.seen_first_line {
            self.seen_first_line = true;
            if let Some(stripped) = line.strip_prefix('\u{feff}') {
                line = stripped.to_string();
            }
        }

        self.process_line(&line);
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            self.dispatch();
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry = value.parse().ok();
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) {
        let event = self.event.take();
        if self.data.is_empty() {
            return;
        }

        let mut data = std::mem::take(&mut self.data);
        data.pop();

        self.ready.push_back(SseEvent {
            event,
            data,
            id: self.last_id.clone(),
        });
    }
}

impl Iterator for SseParser {
    type Item = SseEvent;

    fn next(&mut self) -> Option<SseEvent> {
        self.ready.pop_front()
    }
}
