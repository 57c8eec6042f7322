//! Decoding of streamed chat-completion chunks.
//!
//! Each SSE `data` payload of an OpenAI-compatible stream is a JSON object:
//! `{"choices":[{"delta":{"content":"hi"}}]}`. Only the first choice's text
//! delta is relayed; role announcements, finish markers and usage frames carry
//! no content and produce nothing.

use serde::Deserialize;
use serde_json::Value;

use crate::error::RelayError;

/// Streaming chunk from `/v1/chat/completions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// One choice inside a streaming chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// Text of the first choice's delta, if any.
    pub fn first_delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
    }
}

/// Decode one event payload into the text to relay.
///
/// Returns `Ok(None)` for well-formed chunks that carry no text. Anything that
/// is not a JSON object of the expected shape is an error.
pub fn decode_delta(data: &str) -> Result<Option<String>, RelayError> {
    let value: Value = serde_json::from_str(data)?;

    // Derived struct impls also accept sequences positionally.
    require_object(&value)?;
    if let Some(choice) = value.get("choices").and_then(|choices| choices.get(0)) {
        require_object(choice)?;
        if let Some(delta) = choice.get("delta").filter(|delta| !delta.is_null()) {
            require_object(delta)?;
        }
    }

    let chunk = ChatCompletionChunk::deserialize(&value)?;
    Ok(chunk
        .first_delta_text()
        .filter(|text| !text.is_empty())
        .map(ToString::to_string))
}

fn require_object(value: &Value) -> Result<(), serde_json::Error> {
    if value.is_object() {
        Ok(())
    } else {
        Err(serde::de::Error::custom("expected a JSON object"))
    }
}
