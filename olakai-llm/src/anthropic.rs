//! Anthropic messages API.

use std::fmt::Display;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use olakai_core::PartialMetadata;
use olakai_monitor::{ChunkDecoder, DecodedChunk, MonitorBinding, MonitorError};

use crate::instrument::Instrumented;
use crate::normalizer::{
    content_text, lenient, messages_prompt, null_as_empty, pick_parameters, string_field,
};
use crate::{ChunkStream, Instrument, MetadataNormalizer, ProviderStream, WrapperConfig};

const PARAMETERS: &[(&str, &str)] = &[
    ("max_tokens", "maxTokens"),
    ("temperature", "temperature"),
    ("top_p", "topP"),
    ("top_k", "topK"),
    ("stop_sequences", "stop"),
    ("tool_choice", "toolChoice"),
];

/// The messages surface that gets intercepted. `stream` yields server-sent
/// events already decoded to JSON (`message_start`, `content_block_delta`,
/// `message_delta`, `message_stop`, ...).
#[async_trait]
pub trait AnthropicMessages: Send + Sync {
    type Error: Display + Send + 'static;

    async fn create(&self, request: Value) -> Result<Value, Self::Error>;

    async fn stream(&self, request: Value) -> Result<ChunkStream<Self::Error>, Self::Error>;
}

/// Marker used with `wrap_client`.
#[derive(Clone, Debug)]
pub struct Anthropic<C>(pub C);

#[derive(Clone, Copy, Debug, Default)]
pub struct AnthropicNormalizer;

#[derive(Default, Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Default, Deserialize)]
struct Message {
    model: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    content: Vec<Value>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

impl Message {
    fn metadata(self) -> PartialMetadata {
        let (prompt_tokens, completion_tokens) = self
            .usage
            .map(|usage| (usage.input_tokens, usage.output_tokens))
            .unwrap_or_default();
        PartialMetadata {
            model: self.model,
            prompt_tokens,
            completion_tokens,
            finish_reason: self.stop_reason,
            function_calls: self.content.into_iter().filter(is_tool_use).collect(),
            ..Default::default()
        }
    }
}

fn is_tool_use(block: &Value) -> bool {
    block.get("type").and_then(Value::as_str) == Some("tool_use")
}

impl MetadataNormalizer for AnthropicNormalizer {
    fn provider(&self) -> &'static str {
        "anthropic"
    }

    fn extract_request_metadata(&self, request: &Value) -> PartialMetadata {
        PartialMetadata {
            model: string_field(request, "model"),
            parameters: pick_parameters(request, PARAMETERS),
            ..Default::default()
        }
    }

    fn extract_response_metadata(&self, response: &Value) -> PartialMetadata {
        lenient::<Message>(response).metadata()
    }

    fn extract_prompt(&self, request: &Value) -> Value {
        messages_prompt(request.get("messages"))
            .map(Value::String)
            .unwrap_or(Value::Null)
    }

    fn extract_response_text(&self, response: &Value) -> String {
        let message: Message = lenient(response);
        message
            .content
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .map(content_text_block)
            .collect()
    }
}

fn content_text_block(block: &Value) -> String {
    block
        .get("text")
        .map(content_text)
        .unwrap_or_default()
}

impl ChunkDecoder<Value> for AnthropicNormalizer {
    fn decode(&self, event: &Value) -> DecodedChunk {
        let kind = event.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "message_start" => {
                let message = event.get("message").map(lenient::<Message>).unwrap_or_default();
                DecodedChunk {
                    metadata: message.metadata(),
                    ..Default::default()
                }
            }
            "content_block_start" => {
                let block = event.get("content_block").cloned().unwrap_or_default();
                if is_tool_use(&block) {
                    DecodedChunk {
                        metadata: PartialMetadata {
                            function_calls: vec![block],
                            ..Default::default()
                        },
                        ..Default::default()
                    }
                } else {
                    DecodedChunk {
                        text: block.get("text").and_then(Value::as_str).map(str::to_string),
                        ..Default::default()
                    }
                }
            }
            "content_block_delta" => DecodedChunk {
                text: event
                    .get("delta")
                    .filter(|delta| delta.get("type").and_then(Value::as_str) == Some("text_delta"))
                    .and_then(|delta| string_field(delta, "text")),
                ..Default::default()
            },
            "message_delta" => {
                let output_tokens = event
                    .get("usage")
                    .map(lenient::<Usage>)
                    .and_then(|usage| usage.output_tokens);
                let stop_reason = event
                    .get("delta")
                    .and_then(|delta| string_field(delta, "stop_reason"));
                DecodedChunk {
                    metadata: PartialMetadata {
                        completion_tokens: output_tokens,
                        finish_reason: stop_reason,
                        ..Default::default()
                    },
                    ..Default::default()
                }
            }
            "message_stop" => DecodedChunk::terminal(),
            "error" => {
                let message = event
                    .get("error")
                    .and_then(|error| string_field(error, "message"))
                    .unwrap_or_else(|| "stream error".to_string());
                DecodedChunk::failed(message)
            }
            _ => DecodedChunk::default(),
        }
    }
}

fn assemble_message(text: &str, metadata: &PartialMetadata) -> Value {
    let mut content = vec![json!({"type": "text", "text": text})];
    content.extend(metadata.function_calls.iter().cloned());
    json!({
        "type": "message",
        "role": "assistant",
        "model": metadata.model,
        "content": content,
        "stop_reason": metadata.finish_reason,
        "usage": {
            "input_tokens": metadata.prompt_tokens.unwrap_or(0),
            "output_tokens": metadata.completion_tokens.unwrap_or(0),
        },
    })
}

#[derive(Clone, Debug)]
pub struct MonitoredAnthropic<C> {
    inner: C,
    instrumented: Instrumented<AnthropicNormalizer>,
}

impl<C: AnthropicMessages> MonitoredAnthropic<C> {
    pub fn new(inner: C, config: WrapperConfig, binding: MonitorBinding) -> Self {
        Self {
            inner,
            instrumented: Instrumented::new(AnthropicNormalizer, config, binding),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Streams a message; `final_response()` on the result gives the
    /// assembled message.
    pub async fn open_stream(
        &self,
        request: Value,
    ) -> Result<ProviderStream<C::Error>, MonitorError<C::Error>> {
        self.instrumented
            .stream(request, |request| self.inner.stream(request), assemble_message)
            .await
    }
}

#[async_trait]
impl<C: AnthropicMessages> AnthropicMessages for MonitoredAnthropic<C> {
    type Error = MonitorError<C::Error>;

    async fn create(&self, request: Value) -> Result<Value, Self::Error> {
        self.instrumented
            .invoke(request, |request| self.inner.create(request))
            .await
    }

    async fn stream(&self, request: Value) -> Result<ChunkStream<Self::Error>, Self::Error> {
        let stream = self.open_stream(request).await?;
        Ok(stream.map(|item| item.map_err(MonitorError::Callable)).boxed())
    }
}

impl<C: AnthropicMessages> Instrument for Anthropic<C> {
    type Monitored = MonitoredAnthropic<C>;

    fn instrument(self, config: WrapperConfig, binding: MonitorBinding) -> Self::Monitored {
        MonitoredAnthropic::new(self.0, config, binding)
    }
}
