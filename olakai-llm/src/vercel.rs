//! Vercel AI SDK style `generateText` / `streamText`.
//!
//! Streaming is push-based: the model calls the supplied listener with every
//! part (`text-delta`, `tool-call`, `finish`, `error`, `abort`) and also
//! returns the same parts as a pull stream. Text is taken from the events
//! only; the pull side contributes termination.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use olakai_core::PartialMetadata;
use olakai_monitor::{ChunkDecoder, DecodedChunk, MonitorBinding, MonitorError};

use crate::instrument::{fail, Instrumented};
use crate::normalizer::{
    content_text, lenient, messages_prompt, null_as_empty, pick_parameters, string_field,
};
use crate::{ChunkStream, Instrument, MetadataNormalizer, ProviderStream, WrapperConfig};

const PARAMETERS: &[(&str, &str)] = &[
    ("temperature", "temperature"),
    ("maxTokens", "maxTokens"),
    ("maxOutputTokens", "maxTokens"),
    ("topP", "topP"),
    ("topK", "topK"),
    ("frequencyPenalty", "frequencyPenalty"),
    ("presencePenalty", "presencePenalty"),
    ("stopSequences", "stop"),
    ("seed", "seed"),
    ("maxRetries", "maxRetries"),
];

pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

#[async_trait]
pub trait VercelAiModel: Send + Sync {
    type Error: Display + Send + 'static;

    async fn generate_text(&self, request: Value) -> Result<Value, Self::Error>;

    async fn stream_text(
        &self,
        request: Value,
        on_event: EventListener,
    ) -> Result<ChunkStream<Self::Error>, Self::Error>;
}

/// Marker used with `wrap_client`.
#[derive(Clone, Debug)]
pub struct VercelAi<M>(pub M);

#[derive(Clone, Copy, Debug, Default)]
pub struct VercelNormalizer;

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Usage {
    #[serde(alias = "inputTokens")]
    prompt_tokens: Option<u32>,
    #[serde(alias = "outputTokens")]
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInfo {
    model_id: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextResult {
    text: Option<String>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    total_usage: Option<Usage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    tool_calls: Vec<Value>,
    response: Option<ResponseInfo>,
}

impl TextResult {
    fn metadata(self) -> PartialMetadata {
        let mut metadata = PartialMetadata {
            model: self.response.and_then(|response| response.model_id),
            finish_reason: self.finish_reason,
            function_calls: self.tool_calls,
            ..Default::default()
        };
        if let Some(usage) = self.total_usage.or(self.usage) {
            metadata.prompt_tokens = usage.prompt_tokens;
            metadata.completion_tokens = usage.completion_tokens;
            metadata.total_tokens = usage.total_tokens;
        }
        metadata
    }
}

impl VercelNormalizer {
    /// `model` is either an id string or a model object with `modelId` and
    /// `provider`.
    fn model(request: &Value) -> (Option<String>, Option<String>) {
        match request.get("model") {
            Some(Value::String(id)) => (None, Some(id.clone())),
            Some(model) => (
                string_field(model, "provider"),
                string_field(model, "modelId"),
            ),
            None => (None, None),
        }
    }
}

impl MetadataNormalizer for VercelNormalizer {
    fn provider(&self) -> &'static str {
        "vercel-ai"
    }

    fn extract_request_metadata(&self, request: &Value) -> PartialMetadata {
        let (provider, model) = Self::model(request);
        PartialMetadata {
            provider,
            model,
            parameters: pick_parameters(request, PARAMETERS),
            ..Default::default()
        }
    }

    fn extract_response_metadata(&self, response: &Value) -> PartialMetadata {
        lenient::<TextResult>(response).metadata()
    }

    fn extract_prompt(&self, request: &Value) -> Value {
        request
            .get("prompt")
            .map(content_text)
            .filter(|prompt| !prompt.is_empty())
            .or_else(|| messages_prompt(request.get("messages")))
            .map(Value::String)
            .unwrap_or(Value::Null)
    }

    fn extract_response_text(&self, response: &Value) -> String {
        lenient::<TextResult>(response).text.unwrap_or_default()
    }
}

impl ChunkDecoder<Value> for VercelNormalizer {
    fn decode(&self, part: &Value) -> DecodedChunk {
        let kind = part.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "text-delta" | "text" => DecodedChunk {
                text: ["textDelta", "text", "delta"]
                    .iter()
                    .find_map(|key| string_field(part, key)),
                ..Default::default()
            },
            "tool-call" => DecodedChunk {
                metadata: PartialMetadata {
                    function_calls: vec![part.clone()],
                    ..Default::default()
                },
                ..Default::default()
            },
            "finish" => {
                DecodedChunk::terminal().with_metadata(lenient::<TextResult>(part).metadata())
            }
            "abort" => DecodedChunk::terminal().with_metadata(PartialMetadata {
                finish_reason: Some("abort".to_string()),
                ..Default::default()
            }),
            "error" => {
                let message = match part.get("error") {
                    Some(Value::String(message)) => message.clone(),
                    Some(error) => {
                        string_field(error, "message").unwrap_or_else(|| error.to_string())
                    }
                    None => "stream error".to_string(),
                };
                DecodedChunk::failed(message)
            }
            _ => DecodedChunk::default(),
        }
    }
}

/// Pull-side reader: parts are already counted from the events.
fn termination_only(_: &Value) -> DecodedChunk {
    DecodedChunk::default()
}

fn assemble_text(text: &str, metadata: &PartialMetadata) -> Value {
    let tokens = metadata.tokens();
    json!({
        "text": text,
        "finishReason": metadata.finish_reason,
        "toolCalls": metadata.function_calls,
        "usage": {
            "promptTokens": tokens.prompt,
            "completionTokens": tokens.completion,
            "totalTokens": tokens.total,
        },
    })
}

#[derive(Clone, Debug)]
pub struct MonitoredVercelAi<M> {
    inner: M,
    instrumented: Instrumented<VercelNormalizer>,
}

impl<M: VercelAiModel> MonitoredVercelAi<M> {
    pub fn new(inner: M, config: WrapperConfig, binding: MonitorBinding) -> Self {
        Self {
            inner,
            instrumented: Instrumented::new(VercelNormalizer, config, binding),
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Events still reach `on_event` in order, after the monitor has seen
    /// them.
    pub async fn open_stream(
        &self,
        request: Value,
        on_event: EventListener,
    ) -> Result<ProviderStream<M::Error>, MonitorError<M::Error>> {
        let tap = self.instrumented.open_tap(&request).await?;
        let observe = tap.listener();
        let forward: EventListener = Arc::new(move |event: &Value| {
            observe(event);
            on_event(event);
        });
        match self.inner.stream_text(request, forward).await {
            Ok(parts) => {
                let pulled = tap.with_decoder(termination_only).pull(parts);
                Ok(ProviderStream::new(pulled, assemble_text))
            }
            Err(err) => {
                fail(&tap, &err);
                Err(MonitorError::Callable(err))
            }
        }
    }
}

#[async_trait]
impl<M: VercelAiModel> VercelAiModel for MonitoredVercelAi<M> {
    type Error = MonitorError<M::Error>;

    async fn generate_text(&self, request: Value) -> Result<Value, Self::Error> {
        self.instrumented
            .invoke(request, |request| self.inner.generate_text(request))
            .await
    }

    async fn stream_text(
        &self,
        request: Value,
        on_event: EventListener,
    ) -> Result<ChunkStream<Self::Error>, Self::Error> {
        let stream = self.open_stream(request, on_event).await?;
        Ok(stream.map(|item| item.map_err(MonitorError::Callable)).boxed())
    }
}

impl<M: VercelAiModel> Instrument for VercelAi<M> {
    type Monitored = MonitoredVercelAi<M>;

    fn instrument(self, config: WrapperConfig, binding: MonitorBinding) -> Self::Monitored {
        MonitoredVercelAi::new(self.0, config, binding)
    }
}
