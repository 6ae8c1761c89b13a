//! OpenAI chat completions.
//!
//! Non-streaming responses carry `usage` and `choices[].message`; streamed
//! chunks carry `choices[].delta` and, when requested, a trailing `usage`.

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
    ("temperature", "temperature"),
    ("max_tokens", "maxTokens"),
    ("max_completion_tokens", "maxTokens"),
    ("top_p", "topP"),
    ("frequency_penalty", "frequencyPenalty"),
    ("presence_penalty", "presencePenalty"),
    ("stop", "stop"),
    ("n", "n"),
    ("seed", "seed"),
    ("tool_choice", "toolChoice"),
];

/// The chat-completions surface that gets intercepted.
#[async_trait]
pub trait OpenAiChat: Send + Sync {
    type Error: Display + Send + 'static;

    async fn create(&self, request: Value) -> Result<Value, Self::Error>;

    async fn create_stream(&self, request: Value)
        -> Result<ChunkStream<Self::Error>, Self::Error>;
}

/// Marker used with `wrap_client`.
#[derive(Clone, Debug)]
pub struct OpenAi<C>(pub C);

#[derive(Clone, Copy, Debug, Default)]
pub struct OpenAiNormalizer;

#[derive(Default, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[derive(Default, Deserialize)]
struct Message {
    content: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    tool_calls: Vec<Value>,
    function_call: Option<Value>,
}

#[derive(Default, Deserialize)]
struct Choice {
    message: Option<Message>,
    delta: Option<Message>,
    text: Option<String>,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct Completion {
    model: Option<String>,
    usage: Option<Usage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    choices: Vec<Choice>,
}

impl Completion {
    fn metadata(self) -> PartialMetadata {
        let mut metadata = PartialMetadata {
            model: self.model,
            ..Default::default()
        };
        if let Some(usage) = self.usage {
            metadata.prompt_tokens = usage.prompt_tokens;
            metadata.completion_tokens = usage.completion_tokens;
            metadata.total_tokens = usage.total_tokens;
        }
        if let Some(choice) = self.choices.into_iter().next() {
            metadata.finish_reason = choice.finish_reason;
            if let Some(message) = choice.message.or(choice.delta) {
                metadata.function_calls = message.tool_calls;
                metadata.function_calls.extend(message.function_call);
            }
        }
        metadata
    }
}

impl MetadataNormalizer for OpenAiNormalizer {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn extract_request_metadata(&self, request: &Value) -> PartialMetadata {
        PartialMetadata {
            model: string_field(request, "model"),
            parameters: pick_parameters(request, PARAMETERS),
            ..Default::default()
        }
    }

    fn extract_response_metadata(&self, response: &Value) -> PartialMetadata {
        lenient::<Completion>(response).metadata()
    }

    fn extract_prompt(&self, request: &Value) -> Value {
        messages_prompt(request.get("messages"))
            .or_else(|| request.get("prompt").map(content_text))
            .map(Value::String)
            .unwrap_or(Value::Null)
    }

    fn extract_response_text(&self, response: &Value) -> String {
        let completion: Completion = lenient(response);
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| {
                choice
                    .message
                    .and_then(|message| message.content)
                    .map(|content| content_text(&content))
                    .or(choice.text)
            })
            .unwrap_or_default()
    }
}

impl ChunkDecoder<Value> for OpenAiNormalizer {
    fn decode(&self, chunk: &Value) -> DecodedChunk {
        if let Some(error) = chunk.get("error") {
            let message = string_field(error, "message").unwrap_or_else(|| error.to_string());
            return DecodedChunk::failed(message);
        }
        let completion: Completion = lenient(chunk);
        let text = completion
            .choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_ref())
            .map(content_text);
        DecodedChunk {
            text,
            metadata: completion.metadata(),
            ..Default::default()
        }
    }
}

fn assemble_completion(text: &str, metadata: &PartialMetadata) -> Value {
    let tokens = metadata.tokens();
    json!({
        "object": "chat.completion",
        "model": metadata.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": metadata.finish_reason,
        }],
        "usage": {
            "prompt_tokens": tokens.prompt,
            "completion_tokens": tokens.completion,
            "total_tokens": tokens.total,
        },
    })
}

/// An OpenAI client with every completion monitored.
#[derive(Clone, Debug)]
pub struct MonitoredOpenAi<C> {
    inner: C,
    instrumented: Instrumented<OpenAiNormalizer>,
}

impl<C: OpenAiChat> MonitoredOpenAi<C> {
    pub fn new(inner: C, config: WrapperConfig, binding: MonitorBinding) -> Self {
        Self {
            inner,
            instrumented: Instrumented::new(OpenAiNormalizer, config, binding),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Streams a completion; the result also offers `final_response()`.
    pub async fn open_stream(
        &self,
        request: Value,
    ) -> Result<ProviderStream<C::Error>, MonitorError<C::Error>> {
        self.instrumented
            .stream(
                request,
                |request| self.inner.create_stream(request),
                assemble_completion,
            )
            .await
    }
}

#[async_trait]
impl<C: OpenAiChat> OpenAiChat for MonitoredOpenAi<C> {
    type Error = MonitorError<C::Error>;

    async fn create(&self, request: Value) -> Result<Value, Self::Error> {
        self.instrumented
            .invoke(request, |request| self.inner.create(request))
            .await
    }

    async fn create_stream(
        &self,
        request: Value,
    ) -> Result<ChunkStream<Self::Error>, Self::Error> {
        let stream = self.open_stream(request).await?;
        Ok(stream.map(|item| item.map_err(MonitorError::Callable)).boxed())
    }
}

impl<C: OpenAiChat> Instrument for OpenAi<C> {
    type Monitored = MonitoredOpenAi<C>;

    fn instrument(self, config: WrapperConfig, binding: MonitorBinding) -> Self::Monitored {
        MonitoredOpenAi::new(self.0, config, binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_total_is_derived_when_missing() {
        let response = json!({
            "model": "gpt-4o",
            "usage": {"prompt_tokens": 10, "completion_tokens": 5},
            "choices": [{"message": {"content": "hi"}, "finish_reason": "stop"}]
        });
        let metadata = OpenAiNormalizer.extract_response_metadata(&response);
        assert_eq!(metadata.tokens().total, 15);
        assert_eq!(metadata.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn unknown_shapes_yield_empty_metadata() {
        assert!(OpenAiNormalizer
            .extract_response_metadata(&json!("plain text"))
            .is_empty());
        assert!(OpenAiNormalizer
            .extract_response_metadata(&json!({"choices": 3}))
            .is_empty());
        assert_eq!(OpenAiNormalizer.extract_response_text(&json!(null)), "");
    }

    #[test]
    fn delta_chunks_decode_to_text() {
        let chunk = json!({"model": "gpt-4o", "choices": [{"delta": {"content": "He"}}]});
        let decoded = OpenAiNormalizer.decode(&chunk);
        assert_eq!(decoded.text.as_deref(), Some("He"));
        assert!(!decoded.terminal);
    }

    #[test]
    fn null_tool_calls_keep_the_rest_of_the_response() {
        let response = json!({
            "model": "gpt-4o",
            "usage": {"prompt_tokens": 10, "completion_tokens": 5},
            "choices": [{
                "message": {"content": "hi", "tool_calls": null},
                "finish_reason": "stop"
            }]
        });
        assert_eq!(OpenAiNormalizer.extract_response_text(&response), "hi");
        let metadata = OpenAiNormalizer.extract_response_metadata(&response);
        assert_eq!(metadata.model.as_deref(), Some("gpt-4o"));
        assert_eq!(metadata.tokens().total, 15);
        assert!(metadata.function_calls.is_empty());

        let chunk = json!({"choices": [{"delta": {"content": "He", "tool_calls": null}}]});
        assert_eq!(OpenAiNormalizer.decode(&chunk).text.as_deref(), Some("He"));

        let usage_chunk = json!({"choices": null, "usage": {"prompt_tokens": 7, "completion_tokens": 3}});
        assert_eq!(OpenAiNormalizer.decode(&usage_chunk).metadata.tokens().total, 10);
    }
}
