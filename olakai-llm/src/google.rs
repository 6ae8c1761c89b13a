//! Google Gemini `generateContent`.
//!
//! A streaming call hands back two handles at once: the chunk stream and a
//! future resolving to the aggregated response. Either, or both, may be
//! consumed; the call is reported once.

use std::fmt::Display;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use olakai_core::PartialMetadata;
use olakai_monitor::{ChunkDecoder, DecodedChunk, MonitorBinding, MonitorError, MonitoredStream};

use crate::instrument::{fail, Instrumented};
use crate::normalizer::{content_text, lenient, null_as_empty, pick_parameters, string_field};
use crate::{ChunkStream, Instrument, MetadataNormalizer, WrapperConfig};

const GENERATION_PARAMETERS: &[(&str, &str)] = &[
    ("temperature", "temperature"),
    ("maxOutputTokens", "maxTokens"),
    ("topP", "topP"),
    ("topK", "topK"),
    ("candidateCount", "candidateCount"),
    ("stopSequences", "stop"),
];

/// Both halves of a streaming generation.
pub struct GoogleStreamResult<E> {
    pub stream: ChunkStream<E>,
    pub response: BoxFuture<'static, Result<Value, E>>,
}

#[async_trait]
pub trait GoogleGenerativeModel: Send + Sync {
    type Error: Display + Send + 'static;

    /// The model this handle was created for, e.g. `gemini-1.5-flash`.
    fn model_name(&self) -> &str;

    async fn generate_content(&self, request: Value) -> Result<Value, Self::Error>;

    async fn generate_content_stream(
        &self,
        request: Value,
    ) -> Result<GoogleStreamResult<Self::Error>, Self::Error>;
}

/// Marker used with `wrap_client`.
#[derive(Clone, Debug)]
pub struct Google<M>(pub M);

#[derive(Clone, Copy, Debug, Default)]
pub struct GoogleNormalizer;

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[derive(Default, Deserialize)]
struct Content {
    #[serde(default, deserialize_with = "null_as_empty")]
    parts: Vec<Value>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Generation {
    #[serde(default, deserialize_with = "null_as_empty")]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

impl Generation {
    /// SDKs wrap the payload as `{ response: {...} }`; accept both.
    fn read(value: &Value) -> Self {
        let inner = value
            .get("response")
            .filter(|response| response.is_object())
            .unwrap_or(value);
        lenient(inner)
    }

    fn parts(&self) -> &[Value] {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or_default()
    }

    fn text(&self) -> String {
        self.parts()
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect()
    }

    fn metadata(&self) -> PartialMetadata {
        let mut metadata = PartialMetadata {
            model: self.model_version.clone(),
            finish_reason: self
                .candidates
                .first()
                .and_then(|candidate| candidate.finish_reason.clone()),
            function_calls: self
                .parts()
                .iter()
                .filter_map(|part| part.get("functionCall").cloned())
                .collect(),
            ..Default::default()
        };
        if let Some(usage) = &self.usage_metadata {
            metadata.prompt_tokens = usage.prompt_token_count;
            metadata.completion_tokens = usage.candidates_token_count;
            metadata.total_tokens = usage.total_token_count;
        }
        metadata
    }
}

impl MetadataNormalizer for GoogleNormalizer {
    fn provider(&self) -> &'static str {
        "google"
    }

    fn extract_request_metadata(&self, request: &Value) -> PartialMetadata {
        let parameters = request
            .get("generationConfig")
            .map(|config| pick_parameters(config, GENERATION_PARAMETERS))
            .unwrap_or_default();
        PartialMetadata {
            model: string_field(request, "model"),
            parameters,
            ..Default::default()
        }
    }

    fn extract_response_metadata(&self, response: &Value) -> PartialMetadata {
        Generation::read(response).metadata()
    }

    /// Accepts a bare prompt string, a list of parts, or `{contents: [...]}`.
    fn extract_prompt(&self, request: &Value) -> Value {
        let text = match request.get("contents") {
            Some(Value::Array(contents)) => contents
                .iter()
                .filter(|content| {
                    matches!(
                        content.get("role").and_then(Value::as_str),
                        None | Some("user")
                    )
                })
                .filter_map(|content| content.get("parts").map(content_text))
                .collect::<Vec<_>>()
                .join("\n"),
            Some(other) => content_text(other),
            None => content_text(request),
        };
        Value::String(text)
    }

    fn extract_response_text(&self, response: &Value) -> String {
        Generation::read(response).text()
    }
}

impl ChunkDecoder<Value> for GoogleNormalizer {
    fn decode(&self, chunk: &Value) -> DecodedChunk {
        let generation = Generation::read(chunk);
        let text = generation.text();
        DecodedChunk {
            text: (!text.is_empty()).then_some(text),
            metadata: generation.metadata(),
            ..Default::default()
        }
    }
}

/// Both halves of a monitored streaming generation, sharing one report.
pub struct MonitoredGoogleStream<E> {
    pub stream: MonitoredStream<Value, E>,
    pub response: BoxFuture<'static, Result<Value, E>>,
}

#[derive(Clone, Debug)]
pub struct MonitoredGoogle<M> {
    inner: M,
    instrumented: Instrumented<GoogleNormalizer>,
}

impl<M: GoogleGenerativeModel> MonitoredGoogle<M> {
    pub fn new(inner: M, config: WrapperConfig, binding: MonitorBinding) -> Self {
        let seed = PartialMetadata {
            model: Some(inner.model_name().to_string()),
            ..Default::default()
        };
        Self {
            instrumented: Instrumented::new(GoogleNormalizer, config, binding).with_seed(seed),
            inner,
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub async fn open_stream(
        &self,
        request: Value,
    ) -> Result<MonitoredGoogleStream<M::Error>, MonitorError<M::Error>> {
        let tap = self.instrumented.open_tap(&request).await?;
        match self.inner.generate_content_stream(request).await {
            Ok(GoogleStreamResult { stream, response }) => Ok(MonitoredGoogleStream {
                stream: tap.pull(stream),
                response: tap.final_future(response),
            }),
            Err(err) => {
                fail(&tap, &err);
                Err(MonitorError::Callable(err))
            }
        }
    }
}

#[async_trait]
impl<M: GoogleGenerativeModel> GoogleGenerativeModel for MonitoredGoogle<M> {
    type Error = MonitorError<M::Error>;

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn generate_content(&self, request: Value) -> Result<Value, Self::Error> {
        self.instrumented
            .invoke(request, |request| self.inner.generate_content(request))
            .await
    }

    async fn generate_content_stream(
        &self,
        request: Value,
    ) -> Result<GoogleStreamResult<Self::Error>, Self::Error> {
        let MonitoredGoogleStream { stream, response } = self.open_stream(request).await?;
        Ok(GoogleStreamResult {
            stream: stream
                .map(|item| item.map_err(MonitorError::Callable))
                .boxed(),
            response: response.map(|result| result.map_err(MonitorError::Callable)).boxed(),
        })
    }
}

impl<M: GoogleGenerativeModel> Instrument for Google<M> {
    type Monitored = MonitoredGoogle<M>;

    fn instrument(self, config: WrapperConfig, binding: MonitorBinding) -> Self::Monitored {
        MonitoredGoogle::new(self.0, config, binding)
    }
}
