use std::fmt::Display;
use std::future::Future;

use serde_json::Value;

use olakai_core::{mask_api_key, ExecutionBlocked, PartialMetadata};
use olakai_monitor::{
    CallContext, ChunkDecoder, MonitorBinding, MonitorError, MonitorOptions,
    ResponseSummary, StreamCompletion, StreamTap, Termination,
};

use crate::{Assembler, ChunkStream, MetadataNormalizer, ProviderStream};

/// Monitoring settings for one wrapped client. Identifier resolvers see the
/// raw request of each call.
#[derive(Clone, Debug, Default)]
pub struct WrapperConfig {
    pub options: MonitorOptions<Value>,
    /// Reported masked; the client's own key is never read.
    pub api_key: Option<String>,
}

impl WrapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: MonitorOptions<Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_api_key(mut self, api_key: impl AsRef<str>) -> Self {
        self.api_key = Some(mask_api_key(api_key.as_ref()));
        self
    }
}

/// Turns a provider client (behind its marker newtype) into its monitored
/// counterpart.
pub trait Instrument {
    type Monitored;

    fn instrument(self, config: WrapperConfig, binding: MonitorBinding) -> Self::Monitored;
}

/// Shared engine behind every provider adapter.
#[derive(Clone, Debug)]
pub(crate) struct Instrumented<N> {
    normalizer: N,
    config: WrapperConfig,
    binding: MonitorBinding,
    seed: PartialMetadata,
}

impl<N> Instrumented<N>
where
    N: MetadataNormalizer + ChunkDecoder<Value> + Clone + 'static,
{
    pub(crate) fn new(normalizer: N, config: WrapperConfig, binding: MonitorBinding) -> Self {
        Self {
            normalizer,
            config,
            binding,
            seed: PartialMetadata::default(),
        }
    }

    /// Metadata known from the client itself rather than the request.
    pub(crate) fn with_seed(mut self, seed: PartialMetadata) -> Self {
        self.seed = seed;
        self
    }

    fn call_context(&self, request: &Value) -> CallContext {
        let mut metadata = PartialMetadata::for_provider(self.normalizer.provider())
            .merged(self.seed.clone())
            .merged(self.normalizer.extract_request_metadata(request));
        if metadata.api_key.is_none() {
            metadata.api_key = self.config.api_key.clone();
        }
        let prompt = self.normalizer.extract_prompt(request);
        CallContext::new(prompt, request, &self.config.options).with_request_metadata(metadata)
    }

    pub(crate) async fn invoke<E, Fut, Exec>(
        &self,
        request: Value,
        execute: Exec,
    ) -> Result<Value, MonitorError<E>>
    where
        Exec: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: Display,
    {
        let Some(monitor) = self.binding.resolve() else {
            return execute(request).await.map_err(MonitorError::Callable);
        };
        let call = self.call_context(&request);
        let normalizer = &self.normalizer;
        monitor
            .intercept(
                call,
                || execute(request),
                |response| {
                    ResponseSummary::new(Value::String(normalizer.extract_response_text(response)))
                        .with_metadata(normalizer.extract_response_metadata(response))
                },
            )
            .await
    }

    /// Runs the control check and returns the tap the stream's chunks go
    /// through. Without a monitor the tap reports nowhere.
    pub(crate) async fn open_tap(
        &self,
        request: &Value,
    ) -> Result<StreamTap<Value>, ExecutionBlocked> {
        let Some(monitor) = self.binding.resolve() else {
            let sink = Box::new(|_: StreamCompletion| {});
            return Ok(StreamTap::new(self.normalizer.clone(), sink));
        };
        let mut call = self.call_context(request);
        monitor.check_control(&call).await?;
        call.mark_started();
        Ok(StreamTap::new(self.normalizer.clone(), monitor.stream_sink(call)))
    }

    pub(crate) async fn stream<E, Fut, Open>(
        &self,
        request: Value,
        open: Open,
        assemble: Assembler,
    ) -> Result<ProviderStream<E>, MonitorError<E>>
    where
        Open: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<ChunkStream<E>, E>>,
        E: Display + 'static,
    {
        let tap = self.open_tap(&request).await?;
        match open(request).await {
            Ok(chunks) => Ok(ProviderStream::new(tap.pull(chunks), assemble)),
            Err(err) => {
                fail(&tap, &err);
                Err(MonitorError::Callable(err))
            }
        }
    }
}

/// The provider refused to open the stream at all.
pub(crate) fn fail(tap: &StreamTap<Value>, error: &dyn Display) {
    tap.complete(Termination::Failed(error.to_string()), None);
}
