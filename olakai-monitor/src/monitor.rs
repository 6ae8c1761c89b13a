use std::fmt::Display;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;

use olakai_core::{
    sanitize_text, sanitize_value, ControlPayload, ExecutionBlocked, LlmMetadata, MonitorPayload,
    PartialMetadata, Timing,
};
use olakai_delivery::DeliveryClient;

use crate::stream::{CompletionSink, StreamCompletion, Termination};
use crate::{MonitorError, MonitorOptions, Reporter};

/// Everything known about one invocation before it runs.
#[derive(Clone, Debug)]
pub struct CallContext {
    pub prompt: Value,
    pub chat_id: String,
    pub email: String,
    pub task: Option<String>,
    pub sub_task: Option<String>,
    pub enable_control: bool,
    pub override_criteria: bool,
    pub sanitize: bool,
    /// Request half of the LLM envelope; `None` for plain functions.
    pub request_metadata: Option<PartialMetadata>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl CallContext {
    pub fn new<A: ?Sized>(prompt: Value, args: &A, options: &MonitorOptions<A>) -> Self {
        let (chat_id, email) = options.identify(args);
        Self {
            prompt,
            chat_id,
            email,
            task: options.task.clone(),
            sub_task: options.sub_task.clone(),
            enable_control: options.enable_control,
            override_criteria: options.override_criteria,
            sanitize: options.sanitize,
            request_metadata: None,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn with_request_metadata(mut self, metadata: PartialMetadata) -> Self {
        self.request_metadata = Some(metadata);
        self
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Restarts the clock; called when execution actually begins.
    pub fn mark_started(&mut self) {
        self.started_at = Utc::now();
        self.started = Instant::now();
    }

    /// Merges the response half into the request half and seals the
    /// envelope. Plain (non-LLM) calls with nothing to merge yield `None`.
    pub fn seal(
        &self,
        response: Option<PartialMetadata>,
        stream_mode: bool,
    ) -> Option<LlmMetadata> {
        let merged = match (self.request_metadata.clone(), response) {
            (None, None) => return None,
            (Some(request), None) => request,
            (None, Some(response)) => response,
            (Some(request), Some(response)) => request.merged(response),
        };
        Some(merged.seal(Timing::since(self.started_at), stream_mode))
    }
}

/// What a successful call is reported as.
#[derive(Clone, Debug, Default)]
pub struct ResponseSummary {
    pub response: Value,
    pub metadata: Option<PartialMetadata>,
}

impl ResponseSummary {
    pub fn new(response: Value) -> Self {
        Self {
            response,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: PartialMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Clone, Debug)]
pub enum Outcome {
    Success {
        response: Value,
        metadata: Option<LlmMetadata>,
    },
    Failure {
        error: String,
        response: Value,
        metadata: Option<LlmMetadata>,
    },
    Blocked(ExecutionBlocked),
}

/// Runs the control-check / execute / report sequence for one call.
#[derive(Clone, Debug)]
pub struct Monitor {
    reporter: Reporter,
}

impl Monitor {
    pub fn new(client: DeliveryClient) -> Self {
        Self {
            reporter: Reporter::new(client),
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn client(&self) -> &DeliveryClient {
        self.reporter.client()
    }

    pub async fn intercept<T, E, Fut, Exec, Describe>(
        &self,
        mut call: CallContext,
        execute: Exec,
        describe: Describe,
    ) -> Result<T, MonitorError<E>>
    where
        Exec: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        Describe: FnOnce(&T) -> ResponseSummary,
    {
        self.check_control(&call).await?;

        call.mark_started();
        match execute().await {
            Ok(value) => {
                let summary = catch_unwind(AssertUnwindSafe(|| describe(&value)))
                    .unwrap_or_else(|_| {
                        tracing::warn!("response summary panicked, reporting without it");
                        ResponseSummary::default()
                    });
                let metadata = call.seal(summary.metadata, false);
                self.report(
                    &call,
                    Outcome::Success {
                        response: summary.response,
                        metadata,
                    },
                );
                Ok(value)
            }
            Err(err) => {
                self.report_failure(&call, err.to_string(), false);
                Err(MonitorError::Callable(err))
            }
        }
    }

    /// Fails closed: a control endpoint that cannot be reached blocks the
    /// call. The blocked report is dispatched before the error is returned.
    pub async fn check_control(&self, call: &CallContext) -> Result<(), ExecutionBlocked> {
        if !call.enable_control {
            return Ok(());
        }

        let payload = ControlPayload {
            prompt: call.prompt.clone(),
            chat_id: call.chat_id.clone(),
            email: call.email.clone(),
            task: call.task.clone(),
            sub_task: call.sub_task.clone(),
            tokens: 0,
            override_criteria: call.override_criteria,
        };

        let blocked = match self.client().send_control(&payload).await {
            Ok(response) if response.allowed => return Ok(()),
            Ok(response) => response.into_blocked(),
            Err(err) => {
                tracing::warn!(
                    chat_id = %call.chat_id,
                    error = %err,
                    "control check failed, blocking call"
                );
                ExecutionBlocked::unverified(format!("control check failed: {err}"))
            }
        };

        self.report(call, Outcome::Blocked(blocked.clone()));
        Err(blocked)
    }

    pub fn report_failure(&self, call: &CallContext, error: String, stream_mode: bool) {
        let metadata = call.seal(None, stream_mode);
        self.report(
            call,
            Outcome::Failure {
                error,
                response: Value::String(String::new()),
                metadata,
            },
        );
    }

    /// Fire-and-forget; never fails the caller.
    pub fn report(&self, call: &CallContext, outcome: Outcome) {
        self.reporter.dispatch(build_payload(call, outcome));
    }

    /// The sink a [`crate::StreamTap`] fires when its stream completes.
    pub fn stream_sink(&self, call: CallContext) -> CompletionSink {
        let monitor = self.clone();
        Box::new(move |completion: StreamCompletion| {
            let StreamCompletion {
                text,
                metadata,
                termination,
                ..
            } = completion;
            let metadata = call.seal(Some(metadata), true);
            let response = Value::String(text);
            let outcome = match termination {
                Termination::Failed(error) => Outcome::Failure {
                    error,
                    response,
                    metadata,
                },
                Termination::Completed | Termination::EarlyExit => Outcome::Success {
                    response,
                    metadata,
                },
            };
            monitor.report(&call, outcome);
        })
    }
}

pub fn build_payload(call: &CallContext, outcome: Outcome) -> MonitorPayload {
    let (response, metadata, blocked, error_message, sensitivity) = match outcome {
        Outcome::Success { response, metadata } => (response, metadata, false, None, Vec::new()),
        Outcome::Failure {
            error,
            response,
            metadata,
        } => (response, metadata, false, Some(error), Vec::new()),
        Outcome::Blocked(blocked) => (
            Value::String(String::new()),
            None,
            true,
            blocked.message,
            blocked.detected_sensitivity,
        ),
    };

    let (prompt, response, error_message) = if call.sanitize {
        (
            sanitize_value(call.prompt.clone()),
            sanitize_value(response),
            error_message.map(|message| sanitize_text(&message)),
        )
    } else {
        (call.prompt.clone(), response, error_message)
    };

    MonitorPayload {
        prompt,
        response,
        chat_id: call.chat_id.clone(),
        email: call.email.clone(),
        task: call.task.clone(),
        sub_task: call.sub_task.clone(),
        tokens: metadata.as_ref().map(|m| m.tokens.total).unwrap_or(0),
        request_time_ms: call.elapsed_ms(),
        blocked,
        error_message,
        sensitivity,
        llm_metadata: metadata,
    }
}
