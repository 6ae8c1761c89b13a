use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::time::sleep;
use uuid::Uuid;

use olakai_core::{
    ControlPayload, ControlResponse, Endpoint, MonitorPayload, MonitoringResponse, OlakaiConfig,
};

use crate::error::is_retryable_status;
use crate::{Admission, Backoff, BreakerState, CircuitBreaker, DeliveryError};

/// Sends payloads to the monitoring or control endpoint. Knows nothing about
/// what the payloads mean; every failure comes back to the caller typed.
#[derive(Clone)]
pub struct DeliveryClient {
    http: Client,
    config: Arc<OlakaiConfig>,
    backoff: Backoff,
    monitoring_breaker: Arc<CircuitBreaker>,
    control_breaker: Arc<CircuitBreaker>,
    online: Arc<AtomicBool>,
}

impl DeliveryClient {
    pub fn new(config: Arc<OlakaiConfig>) -> Result<Self, DeliveryError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let monitoring_breaker = Arc::new(CircuitBreaker::new(
            config.breaker_failure_threshold,
            config.breaker_cooldown,
        ));
        let control_breaker = Arc::new(CircuitBreaker::new(
            config.breaker_failure_threshold,
            config.breaker_cooldown,
        ));
        Ok(Self {
            http,
            backoff: Backoff::new(config.initial_backoff, config.max_backoff),
            monitoring_breaker,
            control_breaker,
            online: Arc::new(AtomicBool::new(true)),
            config,
        })
    }

    pub fn config(&self) -> &OlakaiConfig {
        &self.config
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn breaker_state(&self, endpoint: Endpoint) -> BreakerState {
        self.breaker(endpoint).state()
    }

    pub async fn send_monitoring(
        &self,
        payload: &MonitorPayload,
    ) -> Result<MonitoringResponse, DeliveryError> {
        let body = self
            .send(Endpoint::Monitoring, &serde_json::to_value(payload)?)
            .await?;
        if body.is_null() {
            return Ok(MonitoringResponse {
                success: true,
                total_requests: 1,
                success_count: 1,
                ..Default::default()
            });
        }
        let response: MonitoringResponse = serde_json::from_value(body)?;
        if !response.success {
            let reason = response
                .results
                .iter()
                .find_map(|result| result.error.clone())
                .unwrap_or_else(|| {
                    format!(
                        "{} of {} failed",
                        response.failure_count, response.total_requests
                    )
                });
            return Err(DeliveryError::Rejected(reason));
        }
        Ok(response)
    }

    pub async fn send_control(
        &self,
        payload: &ControlPayload,
    ) -> Result<ControlResponse, DeliveryError> {
        let body = self
            .send(Endpoint::Control, &serde_json::to_value(payload)?)
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Posts `payload` and returns the decoded JSON body (`Null` when empty).
    pub async fn send(&self, endpoint: Endpoint, payload: &Value) -> Result<Value, DeliveryError> {
        if !self.is_online() {
            tracing::debug!(endpoint = %endpoint, "offline, skipping delivery");
            return Err(DeliveryError::Offline);
        }

        let breaker = self.breaker(endpoint);
        let Some(permit) = breaker.try_acquire() else {
            tracing::debug!(endpoint = %endpoint, "circuit open, failing fast");
            return Err(DeliveryError::CircuitOpen { endpoint });
        };

        if self.config.debug {
            tracing::debug!(endpoint = %endpoint, payload = %payload, "sending payload");
        }

        let retries = match permit.admission() {
            Admission::Normal => self.config.retries,
            Admission::Trial => 0,
        };
        // a cancelled send drops `permit` here, which releases a trial claim
        let result = self.send_with_retry(endpoint, payload, retries).await;
        match &result {
            Err(err) if err.is_transient() => permit.fail(),
            _ => permit.succeed(),
        }
        result
    }

    async fn send_with_retry(
        &self,
        endpoint: Endpoint,
        payload: &Value,
        retries: u32,
    ) -> Result<Value, DeliveryError> {
        let url = endpoint.url(&self.config);
        let request_id = Uuid::new_v4().to_string();
        let max_attempts = retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let request = self
                .http
                .post(url)
                .header("x-api-key", self.config.api_key.expose_secret())
                .header("x-sdk-version", self.config.sdk_version.as_str())
                .header("x-request-id", request_id.as_str())
                .json(payload);

            let (failure, delay) = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response.bytes().await?;
                        return Ok(decode_body(&bytes));
                    }
                    let delay =
                        self.backoff
                            .next(attempt - 1, Some(status), Some(response.headers()));
                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable_status(status) {
                        return Err(DeliveryError::Http { status, body });
                    }
                    (DeliveryError::Http { status, body }, delay)
                }
                Err(err) => {
                    if err.is_builder() {
                        return Err(DeliveryError::Request(err));
                    }
                    let delay = self.backoff.next(attempt - 1, None, None);
                    (DeliveryError::Request(err), delay)
                }
            };

            if attempt >= max_attempts {
                tracing::warn!(
                    endpoint = %endpoint,
                    attempts = attempt,
                    error = %failure,
                    "delivery failed, retries exhausted"
                );
                return Err(DeliveryError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(failure),
                });
            }

            if self.config.verbose {
                tracing::debug!(
                    endpoint = %endpoint,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "transient delivery failure, retrying"
                );
            }
            sleep(delay).await;
        }
    }

    fn breaker(&self, endpoint: Endpoint) -> &CircuitBreaker {
        match endpoint {
            Endpoint::Monitoring => &self.monitoring_breaker,
            Endpoint::Control => &self.control_breaker,
        }
    }
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

impl std::fmt::Debug for DeliveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryClient")
            .field("monitor_endpoint", &self.config.monitor_endpoint)
            .field("control_endpoint", &self.config.control_endpoint)
            .field("online", &self.is_online())
            .finish()
    }
}
