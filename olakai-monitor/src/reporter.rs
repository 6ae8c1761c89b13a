use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;

use olakai_core::{MonitorPayload, MonitoringResponse};
use olakai_delivery::{DeliveryClient, DeliveryError};

use crate::DrainError;

/// Ships monitoring payloads off the caller's critical path. Every dispatched
/// report is tracked so that short-lived processes can [`Reporter::drain`]
/// before exiting.
#[derive(Clone, Debug)]
pub struct Reporter {
    client: DeliveryClient,
    tracker: TaskTracker,
}

impl Reporter {
    pub fn new(client: DeliveryClient) -> Self {
        Self {
            client,
            tracker: TaskTracker::new(),
        }
    }

    pub fn client(&self) -> &DeliveryClient {
        &self.client
    }

    /// Fire-and-forget. Delivery failures are logged, never returned.
    pub fn dispatch(&self, payload: MonitorPayload) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(
                chat_id = %payload.chat_id,
                "no async runtime available, dropping monitoring report"
            );
            return;
        };
        let client = self.client.clone();
        self.tracker.spawn_on(
            async move {
                let debug = client.config().debug;
                let Err(err) = client.send_monitoring(&payload).await else {
                    return;
                };
                if debug {
                    tracing::warn!(
                        chat_id = %payload.chat_id,
                        error = %err,
                        "monitoring report not delivered"
                    );
                } else {
                    tracing::debug!(
                        chat_id = %payload.chat_id,
                        error = %err,
                        "monitoring report not delivered"
                    );
                }
            },
            &handle,
        );
    }

    /// Sends immediately and hands the result back to the caller.
    pub async fn deliver(
        &self,
        payload: &MonitorPayload,
    ) -> Result<MonitoringResponse, DeliveryError> {
        self.client.send_monitoring(payload).await
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every report dispatched so far. Reports dispatched while
    /// draining are waited for too.
    pub async fn drain(&self, timeout: Duration) -> Result<(), DrainError> {
        let start = Instant::now();
        self.tracker.close();
        let finished = tokio::time::timeout(timeout, self.tracker.wait()).await;
        self.tracker.reopen();
        match finished {
            Ok(()) => Ok(()),
            Err(_) => Err(DrainError::Timeout {
                waited: start.elapsed(),
                pending: self.tracker.len(),
            }),
        }
    }
}
