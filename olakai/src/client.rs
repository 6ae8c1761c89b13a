use std::sync::Arc;
use std::time::Duration;

use olakai_core::{MonitoringResponse, OlakaiConfig};
use olakai_delivery::DeliveryClient;
use olakai_llm::{Instrument, WrapperConfig};
use olakai_monitor::{DrainError, Monitor, MonitorBinding, MonitorOptions, MonitoredFn};

use crate::{OlakaiError, ReportEvent};

/// One configured SDK instance. The free functions at the crate root act on
/// a process-wide instance; this type is for callers that would rather pass
/// it around explicitly.
#[derive(Clone, Debug)]
pub struct Olakai {
    config: Arc<OlakaiConfig>,
    monitor: Monitor,
}

impl Olakai {
    pub fn new(config: OlakaiConfig) -> Result<Self, OlakaiError> {
        config.validate()?;
        let config = Arc::new(config);
        let client = DeliveryClient::new(Arc::clone(&config))?;
        Ok(Self {
            config,
            monitor: Monitor::new(client),
        })
    }

    pub fn config(&self) -> &OlakaiConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn wrap_client<I: Instrument>(&self, client: I, config: WrapperConfig) -> I::Monitored {
        client.instrument(config, MonitorBinding::Bound(self.monitor.clone()))
    }

    pub fn wrap_function<F, A>(&self, f: F, options: MonitorOptions<A>) -> MonitoredFn<F, A> {
        MonitoredFn::new(f, options, MonitorBinding::Bound(self.monitor.clone()))
    }

    /// Queues the event for delivery and returns immediately.
    pub fn report_event(&self, event: ReportEvent) {
        self.monitor.reporter().dispatch(event.into_payload());
    }

    pub async fn report_direct(
        &self,
        event: ReportEvent,
    ) -> Result<MonitoringResponse, OlakaiError> {
        let payload = event.into_payload();
        Ok(self.monitor.reporter().deliver(&payload).await?)
    }

    pub async fn drain(&self, timeout: Duration) -> Result<(), DrainError> {
        self.monitor.reporter().drain(timeout).await
    }
}
