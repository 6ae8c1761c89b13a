use std::future::Ready;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use olakai_core::{MonitoringResponse, OlakaiConfig};
use olakai_llm::{Instrument, WrapperConfig};
use olakai_monitor::{
    sync_callable, DrainError, Monitor, MonitorBinding, MonitorOptions, MonitoredFn,
};

use crate::{Olakai, OlakaiError, ReportEvent};

static GLOBAL: RwLock<Option<Olakai>> = RwLock::new(None);

fn current() -> Option<Olakai> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn current_monitor() -> Option<Monitor> {
    current().map(|olakai| olakai.monitor().clone())
}

fn resolver() -> MonitorBinding {
    MonitorBinding::resolver(current_monitor)
}

/// Validates `config` and installs it process-wide. Calling it again replaces
/// the previous instance; wrappers created earlier pick up the new one on
/// their next call.
pub fn initialize(config: OlakaiConfig) -> Result<(), OlakaiError> {
    let olakai = Olakai::new(config)?;
    tracing::info!(
        monitor_endpoint = %olakai.config().monitor_endpoint,
        control_endpoint = %olakai.config().control_endpoint,
        "olakai initialized"
    );
    let previous = GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(olakai);
    if previous.is_some() {
        tracing::debug!("previous olakai configuration replaced");
    }
    Ok(())
}

pub fn is_initialized() -> bool {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// The process-wide instance.
pub fn get() -> Result<Olakai, OlakaiError> {
    current().ok_or(OlakaiError::NotInitialized)
}

/// Wraps a provider client. Before [`initialize`] (and after [`shutdown`])
/// the wrapper passes calls straight through.
pub fn wrap_client<I: Instrument>(client: I, config: WrapperConfig) -> I::Monitored {
    client.instrument(config, resolver())
}

pub fn wrap_function<F, A>(f: F, options: MonitorOptions<A>) -> MonitoredFn<F, A> {
    MonitoredFn::new(f, options, resolver())
}

pub fn wrap_sync_function<A, T, E, F>(
    f: F,
    options: MonitorOptions<A>,
) -> MonitoredFn<impl Fn(A) -> Ready<Result<T, E>> + Clone, A>
where
    F: Fn(A) -> Result<T, E> + Clone,
{
    MonitoredFn::new(sync_callable(f), options, resolver())
}

/// Fire-and-forget. Without an instance the event is logged and dropped.
pub fn report_event(event: ReportEvent) {
    match current() {
        Some(olakai) => olakai.report_event(event),
        None => tracing::warn!("olakai not initialized, dropping reported event"),
    }
}

pub async fn report_direct(event: ReportEvent) -> Result<MonitoringResponse, OlakaiError> {
    get()?.report_direct(event).await
}

/// Waits for reports still in flight. A no-op before [`initialize`].
pub async fn drain(timeout: Duration) -> Result<(), DrainError> {
    match current() {
        Some(olakai) => olakai.drain(timeout).await,
        None => Ok(()),
    }
}

/// Uninstalls the process-wide instance, then drains its pending reports.
pub async fn shutdown(timeout: Duration) -> Result<(), DrainError> {
    let taken = GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match taken {
        Some(olakai) => olakai.drain(timeout).await,
        None => Ok(()),
    }
}
