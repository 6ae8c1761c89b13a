use std::fmt::{self, Display};
use std::future::{ready, Future, Ready};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::{CallContext, Monitor, MonitorError, MonitorOptions, ResponseSummary};

type MonitorResolver = Arc<dyn Fn() -> Option<Monitor> + Send + Sync>;

/// Where a wrapper finds its monitor at call time.
#[derive(Clone)]
pub enum MonitorBinding {
    Bound(Monitor),
    /// Looked up on every call; `None` runs the callable unmonitored.
    Resolver(MonitorResolver),
}

impl MonitorBinding {
    pub fn resolver<F>(resolve: F) -> Self
    where
        F: Fn() -> Option<Monitor> + Send + Sync + 'static,
    {
        MonitorBinding::Resolver(Arc::new(resolve))
    }

    pub fn resolve(&self) -> Option<Monitor> {
        match self {
            MonitorBinding::Bound(monitor) => Some(monitor.clone()),
            MonitorBinding::Resolver(resolve) => resolve(),
        }
    }
}

impl fmt::Debug for MonitorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorBinding::Bound(monitor) => f.debug_tuple("Bound").field(monitor).finish(),
            MonitorBinding::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// An async callable with monitoring around every invocation. The prompt is
/// the serialized argument and the response the serialized result.
pub struct MonitoredFn<F, A> {
    inner: F,
    options: MonitorOptions<A>,
    binding: MonitorBinding,
}

impl<F, A> MonitoredFn<F, A> {
    pub fn new(inner: F, options: MonitorOptions<A>, binding: MonitorBinding) -> Self {
        Self {
            inner,
            options,
            binding,
        }
    }

    pub fn options(&self) -> &MonitorOptions<A> {
        &self.options
    }
}

impl<F, A, Fut, T, E> MonitoredFn<F, A>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    A: Serialize,
    T: Serialize,
    E: Display,
{
    pub async fn call(&self, args: A) -> Result<T, MonitorError<E>> {
        let Some(monitor) = self.binding.resolve() else {
            tracing::debug!("monitoring not initialized, running callable unmonitored");
            return (self.inner)(args).await.map_err(MonitorError::Callable);
        };

        let prompt = to_json(&args, "arguments");
        let call = CallContext::new(prompt, &args, &self.options);
        monitor
            .intercept(
                call,
                || (self.inner)(args),
                |result| ResponseSummary::new(to_json(result, "result")),
            )
            .await
    }
}

impl<F: Clone, A> Clone for MonitoredFn<F, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            options: self.options.clone(),
            binding: self.binding.clone(),
        }
    }
}

impl<F, A> fmt::Debug for MonitoredFn<F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoredFn")
            .field("options", &self.options)
            .field("binding", &self.binding)
            .finish()
    }
}

/// Adapts a synchronous callable so it can be wrapped like an async one.
pub fn sync_callable<A, T, E, F>(f: F) -> impl Fn(A) -> Ready<Result<T, E>> + Clone
where
    F: Fn(A) -> Result<T, E> + Clone,
{
    move |args| ready(f(args))
}

fn to_json<V: Serialize + ?Sized>(value: &V, what: &'static str) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        tracing::debug!(what, error = %err, "value not serializable, reporting null");
        Value::Null
    })
}
