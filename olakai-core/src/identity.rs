use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub const DEFAULT_CHAT_ID: &str = "123";
pub const DEFAULT_EMAIL: &str = "anonymous@olakai.ai";

pub type IdentifierError = Box<dyn std::error::Error + Send + Sync>;

type ResolveFn<A> = Arc<dyn Fn(&A) -> Result<String, IdentifierError> + Send + Sync>;

/// A chat id or user email: either fixed up front or derived from the call
/// arguments each time the wrapped function runs.
pub enum Identifier<A: ?Sized> {
    Default,
    Static(String),
    Dynamic(ResolveFn<A>),
}

impl<A: ?Sized> Identifier<A> {
    pub fn fixed(value: impl Into<String>) -> Self {
        Identifier::Static(value.into())
    }

    pub fn from_fn<F>(resolve: F) -> Self
    where
        F: Fn(&A) -> Result<String, IdentifierError> + Send + Sync + 'static,
    {
        Identifier::Dynamic(Arc::new(resolve))
    }

    /// `Ok(None)` means no usable value was configured or produced; the
    /// caller substitutes its default. A panicking resolver is reported as an
    /// error rather than unwinding into the instrumented call.
    pub fn try_resolve(&self, args: &A) -> Result<Option<String>, IdentifierError> {
        let value = match self {
            Identifier::Default => return Ok(None),
            Identifier::Static(value) => value.clone(),
            Identifier::Dynamic(resolve) => {
                match catch_unwind(AssertUnwindSafe(|| resolve(args))) {
                    Ok(result) => result?,
                    Err(_) => return Err("identifier resolver panicked".into()),
                }
            }
        };
        if value.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }
}

impl<A: ?Sized> Default for Identifier<A> {
    fn default() -> Self {
        Identifier::Default
    }
}

impl<A: ?Sized> Clone for Identifier<A> {
    fn clone(&self) -> Self {
        match self {
            Identifier::Default => Identifier::Default,
            Identifier::Static(value) => Identifier::Static(value.clone()),
            Identifier::Dynamic(resolve) => Identifier::Dynamic(Arc::clone(resolve)),
        }
    }
}

impl<A: ?Sized> fmt::Debug for Identifier<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Default => f.write_str("Identifier::Default"),
            Identifier::Static(value) => f.debug_tuple("Identifier::Static").field(value).finish(),
            Identifier::Dynamic(_) => f.write_str("Identifier::Dynamic(..)"),
        }
    }
}

impl<A: ?Sized> From<&str> for Identifier<A> {
    fn from(value: &str) -> Self {
        Identifier::fixed(value)
    }
}

impl<A: ?Sized> From<String> for Identifier<A> {
    fn from(value: String) -> Self {
        Identifier::Static(value)
    }
}
