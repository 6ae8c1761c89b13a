use std::fmt;

use olakai_core::{Identifier, DEFAULT_CHAT_ID, DEFAULT_EMAIL};

/// Per-wrapper monitoring settings. `A` is the argument type the identifier
/// resolvers look at.
pub struct MonitorOptions<A: ?Sized> {
    pub chat_id: Identifier<A>,
    pub email: Identifier<A>,
    pub task: Option<String>,
    pub sub_task: Option<String>,
    /// Ask the control endpoint for permission before every call.
    pub enable_control: bool,
    pub override_criteria: bool,
    /// Mask sensitive substrings in reported prompts and responses.
    pub sanitize: bool,
}

impl<A: ?Sized> MonitorOptions<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<Identifier<A>>) -> Self {
        self.chat_id = chat_id.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<Identifier<A>>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_sub_task(mut self, sub_task: impl Into<String>) -> Self {
        self.sub_task = Some(sub_task.into());
        self
    }

    pub fn with_control(mut self, enabled: bool) -> Self {
        self.enable_control = enabled;
        self
    }

    pub fn with_override_criteria(mut self, override_criteria: bool) -> Self {
        self.override_criteria = override_criteria;
        self
    }

    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Resolves chat id and email. Resolver failures are logged and replaced
    /// by the defaults; they never abort the call.
    pub fn identify(&self, args: &A) -> (String, String) {
        (
            resolve_or_default(&self.chat_id, args, "chat_id", DEFAULT_CHAT_ID),
            resolve_or_default(&self.email, args, "email", DEFAULT_EMAIL),
        )
    }
}

fn resolve_or_default<A: ?Sized>(
    identifier: &Identifier<A>,
    args: &A,
    field: &'static str,
    fallback: &str,
) -> String {
    match identifier.try_resolve(args) {
        Ok(Some(value)) => value,
        Ok(None) => fallback.to_string(),
        Err(err) => {
            tracing::warn!(field, error = %err, "identifier resolution failed, using default");
            fallback.to_string()
        }
    }
}

impl<A: ?Sized> Default for MonitorOptions<A> {
    fn default() -> Self {
        Self {
            chat_id: Identifier::Default,
            email: Identifier::Default,
            task: None,
            sub_task: None,
            enable_control: false,
            override_criteria: false,
            sanitize: false,
        }
    }
}

impl<A: ?Sized> Clone for MonitorOptions<A> {
    fn clone(&self) -> Self {
        Self {
            chat_id: self.chat_id.clone(),
            email: self.email.clone(),
            task: self.task.clone(),
            sub_task: self.sub_task.clone(),
            enable_control: self.enable_control,
            override_criteria: self.override_criteria,
            sanitize: self.sanitize,
        }
    }
}

impl<A: ?Sized> fmt::Debug for MonitorOptions<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorOptions")
            .field("chat_id", &self.chat_id)
            .field("email", &self.email)
            .field("task", &self.task)
            .field("sub_task", &self.sub_task)
            .field("enable_control", &self.enable_control)
            .field("override_criteria", &self.override_criteria)
            .field("sanitize", &self.sanitize)
            .finish()
    }
}
