//! Per-attempt command context and the terminal result value.

use std::collections::HashMap;

use command_tree_contract::{ArgValue, FromArgValue};

/// Meta key set by the accepting post-processor once the context has been fully processed.
pub const PROCESSED_KEY: &str = "__command_post_processed__";

/// Mutable key/value store owned by exactly one parse/execute attempt.
#[derive(Debug, Clone)]
pub struct CommandContext<C> {
    sender: C,
    values: HashMap<String, ArgValue>,
    meta: HashMap<String, String>,
}

impl<C> CommandContext<C> {
    /// Creates an empty context for `sender`.
    pub fn new(sender: C) -> Self {
        Self {
            sender,
            values: HashMap::new(),
            meta: HashMap::new(),
        }
    }

    /// Sender that issued the command.
    pub fn sender(&self) -> &C {
        &self.sender
    }

    /// Consumes the context and returns the sender.
    pub fn into_sender(self) -> C {
        self.sender
    }

    /// Binds `value` under `key`, replacing a previous binding.
    pub fn store(&mut self, key: impl Into<String>, value: ArgValue) {
        self.values.insert(key.into(), value);
    }

    /// Returns the value bound under `key` converted to `T`.
    pub fn get<T: FromArgValue>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(T::from_arg)
    }

    /// Like [`CommandContext::get`] with a fallback.
    pub fn get_or<T: FromArgValue>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Raw bound value.
    pub fn value(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    /// Whether a value is bound under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether the presence flag `name` was given.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ArgValue::Bool(true)))
    }

    /// All bound values.
    pub fn values(&self) -> &HashMap<String, ArgValue> {
        &self.values
    }

    /// Stores auxiliary metadata.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    /// Returns auxiliary metadata.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    /// Whether the post-processing chain already accepted this context.
    pub fn is_processed(&self) -> bool {
        self.meta(PROCESSED_KEY) == Some("true")
    }

    pub(crate) fn mark_processed(&mut self) {
        self.set_meta(PROCESSED_KEY, "true");
    }
}

/// Terminal value of a successful attempt, wrapping its context.
#[derive(Debug, Clone)]
pub struct CommandResult<C> {
    context: CommandContext<C>,
}

impl<C> CommandResult<C> {
    pub(crate) fn new(context: CommandContext<C>) -> Self {
        Self { context }
    }

    /// Context after execution.
    pub fn context(&self) -> &CommandContext<C> {
        &self.context
    }

    /// Consumes the result.
    pub fn into_context(self) -> CommandContext<C> {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_checks_variant_and_width() {
        let mut context = CommandContext::new("console");
        context.store("x", ArgValue::Int(2));
        context.store("loud", ArgValue::Bool(true));

        assert_eq!(context.get::<i32>("x"), Some(2));
        assert_eq!(context.get::<String>("x"), None);
        assert_eq!(context.get_or::<i32>("y", 7), 7);
        assert!(context.flag("loud"));
        assert!(!context.flag("quiet"));
    }

    #[test]
    fn processed_marker_is_idempotent() {
        let mut context = CommandContext::new(());
        assert!(!context.is_processed());
        context.mark_processed();
        context.mark_processed();
        assert!(context.is_processed());
    }
}
