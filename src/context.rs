//! # Execution Context
//!
//! The second argument passed to every Implementation.

use std::future::Future;

use anyhow::Result;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::capability::Dispatch;
use crate::error::ConfigurationError;
use crate::{Agent, tracerr};

/// Context key reserved for the agent handle.
pub const RESERVED_CONTEXT_KEY: &str = "agent";

/// Per-call context.
///
/// A `Context` is created for each invocation and dropped when the
/// Implementation completes. It carries a handle to the owning [`Agent`] (not
/// a copy) along with any request-scoped data supplied by the caller.
#[derive(Debug)]
pub struct Context {
    agent: Agent,
    extra: Map<String, Value>,
    call_id: Uuid,
}

impl Context {
    /// Build a context for one invocation on `agent`.
    ///
    /// The agent's configured context is shallow-merged with `extra`, with
    /// `extra` taking precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ReservedContextKey`] if `extra` attempts
    /// to set the reserved `agent` key.
    pub fn new(agent: &Agent, extra: Map<String, Value>) -> Result<Self> {
        if extra.contains_key(RESERVED_CONTEXT_KEY) {
            tracerr!(
                crate::Error::from(ConfigurationError::ReservedContextKey(
                    RESERVED_CONTEXT_KEY.to_string()
                )),
                "extra context cannot override '{RESERVED_CONTEXT_KEY}'"
            );
        }

        let mut merged = agent.base_context().clone();
        merged.extend(extra);

        Ok(Self {
            agent: agent.clone(),
            extra: merged,
            call_id: Uuid::new_v4(),
        })
    }

    /// The agent that dispatched this call.
    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Unique identifier of this invocation.
    #[must_use]
    pub const fn call_id(&self) -> Uuid {
        self.call_id
    }

    /// Look up a request-scoped value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Set a request-scoped value on this context only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ReservedContextKey`] for the `agent` key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>> {
        let key = key.into();
        if key == RESERVED_CONTEXT_KEY {
            tracerr!(crate::Error::from(ConfigurationError::ReservedContextKey(key)));
        }
        Ok(self.extra.insert(key, value))
    }

    /// All request-scoped values.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Calls made through the context carry its request-scoped values into the
/// nested invocation. Use `context.agent()` directly for a call that starts
/// from the agent's configured context instead.
impl Dispatch for Context {
    fn execute(&self, method: &str, args: Value) -> impl Future<Output = Result<Value>> + Send {
        self.agent.execute_with(method, args, self.extra.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Error;

    fn agent() -> Agent {
        let mut context = Map::new();
        context.insert("tenant".to_string(), json!("acme"));
        Agent::build().context(context).build().expect("should build")
    }

    #[test]
    fn merges_extra() {
        let agent = agent();
        let mut extra = Map::new();
        extra.insert("caller".to_string(), json!("did:example:123"));

        let ctx = Context::new(&agent, extra).expect("should build context");
        assert_eq!(ctx.get("tenant"), Some(&json!("acme")));
        assert_eq!(ctx.get("caller"), Some(&json!("did:example:123")));
        assert_eq!(ctx.agent().id(), agent.id());
    }

    #[test]
    fn extra_overrides_base() {
        let agent = agent();
        let mut extra = Map::new();
        extra.insert("tenant".to_string(), json!("globex"));

        let ctx = Context::new(&agent, extra).expect("should build context");
        assert_eq!(ctx.get("tenant"), Some(&json!("globex")));
    }

    #[test]
    fn rejects_reserved_key() {
        let agent = agent();
        let mut extra = Map::new();
        extra.insert(RESERVED_CONTEXT_KEY.to_string(), json!("impostor"));

        let err = Context::new(&agent, extra).expect_err("should reject reserved key");
        assert!(Error::kind(&err).is_some_and(Error::is_configuration));
    }

    #[test]
    fn fresh_per_call() {
        let agent = agent();
        let mut first = Context::new(&agent, Map::new()).expect("should build context");
        let second = Context::new(&agent, Map::new()).expect("should build context");

        first.insert("marker", json!(true)).expect("should insert");
        assert!(second.get("marker").is_none());
        assert_ne!(first.call_id(), second.call_id());

        let err = first.insert(RESERVED_CONTEXT_KEY, json!(null)).expect_err("should reject");
        assert!(Error::kind(&err).is_some_and(Error::is_configuration));
    }
}
