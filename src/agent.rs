//! # Agent
//!
//! The externally visible facade. An [`Agent`] owns the merged [`Registry`]
//! and an [`EventBus`], dispatches calls by method name and injects a fresh
//! [`Context`] into every call.

use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::capability::{Contract, Dispatch};
use crate::config::{AgentConfig, AgentOptions};
use crate::context::RESERVED_CONTEXT_KEY;
use crate::error::{ConfigurationError, Error};
use crate::events::{Event, EventBus};
use crate::registry::Registry;
use crate::schema::{AgentSchema, MethodSchema};
use crate::{Context, Plugin, tracerr};

/// A composed agent.
///
/// Cloning an `Agent` yields another handle to the same instance: the
/// registry, event bus and configured context are shared. Independent agents
/// built from separate configurations never share state.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    id: Uuid,
    registry: Registry,
    events: EventBus,
    context: Map<String, Value>,
    validate_args: bool,
}

impl Agent {
    /// Construct an agent from `config`.
    ///
    /// Plugins are registered in order and their listeners subscribed. The
    /// agent either comes into existence fully configured or not at all.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when two plugins supply the same
    /// method without an override, when the configured context sets the
    /// reserved `agent` key, or when an argument schema cannot be compiled.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let AgentConfig { plugins, options } = config;
        let AgentOptions {
            overrides,
            validate_args,
            context,
        } = options;

        if context.contains_key(RESERVED_CONTEXT_KEY) {
            tracerr!(
                Error::from(ConfigurationError::ReservedContextKey(
                    RESERVED_CONTEXT_KEY.to_string()
                )),
                "agent context cannot set '{RESERVED_CONTEXT_KEY}'"
            );
        }

        let mut registry = Registry::register(&plugins, &overrides)?;
        if validate_args {
            registry.compile_validators()?;
        }

        let events = EventBus::new();
        for plugin in &plugins {
            for (event, listener) in plugin.listeners() {
                events.subscribe(event.clone(), Arc::clone(listener));
            }
        }

        let id = Uuid::new_v4();
        tracing::debug!(agent = %id, methods = registry.len(), "agent ready");

        Ok(Self {
            inner: Arc::new(AgentInner {
                id,
                registry,
                events,
                context,
                validate_args,
            }),
        })
    }

    /// Create a new [`AgentBuilder`].
    #[must_use]
    pub fn build() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Unique identifier of this agent instance.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Invoke `method` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MethodNotFound`] when no plugin supplies `method`,
    /// [`Error::InvalidArgs`] when argument validation is enabled and fails,
    /// or the Implementation's own error, unchanged.
    pub fn execute(
        &self, method: &str, args: Value,
    ) -> impl Future<Output = Result<Value>> + Send + '_ {
        self.execute_with(method, args, Map::new())
    }

    /// Invoke `method` with `args`, adding request-scoped values to the
    /// call's [`Context`].
    ///
    /// # Errors
    ///
    /// As for [`Agent::execute`], plus [`ConfigurationError::ReservedContextKey`]
    /// when `extra` sets the reserved `agent` key.
    pub fn execute_with(
        &self, method: &str, args: Value, extra: Map<String, Value>,
    ) -> impl Future<Output = Result<Value>> + Send + '_ {
        let method = method.to_string();
        let span = tracing::debug_span!("execute", method = %method);

        async move {
            let implementation = {
                let Some(entry) = self.inner.registry.entry(&method) else {
                    tracing::debug!("method not found");
                    return Err(Error::MethodNotFound(method).into());
                };
                if self.inner.validate_args {
                    if let Some(validator) = &entry.validator {
                        validator.validate(&method, &args)?;
                    }
                }
                Arc::clone(&entry.method.implementation)
            };

            let ctx = Context::new(self, extra)?;
            implementation(args, ctx).await
        }
        .instrument(span)
    }

    /// Names of every method this agent exposes, in registration order.
    #[must_use]
    pub fn available_methods(&self) -> Vec<String> {
        self.inner.registry.method_names()
    }

    /// Name of the plugin supplying `method`.
    #[must_use]
    pub fn method_owner(&self, method: &str) -> Option<&str> {
        self.inner.registry.owner(method)
    }

    /// Schema declared for `method`, if any.
    #[must_use]
    pub fn method_schema(&self, method: &str) -> Option<&MethodSchema> {
        self.inner.registry.schema_of(method)
    }

    /// Merged schema of every exposed method.
    #[must_use]
    pub fn schema(&self) -> AgentSchema {
        self.inner.registry.schema()
    }

    /// Whether every method of contract `C` is exposed.
    #[must_use]
    pub fn implements<C: Contract>(&self) -> bool {
        C::METHODS.iter().all(|m| self.inner.registry.contains(m))
    }

    /// The agent's event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Register a listener on the agent's event bus.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.inner.events.on(event, listener);
    }

    /// Emit an event on the agent's event bus.
    pub fn emit(&self, event: impl Into<String>, payload: Value) {
        self.inner.events.emit(event, payload);
    }

    pub(crate) fn base_context(&self) -> &Map<String, Value> {
        &self.inner.context
    }
}

impl Dispatch for Agent {
    fn execute(&self, method: &str, args: Value) -> impl Future<Output = Result<Value>> + Send {
        Self::execute(self, method, args)
    }
}

impl Debug for Agent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.inner.id)
            .field("methods", &self.inner.registry.method_names())
            .finish_non_exhaustive()
    }
}

/// Fluent agent configuration.
#[derive(Default)]
pub struct AgentBuilder {
    config: AgentConfig,
    required: Vec<(&'static str, &'static [&'static str])>,
}

impl AgentBuilder {
    /// Creates a new, empty `AgentBuilder`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Plugins are registered in the order they are added.
    #[must_use]
    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.config.plugins.push(plugin);
        self
    }

    /// Allow `method` to be supplied by more than one plugin, keeping the
    /// first-registered implementation.
    #[must_use]
    pub fn override_method(mut self, method: impl Into<String>) -> Self {
        self.config.options.overrides.insert(method.into());
        self
    }

    /// Set the agent-level context merged into every call.
    #[must_use]
    pub fn context(mut self, context: Map<String, Value>) -> Self {
        self.config.options.context = context;
        self
    }

    /// Enable or disable argument validation.
    #[must_use]
    pub fn validate_args(mut self, validate: bool) -> Self {
        self.config.options.validate_args = validate;
        self
    }

    /// Replace the declarative options wholesale.
    #[must_use]
    pub fn options(mut self, options: AgentOptions) -> Self {
        self.config.options = options;
        self
    }

    /// Require the agent to cover every method of contract `C`.
    #[must_use]
    pub fn require<C: Contract>(mut self) -> Self {
        self.required.push((C::NAME, C::METHODS));
        self
    }

    /// Build the agent.
    ///
    /// # Errors
    ///
    /// As for [`Agent::new`], plus [`ConfigurationError::MissingCapability`]
    /// when a required contract is not covered.
    pub fn build(self) -> Result<Agent> {
        let agent = Agent::new(self.config)?;

        for (contract, methods) in self.required {
            if let Some(missing) = methods.iter().find(|m| !agent.inner.registry.contains(m)) {
                tracerr!(
                    Error::from(ConfigurationError::MissingCapability {
                        contract: contract.to_string(),
                        method: (*missing).to_string(),
                    }),
                    "contract {contract} requires {missing}"
                );
            }
        }

        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Echo;

    impl Contract for Echo {
        const METHODS: &'static [&'static str] = &["echo"];
        const NAME: &'static str = "Echo";
    }

    fn echo() -> Plugin {
        Plugin::build("echo").method("echo", |args, _| async move { Ok(args) }).build()
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let agent = Agent::build().plugin(echo()).build().expect("should build");
        let result = agent.execute("echo", json!({"hello": "world"})).await.expect("should execute");
        assert_eq!(result, json!({"hello": "world"}));
    }

    #[test]
    fn reserved_agent_context() {
        let mut context = Map::new();
        context.insert(RESERVED_CONTEXT_KEY.to_string(), json!("impostor"));
        let err = Agent::build().context(context).build().expect_err("should reject");
        assert!(Error::kind(&err).is_some_and(Error::is_configuration));
    }

    #[test]
    fn required_contract() {
        let agent = Agent::build().plugin(echo()).require::<Echo>().build().expect("should build");
        assert!(agent.implements::<Echo>());

        let err = Agent::build().require::<Echo>().build().expect_err("should be missing echo");
        assert_eq!(
            Error::kind(&err),
            Some(&Error::Configuration(ConfigurationError::MissingCapability {
                contract: "Echo".to_string(),
                method: "echo".to_string(),
            }))
        );
    }

    #[test]
    fn independent_instances() {
        let first = Agent::build().plugin(echo()).build().expect("should build");
        let second = Agent::build().build().expect("should build");

        assert_ne!(first.id(), second.id());
        assert_eq!(first.clone().id(), first.id());
        assert_eq!(first.available_methods(), ["echo"]);
        assert!(second.available_methods().is_empty());
    }
}
