//! # Plugin
//!
//! A plugin is a named bundle of method implementations, optional method
//! schemas and optional event listeners. Plugins are built once by
//! application configuration and are immutable once handed to an agent.

use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::capability::Operation;
use crate::events::{Event, Listener};
use crate::schema::MethodSchema;
use crate::{Context, Error};

/// A method implementation: takes the method's arguments and a per-call
/// [`Context`] and resolves to a JSON result.
pub type Implementation =
    Arc<dyn Fn(Value, Context) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A single named method supplied by a plugin.
#[derive(Clone)]
pub struct Method {
    /// Name the method is dispatched under.
    pub name: String,

    /// The implementation.
    pub implementation: Implementation,

    /// Optional declarative description of the method.
    pub schema: Option<MethodSchema>,
}

impl Debug for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name).field("schema", &self.schema).finish()
    }
}

/// A unit exposing one or more named operations to an agent.
#[derive(Clone)]
pub struct Plugin {
    name: String,
    methods: Vec<Method>,
    listeners: Vec<(String, Listener)>,
}

impl Plugin {
    /// Create a new [`PluginBuilder`] for a plugin called `name`.
    #[must_use]
    pub fn build(name: impl Into<String>) -> PluginBuilder {
        PluginBuilder::new(name)
    }

    /// Plugin name, used in diagnostics and introspection.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Methods in declaration order.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Event listeners to subscribe when the plugin joins an agent.
    #[must_use]
    pub fn listeners(&self) -> &[(String, Listener)] {
        &self.listeners
    }
}

impl Debug for Plugin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let events: Vec<&str> = self.listeners.iter().map(|(e, _)| e.as_str()).collect();
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("listeners", &events)
            .finish()
    }
}

/// Plugin builder.
pub struct PluginBuilder {
    name: String,
    methods: Vec<Method>,
    listeners: Vec<(String, Listener)>,
}

impl PluginBuilder {
    /// Creates a new `PluginBuilder` for a plugin called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: vec![],
            listeners: vec![],
        }
    }

    /// Add an untyped method.
    ///
    /// Declaring the same name twice is not resolved here: the agent rejects
    /// it as a collision when the plugin is registered.
    #[must_use]
    pub fn method<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.push(name.into(), None, f)
    }

    /// Add an untyped method along with its schema.
    #[must_use]
    pub fn method_with_schema<F, Fut>(
        self, name: impl Into<String>, schema: MethodSchema, f: F,
    ) -> Self
    where
        F: Fn(Value, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.push(name.into(), Some(schema), f)
    }

    /// Add a typed [`Operation`].
    ///
    /// Arguments are deserialized before `f` is called, and the schema is
    /// generated from the operation's argument and output types.
    #[must_use]
    pub fn operation<O, F, Fut>(self, f: F) -> Self
    where
        O: Operation,
        F: Fn(O::Args, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O::Output>> + Send + 'static,
    {
        self.push(O::METHOD.to_string(), Some(MethodSchema::of::<O>()), move |args, ctx| {
            let call = serde_json::from_value::<O::Args>(args).map(|args| f(args, ctx));
            async move {
                let output = call
                    .map_err(|e| Error::InvalidArgs {
                        method: O::METHOD.to_string(),
                        reasons: vec![e.to_string()],
                    })?
                    .await?;
                Ok::<_, anyhow::Error>(serde_json::to_value(output)?)
            }
        })
    }

    /// Subscribe `listener` to `event` when the plugin joins an agent.
    #[must_use]
    pub fn listener<F>(mut self, event: impl Into<String>, listener: F) -> Self
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.listeners.push((event.into(), listener));
        self
    }

    /// Build the plugin.
    #[must_use]
    pub fn build(self) -> Plugin {
        Plugin {
            name: self.name,
            methods: self.methods,
            listeners: self.listeners,
        }
    }

    fn push<F, Fut>(mut self, name: String, schema: Option<MethodSchema>, f: F) -> Self
    where
        F: Fn(Value, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let implementation: Implementation = Arc::new(move |args, ctx| f(args, ctx).boxed());
        self.methods.push(Method {
            name,
            implementation,
            schema,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn declaration_order() {
        let plugin = Plugin::build("demo")
            .method("first", |_, _| async { Ok(json!(1)) })
            .method("second", |_, _| async { Ok(json!(2)) })
            .listener("ready", |_| Ok(()))
            .build();

        let names: Vec<&str> = plugin.methods().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(plugin.listeners().len(), 1);
        assert!(plugin.methods().iter().all(|m| m.schema.is_none()));
    }
}
