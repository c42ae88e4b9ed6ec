//! # Method Registry
//!
//! Merges the methods of an ordered list of plugins into a single
//! name-to-implementation map. A method name may be supplied by exactly one
//! plugin: a second supplier is a configuration error unless the name is in
//! the caller's explicit override set, in which case the first-registered
//! implementation is kept.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;

use crate::error::{ConfigurationError, Error};
use crate::plugin::{Implementation, Plugin};
use crate::schema::{AgentSchema, ArgsValidator, MethodDescriptor, MethodSchema};
use crate::tracerr;

/// A registered method.
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) method: crate::Method,
    pub(crate) plugin: String,
    pub(crate) validator: Option<ArgsValidator>,
}

/// The merged, collision-checked method map of one agent.
///
/// Immutable once built, so lookups need no locking.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl Registry {
    /// Merge `plugins`, in order, into a registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MethodCollision`] naming the method and
    /// both plugins when a method is supplied twice and is not in
    /// `overrides`, and [`ConfigurationError::UnknownOverride`] when an
    /// override names a method no plugin supplies.
    pub fn register(plugins: &[Plugin], overrides: &BTreeSet<String>) -> Result<Self> {
        let mut registry = Self::default();

        for plugin in plugins {
            for method in plugin.methods() {
                if let Some(existing) = registry.entries.get(&method.name) {
                    if overrides.contains(&method.name) {
                        tracing::warn!(
                            method = %method.name,
                            kept = %existing.plugin,
                            skipped = %plugin.name(),
                            "override: keeping first registered implementation"
                        );
                        continue;
                    }
                    tracerr!(
                        Error::from(ConfigurationError::MethodCollision {
                            method: method.name.clone(),
                            first: existing.plugin.clone(),
                            second: plugin.name().to_string(),
                        }),
                        "method {} is provided by both {} and {}",
                        method.name,
                        existing.plugin,
                        plugin.name()
                    );
                }

                tracing::debug!(
                    method = %method.name,
                    plugin = %plugin.name(),
                    "registering method"
                );
                registry.order.push(method.name.clone());
                registry.entries.insert(
                    method.name.clone(),
                    Entry {
                        method: method.clone(),
                        plugin: plugin.name().to_string(),
                        validator: None,
                    },
                );
            }
        }

        if let Some(unknown) = overrides.iter().find(|m| !registry.entries.contains_key(*m)) {
            tracerr!(
                Error::from(ConfigurationError::UnknownOverride(unknown.clone())),
                "override {unknown} does not match a registered method"
            );
        }

        Ok(registry)
    }

    /// Compile the argument schema of every method that declares one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSchema`] for the first schema that
    /// fails to compile.
    pub(crate) fn compile_validators(&mut self) -> Result<()> {
        for (name, entry) in &mut self.entries {
            let Some(arguments) = entry.method.schema.as_ref().and_then(|s| s.arguments.as_ref())
            else {
                continue;
            };
            entry.validator = Some(ArgsValidator::compile(name, arguments)?);
        }
        Ok(())
    }

    /// The implementation registered for `method`.
    #[must_use]
    pub fn lookup(&self, method: &str) -> Option<&Implementation> {
        self.entries.get(method).map(|e| &e.method.implementation)
    }

    pub(crate) fn entry(&self, method: &str) -> Option<&Entry> {
        self.entries.get(method)
    }

    /// Registered method names, in registration order.
    #[must_use]
    pub fn method_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Name of the plugin that supplied `method`.
    #[must_use]
    pub fn owner(&self, method: &str) -> Option<&str> {
        self.entries.get(method).map(|e| e.plugin.as_str())
    }

    /// Schema declared for `method`.
    #[must_use]
    pub fn schema_of(&self, method: &str) -> Option<&MethodSchema> {
        self.entries.get(method).and_then(|e| e.method.schema.as_ref())
    }

    /// Whether `method` is registered.
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.entries.contains_key(method)
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Merged schema of every registered method.
    #[must_use]
    pub fn schema(&self) -> AgentSchema {
        let methods = self
            .entries
            .iter()
            .map(|(name, entry)| {
                let descriptor = MethodDescriptor {
                    plugin: entry.plugin.clone(),
                    schema: entry.method.schema.clone(),
                };
                (name.clone(), descriptor)
            })
            .collect();
        AgentSchema { methods }
    }
}
