//! # Capability Traits
//!
//! Type-level descriptions of what a plugin provides and what a caller needs.
//! No runtime object backs a contract: the registry enforces uniqueness of
//! method names at runtime while these traits give callers typed access.

use std::future::Future;

use anyhow::{Result, anyhow};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A single typed method: its name, argument type and output type.
pub trait Operation: Send + Sync + 'static {
    /// Method name the operation is registered and dispatched under.
    const METHOD: &'static str;

    /// Human-readable summary used in schema introspection.
    const DESCRIPTION: &'static str = "";

    /// Method input.
    type Args: Serialize + DeserializeOwned + JsonSchema + Send + 'static;

    /// Method output.
    type Output: Serialize + DeserializeOwned + JsonSchema + Send + 'static;
}

/// A set of methods a consumer may require of an agent.
///
/// Implemented by zero-sized marker types so that a configuration can ask the
/// agent to prove, at construction, that every method is covered.
pub trait Contract {
    /// Contract name used in diagnostics.
    const NAME: &'static str;

    /// Methods that make up the contract.
    const METHODS: &'static [&'static str];
}

/// [`Dispatch`] is implemented by anything that can invoke an agent method by
/// name: the [`crate::Agent`] itself and the per-call [`crate::Context`].
///
/// Contract traits are blanket-implemented for every `Dispatch`, so typed
/// calls and dynamic calls share a single code path.
pub trait Dispatch: Send + Sync {
    /// Invoke `method` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] when no plugin supplies the
    /// method, or whatever error the Implementation returned.
    fn execute(&self, method: &str, args: Value) -> impl Future<Output = Result<Value>> + Send;

    /// Invoke a typed [`Operation`].
    ///
    /// # Errors
    ///
    /// As for [`Dispatch::execute`], plus failure to convert arguments or
    /// output to and from JSON.
    fn call<O: Operation>(&self, args: O::Args) -> impl Future<Output = Result<O::Output>> + Send {
        async move {
            let args = serde_json::to_value(args)?;
            let value = self.execute(O::METHOD, args).await?;
            serde_json::from_value(value)
                .map_err(|e| anyhow!("unexpected output from {}: {e}", O::METHOD))
        }
    }
}
