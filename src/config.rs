//! # Agent Configuration

use std::collections::BTreeSet;
use std::env;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Plugin;

/// Environment variable holding a comma-separated override set.
const OVERRIDES_VAR: &str = "AGENT_OVERRIDES";

/// Environment variable toggling argument validation.
const VALIDATE_ARGS_VAR: &str = "AGENT_VALIDATE_ARGS";

/// Declarative agent options.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentOptions {
    /// Methods that may be supplied by more than one plugin. The first
    /// plugin to register such a method wins; later ones are skipped.
    pub overrides: BTreeSet<String>,

    /// Validate arguments against each method's argument schema before
    /// dispatch.
    pub validate_args: bool,

    /// Agent-level context merged into every call's [`crate::Context`].
    pub context: Map<String, Value>,
}

impl AgentOptions {
    /// Parse options from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid `AgentOptions` JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| anyhow!("invalid agent options: {e}"))
    }

    /// Read options from the environment.
    ///
    /// `AGENT_OVERRIDES` is a comma-separated list of method names and
    /// `AGENT_VALIDATE_ARGS` is `true` or `false`. Unset variables leave the
    /// defaults in place.
    ///
    /// # Errors
    ///
    /// Returns an error if `AGENT_VALIDATE_ARGS` is not a boolean.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(overrides) = env::var(OVERRIDES_VAR) {
            options.overrides = overrides
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Ok(validate) = env::var(VALIDATE_ARGS_VAR) {
            options.validate_args = validate
                .trim()
                .parse()
                .map_err(|e| anyhow!("{VALIDATE_ARGS_VAR} must be true or false: {e}"))?;
        }

        Ok(options)
    }
}

/// Everything needed to construct an [`crate::Agent`].
#[derive(Clone, Debug, Default)]
pub struct AgentConfig {
    /// Plugins, in registration order.
    pub plugins: Vec<Plugin>,

    /// Declarative options.
    pub options: AgentOptions,
}
