//! # Method Schemas
//!
//! Optional declarative descriptions of plugin methods, used for
//! introspection, documentation and (when enabled) argument validation.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};

use anyhow::Result;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::Operation;
use crate::error::{ConfigurationError, Error};
use crate::tracerr;

/// JSON-Schema description of a method's argument and return shapes.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MethodSchema {
    /// Summary of what the method does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Schema for the method's arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,

    /// Schema for the method's result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<Value>,
}

impl MethodSchema {
    /// Generate the schema of a typed [`Operation`].
    #[must_use]
    pub fn of<O: Operation>() -> Self {
        Self {
            description: (!O::DESCRIPTION.is_empty()).then(|| O::DESCRIPTION.to_string()),
            arguments: serde_json::to_value(schemars::schema_for!(O::Args)).ok(),
            return_type: serde_json::to_value(schemars::schema_for!(O::Output)).ok(),
        }
    }
}

/// One entry of an [`AgentSchema`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    /// Plugin supplying the method.
    pub plugin: String,

    /// The method's schema, when the plugin declared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<MethodSchema>,
}

/// Merged description of every method an agent exposes.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AgentSchema {
    /// Method name to descriptor.
    pub methods: BTreeMap<String, MethodDescriptor>,
}

/// Compiled argument schema for one method.
pub(crate) struct ArgsValidator(JSONSchema);

impl ArgsValidator {
    pub(crate) fn compile(method: &str, schema: &Value) -> Result<Self> {
        match JSONSchema::compile(schema) {
            Ok(compiled) => Ok(Self(compiled)),
            Err(e) => tracerr!(
                Error::from(ConfigurationError::InvalidSchema {
                    method: method.to_string(),
                    reason: e.to_string(),
                }),
                "argument schema for {method} does not compile: {e}"
            ),
        }
    }

    pub(crate) fn validate(&self, method: &str, args: &Value) -> Result<()> {
        if let Err(errors) = self.0.validate(args) {
            let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
            tracing::debug!(method, ?reasons, "arguments rejected");
            return Err(Error::InvalidArgs {
                method: method.to_string(),
                reasons,
            }
            .into());
        }
        Ok(())
    }
}

impl Debug for ArgsValidator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("ArgsValidator")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn validates_arguments() {
        let schema = json!({
            "type": "object",
            "properties": {"did": {"type": "string"}},
            "required": ["did"]
        });
        let validator = ArgsValidator::compile("resolveDid", &schema).expect("should compile");

        validator.validate("resolveDid", &json!({"did": "did:key:z6Mk"})).expect("should be valid");

        let err =
            validator.validate("resolveDid", &json!({"did": 7})).expect_err("should be invalid");
        let Some(Error::InvalidArgs { method, reasons }) = Error::kind(&err) else {
            panic!("expected InvalidArgs");
        };
        assert_eq!(method, "resolveDid");
        assert_eq!(reasons.len(), 1);
    }

    #[test]
    fn rejects_bad_schema() {
        let err = ArgsValidator::compile("broken", &json!({"type": 12})).expect_err("should fail");
        assert!(Error::kind(&err).is_some_and(Error::is_configuration));
    }

    #[test]
    fn descriptor_without_schema() {
        let bare = MethodDescriptor {
            plugin: "keyring".to_string(),
            schema: None,
        };
        let json = serde_json::to_value(&bare).expect("should serialize");
        assert_eq!(json, json!({"plugin": "keyring"}));
        let parsed: MethodDescriptor = serde_json::from_value(json).expect("should deserialize");
        assert_eq!(parsed, bare);

        let described = MethodDescriptor {
            plugin: "keyring".to_string(),
            schema: Some(MethodSchema {
                description: Some("Sign data".to_string()),
                ..MethodSchema::default()
            }),
        };
        let json = serde_json::to_value(&described).expect("should serialize");
        assert_eq!(json["schema"]["description"], "Sign data");
        let parsed: MethodDescriptor = serde_json::from_value(json).expect("should deserialize");
        assert_eq!(parsed, described);
    }
}
