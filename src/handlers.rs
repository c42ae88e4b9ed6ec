//! # Remote Exposure
//!
//! A transport-neutral request/response pair for exposing an agent's methods
//! to remote callers. A transport (HTTP, message queue, etc.) deserializes a
//! [`Request`], hands it to [`Agent::handle`], and writes back the
//! [`Response`]. Status codes follow HTTP conventions so an HTTP transport can
//! use them directly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Agent, Error, to_json};

/// A remote method invocation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Request {
    /// Method to invoke.
    pub method: String,

    /// Method arguments. Defaults to an empty object.
    #[serde(default = "empty_args")]
    pub args: Value,

    /// Request-scoped values added to the call's context.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl Request {
    /// A request for `method` with `args`.
    #[must_use]
    pub fn new(method: impl Into<String>, args: Value) -> Self {
        Self {
            method: method.into(),
            args,
            context: Map::new(),
        }
    }
}

fn empty_args() -> Value {
    Value::Object(Map::new())
}

/// Result of a remote method invocation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Response {
    /// HTTP-style status code.
    pub status: u16,

    /// Method result on success, otherwise an error object.
    pub body: Value,
}

impl Response {
    /// Whether the call succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status == 200
    }

    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(err: &anyhow::Error) -> Self {
        Self {
            status: status(err),
            body: to_json(err),
        }
    }
}

/// Status code for a failed call.
///
/// Dispatcher errors map to client errors. Anything else was raised by a
/// method implementation and maps to `500`.
#[must_use]
pub fn status(err: &anyhow::Error) -> u16 {
    match Error::kind(err) {
        Some(Error::MethodNotFound(_)) => 404,
        Some(Error::InvalidArgs { .. } | Error::Configuration(_)) => 400,
        Some(Error::Unsupported(_)) => 422,
        None => 500,
    }
}

impl Agent {
    /// Execute a remote request.
    ///
    /// Never fails: errors are rendered into the [`Response`].
    pub async fn handle(&self, request: Request) -> Response {
        let Request {
            method,
            args,
            context,
        } = request;

        match self.execute_with(&method, args, context).await {
            Ok(body) => Response::ok(body),
            Err(e) => {
                let response = Response::error(&e);
                tracing::debug!(method = %method, status = response.status, "request failed: {e}");
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Plugin;

    fn agent() -> Agent {
        let plugin = Plugin::build("remote")
            .method("echo", |args, _| async move { Ok(args) })
            .method("fail", |_, _| async {
                Err::<Value, _>(anyhow::anyhow!("backend unavailable"))
            })
            .build();
        Agent::build().plugin(plugin).build().expect("should build")
    }

    #[tokio::test]
    async fn success() {
        let response = agent().handle(Request::new("echo", json!({"n": 1}))).await;
        assert!(response.is_success());
        assert_eq!(response.body, json!({"n": 1}));
    }

    #[tokio::test]
    async fn method_not_found() {
        let response = agent().handle(Request::new("missing", json!({}))).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body["error"], "method_not_found");
    }

    #[tokio::test]
    async fn implementation_error() {
        let response = agent().handle(Request::new("fail", json!({}))).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error_description"], "backend unavailable");
    }

    #[tokio::test]
    async fn reserved_context() {
        let request: Request = serde_json::from_value(json!({
            "method": "echo",
            "context": {"agent": "impostor"}
        }))
        .expect("should deserialize");
        assert_eq!(request.args, json!({}));

        let response = agent().handle(request).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "configuration_error");
    }
}
