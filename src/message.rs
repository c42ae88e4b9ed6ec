//! # Message Handling
//!
//! Incoming messages are passed along an ordered [`HandlerChain`]. Each
//! [`MessageHandler`] either handles the message, ending the chain, or passes
//! it (possibly enriched) to the next handler. A message no handler accepts is
//! rejected with [`Error::Unsupported`].
//!
//! [`MessageHandlerPlugin`] exposes the chain to an agent as `handleMessage`
//! and announces every handled message on the agent's event bus.

use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{Contract, Context, Dispatch, Error, Operation, Plugin};

/// Event emitted for every message handled by [`MessageHandlerPlugin`].
pub const VALIDATED_MESSAGE_EVENT: &str = "validatedMessage";

/// DIDComm trust ping message type.
pub const TRUST_PING: &str = "https://didcomm.org/trust-ping/2.0/ping";

/// DIDComm trust ping response message type.
pub const TRUST_PING_RESPONSE: &str = "https://didcomm.org/trust-ping/2.0/ping-response";

/// A message moving through the handler chain.
///
/// Starts life holding only `raw` and is filled in by handlers as it is
/// parsed and processed.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Message {
    /// Message ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Message type URI.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Sender DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Recipient DIDs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,

    /// Thread ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,

    /// Creation time, seconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,

    /// Message body.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,

    /// The message as received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,

    /// Reply produced by a handler, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Box<Message>>,

    /// Handler annotations, e.g. which handlers saw the message.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Message {
    /// An unprocessed message.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Self::default()
        }
    }

    /// The message type, or `unknown` when not yet known.
    #[must_use]
    pub fn type_or_unknown(&self) -> &str {
        self.type_.as_deref().unwrap_or("unknown")
    }
}

/// Result of a single handler.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The handler dealt with the message; the chain stops here.
    Handled(Message),

    /// The handler passed on the message; the chain continues.
    NotHandled(Message),
}

/// A single link in a [`HandlerChain`].
pub trait MessageHandler: Send + Sync {
    /// Handle `message`, or hand it on.
    ///
    /// # Errors
    ///
    /// Returns an error when the message is recognised but cannot be
    /// processed. Errors end the chain.
    fn handle<'a>(&'a self, message: Message, ctx: &'a Context) -> BoxFuture<'a, Result<Outcome>>;
}

/// An ordered list of message handlers.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn MessageHandler>>,
}

impl HandlerChain {
    /// An empty chain. Every message is unsupported.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain: [`JsonMessageHandler`] then [`TrustPingHandler`].
    #[must_use]
    pub fn standard() -> Self {
        Self::new().handler(JsonMessageHandler).handler(TrustPingHandler)
    }

    /// Append `handler` to the chain.
    #[must_use]
    pub fn handler(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Pass `message` along the chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] when no handler handles the message, or
    /// the first error raised by a handler.
    pub async fn handle(&self, message: Message, ctx: &Context) -> Result<Message> {
        let mut message = message;
        for handler in &self.handlers {
            match handler.handle(message, ctx).await? {
                Outcome::Handled(handled) => return Ok(handled),
                Outcome::NotHandled(next) => message = next,
            }
        }

        tracing::debug!(message_type = %message.type_or_unknown(), "no handler for message");
        Err(Error::Unsupported(message.type_or_unknown().to_string()).into())
    }
}

impl Debug for HandlerChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain").field("handlers", &self.handlers.len()).finish()
    }
}

/// Parses a raw plaintext DIDComm JSON message into typed fields.
///
/// Never handles a message itself. Input that is not a JSON object is passed
/// on untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonMessageHandler;

impl MessageHandler for JsonMessageHandler {
    fn handle<'a>(
        &'a self, mut message: Message, _: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome>> {
        async move {
            let Some(raw) = &message.raw else {
                return Ok(Outcome::NotHandled(message));
            };
            let parsed = match serde_json::from_str::<Message>(raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::debug!("not a plaintext JSON message: {e}");
                    return Ok(Outcome::NotHandled(message));
                }
            };

            message.id = parsed.id;
            message.type_ = parsed.type_;
            message.from = parsed.from;
            message.to = parsed.to;
            message.thid = parsed.thid;
            message.created_time = parsed.created_time;
            message.body = parsed.body;
            message.meta.insert("plaintext".to_string(), Value::Bool(true));

            Ok(Outcome::NotHandled(message))
        }
        .boxed()
    }
}

/// Answers trust pings.
///
/// A ping is always handled. A `ping-response` reply is attached unless the
/// ping's body sets `response_requested` to `false`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrustPingHandler;

impl MessageHandler for TrustPingHandler {
    fn handle<'a>(
        &'a self, mut message: Message, _: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome>> {
        async move {
            if message.type_.as_deref() != Some(TRUST_PING) {
                return Ok(Outcome::NotHandled(message));
            }

            let requested =
                message.body.get("response_requested").and_then(Value::as_bool).unwrap_or(true);
            if requested {
                message.reply = Some(Box::new(Message {
                    id: Some(Uuid::new_v4().to_string()),
                    type_: Some(TRUST_PING_RESPONSE.to_string()),
                    from: message.to.first().cloned(),
                    to: message.from.iter().cloned().collect(),
                    thid: message.id.clone(),
                    created_time: Some(Utc::now().timestamp()),
                    body: json!({}),
                    ..Message::default()
                }));
            }

            Ok(Outcome::Handled(message))
        }
        .boxed()
    }
}

/// Arguments to `handleMessage`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct HandleMessageArgs {
    /// The message as received.
    pub raw: String,
}

/// `handleMessage`
pub struct HandleMessage;

impl Operation for HandleMessage {
    type Args = HandleMessageArgs;
    type Output = Message;

    const DESCRIPTION: &'static str = "Pass a raw message through the handler chain";
    const METHOD: &'static str = "handleMessage";
}

/// Message handling contract marker.
pub struct MessageHandling;

impl Contract for MessageHandling {
    const METHODS: &'static [&'static str] = &[HandleMessage::METHOD];
    const NAME: &'static str = "MessageHandling";
}

/// Typed access to message handling.
pub trait MessageReceiver: Dispatch {
    /// Pass `raw` through the agent's handler chain.
    fn handle_message(
        &self, raw: impl Into<String>,
    ) -> impl Future<Output = Result<Message>> + Send {
        self.call::<HandleMessage>(HandleMessageArgs { raw: raw.into() })
    }
}

impl<T: Dispatch> MessageReceiver for T {}

/// Exposes a [`HandlerChain`] as the `handleMessage` method.
#[derive(Clone, Debug)]
pub struct MessageHandlerPlugin {
    chain: Arc<HandlerChain>,
}

impl Default for MessageHandlerPlugin {
    fn default() -> Self {
        Self::new(HandlerChain::standard())
    }
}

impl MessageHandlerPlugin {
    /// Wrap `chain`.
    #[must_use]
    pub fn new(chain: HandlerChain) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }

    /// The plugin to register with an agent.
    #[must_use]
    pub fn plugin(&self) -> Plugin {
        let chain = Arc::clone(&self.chain);

        Plugin::build("message-handler")
            .operation::<HandleMessage, _, _>(move |args, ctx| {
                let chain = Arc::clone(&chain);
                async move {
                    let message = chain.handle(Message::from_raw(args.raw), &ctx).await?;
                    ctx.agent().emit(VALIDATED_MESSAGE_EVENT, serde_json::to_value(&message)?);
                    Ok::<_, anyhow::Error>(message)
                }
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Agent;

    struct Reject;

    impl MessageHandler for Reject {
        fn handle<'a>(&'a self, _: Message, _: &'a Context) -> BoxFuture<'a, Result<Outcome>> {
            async { Err(anyhow::anyhow!("rejected")) }.boxed()
        }
    }

    fn context() -> Context {
        let agent = Agent::build().build().expect("should build");
        Context::new(&agent, Map::new()).expect("should create context")
    }

    fn ping(response_requested: bool) -> String {
        json!({
            "id": "ping-1",
            "type": TRUST_PING,
            "from": "did:key:alice",
            "to": ["did:key:bob"],
            "body": {"response_requested": response_requested},
        })
        .to_string()
    }

    #[tokio::test]
    async fn trust_ping_reply() {
        let handled = HandlerChain::standard()
            .handle(Message::from_raw(ping(true)), &context())
            .await
            .expect("should handle");

        let reply = handled.reply.expect("should reply");
        assert_eq!(reply.type_.as_deref(), Some(TRUST_PING_RESPONSE));
        assert_eq!(reply.thid.as_deref(), Some("ping-1"));
        assert_eq!(reply.from.as_deref(), Some("did:key:bob"));
        assert_eq!(reply.to, ["did:key:alice"]);
        assert_eq!(handled.meta.get("plaintext"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn trust_ping_without_reply() {
        let handled = HandlerChain::standard()
            .handle(Message::from_raw(ping(false)), &context())
            .await
            .expect("should handle");
        assert!(handled.reply.is_none());
    }

    #[tokio::test]
    async fn unsupported_type() {
        let raw = json!({"id": "1", "type": "https://example.com/unknown"}).to_string();
        let err = HandlerChain::standard()
            .handle(Message::from_raw(raw), &context())
            .await
            .expect_err("should be unsupported");

        assert_eq!(
            Error::kind(&err),
            Some(&Error::Unsupported("https://example.com/unknown".to_string()))
        );
    }

    #[tokio::test]
    async fn not_json() {
        let err = HandlerChain::standard()
            .handle(Message::from_raw("not json"), &context())
            .await
            .expect_err("should be unsupported");
        assert_eq!(Error::kind(&err), Some(&Error::Unsupported("unknown".to_string())));
    }

    #[tokio::test]
    async fn handler_error_stops_chain() {
        let err = HandlerChain::new()
            .handler(JsonMessageHandler)
            .handler(Reject)
            .handler(TrustPingHandler)
            .handle(Message::from_raw(ping(true)), &context())
            .await
            .expect_err("should be rejected");

        assert_eq!(err.to_string(), "rejected");
        assert!(Error::kind(&err).is_none());
    }
}
