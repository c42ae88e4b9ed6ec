//! # Credibil Agent
//!
//! Composes independently authored capability modules ("plugins") into a
//! single agent. Application code builds a list of [`Plugin`]s and hands them
//! to an [`Agent`]. The agent merges every plugin's methods into one registry,
//! refusing to start when two plugins claim the same method name, and
//! dispatches calls by name.
//!
//! Every call receives a fresh [`Context`] carrying a handle to the agent, so
//! plugins reach each other through the agent rather than through direct
//! references:
//!
//! ```
//! use credibil_agent::{Agent, Plugin};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let outer = Plugin::build("outer")
//!     .method("a", |_, ctx| async move { ctx.agent().execute("b", json!({})).await })
//!     .build();
//! let inner = Plugin::build("inner").method("b", |_, _| async { Ok(json!(42)) }).build();
//!
//! let agent = Agent::build().plugin(outer).plugin(inner).build().expect("should build");
//! assert_eq!(agent.execute("a", json!({})).await.expect("should execute"), json!(42));
//! # });
//! ```
//!
//! # Design
//!
//! ** Capability contracts **
//!
//! A contract is a Rust trait describing a cohesive set of operations (see
//! [`contracts`]). Contract traits are implemented for anything that can
//! [`Dispatch`] a call, so `agent.key_manager_sign(args)` is typed sugar over
//! `agent.execute("keyManagerSign", args)` with identical semantics.
//!
//! ** Errors **
//!
//! Implementation errors pass through the agent as the original
//! [`anyhow::Error`]. Only the dispatcher's own failures are typed as
//! [`Error`].
//!
//! ** Events **
//!
//! Each agent owns an [`EventBus`] for lifecycle notifications. A failing
//! listener never affects the emitter or the remaining listeners.

pub mod contracts;
pub mod handlers;
pub mod message;

mod agent;
mod capability;
mod config;
mod context;
mod error;
mod events;
mod plugin;
mod registry;
mod schema;

pub use self::agent::{Agent, AgentBuilder};
pub use self::capability::{Contract, Dispatch, Operation};
pub use self::config::{AgentConfig, AgentOptions};
pub use self::context::{Context, RESERVED_CONTEXT_KEY};
pub use self::error::{ConfigurationError, Error, to_json};
pub use self::events::{ERROR_EVENT, Event, EventBus, Listener};
pub use self::plugin::{Implementation, Method, Plugin, PluginBuilder};
pub use self::registry::Registry;
pub use self::schema::{AgentSchema, MethodDescriptor, MethodSchema};
