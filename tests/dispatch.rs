//! Tests for method registration and dispatch.

use std::sync::Arc;

use credibil_agent::{
    Agent, AgentConfig, AgentOptions, ConfigurationError, Dispatch, Error, MethodSchema, Plugin,
};
use serde_json::{Value, json};
use tokio::sync::Barrier;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
enum MathError {
    #[error("division by zero")]
    DivideByZero,
}

fn ping() -> Plugin {
    Plugin::build("ping").method("ping", |_, _| async { Ok(json!("pong")) }).build()
}

fn named(plugin: &str, method: &str) -> Plugin {
    let owner = plugin.to_string();
    Plugin::build(plugin)
        .method(method, move |_, _| {
            let owner = owner.clone();
            async move { Ok(json!(owner)) }
        })
        .build()
}

fn math() -> Plugin {
    Plugin::build("math")
        .method("divide", |args, _| async move {
            let (a, b) = (args["a"].as_i64().unwrap_or_default(), args["b"].as_i64().unwrap_or(1));
            if b == 0 {
                return Err(anyhow::Error::from(MathError::DivideByZero));
            }
            Ok(json!(a / b))
        })
        .build()
}

fn relay() -> Plugin {
    Plugin::build("relay")
        .method("relay", |args, ctx| async move { ctx.agent().execute("divide", args).await })
        .build()
}

fn ledger(arguments: Value) -> Plugin {
    let schema = MethodSchema {
        description: Some("Move an amount between accounts".to_string()),
        arguments: Some(arguments),
        return_type: None,
    };
    Plugin::build("ledger")
        .method_with_schema("transfer", schema, |args, _| async move { Ok(args) })
        .build()
}

// A single plugin's method is dispatched by name and listed.
#[tokio::test]
async fn single_plugin() {
    let agent = Agent::build().plugin(ping()).build().expect("should build");

    assert_eq!(agent.execute("ping", json!({})).await.expect("should execute"), json!("pong"));
    assert_eq!(agent.available_methods(), ["ping"]);
}

// Two plugins supplying the same method cannot be combined.
#[test]
fn collision_fails() {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let err = Agent::build()
        .plugin(named("first", "ping"))
        .plugin(named("second", "ping"))
        .build()
        .expect_err("should collide");

    assert_eq!(
        Error::kind(&err),
        Some(&Error::Configuration(ConfigurationError::MethodCollision {
            method: "ping".to_string(),
            first: "first".to_string(),
            second: "second".to_string(),
        }))
    );
    let message = err.to_string();
    assert!(message.contains("ping") && message.contains("first") && message.contains("second"));
}

// An explicit override keeps the first plugin's implementation.
#[tokio::test]
async fn override_is_explicit() {
    let agent = Agent::build()
        .plugin(named("first", "ping"))
        .plugin(named("second", "ping"))
        .override_method("ping")
        .build()
        .expect("should build");

    for _ in 0..3 {
        assert_eq!(agent.execute("ping", json!({})).await.expect("should execute"), "first");
    }
    assert_eq!(agent.method_owner("ping"), Some("first"));
    assert_eq!(agent.available_methods(), ["ping"]);
}

// Overrides can also come from declarative configuration.
#[tokio::test]
async fn override_from_config() {
    let options = AgentOptions::from_json(r#"{"overrides": ["ping"]}"#).expect("should parse");
    let config = AgentConfig {
        plugins: vec![named("first", "ping"), named("second", "ping")],
        options,
    };
    let agent = Agent::new(config).expect("should build");

    assert_eq!(agent.execute("ping", json!({})).await.expect("should execute"), "first");
}

// Calls between plugins go through the agent carried by the context.
#[tokio::test]
async fn nested_call() {
    let outer = Plugin::build("outer")
        .method("a", |_, ctx| async move { ctx.agent().execute("b", json!({})).await })
        .build();
    let inner = Plugin::build("inner").method("b", |_, _| async { Ok(json!(42)) }).build();

    let agent = Agent::build().plugin(outer).plugin(inner).build().expect("should build");
    assert_eq!(agent.execute("a", json!({})).await.expect("should execute"), json!(42));
}

// Unknown methods are rejected, never resolved.
#[tokio::test]
async fn unknown_method() {
    let agent = Agent::build().plugin(ping()).build().expect("should build");

    let err = agent.execute("doesNotExist", json!({})).await.expect_err("should not exist");
    assert!(Error::kind(&err).is_some_and(Error::is_method_not_found));
    assert!(err.to_string().contains("doesNotExist"));

    let empty = Agent::build().build().expect("should build");
    assert!(empty.available_methods().is_empty());
    assert!(empty.execute("ping", json!({})).await.is_err());
}

// A relayed call returns exactly what a direct call returns, errors included.
#[tokio::test]
async fn relayed_call_matches_direct() {
    let agent = Agent::build().plugin(math()).plugin(relay()).build().expect("should build");

    let args = json!({"a": 84, "b": 2});
    let direct = agent.execute("divide", args.clone()).await.expect("should divide");
    let relayed = agent.execute("relay", args).await.expect("should relay");
    assert_eq!(direct, relayed);

    let args = json!({"a": 1, "b": 0});
    let direct = agent.execute("divide", args.clone()).await.expect_err("should fail");
    let relayed = agent.execute("relay", args).await.expect_err("should fail");
    assert_eq!(direct.downcast_ref::<MathError>(), Some(&MathError::DivideByZero));
    assert_eq!(relayed.downcast_ref::<MathError>(), Some(&MathError::DivideByZero));
    assert_eq!(direct.to_string(), relayed.to_string());

    let relayed_missing = Plugin::build("missing")
        .method("call_missing", |_, ctx| async move {
            ctx.agent().execute("nope", json!({})).await
        })
        .build();
    let agent = Agent::build().plugin(relayed_missing).build().expect("should build");
    let err = agent.execute("call_missing", json!({})).await.expect_err("should fail");
    assert_eq!(Error::kind(&err), Some(&Error::MethodNotFound("nope".to_string())));
}

// Concurrent calls to the same method each see their own context.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contexts_are_isolated() {
    let barrier = Arc::new(Barrier::new(2));
    let plugin = Plugin::build("isolation")
        .method("tag", move |args, mut ctx| {
            let barrier = Arc::clone(&barrier);
            async move {
                let tag = args["tag"].as_str().unwrap_or_default().to_string();
                ctx.insert(tag.clone(), json!(true))?;

                // both calls have written their tag before either reads
                barrier.wait().await;

                let others: Vec<&String> = ctx.extra().keys().filter(|k| **k != tag).collect();
                Ok(json!({
                    "agent": ctx.agent().id(),
                    "call": ctx.call_id(),
                    "others": others,
                }))
            }
        })
        .build();
    let agent = Agent::build().plugin(plugin).build().expect("should build");

    let (first, second) = tokio::join!(
        agent.execute("tag", json!({"tag": "first"})),
        agent.execute("tag", json!({"tag": "second"}))
    );
    let (first, second) = (first.expect("should execute"), second.expect("should execute"));

    assert_eq!(first["others"], json!([]));
    assert_eq!(second["others"], json!([]));
    assert_eq!(first["agent"], json!(agent.id()));
    assert_eq!(first["agent"], second["agent"]);
    assert_ne!(first["call"], second["call"]);
}

// Request-scoped context is visible to nested calls but not to later calls.
#[tokio::test]
async fn request_context() {
    let plugin = Plugin::build("caller")
        .method("whoami", |_, ctx| async move {
            Ok(ctx.get("caller").cloned().unwrap_or(Value::Null))
        })
        .method("nested", |_, ctx| async move { ctx.execute("whoami", json!({})).await })
        .build();

    let mut base = serde_json::Map::new();
    base.insert("caller".to_string(), json!("anonymous"));
    let agent = Agent::build().plugin(plugin).context(base).build().expect("should build");

    let mut extra = serde_json::Map::new();
    extra.insert("caller".to_string(), json!("did:key:alice"));
    let nested = agent.execute_with("nested", json!({}), extra).await.expect("should execute");
    assert_eq!(nested, "did:key:alice");

    let later = agent.execute("whoami", json!({})).await.expect("should execute");
    assert_eq!(later, "anonymous");
}

// A schema declared on an untyped method is enforced when validation is on.
#[tokio::test]
async fn declared_schema_validates() {
    let arguments = json!({
        "type": "object",
        "properties": {"amount": {"type": "integer", "minimum": 1}},
        "required": ["amount"]
    });
    let agent = Agent::build()
        .plugin(ledger(arguments.clone()))
        .validate_args(true)
        .build()
        .expect("should build");

    let result = agent.execute("transfer", json!({"amount": 5})).await.expect("should execute");
    assert_eq!(result, json!({"amount": 5}));

    let err = agent.execute("transfer", json!({"amount": 0})).await.expect_err("should reject");
    let Some(Error::InvalidArgs { method, reasons }) = Error::kind(&err) else {
        panic!("expected InvalidArgs, got {err}");
    };
    assert_eq!(method, "transfer");
    assert_eq!(reasons.len(), 1);

    let schema = agent.method_schema("transfer").expect("should have schema");
    assert_eq!(schema.description.as_deref(), Some("Move an amount between accounts"));

    // without validation the schema is informational only
    let agent = Agent::build().plugin(ledger(arguments)).build().expect("should build");
    assert!(agent.execute("transfer", json!({"amount": 0})).await.is_ok());
}

// A schema that cannot be compiled stops the agent from being built.
#[test]
fn invalid_schema_fails_build() {
    let err = Agent::build()
        .plugin(ledger(json!({"type": 12})))
        .validate_args(true)
        .build()
        .expect_err("should reject schema");

    let Some(Error::Configuration(ConfigurationError::InvalidSchema { method, .. })) =
        Error::kind(&err)
    else {
        panic!("expected InvalidSchema, got {err}");
    };
    assert_eq!(method, "transfer");

    // schemas are only compiled for validation
    Agent::build().plugin(ledger(json!({"type": 12}))).build().expect("should build");
}
