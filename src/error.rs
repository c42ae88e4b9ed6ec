//! # Agent Errors
//!
//! Errors owned by the dispatcher itself. Everything an Implementation returns
//! travels through the agent untouched as the original [`anyhow::Error`], so
//! plugin-defined error types can still be matched with `downcast_ref`. Only
//! configuration, lookup and validation failures are dispatcher types, and
//! they are carried inside an [`anyhow::Error`] as an [`Error`].

use thiserror::Error;

/// Log an error and return it from the enclosing function.
///
/// # Example
/// ```
/// use credibil_agent::{Error, tracerr};
///
/// fn lookup(method: &str) -> anyhow::Result<()> {
///     tracerr!(Error::MethodNotFound(method.to_string()), "no such method: {method}")
/// }
/// assert!(lookup("nope").is_err());
/// ```
#[macro_export]
macro_rules! tracerr {
    // with context
    ($err:expr, $($msg:tt)*) => {
        {
        tracing::error!($($msg)*);
        return Err(anyhow::Error::from($err));
        }
    };
    // no context
    ($err:expr) => {
        {
        let err = $err;
        tracing::error!("{err}");
        return Err(anyhow::Error::from(err));
        }
    }
}

/// Dispatcher errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The agent could not be constructed, or a call supplied context the
    /// agent cannot accept.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No registered plugin supplies the requested method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Arguments did not satisfy the method's argument schema.
    #[error("invalid arguments for {method}: {}", reasons.join("; "))]
    InvalidArgs {
        /// The method called.
        method: String,

        /// Each schema violation found.
        reasons: Vec<String>,
    },

    /// No message handler accepted the message.
    #[error("unsupported message type: {0}")]
    Unsupported(String),
}

/// Causes of a failed agent configuration.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Two plugins supply the same method and no override was declared.
    #[error("method {method} is provided by both {first} and {second}")]
    MethodCollision {
        /// The colliding method name.
        method: String,

        /// Plugin that registered the method first.
        first: String,

        /// Plugin that attempted to register it again.
        second: String,
    },

    /// Extra context attempted to set a reserved key.
    #[error("context key '{0}' is reserved")]
    ReservedContextKey(String),

    /// A required contract is not covered by the registered plugins.
    #[error("contract {contract} requires method {method}, which no plugin provides")]
    MissingCapability {
        /// Contract name.
        contract: String,

        /// The first method found missing.
        method: String,
    },

    /// A method's argument schema could not be compiled.
    #[error("invalid schema for {method}: {reason}")]
    InvalidSchema {
        /// Method the schema belongs to.
        method: String,

        /// Compiler message.
        reason: String,
    },

    /// An override names a method no plugin supplies.
    #[error("override for {0} does not match any registered method")]
    UnknownOverride(String),
}

impl Error {
    /// Find the dispatcher error carried by `err`, if any.
    ///
    /// Returns `None` for errors raised by an Implementation.
    #[must_use]
    pub fn kind(err: &anyhow::Error) -> Option<&Self> {
        err.downcast_ref::<Self>()
    }

    /// Stable, machine-readable code for the error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::MethodNotFound(_) => "method_not_found",
            Self::InvalidArgs { .. } => "invalid_args",
            Self::Unsupported(_) => "unsupported",
        }
    }

    /// Whether the error is a [`ConfigurationError`].
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether the error is [`Error::MethodNotFound`].
    #[must_use]
    pub const fn is_method_not_found(&self) -> bool {
        matches!(self, Self::MethodNotFound(_))
    }
}

/// Render any error returned by the agent in `OAuth2` style.
///
/// Dispatcher errors use their [`Error::code`]; Implementation errors use the
/// root cause.
#[must_use]
pub fn to_json(err: &anyhow::Error) -> serde_json::Value {
    let code =
        Error::kind(err).map_or_else(|| err.root_cause().to_string(), |e| e.code().to_string());
    serde_json::json!({
        "error": code,
        "error_description": err.to_string(),
    })
}
