//! # Keyring
//!
//! An in-memory ed25519 key manager, exposed to an agent as a plugin
//! supplying the key management methods.
//!
//! ```rust,ignore
//! let keyring = Keyring::new();
//! let agent = Agent::build().plugin(keyring.plugin()).build()?;
//! let key = agent.key_manager_create(CreateKeyArgs::default()).await?;
//! ```
//!
//! Keys live only as long as the `Keyring` (and its clones) do.

mod keyring;

pub use self::keyring::{Keyring, KeyringError};
