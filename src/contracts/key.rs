//! # Key Manager
//!
//! Create, look up, delete and sign with managed keys.

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Contract, Dispatch, Operation};

/// Supported key types.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum KeyType {
    /// Ed25519 signing key.
    #[default]
    Ed25519,
}

/// Arguments to `keyManagerCreate`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyArgs {
    /// Type of key to generate.
    #[serde(default)]
    pub key_type: KeyType,

    /// Key ID to use. When omitted the key manager chooses one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A key held by a key manager. Only public material is exposed.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedKey {
    /// Key identifier.
    pub kid: String,

    /// Key type.
    pub key_type: KeyType,

    /// Public key bytes, base64url encoded without padding.
    pub public_key: String,

    /// When the key was created.
    pub created: DateTime<Utc>,
}

/// Identifies a single key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct KeyRef {
    /// Key identifier.
    pub kid: String,
}

/// Arguments to `keyManagerSign`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SignArgs {
    /// Key to sign with.
    pub kid: String,

    /// Data to sign, base64url encoded without padding.
    pub data: String,
}

/// Output of `keyManagerSign`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Signature {
    /// Key that produced the signature.
    pub kid: String,

    /// Signature bytes, base64url encoded without padding.
    pub signature: String,
}

/// Arguments to `keyManagerListKeys`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ListKeysArgs {}

/// Result of a delete operation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Deleted {
    /// Whether anything was removed.
    pub deleted: bool,
}

/// `keyManagerCreate`
pub struct KeyManagerCreate;

impl Operation for KeyManagerCreate {
    type Args = CreateKeyArgs;
    type Output = ManagedKey;

    const DESCRIPTION: &'static str = "Generate a new key";
    const METHOD: &'static str = "keyManagerCreate";
}

/// `keyManagerGet`
pub struct KeyManagerGet;

impl Operation for KeyManagerGet {
    type Args = KeyRef;
    type Output = ManagedKey;

    const DESCRIPTION: &'static str = "Fetch the public part of a key";
    const METHOD: &'static str = "keyManagerGet";
}

/// `keyManagerDelete`
pub struct KeyManagerDelete;

impl Operation for KeyManagerDelete {
    type Args = KeyRef;
    type Output = Deleted;

    const DESCRIPTION: &'static str = "Delete a key";
    const METHOD: &'static str = "keyManagerDelete";
}

/// `keyManagerSign`
pub struct KeyManagerSign;

impl Operation for KeyManagerSign {
    type Args = SignArgs;
    type Output = Signature;

    const DESCRIPTION: &'static str = "Sign data with a managed key";
    const METHOD: &'static str = "keyManagerSign";
}

/// `keyManagerListKeys`
pub struct KeyManagerListKeys;

impl Operation for KeyManagerListKeys {
    type Args = ListKeysArgs;
    type Output = Vec<ManagedKey>;

    const DESCRIPTION: &'static str = "List all managed keys";
    const METHOD: &'static str = "keyManagerListKeys";
}

/// Key management contract marker.
pub struct KeyManagement;

impl Contract for KeyManagement {
    const METHODS: &'static [&'static str] = &[
        KeyManagerCreate::METHOD,
        KeyManagerGet::METHOD,
        KeyManagerDelete::METHOD,
        KeyManagerSign::METHOD,
        KeyManagerListKeys::METHOD,
    ];
    const NAME: &'static str = "KeyManager";
}

/// Typed access to the key management methods.
pub trait KeyManager: Dispatch {
    /// Generate a new key.
    fn key_manager_create(
        &self, args: CreateKeyArgs,
    ) -> impl Future<Output = Result<ManagedKey>> + Send {
        self.call::<KeyManagerCreate>(args)
    }

    /// Fetch the public part of a key.
    fn key_manager_get(
        &self, kid: impl Into<String>,
    ) -> impl Future<Output = Result<ManagedKey>> + Send {
        self.call::<KeyManagerGet>(KeyRef { kid: kid.into() })
    }

    /// Delete a key.
    fn key_manager_delete(
        &self, kid: impl Into<String>,
    ) -> impl Future<Output = Result<Deleted>> + Send {
        self.call::<KeyManagerDelete>(KeyRef { kid: kid.into() })
    }

    /// Sign data with a managed key.
    fn key_manager_sign(&self, args: SignArgs) -> impl Future<Output = Result<Signature>> + Send {
        self.call::<KeyManagerSign>(args)
    }

    /// List all managed keys.
    fn key_manager_list_keys(&self) -> impl Future<Output = Result<Vec<ManagedKey>>> + Send {
        self.call::<KeyManagerListKeys>(ListKeysArgs {})
    }
}

impl<T: Dispatch> KeyManager for T {}
