use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use credibil_agent::Plugin;
use credibil_agent::contracts::{
    CreateKeyArgs, Deleted, KeyManagerCreate, KeyManagerDelete, KeyManagerGet, KeyManagerListKeys,
    KeyManagerSign, KeyType, ManagedKey, SignArgs, Signature,
};
use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Keyring errors. These pass through the agent unchanged, so callers can
/// downcast to them.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KeyringError {
    /// No key with the given ID.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A key with the requested ID already exists.
    #[error("key already exists: {0}")]
    KeyExists(String),
}

struct StoredKey {
    // base64url-encoded secret key
    secret: String,
    created: DateTime<Utc>,
}

impl StoredKey {
    fn signing_key(&self) -> Result<SigningKey> {
        let key_bytes = Base64UrlUnpadded::decode_vec(&self.secret)?;
        let secret_key: ed25519_dalek::SecretKey =
            key_bytes.try_into().map_err(|_| anyhow!("invalid secret key"))?;
        Ok(SigningKey::from_bytes(&secret_key))
    }

    fn managed(&self, kid: &str) -> Result<ManagedKey> {
        let verifying_key = self.signing_key()?.verifying_key();
        Ok(ManagedKey {
            kid: kid.to_string(),
            key_type: KeyType::Ed25519,
            public_key: Base64UrlUnpadded::encode_string(verifying_key.as_bytes()),
            created: self.created,
        })
    }
}

/// Ephemeral ed25519 key manager.
///
/// Clones share the same keys.
#[derive(Clone, Default)]
pub struct Keyring {
    keys: Arc<Mutex<HashMap<String, StoredKey>>>,
}

impl Keyring {
    /// Create an empty keyring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugin exposing this keyring's key management methods.
    #[must_use]
    pub fn plugin(&self) -> Plugin {
        let (create, get, delete) = (self.clone(), self.clone(), self.clone());
        let (sign, list) = (self.clone(), self.clone());

        Plugin::build("keyring")
            .operation::<KeyManagerCreate, _, _>(move |args, _| ready(create.create(&args)))
            .operation::<KeyManagerGet, _, _>(move |args, _| ready(get.get(&args.kid)))
            .operation::<KeyManagerDelete, _, _>(move |args, _| ready(delete.delete(&args.kid)))
            .operation::<KeyManagerSign, _, _>(move |args, _| ready(sign.sign(&args)))
            .operation::<KeyManagerListKeys, _, _>(move |_, _| ready(list.list()))
            .build()
    }

    /// Generate a new key.
    ///
    /// The key ID is the requested alias or, when none is given, the
    /// base64url-encoded public key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError::KeyExists`] if the alias is already in use.
    pub fn create(&self, args: &CreateKeyArgs) -> Result<ManagedKey> {
        let signing_key = match args.key_type {
            KeyType::Ed25519 => SigningKey::generate(&mut OsRng),
        };
        let public_key = Base64UrlUnpadded::encode_string(signing_key.verifying_key().as_bytes());
        let kid = args.alias.clone().unwrap_or(public_key);

        let mut keys = self.lock()?;
        if keys.contains_key(&kid) {
            return Err(KeyringError::KeyExists(kid).into());
        }

        let stored = StoredKey {
            secret: Base64UrlUnpadded::encode_string(signing_key.as_bytes()),
            created: Utc::now(),
        };
        let managed = stored.managed(&kid)?;
        keys.insert(kid.clone(), stored);

        tracing::debug!(kid = %kid, "key created");
        Ok(managed)
    }

    /// Public part of the key `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError::KeyNotFound`] if there is no such key.
    pub fn get(&self, kid: &str) -> Result<ManagedKey> {
        let keys = self.lock()?;
        let Some(stored) = keys.get(kid) else {
            return Err(KeyringError::KeyNotFound(kid.to_string()).into());
        };
        stored.managed(kid)
    }

    /// Delete the key `kid`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring lock is poisoned.
    pub fn delete(&self, kid: &str) -> Result<Deleted> {
        let deleted = self.lock()?.remove(kid).is_some();
        tracing::debug!(kid = %kid, deleted, "key deleted");
        Ok(Deleted { deleted })
    }

    /// Sign base64url-encoded data with the key `args.kid`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError::KeyNotFound`] if there is no such key, or an
    /// error if the data is not valid base64url.
    pub fn sign(&self, args: &SignArgs) -> Result<Signature> {
        let data = Base64UrlUnpadded::decode_vec(&args.data)
            .map_err(|e| anyhow!("data is not base64url encoded: {e}"))?;

        let signing_key = {
            let keys = self.lock()?;
            let Some(stored) = keys.get(&args.kid) else {
                return Err(KeyringError::KeyNotFound(args.kid.clone()).into());
            };
            stored.signing_key()?
        };

        Ok(Signature {
            kid: args.kid.clone(),
            signature: Base64UrlUnpadded::encode_string(&signing_key.sign(&data).to_bytes()),
        })
    }

    /// Every key, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring lock is poisoned.
    pub fn list(&self) -> Result<Vec<ManagedKey>> {
        let keys = self.lock()?;
        let mut managed =
            keys.iter().map(|(kid, stored)| stored.managed(kid)).collect::<Result<Vec<_>>>()?;
        managed.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.kid.cmp(&b.kid)));
        Ok(managed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoredKey>>> {
        self.keys.lock().map_err(|_| anyhow!("keyring lock poisoned"))
    }
}

impl Debug for Keyring {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let count = self.keys.lock().map(|k| k.len()).unwrap_or_default();
        f.debug_struct("Keyring").field("keys", &count).finish()
    }
}
