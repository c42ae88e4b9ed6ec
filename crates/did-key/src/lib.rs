//! # DID Key
//!
//! A `did:key` DID manager and resolver, exposed to an agent as a plugin.
//!
//! The DID manager never holds key material. It asks whichever plugin supplies
//! `keyManagerCreate` for a new key, through the per-call context, and derives
//! the DID from the public key.
//!
//! See <https://w3c-ccg.github.io/did-method-key>

mod manager;
mod resolver;

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use multibase::Base;
use thiserror::Error;

pub use self::manager::DidKey;
pub use self::resolver::resolve;

/// Provider name accepted by `didManagerCreate`.
pub const PROVIDER: &str = "did:key";

/// Multicodec prefix for an Ed25519 public key.
pub const ED25519_CODEC: [u8; 2] = [0xed, 0x01];

/// `did:key` errors. These pass through the agent unchanged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DidKeyError {
    /// The DID or provider is not `did:key`.
    #[error("unsupported DID method: {0}")]
    UnsupportedMethod(String),

    /// The value is not a DID.
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    /// Another managed DID already uses the alias.
    #[error("alias already in use: {0}")]
    AliasExists(String),

    /// The DID is not managed here.
    #[error("DID not found: {0}")]
    NotFound(String),
}

/// Multibase (base58btc) encoding of a base64url-encoded Ed25519 public key,
/// prefixed with the Ed25519 multicodec.
///
/// # Errors
///
/// Returns an error if the key is not base64url encoded or not 32 bytes long.
pub fn multikey(public_key: &str) -> Result<String> {
    let key_bytes = Base64UrlUnpadded::decode_vec(public_key)
        .map_err(|e| anyhow!("issue decoding key: {e}"))?;
    if key_bytes.len() != 32 {
        return Err(anyhow!("public key is not 32 bytes"));
    }

    let mut multi_bytes = ED25519_CODEC.to_vec();
    multi_bytes.extend_from_slice(&key_bytes);
    Ok(multibase::encode(Base::Base58Btc, &multi_bytes))
}

/// Raw public key bytes from a `did:key` multikey.
///
/// # Errors
///
/// Returns an error if `multikey` is not a base58btc-encoded Ed25519 key.
pub fn public_key(multikey: &str) -> Result<Vec<u8>> {
    let (base, multi_bytes) =
        multibase::decode(multikey).map_err(|e| anyhow!("failed to decode multibase key: {e}"))?;
    if base != Base::Base58Btc {
        return Err(anyhow!("multibase base is not Base58Btc"));
    }
    if multi_bytes.len() != ED25519_CODEC.len() + 32 || multi_bytes[..2] != ED25519_CODEC {
        return Err(anyhow!("key is not an Ed25519 key"));
    }
    Ok(multi_bytes[ED25519_CODEC.len()..].to_vec())
}
