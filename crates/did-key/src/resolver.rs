//! # DID Key Resolution
//!
//! A `did:key` DID document is derived entirely from the DID itself, so any
//! well-formed `did:key` resolves whether or not it is managed here.

use anyhow::Result;
use credibil_agent::contracts::{
    DidDocument, DocumentMetadata, Identifier, RESOLUTION_CONTEXT, Resolution, ResolutionMetadata,
    VerificationMethod,
};
use dashmap::DashMap;

use crate::{DidKeyError, public_key};

const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
const ED25519_2020_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";
const CONTENT_TYPE: &str = "application/did+ld+json";

/// Resolve a `did:key` DID or DID URL.
///
/// A `did:key` whose key cannot be decoded resolves to a [`Resolution`]
/// carrying the `invalidDid` error.
///
/// # Errors
///
/// Returns [`DidKeyError::InvalidDid`] when `did_url` is not a DID, and
/// [`DidKeyError::UnsupportedMethod`] when it uses another DID method.
pub fn resolve(did_url: &str) -> Result<Resolution> {
    resolve_with(did_url, &DashMap::new())
}

// Resolve, adding document metadata when the DID is managed.
pub(crate) fn resolve_with(
    did_url: &str, identifiers: &DashMap<String, Identifier>,
) -> Result<Resolution> {
    let did = did_url.split(['#', '?']).next().unwrap_or_default();

    let mut parts = did.splitn(3, ':');
    let (Some("did"), Some(method), Some(multikey)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(DidKeyError::InvalidDid(did_url.to_string()).into());
    };
    if method != "key" {
        return Err(DidKeyError::UnsupportedMethod(format!("did:{method}")).into());
    }
    if let Err(e) = public_key(multikey) {
        tracing::debug!(did = %did, "invalid did:key: {e}");
        return Ok(Resolution::error("invalidDid"));
    }

    let kid = format!("{did}#{multikey}");
    let document = DidDocument {
        context: vec![DID_CONTEXT.to_string(), ED25519_2020_CONTEXT.to_string()],
        id: did.to_string(),
        verification_method: vec![VerificationMethod {
            id: kid.clone(),
            type_: "Ed25519VerificationKey2020".to_string(),
            controller: did.to_string(),
            public_key_multibase: multikey.to_string(),
        }],
        authentication: vec![kid.clone()],
        assertion_method: vec![kid.clone()],
        capability_invocation: vec![kid.clone()],
        capability_delegation: vec![kid],
    };

    let metadata = identifiers.get(did).map(|i| DocumentMetadata {
        created: Some(i.created.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        ..DocumentMetadata::default()
    });

    Ok(Resolution {
        context: RESOLUTION_CONTEXT.to_string(),
        did_document: Some(document),
        did_document_metadata: metadata,
        did_resolution_metadata: ResolutionMetadata {
            content_type: Some(CONTENT_TYPE.to_string()),
            error: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIKEY: &str = "z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK";
    const DID: &str = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK";

    #[test]
    fn resolves_document() {
        let resolution = resolve(&format!("{DID}#key-1")).expect("should resolve");
        let document = resolution.did_document.expect("should have document");

        assert_eq!(document.id, DID);
        assert_eq!(document.verification_method[0].id, format!("{DID}#{MULTIKEY}"));
        assert_eq!(document.authentication, [document.verification_method[0].id.clone()]);
        assert!(resolution.did_document_metadata.is_none());
    }

    #[test]
    fn invalid_key() {
        let resolution = resolve("did:key:z6Mk").expect("should resolve");
        assert!(resolution.did_document.is_none());
        assert_eq!(resolution.did_resolution_metadata.error.as_deref(), Some("invalidDid"));
    }

    #[test]
    fn other_methods() {
        let err = resolve("did:web:example.com").expect_err("should be unsupported");
        assert_eq!(
            err.downcast_ref::<DidKeyError>(),
            Some(&DidKeyError::UnsupportedMethod("did:web".to_string()))
        );

        let err = resolve("example.com").expect_err("should be invalid");
        assert!(matches!(err.downcast_ref::<DidKeyError>(), Some(DidKeyError::InvalidDid(_))));
    }
}
