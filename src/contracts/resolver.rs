//! # DID Resolver
//!
//! Resolution of a DID to its DID document and associated metadata.

use std::future::Future;

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Contract, Dispatch, Operation};

/// Context URL of a DID resolution result.
pub const RESOLUTION_CONTEXT: &str = "https://w3id.org/did-resolution/v1";

/// Arguments to `resolveDid`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolveDidArgs {
    /// DID or DID URL to resolve.
    pub did_url: String,
}

/// Return type from a DID resolution.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Resolution context, e.g. "<https://w3id.org/did-resolution/v1>".
    #[serde(rename = "@context")]
    pub context: String,

    /// The DID document, absent when resolution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document: Option<DidDocument>,

    /// Metadata about the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document_metadata: Option<DocumentMetadata>,

    /// Metadata about the resolution itself.
    pub did_resolution_metadata: ResolutionMetadata,
}

impl Resolution {
    /// A resolution that failed with `error`, such as `notFound` or
    /// `invalidDid`.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            context: RESOLUTION_CONTEXT.to_string(),
            did_document: None,
            did_document_metadata: None,
            did_resolution_metadata: ResolutionMetadata {
                content_type: None,
                error: Some(error.into()),
            },
        }
    }
}

/// Metadata associated with a DID resolution response.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMetadata {
    /// Content type of the document, e.g. "application/did+ld+json".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Error code when resolution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Metadata associated with a DID document.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Creation time, as an XML datetime normalized to UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// Last update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,

    /// Present and `true` when the DID has been deactivated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
}

/// A DID document.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// JSON-LD context.
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    /// The DID the document describes.
    pub id: String,

    /// Verification methods.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub verification_method: Vec<VerificationMethod>,

    /// Verification method IDs usable for authentication.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authentication: Vec<String>,

    /// Verification method IDs usable for assertions.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub assertion_method: Vec<String>,

    /// Verification method IDs usable to invoke capabilities.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub capability_invocation: Vec<String>,

    /// Verification method IDs usable to delegate capabilities.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub capability_delegation: Vec<String>,
}

/// A public key or other verification material bound to a DID.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// Verification method ID, a DID URL.
    pub id: String,

    /// Verification method type, e.g. `Ed25519VerificationKey2020`.
    #[serde(rename = "type")]
    pub type_: String,

    /// DID of the controller.
    pub controller: String,

    /// Multibase-encoded public key.
    pub public_key_multibase: String,
}

/// `resolveDid`
pub struct ResolveDid;

impl Operation for ResolveDid {
    type Args = ResolveDidArgs;
    type Output = Resolution;

    const DESCRIPTION: &'static str = "Resolve a DID to its document";
    const METHOD: &'static str = "resolveDid";
}

/// DID resolution contract marker.
pub struct DidResolution;

impl Contract for DidResolution {
    const METHODS: &'static [&'static str] = &[ResolveDid::METHOD];
    const NAME: &'static str = "DidResolver";
}

/// Typed access to DID resolution.
pub trait DidResolver: Dispatch {
    /// Resolve `did_url`.
    fn resolve_did(
        &self, did_url: impl Into<String>,
    ) -> impl Future<Output = Result<Resolution>> + Send {
        self.call::<ResolveDid>(ResolveDidArgs {
            did_url: did_url.into(),
        })
    }
}

impl<T: Dispatch> DidResolver for T {}
