//! # DID Manager
//!
//! Create and look up the decentralized identifiers an agent controls.

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::contracts::{Deleted, ManagedKey};
use crate::{Contract, Dispatch, Operation};

/// Arguments to `didManagerCreate`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CreateDidArgs {
    /// DID method provider, e.g. `did:key`.
    pub provider: String,

    /// Optional human-readable alias. Unique per provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A DID managed by the agent, with the keys that control it.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    /// The DID.
    pub did: String,

    /// Alias given at creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Provider that created the DID.
    pub provider: String,

    /// ID of the key controlling the DID.
    pub controller_key_id: String,

    /// Keys associated with the DID.
    pub keys: Vec<ManagedKey>,

    /// When the DID was created.
    pub created: DateTime<Utc>,
}

/// Arguments to `didManagerGet` and `didManagerDelete`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DidRef {
    /// The DID.
    pub did: String,
}

/// Arguments to `didManagerFind`. Unset fields match anything.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct FindDidArgs {
    /// Match on alias.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Match on provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// `didManagerCreate`
pub struct DidManagerCreate;

impl Operation for DidManagerCreate {
    type Args = CreateDidArgs;
    type Output = Identifier;

    const DESCRIPTION: &'static str = "Create a DID and its controlling key";
    const METHOD: &'static str = "didManagerCreate";
}

/// `didManagerGet`
pub struct DidManagerGet;

impl Operation for DidManagerGet {
    type Args = DidRef;
    type Output = Identifier;

    const DESCRIPTION: &'static str = "Fetch a managed DID";
    const METHOD: &'static str = "didManagerGet";
}

/// `didManagerFind`
pub struct DidManagerFind;

impl Operation for DidManagerFind {
    type Args = FindDidArgs;
    type Output = Vec<Identifier>;

    const DESCRIPTION: &'static str = "Find managed DIDs by alias or provider";
    const METHOD: &'static str = "didManagerFind";
}

/// `didManagerDelete`
pub struct DidManagerDelete;

impl Operation for DidManagerDelete {
    type Args = DidRef;
    type Output = Deleted;

    const DESCRIPTION: &'static str = "Delete a managed DID and its keys";
    const METHOD: &'static str = "didManagerDelete";
}

/// DID management contract marker.
pub struct DidManagement;

impl Contract for DidManagement {
    const METHODS: &'static [&'static str] = &[
        DidManagerCreate::METHOD,
        DidManagerGet::METHOD,
        DidManagerFind::METHOD,
        DidManagerDelete::METHOD,
    ];
    const NAME: &'static str = "DidManager";
}

/// Typed access to the DID management methods.
pub trait DidManager: Dispatch {
    /// Create a DID.
    fn did_manager_create(
        &self, args: CreateDidArgs,
    ) -> impl Future<Output = Result<Identifier>> + Send {
        self.call::<DidManagerCreate>(args)
    }

    /// Fetch a managed DID.
    fn did_manager_get(
        &self, did: impl Into<String>,
    ) -> impl Future<Output = Result<Identifier>> + Send {
        self.call::<DidManagerGet>(DidRef { did: did.into() })
    }

    /// Find managed DIDs.
    fn did_manager_find(
        &self, args: FindDidArgs,
    ) -> impl Future<Output = Result<Vec<Identifier>>> + Send {
        self.call::<DidManagerFind>(args)
    }

    /// Delete a managed DID.
    fn did_manager_delete(
        &self, did: impl Into<String>,
    ) -> impl Future<Output = Result<Deleted>> + Send {
        self.call::<DidManagerDelete>(DidRef { did: did.into() })
    }
}

impl<T: Dispatch> DidManager for T {}
