//! # DID Key Management
//!
//! Create, read and delete managed `did:key` identifiers.

use std::future::ready;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use credibil_agent::contracts::{
    CreateDidArgs, CreateKeyArgs, Deleted, DidManagerCreate, DidManagerDelete, DidManagerFind,
    DidManagerGet, FindDidArgs, Identifier, KeyManager, KeyType, ResolveDid,
};
use credibil_agent::Plugin;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::{DidKeyError, PROVIDER, multikey, resolver};

/// `did:key` DID manager and resolver.
///
/// Clones share the same identifier store.
#[derive(Clone, Debug, Default)]
pub struct DidKey {
    identifiers: Arc<DashMap<String, Identifier>>,
    aliases: Arc<DashMap<String, ()>>,
}

impl DidKey {
    /// Create an empty DID manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugin exposing `did:key` management and resolution.
    #[must_use]
    pub fn plugin(&self) -> Plugin {
        let (create, get) = (self.clone(), self.clone());
        let (find, delete, resolve) = (self.clone(), self.clone(), self.clone());

        Plugin::build("did-key")
            .operation::<DidManagerCreate, _, _>(move |args, ctx| {
                let manager = create.clone();
                async move { manager.create(args, &ctx).await }
            })
            .operation::<DidManagerGet, _, _>(move |args, _| ready(get.get(&args.did)))
            .operation::<DidManagerFind, _, _>(move |args, _| {
                ready(Ok::<_, anyhow::Error>(find.find(&args)))
            })
            .operation::<DidManagerDelete, _, _>(move |args, ctx| {
                let manager = delete.clone();
                async move { manager.delete(&args.did, &ctx).await }
            })
            .operation::<ResolveDid, _, _>(move |args, _| {
                ready(resolver::resolve_with(&args.did_url, &resolve.identifiers))
            })
            .build()
    }

    /// Create a DID, asking the agent's key manager for its controlling key.
    ///
    /// The alias is claimed before the key manager is called and released if
    /// creation fails.
    ///
    /// # Errors
    ///
    /// Returns [`DidKeyError::UnsupportedMethod`] when the provider is not
    /// `did:key`, [`DidKeyError::AliasExists`] when the alias is in use, or
    /// whatever error the key manager raised.
    pub async fn create(&self, args: CreateDidArgs, ctx: &impl KeyManager) -> Result<Identifier> {
        if args.provider != PROVIDER {
            return Err(DidKeyError::UnsupportedMethod(args.provider).into());
        }
        if let Some(alias) = &args.alias {
            self.claim_alias(alias)?;
        }

        let alias = args.alias;
        let result = self.generate(alias.clone(), ctx).await;
        if let (Err(_), Some(alias)) = (&result, &alias) {
            self.aliases.remove(alias);
        }
        result
    }

    fn claim_alias(&self, alias: &str) -> Result<()> {
        match self.aliases.entry(alias.to_string()) {
            Entry::Occupied(_) => Err(DidKeyError::AliasExists(alias.to_string()).into()),
            Entry::Vacant(entry) => {
                entry.insert(());
                Ok(())
            }
        }
    }

    async fn generate(&self, alias: Option<String>, ctx: &impl KeyManager) -> Result<Identifier> {
        let key = ctx
            .key_manager_create(CreateKeyArgs {
                key_type: KeyType::Ed25519,
                alias: None,
            })
            .await?;

        let did = match multikey(&key.public_key) {
            Ok(multikey) => format!("did:key:{multikey}"),
            Err(e) => {
                // the key cannot back a DID so is not kept
                if let Err(cleanup) = ctx.key_manager_delete(&key.kid).await {
                    tracing::warn!(kid = %key.kid, "failed to delete unusable key: {cleanup}");
                }
                return Err(e);
            }
        };

        let identifier = Identifier {
            did: did.clone(),
            alias,
            provider: PROVIDER.to_string(),
            controller_key_id: key.kid.clone(),
            keys: vec![key],
            created: Utc::now(),
        };
        self.identifiers.insert(did.clone(), identifier.clone());

        tracing::debug!(did = %did, "DID created");
        Ok(identifier)
    }

    /// A managed DID.
    ///
    /// # Errors
    ///
    /// Returns [`DidKeyError::NotFound`] if the DID is not managed here.
    pub fn get(&self, did: &str) -> Result<Identifier> {
        self.identifiers
            .get(did)
            .map(|i| i.clone())
            .ok_or_else(|| DidKeyError::NotFound(did.to_string()).into())
    }

    /// Managed DIDs matching `args`, oldest first.
    #[must_use]
    pub fn find(&self, args: &FindDidArgs) -> Vec<Identifier> {
        let mut found: Vec<Identifier> = self
            .identifiers
            .iter()
            .filter(|i| args.alias.is_none() || i.alias == args.alias)
            .filter(|i| args.provider.is_none() || args.provider.as_ref() == Some(&i.provider))
            .map(|i| i.clone())
            .collect();
        found.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.did.cmp(&b.did)));
        found
    }

    /// Delete a managed DID along with its keys.
    ///
    /// The DID stays managed until every key has been deleted, so a failed
    /// delete can be retried.
    ///
    /// # Errors
    ///
    /// Returns whatever error the key manager raised while deleting keys.
    pub async fn delete(&self, did: &str, ctx: &impl KeyManager) -> Result<Deleted> {
        let Some(identifier) = self.identifiers.get(did).map(|i| i.clone()) else {
            return Ok(Deleted { deleted: false });
        };
        for key in &identifier.keys {
            ctx.key_manager_delete(&key.kid).await?;
        }

        if self.identifiers.remove(did).is_none() {
            return Ok(Deleted { deleted: false });
        }
        if let Some(alias) = &identifier.alias {
            self.aliases.remove(alias);
        }

        tracing::debug!(did = %did, "DID deleted");
        Ok(Deleted { deleted: true })
    }
}
