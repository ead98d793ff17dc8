/*!
 * Bibliographic service clients.
 *
 * This module contains the interface to the reference manager:
 * - `better_bibtex`: Zotero + Better BibTeX over HTTP (CAYW picker and JSON-RPC)
 * - `mock`: scripted in-memory service used by the tests
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::citation::CiteKey;
use crate::errors::CiteError;

/// Numeric library identifier assigned by the reference manager
pub type CollectionId = i64;

/// A library (group) owning bibliographic items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub id: CollectionId,
}

impl Collection {
    pub fn new(name: impl Into<String>, id: CollectionId) -> Self {
        Self { name: name.into(), id }
    }
}

/// Look up a collection id by name
pub fn find_collection<'a>(collections: &'a [Collection], name: &str) -> Option<&'a Collection> {
    collections.iter().find(|c| c.name == name)
}

/// Common trait for reference manager backends
///
/// Every call is awaited sequentially by the commands; implementations do
/// not need to support concurrent use beyond `Send + Sync`.
#[async_trait]
pub trait BibliographyService: Send + Sync + Debug {
    /// Open the interactive picker and return the chosen keys in order
    ///
    /// Fails with `CiteError::NoSelection` when nothing was chosen.
    async fn pick_keys(&self) -> Result<Vec<CiteKey>, CiteError>;

    /// All collections, in the order the service reports them
    async fn list_collections(&self) -> Result<Vec<Collection>, CiteError>;

    /// Name of the collection owning `key`
    ///
    /// Fails with `CiteError::NotFound` when no item carries the key.
    async fn resolve_key_collection(&self, key: &str) -> Result<String, CiteError>;

    /// Render `keys` from one collection with the given export style
    async fn fetch_bibliography(
        &self,
        keys: &[CiteKey],
        style: &str,
        collection: CollectionId,
    ) -> Result<String, CiteError>;

    /// Render a single formatted bibliography entry
    async fn fetch_single_entry_bibliography(&self, key: &str, style: &str) -> Result<String, CiteError>;
}

pub mod better_bibtex;
pub mod mock;
