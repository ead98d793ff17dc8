/*!
 * Mock bibliographic service for testing.
 *
 * The mock is scripted up front:
 * - `with_picks` sets what the picker returns
 * - `with_item` places a key in a collection
 * - `with_failing_key` / `with_failing_collection` inject service errors
 * - `cancel_on_resolve` trips a cancellation token mid-merge
 *
 * Every call is recorded so tests can assert on ordering.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::cancellation::Cancellation;
use crate::citation::CiteKey;
use crate::errors::CiteError;
use crate::providers::{BibliographyService, Collection, CollectionId};

/// Scripted in-memory bibliographic service
#[derive(Debug, Default)]
pub struct MockService {
    picks: Vec<CiteKey>,
    collections: Vec<Collection>,
    owners: HashMap<CiteKey, String>,
    failing_keys: HashMap<CiteKey, String>,
    failing_collections: HashMap<CollectionId, String>,
    failing_entries: HashMap<CiteKey, String>,
    collections_error: Option<String>,
    cancel_on_resolve: Option<(CiteKey, Cancellation)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service with one library holding every requested key
    pub fn single_library() -> Self {
        Self::new().with_collection("My Library", 1)
    }

    pub fn with_picks(mut self, keys: &[&str]) -> Self {
        self.picks = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_collection(mut self, name: &str, id: CollectionId) -> Self {
        self.collections.push(Collection::new(name, id));
        self
    }

    pub fn with_item(mut self, key: &str, collection: &str) -> Self {
        self.owners.insert(key.to_string(), collection.to_string());
        self
    }

    pub fn with_failing_key(mut self, key: &str, message: &str) -> Self {
        self.failing_keys.insert(key.to_string(), message.to_string());
        self
    }

    pub fn with_failing_collection(mut self, id: CollectionId, message: &str) -> Self {
        self.failing_collections.insert(id, message.to_string());
        self
    }

    pub fn with_failing_entry(mut self, key: &str, message: &str) -> Self {
        self.failing_entries.insert(key.to_string(), message.to_string());
        self
    }

    pub fn with_collections_error(mut self, message: &str) -> Self {
        self.collections_error = Some(message.to_string());
        self
    }

    /// Cancel `token` while resolving `key`
    pub fn cancel_on_resolve(mut self, key: &str, token: Cancellation) -> Self {
        self.cancel_on_resolve = Some((key.to_string(), token));
        self
    }

    /// Calls made so far, e.g. `resolve:doe2020`, `export:1:a,b`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Shared handle to the call log, usable after the mock is moved
    pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    /// Text the mock renders for `keys` in `collection`
    pub fn render(keys: &[CiteKey], collection: CollectionId) -> String {
        keys.iter()
            .map(|key| format!("@article{{{},\n  note = {{library {}}}\n}}", key, collection))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text the mock renders for a single formatted entry
    pub fn render_entry(key: &str, style: &str) -> String {
        format!("Entry for {} ({}).\n", key, style)
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl BibliographyService for MockService {
    async fn pick_keys(&self) -> Result<Vec<CiteKey>, CiteError> {
        self.record("pick".to_string());
        if self.picks.is_empty() {
            return Err(CiteError::NoSelection);
        }
        Ok(self.picks.clone())
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, CiteError> {
        self.record("groups".to_string());
        if let Some(message) = &self.collections_error {
            return Err(CiteError::Service(message.clone()));
        }
        Ok(self.collections.clone())
    }

    async fn resolve_key_collection(&self, key: &str) -> Result<String, CiteError> {
        self.record(format!("resolve:{}", key));

        if let Some((trigger, token)) = &self.cancel_on_resolve {
            if trigger == key {
                token.cancel();
            }
        }

        if let Some(message) = self.failing_keys.get(key) {
            return Err(CiteError::Service(message.clone()));
        }

        self.owners
            .get(key)
            .cloned()
            .ok_or_else(|| CiteError::NotFound(key.to_string()))
    }

    async fn fetch_bibliography(
        &self,
        keys: &[CiteKey],
        style: &str,
        collection: CollectionId,
    ) -> Result<String, CiteError> {
        self.record(format!("export:{}:{}", collection, keys.join(",")));

        if let Some(message) = self.failing_collections.get(&collection) {
            return Err(CiteError::Service(message.clone()));
        }
        if style.is_empty() {
            return Err(CiteError::Service("missing translator".to_string()));
        }
        Ok(Self::render(keys, collection))
    }

    async fn fetch_single_entry_bibliography(&self, key: &str, style: &str) -> Result<String, CiteError> {
        self.record(format!("entry:{}", key));
        if let Some(message) = self.failing_entries.get(key) {
            return Err(CiteError::Service(message.clone()));
        }
        Ok(Self::render_entry(key, style))
    }
}
