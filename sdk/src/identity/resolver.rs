//! Document resolution.
//!
//! The validator never talks to the network itself. Whenever it needs a
//! previous version of a document or an external controller's document it
//! goes through [`DocumentResolver`], which a host backs with whatever RPC
//! transport it already has.
//!
//! [`StaticResolver`] is a map-backed implementation for hosts that have
//! already fetched what they need, and for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use super::document::Document;

/// Documents already known to the caller, keyed by document id.
///
/// Consulted before the resolver when looking up external controllers.
pub type ControllerCache = HashMap<String, Document>;

/// Why a document could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// The ledger has no document under this id.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The lookup itself failed.
    #[error("resolver transport error: {0}")]
    Transport(String),
}

/// Async lookup of a document by identifier.
#[async_trait]
pub trait DocumentResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<Document, ResolverError>;
}

/// A resolver over an in-memory set of documents.
///
/// Counts lookups so callers can assert that no resolution happened.
#[derive(Debug, Default)]
pub struct StaticResolver {
    documents: HashMap<String, Document>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a document, keyed by its own id.
    pub fn insert(&mut self, document: Document) -> Option<Document> {
        self.documents.insert(document.id.clone(), document)
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_document(mut self, document: Document) -> Self {
        self.insert(document);
        self
    }

    /// Number of `resolve` calls served so far, successful or not.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentResolver for StaticResolver {
    async fn resolve(&self, id: &str) -> Result<Document, ResolverError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| ResolverError::NotFound(id.to_string()))
    }
}
