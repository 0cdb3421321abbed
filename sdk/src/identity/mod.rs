//! # Identity Module
//!
//! Identity documents and how to find them.
//!
//! - **document**: The DID Core shaped [`Document`], its verification
//!   methods and key material, plus the derived views the authorization
//!   engine works from: [`ControllerTopology`] (who may act on a document)
//!   and key-rotation detection.
//! - **resolver**: The [`DocumentResolver`] collaborator used to fetch
//!   previous document versions and external controllers' documents.
//!
//! Nothing here persists anything. Documents are supplied by the caller,
//! evaluated, and dropped.

pub mod document;
pub mod resolver;

pub use document::{
    rotated_method_ids, ControllerTopology, Document, DocumentError, Jwk, KeyMaterial, Service,
    VerificationMethod, VerificationMethodType,
};
pub use resolver::{ControllerCache, DocumentResolver, ResolverError, StaticResolver};
