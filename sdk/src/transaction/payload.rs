//! Signable document payloads.
//!
//! A payload is what the document's keys sign: the document change itself,
//! not the enclosing chain transaction. Each payload has a deterministic
//! canonical byte form built the same way as the transaction body:
//! null-separated strings and little-endian fixed-width counts, after a
//! leading domain tag per payload kind.

use std::fmt;

use crate::crypto::SignatureEntry;
use crate::identity::{Document, KeyMaterial, VerificationMethod};

const DOCUMENT_DOMAIN: &str = "idledger/document/v1";
const DEACTIVATION_DOMAIN: &str = "idledger/deactivate/v1";

/// Anything the document keys can sign.
pub trait SignablePayload {
    /// Canonical bytes. Computed once per signing run.
    fn signable_bytes(&self) -> Vec<u8>;

    /// The verification methods a signer may reference by id.
    fn verification_methods(&self) -> &[VerificationMethod];
}

// ---------------------------------------------------------------------------
// Canonical encoding helpers
// ---------------------------------------------------------------------------

fn put_str(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    buf.push(0x00);
}

fn put_list(buf: &mut Vec<u8>, values: &[String]) {
    buf.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        put_str(buf, value);
    }
}

fn put_method(buf: &mut Vec<u8>, method: &VerificationMethod) {
    put_str(buf, &method.id);
    put_str(buf, method.type_.as_str());
    put_str(buf, &method.controller);
    match &method.key_material {
        KeyMaterial::Multibase(value) => {
            buf.push(0x01);
            put_str(buf, value);
        }
        KeyMaterial::Base58(value) => {
            buf.push(0x02);
            put_str(buf, value);
        }
        KeyMaterial::Jwk(jwk) => {
            buf.push(0x03);
            put_str(buf, &jwk.kty);
            put_str(buf, &jwk.crv);
            put_str(buf, &jwk.x);
            put_str(buf, jwk.kid.as_deref().unwrap_or_default());
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentPayload
// ---------------------------------------------------------------------------

/// Create or update of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    pub document: Document,
    /// Caller-chosen version id of this revision.
    pub version_id: String,
}

impl DocumentPayload {
    pub fn new(document: Document, version_id: impl Into<String>) -> Self {
        Self {
            document,
            version_id: version_id.into(),
        }
    }
}

impl SignablePayload for DocumentPayload {
    fn signable_bytes(&self) -> Vec<u8> {
        let doc = &self.document;
        let mut buf = Vec::with_capacity(512);

        put_str(&mut buf, DOCUMENT_DOMAIN);
        put_str(&mut buf, &doc.id);
        put_str(&mut buf, &self.version_id);
        put_list(&mut buf, &doc.context);
        put_list(&mut buf, &doc.controller);

        buf.extend_from_slice(&(doc.verification_method.len() as u32).to_le_bytes());
        for method in &doc.verification_method {
            put_method(&mut buf, method);
        }

        put_list(&mut buf, &doc.authentication);
        put_list(&mut buf, &doc.assertion_method);
        put_list(&mut buf, &doc.capability_invocation);
        put_list(&mut buf, &doc.capability_delegation);
        put_list(&mut buf, &doc.key_agreement);

        buf.extend_from_slice(&(doc.service.len() as u32).to_le_bytes());
        for service in &doc.service {
            put_str(&mut buf, &service.id);
            put_str(&mut buf, &service.type_);
            put_list(&mut buf, &service.service_endpoint);
        }

        put_list(&mut buf, &doc.also_known_as);
        buf
    }

    fn verification_methods(&self) -> &[VerificationMethod] {
        &self.document.verification_method
    }
}

// ---------------------------------------------------------------------------
// DeactivationPayload
// ---------------------------------------------------------------------------

/// Deactivation of a document. Signed by the keys of the document being
/// deactivated, so it carries their verification methods for lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivationPayload {
    pub id: String,
    pub version_id: String,
    verification_methods: Vec<VerificationMethod>,
}

impl DeactivationPayload {
    pub fn for_document(document: &Document, version_id: impl Into<String>) -> Self {
        Self {
            id: document.id.clone(),
            version_id: version_id.into(),
            verification_methods: document.verification_method.clone(),
        }
    }
}

impl SignablePayload for DeactivationPayload {
    fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        put_str(&mut buf, DEACTIVATION_DOMAIN);
        put_str(&mut buf, &self.id);
        put_str(&mut buf, &self.version_id);
        buf
    }

    fn verification_methods(&self) -> &[VerificationMethod] {
        &self.verification_methods
    }
}

// ---------------------------------------------------------------------------
// Signer inputs
// ---------------------------------------------------------------------------

/// A private key to sign with, named by the verification method it backs.
#[derive(Clone, PartialEq, Eq)]
pub struct SignInput {
    pub verification_method_id: String,
    pub private_key: Vec<u8>,
}

impl SignInput {
    pub fn new(verification_method_id: impl Into<String>, private_key: Vec<u8>) -> Self {
        Self {
            verification_method_id: verification_method_id.into(),
            private_key,
        }
    }
}

impl fmt::Debug for SignInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInput")
            .field("verification_method_id", &self.verification_method_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// What to produce a signature set from.
#[derive(Debug, Clone)]
pub enum SignerInputs {
    /// Sign locally with these keys.
    Keys(Vec<SignInput>),
    /// Signatures computed elsewhere; passed through untouched.
    Signatures(Vec<SignatureEntry>),
}

impl From<Vec<SignInput>> for SignerInputs {
    fn from(keys: Vec<SignInput>) -> Self {
        Self::Keys(keys)
    }
}

impl From<Vec<SignatureEntry>> for SignerInputs {
    fn from(signatures: Vec<SignatureEntry>) -> Self {
        Self::Signatures(signatures)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
