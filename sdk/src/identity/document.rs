//! # Identity Documents
//!
//! The W3C DID Core shaped document that every authorization decision in
//! this crate is made against. Only the members the SDK reasons about are
//! typed strictly (`id`, `controller`, `verificationMethod`,
//! `authentication`); the remaining verification relationships and
//! services are carried through so a document survives a JSON round trip.
//!
//! ## Key material
//!
//! A verification method carries exactly one public-key representation,
//! selected by its JSON member name:
//!
//! ```text
//! publicKeyMultibase  - "z" + base58btc(multicodec 0xed01 || key)
//! publicKeyBase58     - base58btc(key)
//! publicKeyJwk        - { "kty": "OKP", "crv": "Ed25519", "x": base64url(key) }
//! ```
//!
//! Well-formedness of the material is checked at the boundary that builds
//! the document. Here we only need to compare two materials for equality,
//! which is what key-rotation detection is built on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Context URI for the W3C DID Core specification.
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while parsing or encoding documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The verification-method type tag is outside the supported set.
    #[error("unsupported verification method type: {0}")]
    UnsupportedMethodType(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// Verification methods
// ---------------------------------------------------------------------------

/// The closed set of verification-method types the SDK can sign for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationMethodType {
    Ed25519VerificationKey2018,
    Ed25519VerificationKey2020,
    JsonWebKey2020,
}

impl VerificationMethodType {
    /// Every supported type, in declaration order.
    pub const ALL: [VerificationMethodType; 3] = [
        VerificationMethodType::Ed25519VerificationKey2018,
        VerificationMethodType::Ed25519VerificationKey2020,
        VerificationMethodType::JsonWebKey2020,
    ];

    /// The type tag as it appears in a document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519VerificationKey2018 => "Ed25519VerificationKey2018",
            Self::Ed25519VerificationKey2020 => "Ed25519VerificationKey2020",
            Self::JsonWebKey2020 => "JsonWebKey2020",
        }
    }
}

impl fmt::Display for VerificationMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMethodType {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| DocumentError::UnsupportedMethodType(s.to_string()))
    }
}

/// A JSON Web Key carrying an Ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    /// Base64url (unpadded) encoded public key.
    pub x: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Public key material of a verification method.
///
/// Flattened into the surrounding JSON object, so the variant is selected
/// by which `publicKey*` member is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMaterial {
    #[serde(rename = "publicKeyMultibase")]
    Multibase(String),
    #[serde(rename = "publicKeyBase58")]
    Base58(String),
    #[serde(rename = "publicKeyJwk")]
    Jwk(Jwk),
}

/// A verification method entry in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// Unique within the document, by convention `<docId>#<fragment>`.
    pub id: String,

    #[serde(rename = "type")]
    pub type_: VerificationMethodType,

    /// The identifier that controls this key.
    pub controller: String,

    #[serde(flatten)]
    pub key_material: KeyMaterial,
}

impl VerificationMethod {
    pub fn new(
        id: impl Into<String>,
        type_: VerificationMethodType,
        controller: impl Into<String>,
        key_material: KeyMaterial,
    ) -> Self {
        Self {
            id: id.into(),
            type_,
            controller: controller.into(),
            key_material,
        }
    }
}

/// A service endpoint entry. Carried, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: Vec<String>,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An identity document.
///
/// `authentication` is the declared set of verification-method ids that
/// must sign any change to the document while it is self-controlled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,

    pub id: String,

    #[serde(default)]
    pub controller: Vec<String>,

    #[serde(rename = "verificationMethod", default)]
    pub verification_method: Vec<VerificationMethod>,

    #[serde(default)]
    pub authentication: Vec<String>,

    #[serde(rename = "assertionMethod", default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_method: Vec<String>,

    #[serde(rename = "capabilityInvocation", default, skip_serializing_if = "Vec::is_empty")]
    pub capability_invocation: Vec<String>,

    #[serde(rename = "capabilityDelegation", default, skip_serializing_if = "Vec::is_empty")]
    pub capability_delegation: Vec<String>,

    #[serde(rename = "keyAgreement", default, skip_serializing_if = "Vec::is_empty")]
    pub key_agreement: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<Service>,

    #[serde(rename = "alsoKnownAs", default, skip_serializing_if = "Vec::is_empty")]
    pub also_known_as: Vec<String>,
}

impl Document {
    /// A bare self-controlled document with no keys.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            context: vec![DID_CONTEXT.to_string()],
            controller: vec![id.clone()],
            id,
            verification_method: Vec::new(),
            authentication: Vec::new(),
            assertion_method: Vec::new(),
            capability_invocation: Vec::new(),
            capability_delegation: Vec::new(),
            key_agreement: Vec::new(),
            service: Vec::new(),
            also_known_as: Vec::new(),
        }
    }

    /// Replace the controller list.
    pub fn with_controllers<I, S>(mut self, controllers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.controller = controllers.into_iter().map(Into::into).collect();
        self
    }

    /// Append a verification method.
    pub fn with_verification_method(mut self, method: VerificationMethod) -> Self {
        self.verification_method.push(method);
        self
    }

    /// Append an authentication reference.
    pub fn with_authentication(mut self, key_id: impl Into<String>) -> Self {
        self.authentication.push(key_id.into());
        self
    }

    /// Look up a verification method by id.
    pub fn verification_method(&self, id: &str) -> Option<&VerificationMethod> {
        self.verification_method.iter().find(|vm| vm.id == id)
    }

    /// Whether `id` names one of this document's verification methods.
    pub fn declares_method(&self, id: &str) -> bool {
        self.verification_method(id).is_some()
    }

    /// Derive the controller topology of this document alone.
    pub fn topology(&self) -> ControllerTopology {
        ControllerTopology::derive(&self.id, &self.controller)
    }

    /// Serialize this document to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::Serialization(e.to_string()))
    }

    /// Parse a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::Serialization(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Who is allowed to act on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerTopology {
    /// Every controller entry is the document itself.
    SelfControlled,
    /// At least one controller differs from the document id. Holds those
    /// controllers, de-duplicated, in first-seen order.
    External(Vec<String>),
}

impl ControllerTopology {
    /// Derive the topology for `id` from any number of controller lists.
    /// Key rotation passes the current and previous lists chained together.
    pub fn derive<'a, I>(id: &str, controllers: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut external: Vec<String> = Vec::new();
        for controller in controllers {
            if controller != id && !external.contains(controller) {
                external.push(controller.clone());
            }
        }
        if external.is_empty() {
            Self::SelfControlled
        } else {
            Self::External(external)
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    /// The external controller ids; empty when self-controlled.
    pub fn external_controllers(&self) -> &[String] {
        match self {
            Self::SelfControlled => &[],
            Self::External(controllers) => controllers,
        }
    }
}

/// Ids of verification methods present in both documents whose key
/// material changed, in the order they appear in `current`.
pub fn rotated_method_ids(previous: &Document, current: &Document) -> Vec<String> {
    current
        .verification_method
        .iter()
        .filter(|vm| {
            previous
                .verification_method(&vm.id)
                .is_some_and(|prev| prev.key_material != vm.key_material)
        })
        .map(|vm| vm.id.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_ID: &str = "did:idl:testnet:alice";

    fn multibase_method(fragment: &str, material: &str) -> VerificationMethod {
        VerificationMethod::new(
            format!("{}#{}", DOC_ID, fragment),
            VerificationMethodType::Ed25519VerificationKey2020,
            DOC_ID,
            KeyMaterial::Multibase(material.to_string()),
        )
    }

    #[test]
    fn new_document_is_self_controlled() {
        let doc = Document::new(DOC_ID);
        assert_eq!(doc.controller, vec![DOC_ID.to_string()]);
        assert_eq!(doc.topology(), ControllerTopology::SelfControlled);
    }

    #[test]
    fn external_controllers_exclude_self_and_duplicates() {
        let doc = Document::new(DOC_ID).with_controllers([DOC_ID, "did:idl:bob", "did:idl:bob"]);
        let topology = doc.topology();
        assert!(topology.is_external());
        assert_eq!(topology.external_controllers(), ["did:idl:bob".to_string()]);
    }

    #[test]
    fn topology_over_chained_controller_lists() {
        let current = vec![DOC_ID.to_string()];
        let previous = vec!["did:idl:carol".to_string()];
        let topology = ControllerTopology::derive(DOC_ID, current.iter().chain(previous.iter()));
        assert_eq!(
            topology,
            ControllerTopology::External(vec!["did:idl:carol".to_string()])
        );
    }

    #[test]
    fn method_type_parses_known_tags_only() {
        for ty in VerificationMethodType::ALL {
            assert_eq!(ty.as_str().parse::<VerificationMethodType>().unwrap(), ty);
        }
        assert!(matches!(
            "EcdsaSecp256k1VerificationKey2019".parse::<VerificationMethodType>(),
            Err(DocumentError::UnsupportedMethodType(_))
        ));
    }

    #[test]
    fn rotation_detects_changed_material_only() {
        let previous = Document::new(DOC_ID)
            .with_verification_method(multibase_method("key-1", "zOld"))
            .with_verification_method(multibase_method("key-2", "zSame"));
        let current = Document::new(DOC_ID)
            .with_verification_method(multibase_method("key-1", "zNew"))
            .with_verification_method(multibase_method("key-2", "zSame"))
            .with_verification_method(multibase_method("key-3", "zFresh"));

        assert_eq!(
            rotated_method_ids(&previous, &current),
            vec![format!("{}#key-1", DOC_ID)]
        );
    }

    #[test]
    fn json_uses_did_core_member_names() {
        let doc = Document::new(DOC_ID)
            .with_verification_method(multibase_method("key-1", "z6Mk"))
            .with_authentication(format!("{}#key-1", DOC_ID));
        let json = doc.to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("@context").is_some());
        assert!(value.get("verificationMethod").is_some());
        let vm = &value["verificationMethod"][0];
        assert_eq!(vm["type"], "Ed25519VerificationKey2020");
        assert_eq!(vm["publicKeyMultibase"], "z6Mk");

        let parsed = Document::from_json(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn jwk_material_parses_from_json() {
        let json = r#"{
            "id": "did:idl:testnet:alice",
            "controller": ["did:idl:testnet:alice"],
            "verificationMethod": [{
                "id": "did:idl:testnet:alice#key-1",
                "type": "JsonWebKey2020",
                "controller": "did:idl:testnet:alice",
                "publicKeyJwk": { "kty": "OKP", "crv": "Ed25519", "x": "abc" }
            }],
            "authentication": ["did:idl:testnet:alice#key-1"]
        }"#;
        let doc = Document::from_json(json).unwrap();
        let vm = &doc.verification_method[0];
        assert_eq!(vm.type_, VerificationMethodType::JsonWebKey2020);
        assert!(matches!(&vm.key_material, KeyMaterial::Jwk(jwk) if jwk.x == "abc"));
    }

    #[test]
    fn unknown_method_type_is_rejected_at_parse() {
        let json = r#"{
            "id": "did:idl:testnet:alice",
            "verificationMethod": [{
                "id": "did:idl:testnet:alice#key-1",
                "type": "RsaVerificationKey2018",
                "controller": "did:idl:testnet:alice",
                "publicKeyBase58": "abc"
            }]
        }"#;
        assert!(Document::from_json(json).is_err());
    }
}
