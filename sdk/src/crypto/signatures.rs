//! # Signature Sets
//!
//! A [`SignatureEntry`] binds a signature to the verification method that
//! produced it. A document payload is authorized by a whole set of them,
//! one per required key; which keys are required is decided in
//! [`crate::auth`], while this module answers the narrower question of
//! whether each signature actually verifies.
//!
//! ## Rotation pairs
//!
//! During key rotation the same verification-method id legitimately signs
//! twice: once with the outgoing material and once with the incoming one.
//! [`verify_signature_set`] therefore accepts a candidate list that may
//! contain several methods with the same id. The signatures under one id
//! are matched one-to-one to that id's distinct key materials, so two
//! signatures from the incoming key never stand in for the outgoing one.

use ed25519_dalek::{Signature as DalekSignature, Verifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::{ed25519_verifying_key, KeyError};
use crate::identity::{KeyMaterial, VerificationMethod};

/// A signature over a payload, attributed to a verification method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureEntry {
    #[serde(rename = "verificationMethodId")]
    pub verification_method_id: String,

    /// Raw signature bytes, hex-encoded on the wire.
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

impl SignatureEntry {
    pub fn new(verification_method_id: impl Into<String>, signature: Vec<u8>) -> Self {
        Self {
            verification_method_id: verification_method_id.into(),
            signature,
        }
    }
}

/// The signatures accompanying one payload.
pub type SignatureSet = Vec<SignatureEntry>;

/// Why a signature set failed cryptographic verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No candidate method has the signature's id.
    #[error("signature references unknown verification method: {0}")]
    UnknownVerificationMethod(String),

    /// A candidate method's key material could not be decoded.
    #[error("key material for {key_id} is unusable: {source}")]
    Key {
        key_id: String,
        #[source]
        source: KeyError,
    },

    /// The bytes do not verify against any candidate with this id.
    #[error("signature verification failed for {0}")]
    VerificationFailed(String),

    /// Several signatures under this id verify, but not each against its
    /// own key material.
    #[error("signatures for {0} do not come from distinct key material")]
    ReusedKeyMaterial(String),
}

/// Verify every entry in `signatures` over `message`.
///
/// Stops at the first failure. Deliberately says nothing about *which*
/// keys should have signed; see [`crate::auth`] for that. It does require
/// that signatures sharing an id each verify against a different key
/// material declared under that id.
pub fn verify_signature_set(
    message: &[u8],
    candidates: &[VerificationMethod],
    signatures: &[SignatureEntry],
) -> Result<(), SignatureError> {
    let mut key_ids: Vec<&str> = Vec::new();
    for entry in signatures {
        let key_id = entry.verification_method_id.as_str();
        if !key_ids.contains(&key_id) {
            key_ids.push(key_id);
        }
    }

    for key_id in key_ids {
        let entries: Vec<&SignatureEntry> = signatures
            .iter()
            .filter(|entry| entry.verification_method_id == key_id)
            .collect();
        verify_key_group(message, candidates, key_id, &entries)?;
    }
    Ok(())
}

/// Verify the signatures made under one id and match each to its own
/// material.
fn verify_key_group(
    message: &[u8],
    candidates: &[VerificationMethod],
    key_id: &str,
    entries: &[&SignatureEntry],
) -> Result<(), SignatureError> {
    let mut materials: Vec<&KeyMaterial> = Vec::new();
    for method in candidates.iter().filter(|vm| vm.id == key_id) {
        if !materials.contains(&&method.key_material) {
            materials.push(&method.key_material);
        }
    }
    if materials.is_empty() {
        return Err(SignatureError::UnknownVerificationMethod(key_id.to_string()));
    }

    let mut last_key_error = None;
    let mut keys = Vec::with_capacity(materials.len());
    for material in &materials {
        match ed25519_verifying_key(material) {
            Ok(key) => keys.push(Some(key)),
            Err(source) => {
                last_key_error = Some(source);
                keys.push(None);
            }
        }
    }

    // verifies[i] lists the materials that verify entries[i].
    let mut verifies: Vec<Vec<usize>> = Vec::with_capacity(entries.len());
    for entry in entries {
        let matching: Vec<usize> = match DalekSignature::from_slice(&entry.signature) {
            Ok(signature) => keys
                .iter()
                .enumerate()
                .filter_map(|(index, key)| match key {
                    Some(key) if key.verify(message, &signature).is_ok() => Some(index),
                    _ => None,
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        if matching.is_empty() {
            return Err(match last_key_error {
                Some(source) => SignatureError::Key {
                    key_id: key_id.to_string(),
                    source,
                },
                None => SignatureError::VerificationFailed(key_id.to_string()),
            });
        }
        verifies.push(matching);
    }

    let mut owner: Vec<Option<usize>> = vec![None; materials.len()];
    for entry in 0..verifies.len() {
        let mut visited = vec![false; materials.len()];
        if !assign(entry, &verifies, &mut owner, &mut visited) {
            return Err(SignatureError::ReusedKeyMaterial(key_id.to_string()));
        }
    }
    Ok(())
}

/// Augmenting-path step of the entry-to-material matching.
fn assign(
    entry: usize,
    verifies: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &material in &verifies[entry] {
        if visited[material] {
            continue;
        }
        visited[material] = true;
        let free = match owner[material] {
            None => true,
            Some(other) => assign(other, verifies, owner, visited),
        };
        if free {
            owner[material] = Some(entry);
            return true;
        }
    }
    false
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::ed25519_multibase;
    use crate::crypto::signers::sign_ed25519;
    use crate::identity::{KeyMaterial, VerificationMethodType};
    use ed25519_dalek::SigningKey;

    const KEY_ID: &str = "did:idl:testnet:alice#key-1";
    const MSG: &[u8] = b"canonical payload bytes";

    fn method_for(seed: u8) -> VerificationMethod {
        let pk = SigningKey::from_bytes(&[seed; 32]).verifying_key().to_bytes();
        VerificationMethod::new(
            KEY_ID,
            VerificationMethodType::Ed25519VerificationKey2020,
            "did:idl:testnet:alice",
            ed25519_multibase(&pk),
        )
    }

    fn signed_by(seed: u8) -> SignatureEntry {
        SignatureEntry::new(KEY_ID, sign_ed25519(&[seed; 32], MSG).unwrap())
    }

    #[test]
    fn valid_set_verifies() {
        assert!(verify_signature_set(MSG, &[method_for(1)], &[signed_by(1)]).is_ok());
    }

    #[test]
    fn wrong_key_fails() {
        assert_eq!(
            verify_signature_set(MSG, &[method_for(1)], &[signed_by(2)]).unwrap_err(),
            SignatureError::VerificationFailed(KEY_ID.to_string())
        );
    }

    #[test]
    fn unknown_method_fails() {
        let entry = SignatureEntry::new("did:idl:testnet:alice#key-9", vec![0u8; 64]);
        assert!(matches!(
            verify_signature_set(MSG, &[method_for(1)], &[entry]),
            Err(SignatureError::UnknownVerificationMethod(_))
        ));
    }

    #[test]
    fn rotation_pair_verifies_against_both_materials() {
        let candidates = [method_for(1), method_for(2)];
        let signatures = [signed_by(1), signed_by(2)];
        assert!(verify_signature_set(MSG, &candidates, &signatures).is_ok());
    }

    #[test]
    fn rotation_pair_from_one_key_is_rejected() {
        let candidates = [method_for(1), method_for(2)];
        let incoming_twice = [signed_by(2), signed_by(2)];
        assert_eq!(
            verify_signature_set(MSG, &candidates, &incoming_twice).unwrap_err(),
            SignatureError::ReusedKeyMaterial(KEY_ID.to_string())
        );
        let outgoing_twice = [signed_by(1), signed_by(1)];
        assert_eq!(
            verify_signature_set(MSG, &candidates, &outgoing_twice).unwrap_err(),
            SignatureError::ReusedKeyMaterial(KEY_ID.to_string())
        );
    }

    #[test]
    fn repeated_candidate_material_counts_once() {
        let candidates = [method_for(1), method_for(1)];
        assert!(verify_signature_set(MSG, &candidates, &[signed_by(1)]).is_ok());
        assert_eq!(
            verify_signature_set(MSG, &candidates, &[signed_by(1), signed_by(1)]).unwrap_err(),
            SignatureError::ReusedKeyMaterial(KEY_ID.to_string())
        );
    }

    #[test]
    fn undecodable_material_is_reported() {
        let mut method = method_for(1);
        method.key_material = KeyMaterial::Multibase("not-multibase".to_string());
        assert!(matches!(
            verify_signature_set(MSG, &[method], &[signed_by(1)]),
            Err(SignatureError::Key { .. })
        ));
    }

    #[test]
    fn truncated_signature_fails() {
        let mut entry = signed_by(1);
        entry.signature.truncate(10);
        assert!(matches!(
            verify_signature_set(MSG, &[method_for(1)], &[entry]),
            Err(SignatureError::VerificationFailed(_))
        ));
    }

    #[test]
    fn signature_serializes_as_hex() {
        let entry = SignatureEntry::new(KEY_ID, vec![0xde, 0xad]);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["verificationMethodId"], KEY_ID);
        assert_eq!(json["signature"], "dead");
        let back: SignatureEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
