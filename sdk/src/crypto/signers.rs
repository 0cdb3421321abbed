//! # Signers
//!
//! Two ways to get from a secret key to a signature:
//!
//! 1. **By verification-method type.** Document payloads are signed by the
//!    keys the document declares, so the signer is chosen by the method's
//!    [`VerificationMethodType`]. The set of types is closed and each one
//!    maps to its signer through an exhaustive `match`; [`SignerRegistry`]
//!    only memoizes that choice per instance.
//! 2. **By algorithm.** Opaque payloads (resource content, account-level
//!    transaction bodies) are signed with whatever algorithm the key
//!    holder uses. [`RawSignerRegistry`] is pluggable because that set is
//!    genuinely open.
//!
//! Neither path does I/O. A [`SignerFn`] is a plain function pointer so it
//! can be copied out of a registry and called without holding a lock.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer as _, SigningKey as Ed25519SigningKey};
use k256::ecdsa::signature::Signer as _;
use parking_lot::RwLock;
use thiserror::Error;

use crate::config::{ECDSA_SECRET_KEY_LENGTH, ED25519_SECRET_KEY_LENGTH};
use crate::identity::VerificationMethodType;

/// `(secret_key, message) -> signature`.
pub type SignerFn = fn(&[u8], &[u8]) -> Result<Vec<u8>, SigningError>;

/// Caller configuration errors. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    /// The verification-method type tag has no signer.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The algorithm name has no registered signer.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A sign input references a method the payload does not declare.
    #[error("no verification method found for {0}")]
    NoVerificationMethod(String),

    /// The secret key bytes are malformed for the chosen algorithm.
    #[error("invalid {algorithm} secret key: {reason}")]
    InvalidSecretKey {
        algorithm: &'static str,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Algorithms
// ---------------------------------------------------------------------------

/// Signature algorithms with a built-in signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    Ed25519,
    Secp256k1,
    P256,
}

impl SigningAlgorithm {
    pub const ALL: [SigningAlgorithm; 3] = [
        SigningAlgorithm::Ed25519,
        SigningAlgorithm::Secp256k1,
        SigningAlgorithm::P256,
    ];

    /// Canonical lowercase name, used as the raw registry key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Secp256k1 => "secp256k1",
            Self::P256 => "p256",
        }
    }

    pub fn signer(&self) -> SignerFn {
        match self {
            Self::Ed25519 => sign_ed25519,
            Self::Secp256k1 => sign_secp256k1,
            Self::P256 => sign_p256,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = SigningError;

    /// Accepts the canonical names plus the common JOSE / curve aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" | "eddsa" => Ok(Self::Ed25519),
            "secp256k1" | "es256k" => Ok(Self::Secp256k1),
            "p256" | "p-256" | "secp256r1" | "es256" => Ok(Self::P256),
            _ => Err(SigningError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Sign with a built-in algorithm. Stateless.
pub fn sign_raw(
    algorithm: SigningAlgorithm,
    secret_key: &[u8],
    message: &[u8],
) -> Result<Vec<u8>, SigningError> {
    (algorithm.signer())(secret_key, message)
}

/// Ed25519 over the message. Accepts a 32-byte seed or a 64-byte
/// `seed || public` keypair (the NaCl layout); the latter is checked for
/// consistency.
pub fn sign_ed25519(secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>, SigningError> {
    let invalid = |reason: &str| SigningError::InvalidSecretKey {
        algorithm: "ed25519",
        reason: reason.to_string(),
    };

    let signing_key = match secret_key.len() {
        ED25519_SECRET_KEY_LENGTH => {
            let mut seed = [0u8; ED25519_SECRET_KEY_LENGTH];
            seed.copy_from_slice(secret_key);
            Ed25519SigningKey::from_bytes(&seed)
        }
        64 => {
            let mut keypair = [0u8; 64];
            keypair.copy_from_slice(secret_key);
            Ed25519SigningKey::from_keypair_bytes(&keypair)
                .map_err(|_| invalid("public half does not match seed"))?
        }
        other => return Err(invalid(&format!("expected 32 or 64 bytes, got {}", other))),
    };

    Ok(signing_key.sign(message).to_bytes().to_vec())
}

/// ECDSA/secp256k1 over SHA-256 of the message, fixed-size `r || s`,
/// low-S normalized.
pub fn sign_secp256k1(secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>, SigningError> {
    check_ecdsa_length("secp256k1", secret_key)?;
    let signing_key =
        k256::ecdsa::SigningKey::from_slice(secret_key).map_err(|e| SigningError::InvalidSecretKey {
            algorithm: "secp256k1",
            reason: e.to_string(),
        })?;
    let signature: k256::ecdsa::Signature = signing_key.sign(message);
    Ok(signature.to_bytes().to_vec())
}

/// ECDSA/P-256 over SHA-256 of the message, fixed-size `r || s`.
pub fn sign_p256(secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>, SigningError> {
    check_ecdsa_length("p256", secret_key)?;
    let signing_key =
        p256::ecdsa::SigningKey::from_slice(secret_key).map_err(|e| SigningError::InvalidSecretKey {
            algorithm: "p256",
            reason: e.to_string(),
        })?;
    let signature: p256::ecdsa::Signature = signing_key.sign(message);
    Ok(signature.to_bytes().to_vec())
}

fn check_ecdsa_length(algorithm: &'static str, secret_key: &[u8]) -> Result<(), SigningError> {
    if secret_key.len() != ECDSA_SECRET_KEY_LENGTH {
        return Err(SigningError::InvalidSecretKey {
            algorithm,
            reason: format!(
                "expected {} bytes, got {}",
                ECDSA_SECRET_KEY_LENGTH,
                secret_key.len()
            ),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-type signers
// ---------------------------------------------------------------------------

impl VerificationMethodType {
    /// The signer used for keys declared with this type.
    pub fn default_signer(&self) -> SignerFn {
        match self {
            Self::Ed25519VerificationKey2018 => sign_ed25519,
            Self::Ed25519VerificationKey2020 => sign_ed25519,
            // Only OKP/Ed25519 JWKs are accepted in documents.
            Self::JsonWebKey2020 => sign_ed25519,
        }
    }
}

/// Per-instance memo of verification-method type → signer.
///
/// Filled lazily: the first `resolve` for a type inserts its default
/// signer. One registry can be shared by concurrent signers.
#[derive(Debug, Default)]
pub struct SignerRegistry {
    signers: RwLock<HashMap<VerificationMethodType, SignerFn>>,
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, method_type: VerificationMethodType) -> SignerFn {
        if let Some(signer) = self.signers.read().get(&method_type) {
            return *signer;
        }
        *self
            .signers
            .write()
            .entry(method_type)
            .or_insert_with(|| method_type.default_signer())
    }

    /// Resolve by the textual type tag, as found in untyped input.
    pub fn resolve_tag(&self, tag: &str) -> Result<SignerFn, SigningError> {
        let method_type = tag
            .parse::<VerificationMethodType>()
            .map_err(|_| SigningError::UnsupportedKeyType(tag.to_string()))?;
        Ok(self.resolve(method_type))
    }

    /// Number of types resolved so far.
    pub fn len(&self) -> usize {
        self.signers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Raw (algorithm-keyed) signers
// ---------------------------------------------------------------------------

/// Algorithm name → signer, pre-populated with the built-ins.
///
/// Names are matched case-insensitively; the built-in aliases accepted by
/// [`SigningAlgorithm::from_str`] resolve to the canonical entries.
#[derive(Debug, Clone)]
pub struct RawSignerRegistry {
    signers: HashMap<String, SignerFn>,
}

impl Default for RawSignerRegistry {
    fn default() -> Self {
        let signers = SigningAlgorithm::ALL
            .into_iter()
            .map(|algorithm| (algorithm.name().to_string(), algorithm.signer()))
            .collect();
        Self { signers }
    }
}

impl RawSignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the signer for an algorithm name. Returns the
    /// previous signer, if any.
    pub fn register(&mut self, algorithm: &str, signer: SignerFn) -> Option<SignerFn> {
        self.signers.insert(algorithm.to_ascii_lowercase(), signer)
    }

    pub fn signer(&self, algorithm: &str) -> Result<SignerFn, SigningError> {
        let key = match algorithm.parse::<SigningAlgorithm>() {
            Ok(builtin) => builtin.name().to_string(),
            Err(_) => algorithm.to_ascii_lowercase(),
        };
        self.signers
            .get(&key)
            .copied()
            .ok_or_else(|| SigningError::UnsupportedAlgorithm(algorithm.to_string()))
    }

    pub fn sign(
        &self,
        algorithm: &str,
        secret_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, SigningError> {
        (self.signer(algorithm)?)(secret_key, message)
    }
}
