//! # Cryptographic Primitives
//!
//! Everything that touches key bytes lives here:
//!
//! - **keys**: Decoding verification-method key material (multibase,
//!   base58, JWK) into Ed25519 verifying keys, and encoding it back.
//! - **signers**: Per-type and per-algorithm signer dispatch
//!   (Ed25519, secp256k1, P-256).
//! - **signatures**: [`SignatureEntry`] / [`SignatureSet`] and
//!   cryptographic verification of a set against candidate methods.
//!
//! Everything here is a thin, typed wrapper around `ed25519-dalek`, `k256`
//! and `p256`. Nothing here decides *whose* signature is required; that
//! is [`crate::auth`]'s job.

pub mod keys;
pub mod signatures;
pub mod signers;

pub use keys::{ed25519_base58, ed25519_jwk, ed25519_multibase, ed25519_verifying_key, KeyError};
pub use signatures::{verify_signature_set, SignatureEntry, SignatureError, SignatureSet};
pub use signers::{
    sign_raw, RawSignerRegistry, SignerFn, SignerRegistry, SigningAlgorithm, SigningError,
};
