//! # Key Material Codecs
//!
//! Converts between raw Ed25519 public keys and the three representations a
//! verification method can carry. Decoding is only needed to *verify*
//! signatures; authorization decisions compare materials structurally and
//! never decode them.
//!
//! Key bytes are never logged, public ones included.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::VerifyingKey;
use thiserror::Error;

use crate::config::{
    ED25519_MULTICODEC_PREFIX, ED25519_PUBLIC_KEY_LENGTH, JWK_ED25519_CRV, JWK_OKP_KTY,
    MULTIBASE_BASE58BTC_PREFIX,
};
use crate::identity::{Jwk, KeyMaterial};

/// Errors decoding public key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("multibase value must start with 'z' (base58btc)")]
    UnsupportedMultibase,

    #[error("multicodec prefix is not ed25519-pub (0xed01)")]
    UnsupportedMulticodec,

    #[error("invalid base58 encoding")]
    InvalidBase58,

    #[error("unsupported JWK: kty={kty}, crv={crv}")]
    UnsupportedJwk { kty: String, crv: String },

    #[error("invalid base64url encoding in JWK")]
    InvalidBase64,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// Decode any supported key material into an Ed25519 verifying key.
pub fn ed25519_verifying_key(material: &KeyMaterial) -> Result<VerifyingKey, KeyError> {
    let raw = match material {
        KeyMaterial::Multibase(value) => decode_multibase(value)?,
        KeyMaterial::Base58(value) => bs58::decode(value)
            .into_vec()
            .map_err(|_| KeyError::InvalidBase58)?,
        KeyMaterial::Jwk(jwk) => decode_jwk(jwk)?,
    };

    let bytes: [u8; ED25519_PUBLIC_KEY_LENGTH] =
        raw.as_slice().try_into().map_err(|_| KeyError::InvalidPublicKey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

fn decode_multibase(value: &str) -> Result<Vec<u8>, KeyError> {
    let encoded = value
        .strip_prefix(MULTIBASE_BASE58BTC_PREFIX)
        .ok_or(KeyError::UnsupportedMultibase)?;
    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| KeyError::InvalidBase58)?;
    decoded
        .strip_prefix(&ED25519_MULTICODEC_PREFIX[..])
        .map(<[u8]>::to_vec)
        .ok_or(KeyError::UnsupportedMulticodec)
}

fn decode_jwk(jwk: &Jwk) -> Result<Vec<u8>, KeyError> {
    if jwk.kty != JWK_OKP_KTY || jwk.crv != JWK_ED25519_CRV {
        return Err(KeyError::UnsupportedJwk {
            kty: jwk.kty.clone(),
            crv: jwk.crv.clone(),
        });
    }
    URL_SAFE_NO_PAD
        .decode(&jwk.x)
        .map_err(|_| KeyError::InvalidBase64)
}

/// `publicKeyMultibase` form: `z` + base58btc(0xed01 || key).
pub fn ed25519_multibase(public_key: &[u8; ED25519_PUBLIC_KEY_LENGTH]) -> KeyMaterial {
    let mut multicodec_bytes = ED25519_MULTICODEC_PREFIX.to_vec();
    multicodec_bytes.extend_from_slice(public_key);
    KeyMaterial::Multibase(format!(
        "{}{}",
        MULTIBASE_BASE58BTC_PREFIX,
        bs58::encode(&multicodec_bytes).into_string()
    ))
}

/// `publicKeyBase58` form.
pub fn ed25519_base58(public_key: &[u8; ED25519_PUBLIC_KEY_LENGTH]) -> KeyMaterial {
    KeyMaterial::Base58(bs58::encode(public_key).into_string())
}

/// `publicKeyJwk` form (OKP / Ed25519).
pub fn ed25519_jwk(public_key: &[u8; ED25519_PUBLIC_KEY_LENGTH]) -> KeyMaterial {
    KeyMaterial::Jwk(Jwk {
        kty: JWK_OKP_KTY.to_string(),
        crv: JWK_ED25519_CRV.to_string(),
        x: URL_SAFE_NO_PAD.encode(public_key),
        kid: None,
    })
}
