//! Payload and transaction signing.
//!
//! Two separate signatures are involved in getting a document change on
//! chain, and [`TransactionSigner`] produces both:
//!
//! 1. The document keys sign the [`SignablePayload`]
//!    ([`TransactionSigner::sign_payload`]). This is what the
//!    authentication policy is checked against.
//! 2. The fee-paying account signs the transaction that carries the
//!    messages ([`TransactionSigner::seal`]). The result is an immutable
//!    [`SignedTransaction`] that the broadcaster re-submits verbatim.
//!
//! # Canonical Byte Format
//!
//! The transaction is sealed over `sign_doc = body || auth_info || chain_id
//! 0x00 || account_number (u64 LE)`, where `body` and `auth_info` use the
//! same null-separated, little-endian encoding as the document payloads.
//! The envelope is the three length-prefixed (u32 LE) parts `body`,
//! `auth_info`, `signature`.

use std::fmt;

use tracing::debug;

use super::payload::{DocumentPayload, SignablePayload, SignerInputs};
use super::types::{Fee, Message, SignedTransaction};
use crate::crypto::{RawSignerRegistry, SignatureEntry, SignatureSet, SignerRegistry, SigningError};
use crate::identity::{Document, VerificationMethod};

const TX_BODY_DOMAIN: &str = "idledger/tx-body/v1";

// ---------------------------------------------------------------------------
// SigningAccount
// ---------------------------------------------------------------------------

/// The account that seals (and pays for) a transaction.
#[derive(Clone)]
pub struct SigningAccount {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    /// Raw-registry algorithm name, e.g. `secp256k1`.
    pub algorithm: String,
    pub public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

impl SigningAccount {
    pub fn new(
        chain_id: impl Into<String>,
        algorithm: impl Into<String>,
        secret_key: Vec<u8>,
        public_key: Vec<u8>,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            account_number: 0,
            sequence: 0,
            algorithm: algorithm.into(),
            public_key,
            secret_key,
        }
    }

    /// Set the on-chain account number and current sequence.
    pub fn with_account(mut self, account_number: u64, sequence: u64) -> Self {
        self.account_number = account_number;
        self.sequence = sequence;
        self
    }
}

impl fmt::Debug for SigningAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningAccount")
            .field("chain_id", &self.chain_id)
            .field("account_number", &self.account_number)
            .field("sequence", &self.sequence)
            .field("algorithm", &self.algorithm)
            .field("public_key", &hex::encode(&self.public_key))
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TransactionSigner
// ---------------------------------------------------------------------------

/// Owns the signer registries. Share one per process or per task; both
/// registries are safe to use from `&self`.
#[derive(Debug, Default)]
pub struct TransactionSigner {
    registry: SignerRegistry,
    raw: RawSignerRegistry,
}

impl TransactionSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a raw registry with extra algorithms registered.
    pub fn with_raw_registry(raw: RawSignerRegistry) -> Self {
        Self {
            registry: SignerRegistry::new(),
            raw,
        }
    }

    pub fn registry(&self) -> &SignerRegistry {
        &self.registry
    }

    pub fn raw_registry(&self) -> &RawSignerRegistry {
        &self.raw
    }

    /// Produce a signature set for `payload`.
    ///
    /// The payload is encoded once; each key then signs the same bytes with
    /// the signer for its verification method's type. Pre-computed
    /// signatures are returned untouched.
    pub fn sign_payload<P>(&self, payload: &P, inputs: SignerInputs) -> Result<SignatureSet, SigningError>
    where
        P: SignablePayload + ?Sized,
    {
        self.sign_with_candidates(payload, inputs, &[])
    }

    /// Like [`sign_payload`](Self::sign_payload) for an update, where a
    /// signer may also be a key of the previous version or of a controller.
    ///
    /// Those documents' methods are only used to find the signer type by
    /// id; their key material is ignored.
    pub fn sign_update_payload(
        &self,
        payload: &DocumentPayload,
        inputs: SignerInputs,
        previous: &Document,
        controllers: &[Document],
    ) -> Result<SignatureSet, SigningError> {
        let candidates: Vec<&VerificationMethod> = previous
            .verification_method
            .iter()
            .chain(controllers.iter().flat_map(|doc| doc.verification_method.iter()))
            .collect();
        self.sign_with_candidates(payload, inputs, &candidates)
    }

    fn sign_with_candidates<P>(
        &self,
        payload: &P,
        inputs: SignerInputs,
        candidates: &[&VerificationMethod],
    ) -> Result<SignatureSet, SigningError>
    where
        P: SignablePayload + ?Sized,
    {
        let keys = match inputs {
            SignerInputs::Signatures(entries) => return Ok(entries),
            SignerInputs::Keys(keys) => keys,
        };

        let message = payload.signable_bytes();
        keys.iter()
            .map(|input| {
                let key_id = &input.verification_method_id;
                let method = payload
                    .verification_methods()
                    .iter()
                    .chain(candidates.iter().copied())
                    .find(|vm| &vm.id == key_id)
                    .ok_or_else(|| SigningError::NoVerificationMethod(key_id.clone()))?;

                let signer = self.registry.resolve(method.type_);
                let signature = signer(&input.private_key, &message)?;
                debug!(key_id = %key_id, method_type = %method.type_, "payload signed");
                Ok(SignatureEntry::new(key_id.clone(), signature))
            })
            .collect()
    }

    /// Seal `messages` into a signed transaction for `account`.
    pub fn seal(
        &self,
        messages: &[Message],
        fee: Fee,
        memo: &str,
        account: &SigningAccount,
    ) -> Result<SignedTransaction, SigningError> {
        let body = body_bytes(messages, memo);
        let auth_info = auth_info_bytes(&fee, account);

        let mut sign_doc = Vec::with_capacity(body.len() + auth_info.len() + 64);
        sign_doc.extend_from_slice(&body);
        sign_doc.extend_from_slice(&auth_info);
        sign_doc.extend_from_slice(account.chain_id.as_bytes());
        sign_doc.push(0x00);
        sign_doc.extend_from_slice(&account.account_number.to_le_bytes());

        let signature = self
            .raw
            .sign(&account.algorithm, &account.secret_key, &sign_doc)?;

        let mut envelope = Vec::with_capacity(body.len() + auth_info.len() + signature.len() + 12);
        for part in [&body, &auth_info, &signature] {
            envelope.extend_from_slice(&(part.len() as u32).to_le_bytes());
            envelope.extend_from_slice(part);
        }

        let signed = SignedTransaction::from_envelope(envelope, fee, memo);
        debug!(
            tx_id = %signed.tx_id(),
            messages = messages.len(),
            sequence = account.sequence,
            "transaction sealed"
        );
        Ok(signed)
    }
}

fn body_bytes(messages: &[Message], memo: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + messages.iter().map(|m| m.value.len() + 48).sum::<usize>());
    buf.extend_from_slice(TX_BODY_DOMAIN.as_bytes());
    buf.push(0x00);
    buf.extend_from_slice(&(messages.len() as u32).to_le_bytes());
    for message in messages {
        buf.extend_from_slice(message.type_url.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&(message.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&message.value);
    }
    buf.extend_from_slice(memo.as_bytes());
    buf.push(0x00);
    buf
}

fn auth_info_bytes(fee: &Fee, account: &SigningAccount) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(&(fee.amount.len() as u32).to_le_bytes());
    for coin in &fee.amount {
        buf.extend_from_slice(coin.denom.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&coin.amount.to_le_bytes());
    }
    buf.extend_from_slice(&fee.gas_limit.to_le_bytes());
    buf.extend_from_slice(fee.payer.as_deref().unwrap_or_default().as_bytes());
    buf.push(0x00);
    buf.extend_from_slice(fee.granter.as_deref().unwrap_or_default().as_bytes());
    buf.push(0x00);
    buf.extend_from_slice(account.algorithm.to_ascii_lowercase().as_bytes());
    buf.push(0x00);
    buf.extend_from_slice(&(account.public_key.len() as u32).to_le_bytes());
    buf.extend_from_slice(&account.public_key);
    buf.extend_from_slice(&account.sequence.to_le_bytes());
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
