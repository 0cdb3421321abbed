// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # IdLedger SDK
//!
//! Client-side library for authorizing, signing and broadcasting
//! identity-document transactions against the ledger.
//!
//! ## Architecture
//!
//! - **identity**: Documents, verification methods, controller topology,
//!   and the resolver collaborator.
//! - **crypto**: Key-material decoding, per-type and per-algorithm signers
//!   (Ed25519, secp256k1, P-256), signature-set verification.
//! - **auth**: The authentication-to-signature validation engine, including
//!   key rotation and externally controlled documents.
//! - **transaction**: Payload signing, transaction sealing, gas-bounded
//!   batching, and broadcast with confirmation and retry.
//! - **config**: Defaults and protocol constants.
//! - **logging**: Optional `tracing` subscriber setup.
//!
//! ## Ground rules
//!
//! 1. The SDK persists nothing. Caller data is validated, used and dropped.
//! 2. Policy outcomes are data ([`auth::ValidationResult`]); only failures to
//!    evaluate a policy are errors.
//! 3. Network access goes through async collaborator traits the host
//!    implements. Nothing here opens a socket.
//! 4. Only confirmation timeouts are retried, only by the broadcaster, and
//!    only a bounded number of times.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod logging;
pub mod transaction;

pub use auth::{
    validate_authentication, validate_authentication_on_rotation, InvalidReason, Provenance,
    ValidationError, ValidationResult,
};
pub use crypto::{SignatureEntry, SignatureSet, SignerRegistry, SigningAlgorithm, SigningError};
pub use identity::{Document, DocumentResolver, VerificationMethod, VerificationMethodType};
pub use transaction::{
    BatchPlan, Batcher, BroadcastError, Broadcaster, SignedTransaction, TransactionSigner,
};
