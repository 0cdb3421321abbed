//! Core value types of the transaction pipeline.
//!
//! Chain messages are opaque here: a type URL plus already-encoded bytes.
//! Building them is the job of the per-feature modules that feed this
//! crate; the pipeline only estimates, batches, signs and broadcasts them.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::broadcast::BroadcastError;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One encoded chain message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Fully-qualified message type, e.g. `/idledger.did.v1.MsgCreateDid`.
    pub type_url: String,
    /// Encoded message body.
    pub value: Vec<u8>,
}

impl Message {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }
}

// ---------------------------------------------------------------------------
// Fee
// ---------------------------------------------------------------------------

/// An amount of a single denomination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// The fee declared in a transaction. Amounts are computed by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
    /// Account paying the fee when it is not the signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Account granting a fee allowance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granter: Option<String>,
}

impl Fee {
    pub fn new(amount: Vec<Coin>, gas_limit: u64) -> Self {
        Self {
            amount,
            gas_limit,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// Inclusion result of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_id: String,
    pub height: u64,
    /// Execution result code; zero means success.
    pub code: u32,
    pub gas_wanted: u64,
    pub gas_used: u64,
    #[serde(default)]
    pub raw_log: String,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero execution code into an error.
    ///
    /// Inclusion alone does not mean the messages executed; a confirmed
    /// transaction can still carry a failure code.
    pub fn ensure_success(self) -> Result<Self, BroadcastError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(BroadcastError::ExecutionFailed {
                tx_id: self.tx_id,
                code: self.code,
                log: self.raw_log,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// A sealed transaction, ready to broadcast.
///
/// Immutable once produced: every retry re-submits exactly these bytes, so
/// the transaction id stays stable across attempts. The id is the
/// upper-case hex SHA-256 of the envelope bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    bytes: Vec<u8>,
    fee: Fee,
    memo: String,
    tx_id: String,
}

impl SignedTransaction {
    /// Wrap envelope bytes produced elsewhere (e.g. a hardware signer).
    pub fn from_envelope(bytes: Vec<u8>, fee: Fee, memo: impl Into<String>) -> Self {
        let tx_id = transaction_id(&bytes);
        Self {
            bytes,
            fee,
            memo: memo.into(),
            tx_id,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn fee(&self) -> &Fee {
        &self.fee
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }
}

impl fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("tx_id", &self.tx_id)
            .field("len", &self.bytes.len())
            .field("fee", &self.fee)
            .field("memo", &self.memo)
            .finish()
    }
}

/// `HEX(SHA-256(bytes))`, upper case.
pub fn transaction_id(bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
