//! # SDK Configuration & Constants
//!
//! Every tunable number in the SDK lives here.
//!
//! Constants are grouped by the component that consumes them. The config
//! structs at the bottom bundle the broadcast and batching knobs so a host
//! application can deserialize them from whatever config file it already
//! has.

use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Broadcast & Confirmation
// ---------------------------------------------------------------------------

/// How long a single confirmation attempt waits for the transaction to be
/// observed in a block before giving up on that attempt.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Interval between status lookups while waiting for inclusion. Roughly
/// half a block on the reference network.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3_000);

/// Number of *additional* submit+confirm cycles after the first one times
/// out. Three retries means at most four submissions of the same bytes.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Fixed pause between a timed-out attempt and the next submission.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1_000);

/// Upper bound on `max_retries` accepted from external configuration.
pub const MAX_RETRIES_CEILING: u32 = 16;

/// Admission code a node returns for bytes it already holds in its mempool
/// cache. On a resubmission this means the earlier attempt landed.
pub const TX_ALREADY_IN_MEMPOOL_CODE: u32 = 19;

// ---------------------------------------------------------------------------
// Batching
// ---------------------------------------------------------------------------

/// Gas ceiling used when the caller supplies none and no consensus-limits
/// source is configured. A chain that reports unlimited block gas gets a
/// single batch instead.
pub const FALLBACK_MAX_GAS_PER_BATCH: u64 = 30_000_000;

// ---------------------------------------------------------------------------
// Key Material
// ---------------------------------------------------------------------------

/// Multibase prefix for base58btc.
pub const MULTIBASE_BASE58BTC_PREFIX: char = 'z';

/// Multicodec varint prefix for a raw Ed25519 public key.
pub const ED25519_MULTICODEC_PREFIX: [u8; 2] = [0xed, 0x01];

/// Ed25519 public key length in bytes.
pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 secret key (seed) length in bytes.
pub const ED25519_SECRET_KEY_LENGTH: usize = 32;

/// ECDSA secret scalar length for both secp256k1 and P-256.
pub const ECDSA_SECRET_KEY_LENGTH: usize = 32;

/// Compact signature length shared by Ed25519 and fixed-size ECDSA (r || s).
pub const SIGNATURE_LENGTH: usize = 64;

/// JWK key type / curve pair accepted for `JsonWebKey2020` methods.
pub const JWK_OKP_KTY: &str = "OKP";
pub const JWK_ED25519_CRV: &str = "Ed25519";

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Tunable parameters for [`crate::transaction::broadcast::Broadcaster`].
///
/// Durations deserialize from milliseconds so the same values can live in
/// TOML, JSON or environment-derived maps without a custom format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Per-attempt confirmation timeout.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Delay between status lookups.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,

    /// Additional attempts after the first timed-out one.
    pub max_retries: u32,

    /// Pause between attempts.
    #[serde(rename = "retry_backoff_ms", with = "millis")]
    pub retry_backoff: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl BroadcastConfig {
    /// Clamp values that would make the confirmation loop degenerate: a
    /// zero poll interval spins, and an unbounded retry count never gives
    /// the caller its transaction id back.
    pub fn sanitized(mut self) -> Self {
        if self.poll_interval.is_zero() {
            self.poll_interval = DEFAULT_POLL_INTERVAL;
        }
        self.max_retries = self.max_retries.min(MAX_RETRIES_CEILING);
        self
    }
}

/// Tunable parameters for [`crate::transaction::batch::Batcher`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Explicit per-batch gas ceiling. When `None`, the ceiling comes from
    /// the chain's consensus limits.
    pub max_gas_per_batch: Option<u64>,
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
