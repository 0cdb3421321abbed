//! # Broadcaster
//!
//! Gets a [`SignedTransaction`] included despite an unreliable network.
//!
//! ```text
//! Signed ──submit──► Submitted ──confirm──► Confirmed
//!    │                   │
//!    │                   └── timeout ──► TimedOut ──(retry, same bytes)──► Submitted
//!    └── admission refused ──► Rejected (terminal, never retried)
//! ```
//!
//! Only a confirmation timeout is transient. A node refusing the
//! transaction at admission, a transport failure or a failed status lookup
//! ends the run immediately. Retries re-submit the exact same bytes, so the
//! transaction id never changes and the ledger de-duplicates.
//!
//! Attempts are strictly sequential: a new submission is only made after
//! the previous attempt's confirmation window has closed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::batch::{BatchPlan, MessageBatch};
use super::types::{Receipt, SignedTransaction};
use crate::config::{BroadcastConfig, TX_ALREADY_IN_MEMPOOL_CODE};
use crate::crypto::SigningError;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Why a node did not accept submitted bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Refused at admission (bad signature, wrong sequence, insufficient
    /// fee...). Permanent.
    #[error("rejected at admission (code {code}): {log}")]
    Rejected { code: u32, log: String },

    #[error("submit transport error: {0}")]
    Transport(String),
}

/// A status query failed. Distinct from "not yet included".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("status lookup failed: {0}")]
pub struct LookupError(pub String);

/// Sends signed transaction bytes to a node.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Returns the transaction id the node assigned.
    async fn submit(&self, tx_bytes: &[u8]) -> Result<String, SubmitError>;
}

/// Looks up the inclusion status of a transaction.
#[async_trait]
pub trait TransactionStatusLookup: Send + Sync {
    /// `Ok(None)` while the transaction is not yet included.
    async fn lookup(&self, tx_id: &str) -> Result<Option<Receipt>, LookupError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Broadcast failures. Every variant carries the transaction id so the
/// caller can keep tracking the transaction out of band.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("transaction {tx_id} rejected (code {code}): {log}")]
    Rejected {
        tx_id: String,
        code: u32,
        log: String,
    },

    /// Not observed within the confirmation window of any attempt.
    #[error("transaction {tx_id} not confirmed after {attempts} attempt(s) of {timeout:?} each")]
    TimedOut {
        tx_id: String,
        attempts: u32,
        timeout: Duration,
    },

    #[error("failed to submit transaction {tx_id}: {source}")]
    Submit {
        tx_id: String,
        #[source]
        source: SubmitError,
    },

    #[error("failed to query transaction {tx_id}: {source}")]
    Lookup {
        tx_id: String,
        #[source]
        source: LookupError,
    },

    /// Included, but execution returned a non-zero code.
    #[error("transaction {tx_id} failed during execution (code {code}): {log}")]
    ExecutionFailed {
        tx_id: String,
        code: u32,
        log: String,
    },

    /// A batch could not be sealed before broadcasting.
    #[error("failed to seal transaction: {0}")]
    Signing(#[from] SigningError),
}

impl BroadcastError {
    /// The id of the transaction concerned, when one exists.
    pub fn tx_id(&self) -> Option<&str> {
        match self {
            Self::Rejected { tx_id, .. }
            | Self::TimedOut { tx_id, .. }
            | Self::Submit { tx_id, .. }
            | Self::Lookup { tx_id, .. }
            | Self::ExecutionFailed { tx_id, .. } => Some(tx_id),
            Self::Signing(_) => None,
        }
    }

    fn with_tx_id(mut self, id: String) -> Self {
        match &mut self {
            Self::Rejected { tx_id, .. }
            | Self::TimedOut { tx_id, .. }
            | Self::Submit { tx_id, .. }
            | Self::Lookup { tx_id, .. }
            | Self::ExecutionFailed { tx_id, .. } => *tx_id = id,
            Self::Signing(_) => {}
        }
        self
    }

    /// Whether the broadcaster itself would retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Submit-and-confirm loop over a pair of node collaborators.
#[derive(Clone)]
pub struct Broadcaster {
    submitter: Arc<dyn TransactionSubmitter>,
    lookup: Arc<dyn TransactionStatusLookup>,
    config: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(
        submitter: Arc<dyn TransactionSubmitter>,
        lookup: Arc<dyn TransactionStatusLookup>,
    ) -> Self {
        Self::with_config(submitter, lookup, BroadcastConfig::default())
    }

    pub fn with_config(
        submitter: Arc<dyn TransactionSubmitter>,
        lookup: Arc<dyn TransactionStatusLookup>,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            submitter,
            lookup,
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Send the signed bytes once. Admission rejection is final.
    pub async fn submit(&self, tx: &SignedTransaction) -> Result<String, BroadcastError> {
        match self.submitter.submit(tx.bytes()).await {
            Ok(tx_id) => {
                info!(tx_id = %tx_id, "transaction submitted");
                Ok(tx_id)
            }
            Err(SubmitError::Rejected { code, log }) => Err(BroadcastError::Rejected {
                tx_id: tx.tx_id().to_string(),
                code,
                log,
            }),
            Err(source) => Err(BroadcastError::Submit {
                tx_id: tx.tx_id().to_string(),
                source,
            }),
        }
    }

    /// Poll every `poll_interval` until the transaction is observed or
    /// `wait` elapses.
    ///
    /// The timeout stops waiting; it does not abort a lookup already in
    /// flight on the node.
    pub async fn confirm(
        &self,
        tx_id: &str,
        wait: Duration,
        poll_interval: Duration,
    ) -> Result<Receipt, BroadcastError> {
        let poll = async {
            loop {
                match self.lookup.lookup(tx_id).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => debug!(tx_id = %tx_id, "not yet included"),
                    Err(source) => {
                        return Err(BroadcastError::Lookup {
                            tx_id: tx_id.to_string(),
                            source,
                        })
                    }
                }
                sleep(poll_interval).await;
            }
        };

        match timeout(wait, poll).await {
            Ok(result) => result,
            Err(_) => Err(BroadcastError::TimedOut {
                tx_id: tx_id.to_string(),
                attempts: 1,
                timeout: wait,
            }),
        }
    }

    /// Submit and confirm with this broadcaster's configuration.
    pub async fn broadcast_and_confirm(
        &self,
        tx: &SignedTransaction,
    ) -> Result<Receipt, BroadcastError> {
        self.broadcast_and_confirm_with(tx, &self.config).await
    }

    /// Submit and confirm, re-running the whole cycle on timeout.
    ///
    /// At most `max_retries + 1` attempts are made, separated by
    /// `retry_backoff`. The final `TimedOut` names the last transaction id
    /// the node reported and the number of attempts made.
    pub async fn broadcast_and_confirm_with(
        &self,
        tx: &SignedTransaction,
        config: &BroadcastConfig,
    ) -> Result<Receipt, BroadcastError> {
        let config = config.clone().sanitized();
        let attempts = config.max_retries + 1;
        let mut last_tx_id = tx.tx_id().to_string();

        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(config.retry_backoff).await;
            }

            let tx_id = match self.submit(tx).await {
                Ok(tx_id) => tx_id,
                // The node already holds these bytes from an earlier attempt.
                Err(BroadcastError::Rejected { code, .. })
                    if attempt > 1 && code == TX_ALREADY_IN_MEMPOOL_CODE =>
                {
                    debug!(tx_id = %last_tx_id, attempt, "already in mempool");
                    last_tx_id.clone()
                }
                // Later attempts report the id the node last assigned.
                Err(err) if attempt > 1 => return Err(err.with_tx_id(last_tx_id)),
                Err(err) => return Err(err),
            };
            last_tx_id = tx_id;

            match self
                .confirm(&last_tx_id, config.timeout, config.poll_interval)
                .await
            {
                Ok(receipt) => {
                    info!(
                        tx_id = %last_tx_id,
                        height = receipt.height,
                        code = receipt.code,
                        attempt,
                        "transaction confirmed"
                    );
                    return Ok(receipt);
                }
                Err(BroadcastError::TimedOut { .. }) => {
                    warn!(
                        tx_id = %last_tx_id,
                        attempt,
                        max_attempts = attempts,
                        "confirmation timed out"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(BroadcastError::TimedOut {
            tx_id: last_tx_id,
            attempts,
            timeout: config.timeout,
        })
    }

    /// Broadcast a batch plan, one transaction per batch, strictly in order.
    ///
    /// `seal` turns each batch into a signed transaction (typically bumping
    /// the account sequence each time). Stops at the first failing batch;
    /// batches confirmed before it stay committed on chain.
    pub async fn broadcast_plan<F>(
        &self,
        plan: &BatchPlan,
        mut seal: F,
    ) -> Result<Vec<Receipt>, BroadcastError>
    where
        F: FnMut(usize, &MessageBatch) -> Result<SignedTransaction, SigningError>,
    {
        let mut receipts = Vec::with_capacity(plan.len());
        for (index, batch) in plan.batches().iter().enumerate() {
            let tx = seal(index, batch)?;
            debug!(
                batch = index,
                messages = batch.len(),
                gas = batch.gas(),
                tx_id = %tx.tx_id(),
                "broadcasting batch"
            );
            let receipt = self.broadcast_and_confirm(&tx).await?.ensure_success()?;
            receipts.push(receipt);
        }
        Ok(receipts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
