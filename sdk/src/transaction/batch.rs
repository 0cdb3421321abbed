//! # Batcher
//!
//! Splits an ordered list of messages into gas-bounded batches.
//!
//! Every message is simulated on its own, all simulations in flight at
//! once. The estimates are then folded first-fit, in order:
//! a message joins the current batch while the running sum stays within the
//! ceiling, otherwise it opens the next batch. Messages are never reordered.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::Message;
use crate::config::{BatchConfig, FALLBACK_MAX_GAS_PER_BATCH};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    /// The node ran the simulation and it failed.
    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error("estimator transport error: {0}")]
    Transport(String),
}

/// Simulates one message and reports the gas it would use.
#[async_trait]
pub trait GasEstimator: Send + Sync {
    async fn estimate(&self, message: &Message) -> Result<u64, EstimateError>;
}

/// Reads the chain's consensus parameters.
#[async_trait]
pub trait ConsensusLimits: Send + Sync {
    /// Maximum gas per block; `None` when the chain sets no limit.
    async fn max_block_gas(&self) -> Result<Option<u64>, EstimateError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("gas estimation failed for message {index}: {source}")]
    Estimate {
        index: usize,
        #[source]
        source: EstimateError,
    },

    #[error("failed to read consensus limits: {0}")]
    Limits(#[source] EstimateError),
}

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// Consecutive messages that go into one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBatch {
    messages: Vec<Message>,
    gas: u64,
}

impl MessageBatch {
    fn push(&mut self, message: Message, gas: u64) {
        self.messages.push(message);
        self.gas = self.gas.saturating_add(gas);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Sum of the members' estimates.
    pub fn gas(&self) -> u64 {
        self.gas
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Ordered batches. Concatenated, they reproduce the input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    batches: Vec<MessageBatch>,
}

impl BatchPlan {
    pub fn batches(&self) -> &[MessageBatch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn total_gas(&self) -> u64 {
        self.batches
            .iter()
            .fold(0u64, |acc, batch| acc.saturating_add(batch.gas))
    }

    /// All messages, flattened back into one list.
    pub fn into_messages(self) -> Vec<Message> {
        self.batches
            .into_iter()
            .flat_map(MessageBatch::into_messages)
            .collect()
    }
}

impl IntoIterator for BatchPlan {
    type Item = MessageBatch;
    type IntoIter = std::vec::IntoIter<MessageBatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Batcher
// ---------------------------------------------------------------------------

pub struct Batcher {
    estimator: Arc<dyn GasEstimator>,
    limits: Option<Arc<dyn ConsensusLimits>>,
    config: BatchConfig,
}

impl Batcher {
    pub fn new(estimator: Arc<dyn GasEstimator>) -> Self {
        Self {
            estimator,
            limits: None,
            config: BatchConfig::default(),
        }
    }

    /// Source of the default ceiling when none is configured or supplied.
    pub fn with_limits(mut self, limits: Arc<dyn ConsensusLimits>) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Estimate and batch `messages`.
    ///
    /// The ceiling is, in order of preference: `max_gas_per_batch`, the
    /// configured ceiling, the chain's block gas limit, and finally
    /// [`FALLBACK_MAX_GAS_PER_BATCH`] when no limits source is set.
    pub async fn plan(
        &self,
        messages: Vec<Message>,
        max_gas_per_batch: Option<u64>,
    ) -> Result<BatchPlan, BatchError> {
        let ceiling = match max_gas_per_batch.or(self.config.max_gas_per_batch) {
            Some(ceiling) => ceiling,
            None => self.default_ceiling().await?,
        };

        let estimates = try_join_all(messages.iter().enumerate().map(|(index, message)| async move {
            self.estimator
                .estimate(message)
                .await
                .map_err(|source| BatchError::Estimate { index, source })
        }))
        .await?;

        let plan = assemble(messages, &estimates, ceiling);
        debug!(
            batches = plan.len(),
            total_gas = plan.total_gas(),
            ceiling,
            "batch plan assembled"
        );
        Ok(plan)
    }

    async fn default_ceiling(&self) -> Result<u64, BatchError> {
        let Some(limits) = &self.limits else {
            return Ok(FALLBACK_MAX_GAS_PER_BATCH);
        };
        let max_block_gas = limits.max_block_gas().await.map_err(BatchError::Limits)?;
        Ok(max_block_gas.unwrap_or(u64::MAX))
    }
}

/// First-fit sequential fold of `messages` with their `estimates`.
///
/// A message whose own estimate exceeds `ceiling` cannot fit anywhere; it
/// gets a batch of its own.
pub fn assemble(messages: Vec<Message>, estimates: &[u64], ceiling: u64) -> BatchPlan {
    let mut batches = Vec::new();
    let mut current = MessageBatch::default();

    for (index, (message, &gas)) in messages.into_iter().zip(estimates).enumerate() {
        if !current.is_empty() && current.gas.saturating_add(gas) > ceiling {
            debug!(batch = batches.len(), gas = current.gas, "batch closed");
            batches.push(std::mem::take(&mut current));
        }
        if gas > ceiling {
            warn!(index, gas, ceiling, "message exceeds the batch gas ceiling on its own");
        }
        current.push(message, gas);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    BatchPlan { batches }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
