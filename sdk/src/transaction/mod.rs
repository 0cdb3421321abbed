//! # Transaction Module
//!
//! The resilient transaction pipeline: from a document change to a
//! confirmed receipt.
//!
//! ## Architecture
//!
//! ```text
//! types.rs     - Message, Fee, Receipt, SignedTransaction
//! payload.rs   - SignablePayload and the document/deactivation payloads
//! signing.rs   - TransactionSigner: payload signature sets, transaction sealing
//! batch.rs     - Batcher: per-message gas estimation, first-fit batching
//! broadcast.rs - Broadcaster: submit, confirm, retry on timeout
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Authorize**: check the intended signer set with [`crate::auth`].
//! 2. **Sign**: [`TransactionSigner::sign_payload`] collects the document
//!    keys' signatures.
//! 3. **Batch** (optional): [`Batcher::plan`] groups the resulting
//!    messages under a gas ceiling.
//! 4. **Seal**: [`TransactionSigner::seal`] produces the immutable
//!    [`SignedTransaction`].
//! 5. **Broadcast**: [`Broadcaster::broadcast_and_confirm`] gets it included.
//!
//! Node access (simulation, submission, status queries, consensus
//! parameters) goes through the collaborator traits defined here, which the
//! host implements over its own RPC client.

pub mod batch;
pub mod broadcast;
pub mod payload;
pub mod signing;
pub mod types;

pub use batch::{
    assemble, BatchError, BatchPlan, Batcher, ConsensusLimits, EstimateError, GasEstimator,
    MessageBatch,
};
pub use broadcast::{
    BroadcastError, Broadcaster, LookupError, SubmitError, TransactionStatusLookup,
    TransactionSubmitter,
};
pub use payload::{DeactivationPayload, DocumentPayload, SignInput, SignablePayload, SignerInputs};
pub use signing::{SigningAccount, TransactionSigner};
pub use types::{transaction_id, Coin, Fee, Message, Receipt, SignedTransaction};
