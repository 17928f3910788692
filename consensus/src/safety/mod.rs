//! Safety rules of chained HotStuff.
//!
//! # Voting
//!
//! A replica votes for a proposal only if:
//! - the block's view is strictly above the view of its QC;
//! - the block's view is strictly above every view the replica already voted or timed out in;
//! - the block directly extends the QC of the preceding view, or the proposal carries a TC for
//!   the preceding view and the block's QC is not older than the highest QC known to that TC;
//! - both the proposer and the replica itself are eligible committee members at the block.
//!
//! # Timing out
//!
//! A replica times out a view only if its highest QC is not behind its locked view, the view has
//! not already been left behind, and the view is the immediate successor of either its highest
//! QC or the TC of the preceding view. Repeated requests for the same view return the timeout
//! produced the first time.
//!
//! # Persistence
//!
//! Votes and timeouts are only returned after the updated [SafetyData] has been durably written
//! by the [crate::Persister]. If that write fails, the in-memory [SafetyData] is left untouched
//! and the request fails: no artifact leaves the engine without the matching state on disk.
//!
//! # Concurrency
//!
//! [SafetyRules] is not thread-safe: requests must be serialized by the caller (the consensus
//! driver already processes views in order).

mod data;
pub use data::SafetyData;
mod metrics;
mod rules;
pub use rules::SafetyRules;

use crate::{types::View, CommitteeError};
use hotstuff_cryptography::Identifier;
use thiserror::Error;

/// Configuration for [SafetyRules].
pub struct Config<S, P, C> {
    /// Signs votes and timeouts.
    pub signer: S,

    /// Stores [SafetyData].
    pub persister: P,

    /// Resolves committee membership.
    pub committee: C,

    /// View of the trusted root block, used to bootstrap [SafetyData] when nothing has
    /// been persisted yet.
    pub root_view: View,
}

/// Outcome of a request that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision<T> {
    /// The artifact was produced and the matching [SafetyData] persisted.
    Accepted(T),
    /// The protocol withholds the artifact.
    Declined(Decline),
}

impl<T> Decision<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted(_))
    }

    /// Returns the artifact, if produced.
    pub fn accepted(self) -> Option<T> {
        match self {
            Decision::Accepted(artifact) => Some(artifact),
            Decision::Declined(_) => None,
        }
    }

    /// Returns the reason the artifact was withheld, if declined.
    pub fn declined(&self) -> Option<&Decline> {
        match self {
            Decision::Accepted(_) => None,
            Decision::Declined(reason) => Some(reason),
        }
    }
}

/// Broken voting rule.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    #[error("block view {block} must be larger than qc view {qc}")]
    QcNotBehindBlock { block: View, qc: View },
    #[error("already acknowledged view {acknowledged} (block view {view})")]
    AlreadyAcknowledged { view: View, acknowledged: View },
    #[error("block view {block} is not sequential with qc view {qc} and no timeout certificate is included")]
    MissingTimeoutCertificate { block: View, qc: View },
    #[error("timeout certificate for view {tc} is not sequential with block view {block}")]
    NonSequentialTimeoutCertificate { tc: View, block: View },
    #[error("qc view {qc} must be at least {required}")]
    QcRegression { qc: View, required: View },
}

/// Reason a vote or timeout was withheld.
///
/// Declines are part of normal operation: they are the safety rules doing their job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Decline {
    #[error("unsafe to vote: {0}")]
    Unsafe(#[from] Violation),
    #[error("proposer {0} ejected")]
    ProposerEjected(Identifier),
    #[error("{0} is not a committee member")]
    NotCommitteeMember(Identifier),
    #[error("unsafe to time out view {0}")]
    UnsafeTimeout(View),
}

/// Fatal errors.
///
/// These indicate a caller bug or a local fault. The request must not be retried with the
/// same state.
#[derive(Error, Debug)]
pub enum Error {
    #[error("expected block for view {expected}, got view {actual}")]
    ViewMismatch { expected: View, actual: View },
    #[error("failed to resolve {node} at block {block}: {source}")]
    Committee {
        block: Identifier,
        node: Identifier,
        #[source]
        source: CommitteeError,
    },
    #[error("signer failed: {0}")]
    Signer(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to persist safety data: {0}")]
    Persist(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to load safety data: {0}")]
    Load(#[source] Box<dyn std::error::Error + Send + Sync>),
}
