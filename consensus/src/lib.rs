//! Decide, without ever violating safety, whether a HotStuff replica may vote or time out.
//!
//! # Overview
//!
//! [safety::SafetyRules] answers two questions for the consensus driver:
//! - "May I vote for this proposal?" ([safety::SafetyRules::produce_vote])
//! - "May I time out this view?" ([safety::SafetyRules::produce_timeout])
//!
//! Each answer is an artifact, a typed decline, or a fatal error. Before an artifact is returned,
//! the watermarks that make the answer safe across restarts ([safety::SafetyData]) are durably
//! written through a [Persister].
//!
//! The engine relies on three collaborators injected at construction:
//! - [Signer]: produces the cryptographic payload of votes and timeouts.
//! - [Persister]: stores [safety::SafetyData].
//! - [Committee]: resolves committee membership at a given block.

use hotstuff_cryptography::Identifier;
use thiserror::Error;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod safety;
pub mod signer;
pub mod types;

use safety::SafetyData;
use types::{Block, QuorumCertificate, TimeoutCertificate, TimeoutObject, View, Vote};

/// Produces signed votes and timeouts.
///
/// Inputs have already passed the safety rules; a failure indicates a local fault (for
/// example, a corrupted key).
pub trait Signer {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Signs a vote for `block`.
    fn create_vote(&self, block: &Block) -> Result<Vote, Self::Error>;

    /// Signs a timeout for `view`.
    fn create_timeout(
        &self,
        view: View,
        newest_qc: &QuorumCertificate,
        last_view_tc: Option<&TimeoutCertificate>,
    ) -> Result<TimeoutObject, Self::Error>;
}

/// Durable storage of [SafetyData].
pub trait Persister {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Durably stores `safety_data`.
    ///
    /// Must not return before the write is durable, including the directory entry of any
    /// file created to hold it: a write lost after returning `Ok` can let the replica vote
    /// twice in a view.
    fn put_safety_data(&mut self, safety_data: &SafetyData) -> Result<(), Self::Error>;

    /// Returns the last stored [SafetyData], if any.
    fn get_safety_data(&self) -> Result<Option<SafetyData>, Self::Error>;
}

/// Committee membership of a node at some block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    pub node_id: Identifier,
    pub weight: u64,
}

/// Errors returned by a [Committee] lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitteeError {
    /// The node is not an eligible member of the committee at the block (for example, it
    /// was ejected).
    #[error("invalid signer: {0}")]
    InvalidSigner(Identifier),
    #[error("unknown block: {0}")]
    UnknownBlock(Identifier),
    #[error("committee unavailable: {0}")]
    Unavailable(String),
}

/// Resolves committee membership.
pub trait Committee {
    /// Returns the identity of `node_id` at `block_id`.
    ///
    /// Returns [CommitteeError::InvalidSigner] if the node is not an eligible member.
    fn identity_by_block(
        &self,
        block_id: &Identifier,
        node_id: &Identifier,
    ) -> Result<Identity, CommitteeError>;

    /// Returns the identifier of the local node.
    fn me(&self) -> Identifier;
}
