//! Accumulate verified signatures from a fixed set of signers into a single signature.
//!
//! # Overview
//!
//! Votes and random beacon shares arrive from the network concurrently. Each signature is
//! verified by the caller before it is handed to an aggregator ("trusted add"), so aggregators
//! only track which signer contributed what and combine the collected signatures on request.
//!
//! Three contracts are exposed:
//! - [StakingAggregator]: sums BLS signatures over the same message ([Staking]).
//! - [ThresholdAggregator]: recovers a threshold signature from partial signatures ([Threshold]).
//! - [BeaconReconstructor]: reconstructs the random beacon once enough shares are known
//!   ([Reconstructor]).
//!
//! # Guarantees
//!
//! - Adding a signature from a signer that already contributed returns `Ok(false)` and leaves
//!   the aggregator untouched. Adding a signature from an unknown signer returns
//!   [Error::InvalidSigner].
//! - Combining runs at most once per set of collected signatures, no matter how many threads
//!   request the result concurrently. Every caller observes the same result.
//! - A staking aggregator is built from `(signer, public key)` pairs, so every collected
//!   signature is checked against the key of the signer that contributed it.

mod aggregator;
pub use aggregator::Aggregator;
mod reconstructor;
pub use reconstructor::Reconstructor;
mod schemes;
pub use schemes::{Staking, Threshold};

use crate::Identifier;
use bytes::Bytes;
use commonware_cryptography::bls12381::primitives::variant::{MinPk, Variant};
use std::collections::BTreeMap;
use thiserror::Error;

/// Public key of a signer (G1).
pub type Public = <MinPk as Variant>::Public;

/// Signature, or signature share, over G2.
pub type Signature = <MinPk as Variant>::Signature;

/// Errors that can occur when aggregating signatures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid signer: {0}")]
    InvalidSigner(Identifier),
    #[error("insufficient signatures: {0}/{1}")]
    InsufficientSignatures(usize, usize),
    #[error("invalid signature included")]
    InvalidSignatureIncluded,
}

/// Combines signatures collected by an [Aggregator].
///
/// Signatures are keyed by the signer's index in the aggregator's signer set.
pub trait Scheme: Send + Sync {
    /// Signature contributed by a single signer.
    type Signature: Clone + Send;

    /// Result of combining signatures.
    type Output: Clone + Send;

    /// Combines the collected signatures.
    fn combine(&self, signatures: &BTreeMap<u32, Self::Signature>) -> Result<Self::Output, Error>;
}

/// Aggregates staking (vote) signatures.
pub trait StakingAggregator: Send + Sync {
    /// Adds a signature that the caller has already verified.
    ///
    /// Returns `Ok(false)` if `signer` already contributed a signature.
    fn trusted_add(&self, signer: Identifier, signature: Signature) -> Result<bool, Error>;

    /// Returns the encoded aggregate signature.
    ///
    /// The caller must have confirmed that the collected signatures carry enough weight.
    fn aggregate(&self) -> Result<Bytes, Error>;
}

/// Aggregates partial signatures of a threshold scheme.
pub trait ThresholdAggregator: Send + Sync {
    /// Adds a partial signature that the caller has already verified.
    ///
    /// Returns `Ok(false)` if `signer` already contributed a signature.
    fn trusted_add(&self, signer: Identifier, signature: Signature) -> Result<bool, Error>;

    /// Returns the encoded threshold signature.
    fn aggregate(&self) -> Result<Bytes, Error>;
}

/// Reconstructs the random beacon signature from threshold shares.
pub trait BeaconReconstructor: Send + Sync {
    /// Adds a share that the caller has already verified.
    ///
    /// Returns `Ok(false)` if `signer` already contributed a share.
    fn trusted_add(&self, signer: Identifier, share: Signature) -> Result<bool, Error>;

    /// Returns whether enough shares are known to reconstruct the beacon.
    fn has_sufficient_shares(&self) -> bool;

    /// Reconstructs the beacon signature.
    ///
    /// Must only be called once [BeaconReconstructor::has_sufficient_shares] returns `true`;
    /// earlier calls return [Error::InsufficientSignatures].
    fn reconstruct(&self) -> Result<Signature, Error>;
}
