//! Identify consensus artifacts and aggregate signatures.
//!
//! # Overview
//!
//! - [Identifier]: 32-byte SHA-256 digests naming nodes, blocks and messages.
//! - [aggregation]: thread-safe accumulation of verified BLS12-381 signatures (public keys in
//!   G1, signatures in G2) into a staking aggregate, a threshold signature or a random beacon.

pub mod aggregation;
mod identifier;
pub use identifier::Identifier;
