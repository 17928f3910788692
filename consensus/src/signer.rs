//! BLS12-381 [crate::Signer] backed by a local private key.

use crate::{
    types::{Block, QuorumCertificate, TimeoutCertificate, TimeoutObject, View, Vote},
    Signer,
};
use bytes::{BufMut, Bytes};
use commonware_codec::{DecodeExt, Encode};
use commonware_cryptography::bls12381::primitives::{group::Private, ops, variant::MinPk};
use hotstuff_cryptography::{
    aggregation::{Public, Signature},
    Identifier,
};
use std::convert::Infallible;
use thiserror::Error;

const VOTE_SUFFIX: &[u8] = b"_VOTE";
const TIMEOUT_SUFFIX: &[u8] = b"_TIMEOUT";

/// Errors that can occur when verifying a signed artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed signature")]
    MalformedSignature,
    #[error("invalid signature")]
    InvalidSignature,
}

#[inline]
fn vote_namespace(namespace: &[u8]) -> Vec<u8> {
    [namespace, VOTE_SUFFIX].concat()
}

#[inline]
fn timeout_namespace(namespace: &[u8]) -> Vec<u8> {
    [namespace, TIMEOUT_SUFFIX].concat()
}

/// Message signed by a vote: `view || block_id`.
pub fn vote_message(view: View, block_id: &Identifier) -> Vec<u8> {
    let mut message = Vec::with_capacity(8 + 32);
    message.put_u64(view);
    message.put_slice(block_id.as_ref());
    message
}

/// Message signed by a timeout: `view || newest_qc.view`.
pub fn timeout_message(view: View, newest_qc_view: View) -> Vec<u8> {
    let mut message = Vec::with_capacity(16);
    message.put_u64(view);
    message.put_u64(newest_qc_view);
    message
}

fn verify(public: &Public, namespace: &[u8], message: &[u8], sig_data: &[u8]) -> Result<(), Error> {
    let signature = Signature::decode(sig_data).map_err(|_| Error::MalformedSignature)?;
    ops::verify_message::<MinPk>(public, Some(namespace), message, &signature)
        .map_err(|_| Error::InvalidSignature)
}

/// Verifies the signature of `vote` under `public`.
pub fn verify_vote(namespace: &[u8], public: &Public, vote: &Vote) -> Result<(), Error> {
    verify(
        public,
        &vote_namespace(namespace),
        &vote_message(vote.view, &vote.block_id),
        &vote.sig_data,
    )
}

/// Verifies the signature of `timeout` under `public`.
pub fn verify_timeout(
    namespace: &[u8],
    public: &Public,
    timeout: &TimeoutObject,
) -> Result<(), Error> {
    verify(
        public,
        &timeout_namespace(namespace),
        &timeout_message(timeout.view, timeout.newest_qc.view),
        &timeout.sig_data,
    )
}

/// Signs votes and timeouts with a BLS12-381 private key.
pub struct Local {
    me: Identifier,
    private: Private,
    public: Public,

    vote_namespace: Vec<u8>,
    timeout_namespace: Vec<u8>,
}

impl Local {
    /// Creates a signer for node `me`. Every signed message is prefixed with `namespace`.
    pub fn new(me: Identifier, private: Private, namespace: &[u8]) -> Self {
        let public = ops::compute_public::<MinPk>(&private);
        Self {
            me,
            private,
            public,
            vote_namespace: vote_namespace(namespace),
            timeout_namespace: timeout_namespace(namespace),
        }
    }

    pub fn public_key(&self) -> &Public {
        &self.public
    }

    fn sign(&self, namespace: &[u8], message: &[u8]) -> Bytes {
        let signature = ops::sign_message::<MinPk>(&self.private, Some(namespace), message);
        Bytes::copy_from_slice(&signature.encode())
    }
}

impl Signer for Local {
    type Error = Infallible;

    fn create_vote(&self, block: &Block) -> Result<Vote, Infallible> {
        let message = vote_message(block.view, &block.block_id);
        Ok(Vote {
            view: block.view,
            block_id: block.block_id,
            signer_id: self.me,
            sig_data: self.sign(&self.vote_namespace, &message),
        })
    }

    fn create_timeout(
        &self,
        view: View,
        newest_qc: &QuorumCertificate,
        last_view_tc: Option<&TimeoutCertificate>,
    ) -> Result<TimeoutObject, Infallible> {
        let message = timeout_message(view, newest_qc.view);
        Ok(TimeoutObject {
            view,
            newest_qc: newest_qc.clone(),
            last_view_tc: last_view_tc.cloned(),
            signer_id: self.me,
            sig_data: self.sign(&self.timeout_namespace, &message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks,
        safety::{Config, SafetyData, SafetyRules},
        types::Proposal,
    };
    use commonware_codec::FixedSize;
    use commonware_macros::test_traced;
    use hotstuff_cryptography::aggregation::{Aggregator, StakingAggregator};
    use prometheus_client::registry::Registry;
    use rand::{rngs::StdRng, SeedableRng};

    const NAMESPACE: &[u8] = b"_HOTSTUFF";

    fn qc(view: View) -> QuorumCertificate {
        QuorumCertificate::new(view, Identifier::from_seed(view), Bytes::new(), Bytes::new())
    }

    fn signer(seed: u64) -> Local {
        let mut rng = StdRng::seed_from_u64(seed);
        let (private, _) = ops::keypair::<_, MinPk>(&mut rng);
        Local::new(Identifier::from_seed(seed), private, NAMESPACE)
    }

    #[test]
    fn test_vote_signature() {
        let local = signer(0);
        let block = Block::new(6, Identifier::from_seed(9), qc(5), b"payload");
        let vote = local.create_vote(&block).unwrap();
        verify_vote(NAMESPACE, local.public_key(), &vote).unwrap();

        // Signature does not transfer to another block, namespace or key
        let mut other = vote.clone();
        other.view = 7;
        assert_eq!(
            verify_vote(NAMESPACE, local.public_key(), &other),
            Err(Error::InvalidSignature)
        );
        assert_eq!(
            verify_vote(b"_OTHER", local.public_key(), &vote),
            Err(Error::InvalidSignature)
        );
        assert_eq!(
            verify_vote(NAMESPACE, signer(1).public_key(), &vote),
            Err(Error::InvalidSignature)
        );

        let mut malformed = vote;
        malformed.sig_data = Bytes::from_static(b"short");
        assert_eq!(
            verify_vote(NAMESPACE, local.public_key(), &malformed),
            Err(Error::MalformedSignature)
        );
    }

    #[test]
    fn test_timeout_signature() {
        let local = signer(0);
        let timeout = local.create_timeout(7, &qc(5), None).unwrap();
        verify_timeout(NAMESPACE, local.public_key(), &timeout).unwrap();

        // A vote signature is never a valid timeout signature
        let mut forged = timeout.clone();
        let block = Block::new(7, Identifier::from_seed(9), qc(5), b"payload");
        forged.sig_data = local.create_vote(&block).unwrap().sig_data;
        assert_eq!(
            verify_timeout(NAMESPACE, local.public_key(), &forged),
            Err(Error::InvalidSignature)
        );
    }

    #[test_traced]
    fn test_engine_votes_aggregate() {
        // Four replicas vote on the same block through their own engines
        let signers: Vec<_> = (0..4).map(signer).collect();
        let ids: Vec<_> = (0..4).map(Identifier::from_seed).collect();
        let participants: Vec<_> = ids
            .iter()
            .zip(signers.iter())
            .map(|(id, signer)| (*id, *signer.public_key()))
            .collect();
        let proposer = ids[0];
        let block = Block::new(6, proposer, qc(5), b"payload");
        let proposal = Proposal::new(block.clone(), None);

        let message = vote_message(block.view, &block.block_id);
        let aggregator = Aggregator::staking(&vote_namespace(NAMESPACE), &message, &participants);
        for (signer, id) in signers.into_iter().zip(ids.iter()) {
            let mut registry = Registry::default();
            let mut engine = SafetyRules::new(
                &mut registry,
                Config {
                    signer,
                    persister: mocks::Persister::new(),
                    committee: mocks::Committee::new(*id, ids.clone()),
                    root_view: 0,
                },
                SafetyData::new(5),
            );
            let vote = engine.produce_vote(&proposal, 6).unwrap().accepted().unwrap();
            let signature = Signature::decode(vote.sig_data.clone()).unwrap();
            assert!(aggregator.trusted_add(vote.signer_id, signature).unwrap());
        }
        let aggregate = aggregator.aggregate().unwrap();
        assert_eq!(aggregate.len(), Signature::SIZE);
    }
}
