use super::{Error, Public, Scheme, Signature};
use commonware_cryptography::bls12381::primitives::{ops, poly::Eval, variant::MinPk};
use std::collections::BTreeMap;

/// BLS signature aggregation over a single message.
///
/// The aggregate is checked against the aggregate public key of the contributing signers,
/// so a forged signature that slipped past the caller surfaces as
/// [Error::InvalidSignatureIncluded].
pub struct Staking {
    namespace: Vec<u8>,
    message: Vec<u8>,
    publics: Vec<Public>,
}

impl Staking {
    /// `publics[i]` is the key of signer `i`; built by [super::Aggregator::staking].
    pub(super) fn new(namespace: &[u8], message: &[u8], publics: Vec<Public>) -> Self {
        Self {
            namespace: namespace.to_vec(),
            message: message.to_vec(),
            publics,
        }
    }
}

impl Scheme for Staking {
    type Signature = Signature;
    type Output = Signature;

    fn combine(&self, signatures: &BTreeMap<u32, Signature>) -> Result<Signature, Error> {
        if signatures.is_empty() {
            return Err(Error::InsufficientSignatures(0, 1));
        }
        let aggregate = ops::aggregate_signatures::<MinPk, _>(signatures.values());
        let public = ops::aggregate_public_keys::<MinPk, _>(
            signatures
                .keys()
                .map(|index| &self.publics[*index as usize]),
        );
        ops::verify_message::<MinPk>(
            &public,
            Some(self.namespace.as_slice()),
            &self.message,
            &aggregate,
        )
        .map_err(|_| Error::InvalidSignatureIncluded)?;
        Ok(aggregate)
    }
}

/// Threshold signature recovery from partial signatures.
///
/// A signer's index in the [super::Aggregator] is its share index. The recovered signature
/// is checked against the group public key.
pub struct Threshold {
    threshold: u32,
    public: Public,
    namespace: Vec<u8>,
    message: Vec<u8>,
}

impl Threshold {
    pub fn new(threshold: u32, public: Public, namespace: &[u8], message: &[u8]) -> Self {
        assert!(threshold > 0, "threshold must be positive");
        Self {
            threshold,
            public,
            namespace: namespace.to_vec(),
            message: message.to_vec(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Scheme for Threshold {
    type Signature = Signature;
    type Output = Signature;

    fn combine(&self, signatures: &BTreeMap<u32, Signature>) -> Result<Signature, Error> {
        let required = self.threshold as usize;
        if signatures.len() < required {
            return Err(Error::InsufficientSignatures(signatures.len(), required));
        }
        let partials: Vec<_> = signatures
            .iter()
            .map(|(index, value)| Eval {
                index: *index,
                value: *value,
            })
            .collect();
        let recovered = ops::threshold_signature_recover::<MinPk, _>(self.threshold, &partials)
            .map_err(|_| Error::InvalidSignatureIncluded)?;
        ops::verify_message::<MinPk>(
            &self.public,
            Some(self.namespace.as_slice()),
            &self.message,
            &recovered,
        )
        .map_err(|_| Error::InvalidSignatureIncluded)?;
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregation::{Aggregator, StakingAggregator, ThresholdAggregator},
        Identifier,
    };
    use commonware_codec::DecodeExt;
    use commonware_cryptography::bls12381::{dkg, primitives::group::Private};
    use rand::{rngs::StdRng, SeedableRng};

    const NAMESPACE: &[u8] = b"_HOTSTUFF_VOTE";
    const MESSAGE: &[u8] = b"block 6";

    fn committee(n: u64) -> (Vec<(Identifier, Public)>, Vec<Private>) {
        let mut rng = StdRng::seed_from_u64(n);
        let mut participants = Vec::new();
        let mut privates = Vec::new();
        for i in 0..n {
            let (private, public) = ops::keypair::<_, MinPk>(&mut rng);
            participants.push((Identifier::from_seed(i), public));
            privates.push(private);
        }
        (participants, privates)
    }

    fn sign(private: &Private, message: &[u8]) -> Signature {
        ops::sign_message::<MinPk>(private, Some(NAMESPACE), message)
    }

    #[test]
    fn test_staking_aggregate() {
        let (participants, privates) = committee(4);
        let aggregator = Aggregator::staking(NAMESPACE, MESSAGE, &participants);
        for i in [0, 2, 3] {
            let signer = participants[i].0;
            assert_eq!(
                aggregator.trusted_add(signer, sign(&privates[i], MESSAGE)),
                Ok(true)
            );
        }
        let encoded = aggregator.aggregate().unwrap();
        let signature = Signature::decode(encoded).unwrap();
        let public = ops::aggregate_public_keys::<MinPk, _>([
            &participants[0].1,
            &participants[2].1,
            &participants[3].1,
        ]);
        ops::verify_message::<MinPk>(&public, Some(NAMESPACE), MESSAGE, &signature).unwrap();
    }

    #[test]
    fn test_staking_counts_every_participant() {
        // Every honest participant, including the last one listed, has its key in the aggregate
        let (participants, privates) = committee(3);
        let aggregator = Aggregator::staking(NAMESPACE, MESSAGE, &participants);
        for (i, (signer, _)) in participants.iter().enumerate() {
            assert_eq!(
                aggregator.trusted_add(*signer, sign(&privates[i], MESSAGE)),
                Ok(true)
            );
        }
        let signature = Signature::decode(aggregator.aggregate().unwrap()).unwrap();
        let public =
            ops::aggregate_public_keys::<MinPk, _>(participants.iter().map(|(_, public)| public));
        ops::verify_message::<MinPk>(&public, Some(NAMESPACE), MESSAGE, &signature).unwrap();
    }

    #[test]
    fn test_staking_invalid_signature_included() {
        let (participants, privates) = committee(3);
        let aggregator = Aggregator::staking(NAMESPACE, MESSAGE, &participants);
        aggregator
            .trusted_add(participants[0].0, sign(&privates[0], MESSAGE))
            .unwrap();
        aggregator
            .trusted_add(participants[1].0, sign(&privates[1], b"other block"))
            .unwrap();
        assert_eq!(aggregator.aggregate(), Err(Error::InvalidSignatureIncluded));
    }

    #[test]
    fn test_staking_empty() {
        let (participants, _) = committee(2);
        let aggregator = Aggregator::staking(NAMESPACE, MESSAGE, &participants);
        assert_eq!(
            aggregator.aggregate(),
            Err(Error::InsufficientSignatures(0, 1))
        );
    }

    #[test]
    fn test_threshold_aggregate() {
        let mut rng = StdRng::seed_from_u64(7);
        let (n, t) = (4, 3);
        let (polynomial, shares) = dkg::ops::generate_shares::<_, MinPk>(&mut rng, None, n, t);
        let public = *polynomial.constant();
        let ids: Vec<_> = (0..n as u64).map(Identifier::from_seed).collect();
        let aggregator = Aggregator::new(Threshold::new(t, public, NAMESPACE, MESSAGE), &ids);

        let partial = |i: usize| {
            ops::partial_sign_message::<MinPk>(&shares[i], Some(NAMESPACE), MESSAGE).value
        };
        aggregator.trusted_add(ids[3], partial(3)).unwrap();
        aggregator.trusted_add(ids[1], partial(1)).unwrap();
        assert_eq!(
            aggregator.aggregate(),
            Err(Error::InsufficientSignatures(2, 3))
        );

        aggregator.trusted_add(ids[0], partial(0)).unwrap();
        let signature = Signature::decode(aggregator.aggregate().unwrap()).unwrap();
        ops::verify_message::<MinPk>(&public, Some(NAMESPACE), MESSAGE, &signature).unwrap();
    }
}
