use super::{Aggregator, BeaconReconstructor, Error, Public, Signature, Threshold};
use crate::Identifier;

/// Reconstructs the random beacon from threshold signature shares over a seed.
pub struct Reconstructor {
    threshold: usize,
    aggregator: Aggregator<Threshold>,
}

impl Reconstructor {
    /// Creates a reconstructor where `signers[i]` holds share `i` of the group key `public`.
    pub fn new(
        threshold: u32,
        public: Public,
        namespace: &[u8],
        seed: &[u8],
        signers: &[Identifier],
    ) -> Self {
        assert!(
            threshold as usize <= signers.len(),
            "threshold must not exceed signers"
        );
        Self {
            threshold: threshold as usize,
            aggregator: Aggregator::new(Threshold::new(threshold, public, namespace, seed), signers),
        }
    }

    /// Number of shares still required.
    pub fn missing(&self) -> usize {
        self.threshold.saturating_sub(self.aggregator.len())
    }
}

impl BeaconReconstructor for Reconstructor {
    fn trusted_add(&self, signer: Identifier, share: Signature) -> Result<bool, Error> {
        self.aggregator.add(signer, share)
    }

    fn has_sufficient_shares(&self) -> bool {
        self.aggregator.len() >= self.threshold
    }

    fn reconstruct(&self) -> Result<Signature, Error> {
        let collected = self.aggregator.len();
        if collected < self.threshold {
            return Err(Error::InsufficientSignatures(collected, self.threshold));
        }
        self.aggregator.combine()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_cryptography::bls12381::{
        dkg,
        primitives::{group::Share, ops, variant::MinPk},
    };
    use rand::{rngs::StdRng, SeedableRng};
    use std::thread;

    const NAMESPACE: &[u8] = b"_HOTSTUFF_BEACON";
    const SEED: &[u8] = b"view 9";

    fn deal(seed: u64, n: u32, t: u32) -> (Public, Vec<Share>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (polynomial, shares) = dkg::ops::generate_shares::<_, MinPk>(&mut rng, None, n, t);
        (*polynomial.constant(), shares)
    }

    fn sign_share(share: &Share) -> Signature {
        ops::partial_sign_message::<MinPk>(share, Some(NAMESPACE), SEED).value
    }

    fn verify(public: &Public, beacon: &Signature) {
        ops::verify_message::<MinPk>(public, Some(NAMESPACE), SEED, beacon).unwrap();
    }

    #[test]
    fn test_reconstruct() {
        let (n, t) = (7, 5);
        let (public, shares) = deal(0, n, t);
        let ids: Vec<_> = (0..n as u64).map(Identifier::from_seed).collect();
        let reconstructor = Reconstructor::new(t, public, NAMESPACE, SEED, &ids);

        for i in 0..4 {
            let share = sign_share(&shares[i]);
            assert_eq!(reconstructor.trusted_add(ids[i], share), Ok(true));
        }
        assert!(!reconstructor.has_sufficient_shares());
        assert_eq!(reconstructor.missing(), 1);
        assert_eq!(
            reconstructor.reconstruct(),
            Err(Error::InsufficientSignatures(4, 5))
        );

        // Duplicate does not count towards the threshold
        let share = sign_share(&shares[0]);
        assert_eq!(reconstructor.trusted_add(ids[0], share), Ok(false));
        assert!(!reconstructor.has_sufficient_shares());

        let share = sign_share(&shares[6]);
        assert_eq!(reconstructor.trusted_add(ids[6], share), Ok(true));
        assert!(reconstructor.has_sufficient_shares());
        let beacon = reconstructor.reconstruct().unwrap();
        verify(&public, &beacon);
    }

    #[test]
    fn test_concurrent_adds() {
        let (n, t) = (6, 4);
        let (public, shares) = deal(1, n, t);
        let ids: Vec<_> = (0..n as u64).map(Identifier::from_seed).collect();
        let reconstructor = Reconstructor::new(t, public, NAMESPACE, SEED, &ids);

        thread::scope(|s| {
            for (id, share) in ids.iter().zip(shares.iter()) {
                let reconstructor = &reconstructor;
                s.spawn(move || {
                    let share = sign_share(share);
                    reconstructor.trusted_add(*id, share).unwrap();
                    // Every thread may race to reconstruct once enough shares arrived
                    if reconstructor.has_sufficient_shares() {
                        let beacon = reconstructor.reconstruct().unwrap();
                        verify(&public, &beacon);
                    }
                });
            }
        });
        assert!(reconstructor.has_sufficient_shares());
        assert_eq!(reconstructor.missing(), 0);
    }

    #[test]
    fn test_unknown_signer() {
        let (public, shares) = deal(2, 3, 2);
        let ids: Vec<_> = (0..3).map(Identifier::from_seed).collect();
        let reconstructor = Reconstructor::new(2, public, NAMESPACE, SEED, &ids);
        let outsider = Identifier::from_seed(99);
        let share = sign_share(&shares[0]);
        assert_eq!(
            reconstructor.trusted_add(outsider, share),
            Err(Error::InvalidSigner(outsider))
        );
    }
}
