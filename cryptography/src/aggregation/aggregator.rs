use super::{
    Error, Public, Scheme, Signature, Staking, StakingAggregator, Threshold, ThresholdAggregator,
};
use crate::Identifier;
use bytes::Bytes;
use commonware_codec::Encode;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

struct State<S: Scheme> {
    signatures: BTreeMap<u32, S::Signature>,
    combined: Option<Result<S::Output, Error>>,
}

/// Thread-safe bookkeeping of signatures from a fixed set of signers.
///
/// All state is guarded by a single lock that is held while combining, so concurrent
/// callers of [Aggregator::combine] wait for (and then share) the first computation.
///
/// The lock is also held through the scheme's verification of the combined signature
/// (a pairing check for [Staking] and [Threshold]): every [Aggregator::add] issued while a
/// combination is in progress blocks until it completes.
pub struct Aggregator<S: Scheme> {
    scheme: S,
    signers: HashMap<Identifier, u32>,
    state: Mutex<State<S>>,
}

impl<S: Scheme> Aggregator<S> {
    /// Creates an aggregator for `signers`, indexed by their position.
    ///
    /// # Panics
    ///
    /// Panics if `signers` contains duplicates.
    pub fn new(scheme: S, signers: &[Identifier]) -> Self {
        let mut indices = HashMap::with_capacity(signers.len());
        for (index, signer) in signers.iter().enumerate() {
            let index = u32::try_from(index).expect("too many signers");
            assert!(
                indices.insert(*signer, index).is_none(),
                "duplicate signer: {signer}"
            );
        }
        Self {
            scheme,
            signers: indices,
            state: Mutex::new(State {
                signatures: BTreeMap::new(),
                combined: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    /// Returns the index of `signer`, if it belongs to the signer set.
    pub fn index(&self, signer: &Identifier) -> Option<u32> {
        self.signers.get(signer).copied()
    }

    /// Adds the (already verified) signature of `signer`.
    ///
    /// Returns `Ok(false)` if `signer` already contributed.
    pub fn add(&self, signer: Identifier, signature: S::Signature) -> Result<bool, Error> {
        let index = self.index(&signer).ok_or(Error::InvalidSigner(signer))?;
        let mut state = self.state();
        if state.signatures.contains_key(&index) {
            return Ok(false);
        }
        state.signatures.insert(index, signature);
        state.combined = None;
        Ok(true)
    }

    /// Returns whether `signer` already contributed.
    pub fn contains(&self, signer: &Identifier) -> bool {
        match self.index(signer) {
            Some(index) => self.state().signatures.contains_key(&index),
            None => false,
        }
    }

    /// Number of collected signatures.
    pub fn len(&self) -> usize {
        self.state().signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Combines the collected signatures.
    ///
    /// The result is cached until another signature is added.
    pub fn combine(&self) -> Result<S::Output, Error> {
        let mut state = self.state();
        if let Some(combined) = &state.combined {
            return combined.clone();
        }
        let combined = self.scheme.combine(&state.signatures);
        state.combined = Some(combined.clone());
        combined
    }
}

impl Aggregator<Staking> {
    /// Creates a staking aggregator over `message` for `participants`, each given with the
    /// public key its signature is checked against.
    ///
    /// # Panics
    ///
    /// Panics if a participant is listed twice.
    pub fn staking(
        namespace: &[u8],
        message: &[u8],
        participants: &[(Identifier, Public)],
    ) -> Self {
        let (signers, publics): (Vec<Identifier>, Vec<Public>) =
            participants.iter().copied().unzip();
        Self::new(Staking::new(namespace, message, publics), &signers)
    }
}

impl StakingAggregator for Aggregator<Staking> {
    fn trusted_add(&self, signer: Identifier, signature: Signature) -> Result<bool, Error> {
        self.add(signer, signature)
    }

    fn aggregate(&self) -> Result<Bytes, Error> {
        let signature = self.combine()?;
        Ok(Bytes::copy_from_slice(&signature.encode()))
    }
}

impl ThresholdAggregator for Aggregator<Threshold> {
    fn trusted_add(&self, signer: Identifier, signature: Signature) -> Result<bool, Error> {
        self.add(signer, signature)
    }

    fn aggregate(&self) -> Result<Bytes, Error> {
        let signature = self.combine()?;
        Ok(Bytes::copy_from_slice(&signature.encode()))
    }
}
