//! Collaborators with inspectable state and injectable failures.
//!
//! Every mock is a cheap handle over shared state, so a test can keep a clone after handing
//! the mock to the engine.

use crate::{
    safety::SafetyData,
    types::{Block, QuorumCertificate, TimeoutCertificate, TimeoutObject, View, Vote},
    CommitteeError, Identity,
};
use bytes::Bytes;
use commonware_codec::Encode;
use hotstuff_cryptography::Identifier;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};
use thiserror::Error;

/// Injected failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("injected failure: {0}")]
pub struct Failure(pub &'static str);

/// Signs with a deterministic digest instead of a key.
#[derive(Clone)]
pub struct Signer {
    me: Identifier,

    pub votes: Arc<Mutex<Vec<Vote>>>,
    pub timeouts: Arc<Mutex<Vec<TimeoutObject>>>,
    fail: Arc<Mutex<bool>>,
}

impl Signer {
    pub fn new(me: Identifier) -> Self {
        Self {
            me,
            votes: Arc::new(Mutex::new(Vec::new())),
            timeouts: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Fails the next signing request.
    pub fn fail_next(&self) {
        *self.fail.lock().unwrap() = true;
    }

    fn check(&self) -> Result<(), Failure> {
        let mut fail = self.fail.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(Failure("signer"));
        }
        Ok(())
    }

    fn sign(&self, message: &[u8]) -> Bytes {
        let mut payload = self.me.as_ref().to_vec();
        payload.extend_from_slice(message);
        Bytes::copy_from_slice(Identifier::hash(&payload).as_ref())
    }
}

impl crate::Signer for Signer {
    type Error = Failure;

    fn create_vote(&self, block: &Block) -> Result<Vote, Failure> {
        self.check()?;
        let mut message = block.view.encode().to_vec();
        message.extend_from_slice(block.block_id.as_ref());
        let vote = Vote {
            view: block.view,
            block_id: block.block_id,
            signer_id: self.me,
            sig_data: self.sign(&message),
        };
        self.votes.lock().unwrap().push(vote.clone());
        Ok(vote)
    }

    fn create_timeout(
        &self,
        view: View,
        newest_qc: &QuorumCertificate,
        last_view_tc: Option<&TimeoutCertificate>,
    ) -> Result<TimeoutObject, Failure> {
        self.check()?;
        let mut message = view.encode().to_vec();
        message.extend_from_slice(&newest_qc.view.encode());
        let timeout = TimeoutObject {
            view,
            newest_qc: newest_qc.clone(),
            last_view_tc: last_view_tc.cloned(),
            signer_id: self.me,
            sig_data: self.sign(&message),
        };
        self.timeouts.lock().unwrap().push(timeout.clone());
        Ok(timeout)
    }
}

/// Keeps the last stored [SafetyData] in memory.
#[derive(Clone, Default)]
pub struct Persister {
    pub stored: Arc<Mutex<Option<SafetyData>>>,
    pub writes: Arc<Mutex<usize>>,
    fail: Arc<Mutex<bool>>,
}

impl Persister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `safety_data` already stored.
    pub fn with(safety_data: SafetyData) -> Self {
        let persister = Self::default();
        *persister.stored.lock().unwrap() = Some(safety_data);
        persister
    }

    /// Fails the next write.
    pub fn fail_next(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn stored(&self) -> Option<SafetyData> {
        self.stored.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl crate::Persister for Persister {
    type Error = Failure;

    fn put_safety_data(&mut self, safety_data: &SafetyData) -> Result<(), Failure> {
        {
            let mut fail = self.fail.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(Failure("persister"));
            }
        }
        *self.stored.lock().unwrap() = Some(safety_data.clone());
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }

    fn get_safety_data(&self) -> Result<Option<SafetyData>, Failure> {
        Ok(self.stored())
    }
}

/// A committee where every member has weight 1 at every block.
#[derive(Clone)]
pub struct Committee {
    me: Identifier,

    members: Arc<Mutex<HashSet<Identifier>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl Committee {
    pub fn new(me: Identifier, members: impl IntoIterator<Item = Identifier>) -> Self {
        Self {
            me,
            members: Arc::new(Mutex::new(members.into_iter().collect())),
            unavailable: Arc::new(Mutex::new(false)),
        }
    }

    /// Removes `node` from the committee.
    pub fn eject(&self, node: &Identifier) {
        self.members.lock().unwrap().remove(node);
    }

    /// Makes every lookup fail with [CommitteeError::Unavailable].
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }
}

impl crate::Committee for Committee {
    fn identity_by_block(
        &self,
        _block_id: &Identifier,
        node_id: &Identifier,
    ) -> Result<Identity, CommitteeError> {
        if *self.unavailable.lock().unwrap() {
            return Err(CommitteeError::Unavailable("mock".into()));
        }
        if !self.members.lock().unwrap().contains(node_id) {
            return Err(CommitteeError::InvalidSigner(*node_id));
        }
        Ok(Identity {
            node_id: *node_id,
            weight: 1,
        })
    }

    fn me(&self) -> Identifier {
        self.me
    }
}
