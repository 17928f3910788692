use super::{metrics::Metrics, Config, Decision, Decline, Error, SafetyData, Violation};
use crate::{
    types::{Block, Proposal, QuorumCertificate, TimeoutCertificate, TimeoutObject, View, Vote},
    Committee, CommitteeError, Persister, Signer,
};
use hotstuff_cryptography::Identifier;
use prometheus_client::registry::Registry;
use tracing::{debug, info, warn};

/// Decides whether to vote or time out, and persists the watermarks that keep those
/// decisions safe.
pub struct SafetyRules<S: Signer, P: Persister, C: Committee> {
    signer: S,
    persister: P,
    committee: C,

    safety_data: SafetyData,

    metrics: Metrics,
}

impl<S: Signer, P: Persister, C: Committee> SafetyRules<S, P, C> {
    /// Loads [SafetyData] from the persister (or bootstraps it at `cfg.root_view`) and
    /// creates the engine.
    pub fn init(registry: &mut Registry, cfg: Config<S, P, C>) -> Result<Self, Error> {
        let safety_data = match cfg.persister.get_safety_data() {
            Ok(Some(safety_data)) => {
                info!(
                    highest_acknowledged_view = safety_data.highest_acknowledged_view,
                    locked_one_chain_view = safety_data.locked_one_chain_view,
                    "loaded safety data"
                );
                safety_data
            }
            Ok(None) => {
                info!(root_view = cfg.root_view, "bootstrapping safety data");
                SafetyData::new(cfg.root_view)
            }
            Err(err) => {
                warn!(?err, "failed to load safety data");
                return Err(Error::Load(Box::new(err)));
            }
        };
        Ok(Self::new(registry, cfg, safety_data))
    }

    /// Creates the engine from already loaded [SafetyData].
    pub fn new(registry: &mut Registry, cfg: Config<S, P, C>, safety_data: SafetyData) -> Self {
        let metrics = Metrics::init(registry);
        metrics.watermarks(
            safety_data.highest_acknowledged_view,
            safety_data.locked_one_chain_view,
        );
        Self {
            signer: cfg.signer,
            persister: cfg.persister,
            committee: cfg.committee,
            safety_data,
            metrics,
        }
    }

    pub fn safety_data(&self) -> &SafetyData {
        &self.safety_data
    }

    /// Produces a vote for `proposal` in `current_view`.
    ///
    /// The caller must only request votes for blocks in the current view; a mismatch is
    /// returned as [Error::ViewMismatch].
    pub fn produce_vote(
        &mut self,
        proposal: &Proposal,
        current_view: View,
    ) -> Result<Decision<Vote>, Error> {
        let block = &proposal.block;
        if current_view != block.view {
            return Err(Error::ViewMismatch {
                expected: current_view,
                actual: block.view,
            });
        }
        if let Err(violation) = self.is_safe_to_vote(proposal) {
            return Ok(self.decline_vote(block, Decline::Unsafe(violation)));
        }

        // The proposal was validated upstream, so an invalid proposer can only have lost
        // its standing since
        match self
            .committee
            .identity_by_block(&block.block_id, &block.proposer_id)
        {
            Ok(_) => {}
            Err(CommitteeError::InvalidSigner(_)) => {
                return Ok(self.decline_vote(block, Decline::ProposerEjected(block.proposer_id)));
            }
            Err(source) => return Err(committee_failure(block, block.proposer_id, source)),
        }
        let me = self.committee.me();
        match self.committee.identity_by_block(&block.block_id, &me) {
            Ok(_) => {}
            Err(CommitteeError::InvalidSigner(_)) => {
                return Ok(self.decline_vote(block, Decline::NotCommitteeMember(me)));
            }
            Err(source) => return Err(committee_failure(block, me, source)),
        }

        let vote = self.signer.create_vote(block).map_err(|err| {
            warn!(view = block.view, block = %block.block_id, ?err, "failed to sign vote");
            Error::Signer(Box::new(err))
        })?;

        let mut next = self.safety_data.clone();
        next.highest_acknowledged_view = current_view;
        next.locked_one_chain_view = next.locked_one_chain_view.max(block.qc.view);
        self.persist(next)?;

        self.metrics.votes.inc();
        debug!(view = current_view, block = %block.block_id, "voted");
        Ok(Decision::Accepted(vote))
    }

    /// Produces a timeout for `current_view`.
    ///
    /// If a timeout was already produced for `current_view`, it is returned unchanged and
    /// nothing is signed or persisted.
    pub fn produce_timeout(
        &mut self,
        current_view: View,
        newest_qc: &QuorumCertificate,
        last_view_tc: Option<&TimeoutCertificate>,
    ) -> Result<Decision<TimeoutObject>, Error> {
        if let Some(last_timeout) = &self.safety_data.last_timeout {
            if last_timeout.view == current_view {
                debug!(view = current_view, "repeating timeout");
                return Ok(Decision::Accepted(last_timeout.clone()));
            }
        }
        if !self.is_safe_to_timeout(current_view, newest_qc, last_view_tc) {
            self.metrics.declined_timeouts.inc();
            debug!(
                view = current_view,
                qc = newest_qc.view,
                tc = last_view_tc.map(|tc| tc.view()),
                highest_acknowledged_view = self.safety_data.highest_acknowledged_view,
                locked_one_chain_view = self.safety_data.locked_one_chain_view,
                "declined timeout"
            );
            return Ok(Decision::Declined(Decline::UnsafeTimeout(current_view)));
        }

        let timeout = self
            .signer
            .create_timeout(current_view, newest_qc, last_view_tc)
            .map_err(|err| {
                warn!(view = current_view, ?err, "failed to sign timeout");
                Error::Signer(Box::new(err))
            })?;

        let mut next = self.safety_data.clone();
        next.highest_acknowledged_view = current_view;
        next.last_timeout = Some(timeout.clone());
        self.persist(next)?;

        self.metrics.timeouts.inc();
        debug!(view = current_view, qc = newest_qc.view, "timed out");
        Ok(Decision::Accepted(timeout))
    }

    /// Checks the voting rules for `proposal` against the current watermarks.
    pub fn is_safe_to_vote(&self, proposal: &Proposal) -> Result<(), Violation> {
        let block_view = proposal.block.view;
        let qc_view = proposal.block.qc.view;
        if block_view <= qc_view {
            return Err(Violation::QcNotBehindBlock {
                block: block_view,
                qc: qc_view,
            });
        }
        let acknowledged = self.safety_data.highest_acknowledged_view;
        if block_view <= acknowledged {
            return Err(Violation::AlreadyAcknowledged {
                view: block_view,
                acknowledged,
            });
        }

        // Happy path: the block extends the QC of the preceding view
        if block_view == qc_view + 1 {
            return Ok(());
        }
        self.is_safe_to_extend(block_view, qc_view, proposal.last_view_tc.as_ref())
    }

    /// Checks that a block skipping views past its QC is justified by a TC for the preceding
    /// view whose highest QC is not newer than the block's QC.
    pub fn is_safe_to_extend(
        &self,
        block_view: View,
        qc_view: View,
        last_view_tc: Option<&TimeoutCertificate>,
    ) -> Result<(), Violation> {
        let Some(tc) = last_view_tc else {
            return Err(Violation::MissingTimeoutCertificate {
                block: block_view,
                qc: qc_view,
            });
        };
        if tc.view().checked_add(1) != Some(block_view) {
            return Err(Violation::NonSequentialTimeoutCertificate {
                tc: tc.view(),
                block: block_view,
            });
        }
        if qc_view < tc.highest_qc_view() {
            return Err(Violation::QcRegression {
                qc: qc_view,
                required: tc.highest_qc_view(),
            });
        }
        Ok(())
    }

    /// Returns whether timing out `current_view` is safe.
    ///
    /// An absent `last_view_tc` never justifies `current_view`.
    pub fn is_safe_to_timeout(
        &self,
        current_view: View,
        newest_qc: &QuorumCertificate,
        last_view_tc: Option<&TimeoutCertificate>,
    ) -> bool {
        // Timing out the view last voted in is allowed
        if newest_qc.view < self.safety_data.locked_one_chain_view
            || current_view < self.safety_data.highest_acknowledged_view
            || current_view <= newest_qc.view
        {
            return false;
        }
        newest_qc.view + 1 == current_view
            || last_view_tc.is_some_and(|tc| tc.view().checked_add(1) == Some(current_view))
    }

    fn decline_vote(&self, block: &Block, reason: Decline) -> Decision<Vote> {
        self.metrics.declined_votes.inc();
        debug!(view = block.view, block = %block.block_id, %reason, "declined vote");
        Decision::Declined(reason)
    }

    /// Durably stores `next` and only then adopts it.
    fn persist(&mut self, next: SafetyData) -> Result<(), Error> {
        if let Err(err) = self.persister.put_safety_data(&next) {
            warn!(
                view = next.highest_acknowledged_view,
                ?err,
                "failed to persist safety data"
            );
            return Err(Error::Persist(Box::new(err)));
        }
        self.metrics
            .watermarks(next.highest_acknowledged_view, next.locked_one_chain_view);
        self.safety_data = next;
        Ok(())
    }
}

fn committee_failure(block: &Block, node: Identifier, source: CommitteeError) -> Error {
    warn!(view = block.view, block = %block.block_id, %node, ?source, "committee lookup failed");
    Error::Committee {
        block: block.block_id,
        node,
        source,
    }
}
