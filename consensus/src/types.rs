//! Certificates, votes, timeouts and proposals exchanged by HotStuff replicas.
//!
//! All types are immutable once constructed and implement the codec traits so they can be
//! persisted (as part of [crate::safety::SafetyData]) and identified by the digest of their
//! canonical encoding.

use bytes::{Buf, BufMut, Bytes};
use commonware_codec::{Encode, EncodeSize, Error as CodecError, Read, ReadExt, Write};
use hotstuff_cryptography::Identifier;
use thiserror::Error;

/// Round of the consensus protocol.
pub type View = u64;

/// Maximum length of signer indices or signature data accepted when decoding.
pub const MAX_SIGNATURE_DATA: usize = 64 * 1024;

/// Errors that can occur when constructing a certificate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("timeout certificate for view {view} carries newer qc (view {qc})")]
    TcQcAhead { view: View, qc: View },
}

fn read_payload(buf: &mut impl Buf) -> Result<Bytes, CodecError> {
    Bytes::read_cfg(buf, &(..=MAX_SIGNATURE_DATA).into())
}

/// Attests that a supermajority of stake voted for `block_id` at `view`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QuorumCertificate {
    pub view: View,
    pub block_id: Identifier,
    pub signer_indices: Bytes,
    pub sig_data: Bytes,
}

impl QuorumCertificate {
    pub fn new(view: View, block_id: Identifier, signer_indices: Bytes, sig_data: Bytes) -> Self {
        Self {
            view,
            block_id,
            signer_indices,
            sig_data,
        }
    }
}

impl Write for QuorumCertificate {
    fn write(&self, buf: &mut impl BufMut) {
        self.view.write(buf);
        self.block_id.write(buf);
        self.signer_indices.write(buf);
        self.sig_data.write(buf);
    }
}

impl EncodeSize for QuorumCertificate {
    fn encode_size(&self) -> usize {
        self.view.encode_size()
            + self.block_id.encode_size()
            + self.signer_indices.encode_size()
            + self.sig_data.encode_size()
    }
}

impl Read for QuorumCertificate {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let view = View::read(buf)?;
        let block_id = Identifier::read(buf)?;
        let signer_indices = read_payload(buf)?;
        let sig_data = read_payload(buf)?;
        Ok(Self {
            view,
            block_id,
            signer_indices,
            sig_data,
        })
    }
}

/// Attests that a supermajority of stake timed out `view` without observing a QC for it.
///
/// The highest QC known to the contributing replicas is never newer than `view`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimeoutCertificate {
    view: View,
    highest_qc: QuorumCertificate,
    signer_indices: Bytes,
    sig_data: Bytes,
}

impl TimeoutCertificate {
    /// Creates a timeout certificate, rejecting a `highest_qc` newer than `view`.
    pub fn new(
        view: View,
        highest_qc: QuorumCertificate,
        signer_indices: Bytes,
        sig_data: Bytes,
    ) -> Result<Self, Error> {
        if highest_qc.view > view {
            return Err(Error::TcQcAhead {
                view,
                qc: highest_qc.view,
            });
        }
        Ok(Self {
            view,
            highest_qc,
            signer_indices,
            sig_data,
        })
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn highest_qc(&self) -> &QuorumCertificate {
        &self.highest_qc
    }

    pub fn highest_qc_view(&self) -> View {
        self.highest_qc.view
    }

    pub fn signer_indices(&self) -> &Bytes {
        &self.signer_indices
    }

    pub fn sig_data(&self) -> &Bytes {
        &self.sig_data
    }
}

impl Write for TimeoutCertificate {
    fn write(&self, buf: &mut impl BufMut) {
        self.view.write(buf);
        self.highest_qc.write(buf);
        self.signer_indices.write(buf);
        self.sig_data.write(buf);
    }
}

impl EncodeSize for TimeoutCertificate {
    fn encode_size(&self) -> usize {
        self.view.encode_size()
            + self.highest_qc.encode_size()
            + self.signer_indices.encode_size()
            + self.sig_data.encode_size()
    }
}

impl Read for TimeoutCertificate {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let view = View::read(buf)?;
        let highest_qc = QuorumCertificate::read(buf)?;
        let signer_indices = read_payload(buf)?;
        let sig_data = read_payload(buf)?;
        Self::new(view, highest_qc, signer_indices, sig_data)
            .map_err(|_| CodecError::Invalid("TimeoutCertificate", "highest qc ahead of view"))
    }
}

/// A block as seen by the safety rules: its position and the QC certifying its parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    pub view: View,
    pub block_id: Identifier,
    pub proposer_id: Identifier,
    pub qc: QuorumCertificate,
}

impl Block {
    /// Creates a block whose identifier is derived from its header and `payload`.
    pub fn new(view: View, proposer_id: Identifier, qc: QuorumCertificate, payload: &[u8]) -> Self {
        let mut header = Vec::with_capacity(
            view.encode_size() + proposer_id.encode_size() + qc.encode_size() + payload.len(),
        );
        view.write(&mut header);
        proposer_id.write(&mut header);
        qc.write(&mut header);
        header.extend_from_slice(payload);
        Self {
            view,
            block_id: Identifier::hash(&header),
            proposer_id,
            qc,
        }
    }

    /// Identifier of the block certified by this block's QC.
    pub fn parent_id(&self) -> Identifier {
        self.qc.block_id
    }
}

impl Write for Block {
    fn write(&self, buf: &mut impl BufMut) {
        self.view.write(buf);
        self.block_id.write(buf);
        self.proposer_id.write(buf);
        self.qc.write(buf);
    }
}

impl EncodeSize for Block {
    fn encode_size(&self) -> usize {
        self.view.encode_size()
            + self.block_id.encode_size()
            + self.proposer_id.encode_size()
            + self.qc.encode_size()
    }
}

impl Read for Block {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let view = View::read(buf)?;
        let block_id = Identifier::read(buf)?;
        let proposer_id = Identifier::read(buf)?;
        let qc = QuorumCertificate::read(buf)?;
        Ok(Self {
            view,
            block_id,
            proposer_id,
            qc,
        })
    }
}

/// A candidate block and, on the recovery path, the TC for the preceding view.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Proposal {
    pub block: Block,
    pub last_view_tc: Option<TimeoutCertificate>,
}

impl Proposal {
    pub fn new(block: Block, last_view_tc: Option<TimeoutCertificate>) -> Self {
        Self {
            block,
            last_view_tc,
        }
    }
}

impl Write for Proposal {
    fn write(&self, buf: &mut impl BufMut) {
        self.block.write(buf);
        self.last_view_tc.write(buf);
    }
}

impl EncodeSize for Proposal {
    fn encode_size(&self) -> usize {
        self.block.encode_size() + self.last_view_tc.encode_size()
    }
}

impl Read for Proposal {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let block = Block::read(buf)?;
        let last_view_tc = Option::<TimeoutCertificate>::read(buf)?;
        Ok(Self {
            block,
            last_view_tc,
        })
    }
}

/// A replica's signed endorsement of `block_id` at `view`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Vote {
    pub view: View,
    pub block_id: Identifier,
    pub signer_id: Identifier,
    pub sig_data: Bytes,
}

impl Vote {
    /// Content-derived identifier of the vote.
    pub fn id(&self) -> Identifier {
        Identifier::hash(&self.encode())
    }
}

impl Write for Vote {
    fn write(&self, buf: &mut impl BufMut) {
        self.view.write(buf);
        self.block_id.write(buf);
        self.signer_id.write(buf);
        self.sig_data.write(buf);
    }
}

impl EncodeSize for Vote {
    fn encode_size(&self) -> usize {
        self.view.encode_size()
            + self.block_id.encode_size()
            + self.signer_id.encode_size()
            + self.sig_data.encode_size()
    }
}

impl Read for Vote {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let view = View::read(buf)?;
        let block_id = Identifier::read(buf)?;
        let signer_id = Identifier::read(buf)?;
        let sig_data = read_payload(buf)?;
        Ok(Self {
            view,
            block_id,
            signer_id,
            sig_data,
        })
    }
}

/// A replica's signed refusal to wait any longer in `view`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimeoutObject {
    pub view: View,
    pub newest_qc: QuorumCertificate,
    pub last_view_tc: Option<TimeoutCertificate>,
    pub signer_id: Identifier,
    pub sig_data: Bytes,
}

impl TimeoutObject {
    /// Content-derived identifier of the timeout.
    pub fn id(&self) -> Identifier {
        Identifier::hash(&self.encode())
    }
}

impl Write for TimeoutObject {
    fn write(&self, buf: &mut impl BufMut) {
        self.view.write(buf);
        self.newest_qc.write(buf);
        self.last_view_tc.write(buf);
        self.signer_id.write(buf);
        self.sig_data.write(buf);
    }
}

impl EncodeSize for TimeoutObject {
    fn encode_size(&self) -> usize {
        self.view.encode_size()
            + self.newest_qc.encode_size()
            + self.last_view_tc.encode_size()
            + self.signer_id.encode_size()
            + self.sig_data.encode_size()
    }
}

impl Read for TimeoutObject {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let view = View::read(buf)?;
        let newest_qc = QuorumCertificate::read(buf)?;
        let last_view_tc = Option::<TimeoutCertificate>::read(buf)?;
        let signer_id = Identifier::read(buf)?;
        let sig_data = read_payload(buf)?;
        Ok(Self {
            view,
            newest_qc,
            last_view_tc,
            signer_id,
            sig_data,
        })
    }
}
