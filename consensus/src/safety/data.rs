use crate::types::{TimeoutObject, View};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, Read, ReadExt, Write};

/// State that must survive a restart for the safety rules to hold.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SafetyData {
    /// Highest view this replica voted or timed out in. Never decreases.
    pub highest_acknowledged_view: View,

    /// Highest QC view included in a block this replica voted for. Never decreases.
    pub locked_one_chain_view: View,

    /// Most recent timeout produced, returned again if the same view is timed out twice.
    pub last_timeout: Option<TimeoutObject>,
}

impl SafetyData {
    /// Bootstraps safety data at the trusted root block.
    ///
    /// The replica never votes at or below the root view.
    pub fn new(root_view: View) -> Self {
        Self {
            highest_acknowledged_view: root_view,
            locked_one_chain_view: root_view,
            last_timeout: None,
        }
    }
}

impl Write for SafetyData {
    fn write(&self, buf: &mut impl BufMut) {
        self.highest_acknowledged_view.write(buf);
        self.locked_one_chain_view.write(buf);
        self.last_timeout.write(buf);
    }
}

impl EncodeSize for SafetyData {
    fn encode_size(&self) -> usize {
        self.highest_acknowledged_view.encode_size()
            + self.locked_one_chain_view.encode_size()
            + self.last_timeout.encode_size()
    }
}

impl Read for SafetyData {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let highest_acknowledged_view = View::read(buf)?;
        let locked_one_chain_view = View::read(buf)?;
        let last_timeout = Option::<TimeoutObject>::read(buf)?;
        Ok(Self {
            highest_acknowledged_view,
            locked_one_chain_view,
            last_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuorumCertificate;
    use bytes::Bytes;
    use commonware_codec::{DecodeExt, Encode};
    use hotstuff_cryptography::Identifier;

    #[test]
    fn test_bootstrap() {
        let data = SafetyData::new(9);
        assert_eq!(data.highest_acknowledged_view, 9);
        assert_eq!(data.locked_one_chain_view, 9);
        assert!(data.last_timeout.is_none());
    }

    #[test]
    fn test_codec_with_timeout() {
        let data = SafetyData {
            highest_acknowledged_view: 7,
            locked_one_chain_view: 5,
            last_timeout: Some(TimeoutObject {
                view: 7,
                newest_qc: QuorumCertificate::new(
                    6,
                    Identifier::from_seed(6),
                    Bytes::new(),
                    Bytes::from_static(b"qc"),
                ),
                last_view_tc: None,
                signer_id: Identifier::from_seed(1),
                sig_data: Bytes::from_static(b"timeout"),
            }),
        };
        let encoded = data.encode();
        assert_eq!(SafetyData::decode(encoded).unwrap(), data);
    }

    #[test]
    fn test_truncated() {
        let encoded = SafetyData::new(3).encode();
        assert!(matches!(
            SafetyData::decode(&encoded[..10]),
            Err(CodecError::EndOfBuffer)
        ));
    }
}
