use super::error::DecodeError;
use super::layout;
use super::reader::PayloadReader;

/// Opcodes this node can receive. Values the table does not know are kept
/// verbatim in `Unknown` so the engine can report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Poll,
    PollReply,
    DiagData,
    Output,
    Address,
    Input,
    TodRequest,
    TodData,
    TodControl,
    Rdm,
    RdmSub,
    Media,
    MediaPatch,
    MediaControl,
    MediaControlReply,
    TimeCode,
    VideoSetup,
    VideoPalette,
    VideoData,
    MacMaster,
    MacSlave,
    FirmwareMaster,
    FirmwareReply,
    IpProg,
    IpProgReply,
    Unknown(u16),
}

impl Opcode {
    pub fn from_wire(raw: u16) -> Self {
        match raw {
            layout::OP_POLL => Opcode::Poll,
            layout::OP_POLL_REPLY => Opcode::PollReply,
            layout::OP_DIAG_DATA => Opcode::DiagData,
            layout::OP_OUTPUT => Opcode::Output,
            layout::OP_ADDRESS => Opcode::Address,
            layout::OP_INPUT => Opcode::Input,
            layout::OP_TOD_REQUEST => Opcode::TodRequest,
            layout::OP_TOD_DATA => Opcode::TodData,
            layout::OP_TOD_CONTROL => Opcode::TodControl,
            layout::OP_RDM => Opcode::Rdm,
            layout::OP_RDM_SUB => Opcode::RdmSub,
            layout::OP_MEDIA => Opcode::Media,
            layout::OP_MEDIA_PATCH => Opcode::MediaPatch,
            layout::OP_MEDIA_CONTROL => Opcode::MediaControl,
            layout::OP_MEDIA_CONTROL_REPLY => Opcode::MediaControlReply,
            layout::OP_TIMECODE => Opcode::TimeCode,
            layout::OP_VIDEO_SETUP => Opcode::VideoSetup,
            layout::OP_VIDEO_PALETTE => Opcode::VideoPalette,
            layout::OP_VIDEO_DATA => Opcode::VideoData,
            layout::OP_MAC_MASTER => Opcode::MacMaster,
            layout::OP_MAC_SLAVE => Opcode::MacSlave,
            layout::OP_FIRMWARE_MASTER => Opcode::FirmwareMaster,
            layout::OP_FIRMWARE_REPLY => Opcode::FirmwareReply,
            layout::OP_IP_PROG => Opcode::IpProg,
            layout::OP_IP_PROG_REPLY => Opcode::IpProgReply,
            other => Opcode::Unknown(other),
        }
    }

    /// Minimum payload bytes the opcode's handler reads. Per-port columns in
    /// ArtAddress and ArtInput scale with the node's port count.
    pub fn min_payload_len(self, port_count: usize) -> usize {
        match self {
            Opcode::Poll => 2,
            Opcode::Output => 6,
            Opcode::Address => 97 + 2 * port_count,
            Opcode::Input => 4 + port_count,
            Opcode::IpProg => 10,
            _ => 0,
        }
    }
}

/// Decoded header plus a borrowed view of the payload. Never outlives the
/// datagram buffer it was decoded from.
#[derive(Debug)]
pub struct DecodedPacket<'a> {
    pub opcode: Opcode,
    pub protocol_version: u16,
    pub payload: &'a [u8],
}

/// Decode a raw datagram into a typed header and payload view.
///
/// Fails with `BadMagic` when the signature does not match (including
/// buffers shorter than the signature itself) and with `Truncated` when the
/// buffer cannot hold the fixed header or the opcode's minimum payload.
/// Legacy protocol versions decode successfully; acting on them is the
/// caller's decision.
pub fn decode(raw: &[u8], port_count: usize) -> Result<DecodedPacket<'_>, DecodeError> {
    let reader = PayloadReader::new(raw);
    let signature = reader
        .read_slice(0..layout::SIGNATURE.len())
        .map_err(|_| DecodeError::BadMagic)?;
    if signature != layout::SIGNATURE {
        return Err(DecodeError::BadMagic);
    }

    reader.require_len(layout::HEADER_LEN)?;
    let opcode = Opcode::from_wire(reader.read_u16_le(layout::OPCODE_RANGE.clone())?);
    let protocol_version = reader.read_u16_be(layout::PROTOCOL_VERSION_RANGE.clone())?;

    let payload = reader.read_slice(layout::HEADER_LEN..raw.len())?;
    let needed = opcode.min_payload_len(port_count);
    if payload.len() < needed {
        return Err(DecodeError::Truncated {
            needed: layout::HEADER_LEN + needed,
            actual: raw.len(),
        });
    }

    Ok(DecodedPacket {
        opcode,
        protocol_version,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::{Opcode, decode};
    use crate::protocol::error::DecodeError;
    use crate::protocol::layout;

    fn datagram(opcode: u16, payload: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(layout::SIGNATURE);
        raw.extend_from_slice(&opcode.to_le_bytes());
        raw.extend_from_slice(&layout::PROTOCOL_VERSION.to_be_bytes());
        raw.extend_from_slice(payload);
        raw
    }

    #[test]
    fn decode_poll() {
        let raw = datagram(layout::OP_POLL, &[0x0e, 0x10]);
        let packet = decode(&raw, 4).unwrap();
        assert_eq!(packet.opcode, Opcode::Poll);
        assert_eq!(packet.protocol_version, 14);
        assert_eq!(packet.payload, &[0x0e, 0x10]);
    }

    #[test]
    fn decode_bad_magic() {
        let mut raw = datagram(layout::OP_POLL, &[0, 0]);
        raw[0] = b'B';
        assert!(matches!(decode(&raw, 4), Err(DecodeError::BadMagic)));
    }

    #[test]
    fn decode_short_buffer_is_bad_magic() {
        assert!(matches!(decode(b"Art-N", 4), Err(DecodeError::BadMagic)));
    }

    #[test]
    fn decode_signature_without_header_is_truncated() {
        let raw = b"Art-Net\0\x00";
        let err = decode(raw, 4).unwrap_err();
        assert!(err.to_string().contains("payload too short"));
    }

    #[test]
    fn decode_short_payload_is_truncated() {
        let raw = datagram(layout::OP_OUTPUT, &[0, 0, 1]);
        let err = decode(&raw, 4).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                needed: 18,
                actual: 15
            }
        );
    }

    #[test]
    fn decode_unknown_opcode() {
        let raw = datagram(0x1234, &[]);
        let packet = decode(&raw, 4).unwrap();
        assert_eq!(packet.opcode, Opcode::Unknown(0x1234));
    }

    #[test]
    fn decode_legacy_version_succeeds() {
        let mut raw = datagram(layout::OP_POLL, &[0, 0]);
        raw[11] = 13;
        let packet = decode(&raw, 4).unwrap();
        assert_eq!(packet.protocol_version & 0xff, 13);
    }

    #[test]
    fn address_minimum_scales_with_port_count() {
        let raw = datagram(layout::OP_ADDRESS, &vec![0u8; 104]);
        assert!(decode(&raw, 4).is_err());
        let raw = datagram(layout::OP_ADDRESS, &vec![0u8; 105]);
        assert!(decode(&raw, 4).is_ok());
    }
}
