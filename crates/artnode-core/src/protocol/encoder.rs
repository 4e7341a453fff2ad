use super::layout;
use crate::config::{ConfigStore, DeviceConfig};

/// Encode a complete ArtPollReply body into `buf` (cleared first).
///
/// The layout is fixed by the protocol standard; for a node with N ports the
/// result is always `layout::poll_reply_len(N)` bytes. `input_status` and
/// `output_status` must each carry one byte per port. The node report is
/// truncated so the 64-byte field keeps its terminator.
pub fn encode_poll_reply<S: ConfigStore>(
    config: &DeviceConfig<S>,
    input_status: &[u8],
    output_status: &[u8],
    node_report: &str,
    buf: &mut Vec<u8>,
) {
    buf.clear();
    buf.extend_from_slice(layout::SIGNATURE);
    buf.extend_from_slice(&layout::OP_POLL_REPLY.to_le_bytes());
    buf.extend_from_slice(&config.ip());
    buf.extend_from_slice(&layout::UDP_PORT.to_be_bytes());
    buf.extend_from_slice(&layout::PROTOCOL_VERSION.to_be_bytes());
    buf.extend_from_slice(&u16::from(config.subnet()).to_be_bytes());
    buf.push(layout::OEM_HI);
    buf.push(layout::OEM_LO);
    // UBEA not present
    buf.push(0);
    buf.push(layout::STATUS1_INDICATORS_NORMAL | layout::STATUS1_ADDRESS_FROM_NETWORK);
    buf.extend_from_slice(&layout::ESTA_CODE.to_le_bytes());
    buf.extend_from_slice(config.short_name());
    buf.extend_from_slice(config.long_name());

    let report = node_report.as_bytes();
    let n = report.len().min(layout::NODE_REPORT_LEN - 1);
    buf.extend_from_slice(&report[..n]);
    buf.extend(std::iter::repeat_n(0, layout::NODE_REPORT_LEN - n));

    buf.extend_from_slice(&(config.port_count() as u16).to_be_bytes());
    for _ in config.ports() {
        buf.push(layout::PORT_TYPE_DMX512);
    }
    buf.extend_from_slice(input_status);
    buf.extend_from_slice(output_status);
    for port in config.ports() {
        buf.push(port.input_universe);
    }
    for port in config.ports() {
        buf.push(port.output_universe);
    }

    // SwVideo, SwMacro, SwRemote, three spare bytes, Style (StNode)
    buf.extend(std::iter::repeat_n(0, 7));
    buf.extend_from_slice(&config.mac());
    // BindIp mirrors the node address; BindIndex 0 marks the root device
    buf.extend_from_slice(&config.ip());
    buf.push(0);

    let mut status2 = layout::STATUS2_WEB_CONFIG | layout::STATUS2_DHCP_CAPABLE;
    if config.dhcp_enabled() {
        status2 |= layout::STATUS2_DHCP_ENABLED;
    }
    buf.push(status2);

    buf.extend(std::iter::repeat_n(0, 26));

    debug_assert_eq!(buf.len(), layout::poll_reply_len(config.port_count()));
}

/// Encode a complete ArtIpProgReply body into `buf` (cleared first).
/// Always `layout::IP_PROG_REPLY_LEN` bytes.
pub fn encode_ip_prog_reply<S: ConfigStore>(config: &DeviceConfig<S>, buf: &mut Vec<u8>) {
    buf.clear();
    buf.extend_from_slice(layout::SIGNATURE);
    buf.extend_from_slice(&layout::OP_IP_PROG_REPLY.to_le_bytes());
    buf.extend_from_slice(&layout::PROTOCOL_VERSION.to_be_bytes());
    buf.extend(std::iter::repeat_n(0, 4));
    buf.extend_from_slice(&config.ip());
    // Subnet mask reporting not supported
    buf.extend(std::iter::repeat_n(0, 4));
    buf.extend_from_slice(&layout::UDP_PORT.to_be_bytes());
    buf.push(u8::from(config.dhcp_enabled()));
    buf.extend(std::iter::repeat_n(0, 7));

    debug_assert_eq!(buf.len(), layout::IP_PROG_REPLY_LEN);
}
