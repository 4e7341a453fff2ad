//! Receiving-node protocol engine.
//!
//! `ArtNode` consumes raw datagrams, dispatches on opcode and mutates the
//! persisted device state; replies and local side effects go through the
//! injected `NodeIo` collaborators. Processing is single-threaded and
//! non-reentrant: `process_packet` completes every store write and any
//! reply transmission before returning, and the host must deliver one
//! datagram at a time. Handlers read-modify-write the configuration with
//! no locking, so the type is deliberately not `Sync`-oriented.
//!
//! Version française (résumé):
//! Moteur du nœud récepteur : décodage, aiguillage par opcode, mutation de
//! l'état persistant, réponses et effets de bord via `NodeIo`. Traitement
//! strictement séquentiel, un datagramme à la fois; aucune synchronisation
//! interne.

use tracing::{debug, trace, warn};

pub mod io;
pub mod status;

pub use io::{IpConfigurationMode, NodeIo};
pub use status::{Counters, DiagnosticPriority, NodeStatus, STATUS_MESSAGE_OK};

use crate::config::{ConfigStore, DeviceConfig, PortDirection};
use crate::protocol::encoder::{encode_ip_prog_reply, encode_poll_reply};
use crate::protocol::error::DecodeError;
use crate::protocol::layout;
use crate::protocol::parser::{Opcode, decode};
use crate::protocol::reader::PayloadReader;
use crate::{NodeSnapshot, PortSnapshot};

const BROADCAST_IP: [u8; 4] = [255, 255, 255, 255];

/// Device-side Art-Net protocol engine.
///
/// Owns the device configuration (backed by the host's `ConfigStore`), the
/// packet counters and the reply buffer. See the module docs for the
/// threading contract.
pub struct ArtNode<S: ConfigStore, IO: NodeIo> {
    config: DeviceConfig<S>,
    io: IO,
    counters: Counters,
    status: NodeStatus,
    status_message: &'static str,
    diagnostic_flags: u8,
    diagnostic_priority: u8,
    poll_target: [u8; 4],
    input_status: Vec<u8>,
    output_status: Vec<u8>,
    reply_buf: Vec<u8>,
}

impl<S: ConfigStore, IO: NodeIo> ArtNode<S, IO> {
    /// Build the engine: loads (or first-boot-initializes) the persisted
    /// state at `base_addr` and sizes the node for `port_count` ports.
    pub fn new(mac: [u8; 6], base_addr: u16, port_count: u8, store: S, io: IO) -> Self {
        let config = DeviceConfig::load(mac, base_addr, port_count, store);
        let ports = config.port_count();
        Self {
            config,
            io,
            counters: Counters::default(),
            status: NodeStatus::PowerOk,
            status_message: STATUS_MESSAGE_OK,
            diagnostic_flags: layout::TALK_BROADCAST
                | layout::TALK_SEND_DIAGNOSTICS
                | layout::TALK_ALWAYS,
            diagnostic_priority: DiagnosticPriority::Critical.as_byte(),
            poll_target: BROADCAST_IP,
            input_status: vec![0; ports],
            output_status: vec![0; ports],
            reply_buf: Vec::with_capacity(layout::poll_reply_len(ports)),
        }
    }

    /// Bring the node up once the host's IP stack is ready.
    ///
    /// Completes an IP-programming exchange left open by the previous run
    /// (reply sent to the saved target, flag cleared), or announces the
    /// node with a forced discovery reply on a normal cold start.
    pub fn configure(&mut self, dhcp_enabled: bool, ip: [u8; 4]) {
        self.config.set_network(dhcp_enabled, ip);
        if let Some((reply_ip, reply_port)) = self.config.take_pending_reboot() {
            debug!(?reply_ip, reply_port, "completing ip programming after reboot");
            self.send_ip_prog_reply(reply_ip, reply_port);
        } else {
            self.send_poll_reply(true);
        }
    }

    /// Process one received datagram. Fully synchronous: all store writes
    /// and any reply transmission happen before this returns.
    pub fn process_packet(&mut self, sender_ip: [u8; 4], sender_port: u16, raw: &[u8]) {
        let packet = match decode(raw, self.config.port_count()) {
            Ok(packet) => packet,
            Err(DecodeError::BadMagic) => {
                self.counters.packets_failed += 1;
                trace!("dropping foreign datagram");
                return;
            }
            Err(err) => {
                self.counters.packets_received += 1;
                debug!(%err, "dropping malformed datagram");
                return;
            }
        };

        self.counters.packets_received += 1;

        if (packet.protocol_version & 0x00ff) < layout::PROTOCOL_VERSION {
            trace!(
                version = packet.protocol_version,
                "ignoring legacy protocol revision"
            );
            return;
        }

        let outcome = match packet.opcode {
            Opcode::Poll => self.handle_poll(sender_ip, packet.payload),
            Opcode::Output => self.handle_output(packet.payload),
            Opcode::Address => self.handle_address(packet.payload),
            Opcode::Input => self.handle_input(packet.payload),
            Opcode::IpProg => self.handle_ip_prog(sender_ip, sender_port, packet.payload),
            Opcode::Unknown(raw_opcode) => {
                warn!(opcode = raw_opcode, "unknown opcode");
                self.status = NodeStatus::ParseFail;
                self.send_poll_reply(false);
                Ok(())
            }
            // RDM, firmware, video, media, timecode and the reply opcodes
            // are recognized so they route cleanly, with no semantics here.
            other => {
                trace!(opcode = ?other, "opcode ignored");
                Ok(())
            }
        };

        if let Err(err) = outcome {
            debug!(%err, opcode = ?packet.opcode, "dropping malformed datagram");
        }
    }

    fn handle_poll(&mut self, sender_ip: [u8; 4], payload: &[u8]) -> Result<(), DecodeError> {
        let reader = PayloadReader::new(payload);
        self.poll_target = sender_ip;
        self.diagnostic_flags = reader.read_u8(layout::POLL_TALK_TO_ME_OFFSET)?;
        self.diagnostic_priority = reader.read_u8(layout::POLL_PRIORITY_OFFSET)?;
        self.send_poll_reply(true);
        Ok(())
    }

    fn handle_output(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        let reader = PayloadReader::new(payload);
        let universe = reader.read_u16_le(layout::OUTPUT_UNIVERSE_RANGE.clone())?;
        let length = reader.read_u16_be(layout::OUTPUT_LENGTH_RANGE.clone())?;
        if length == 0 || length as usize > layout::DMX_MAX_SLOTS {
            return Err(DecodeError::InvalidLength { length });
        }
        let end = layout::OUTPUT_DATA_OFFSET + length as usize;
        let data = reader.read_slice(layout::OUTPUT_DATA_OFFSET..end)?;

        for (index, port) in self.config.ports().iter().enumerate() {
            if port.direction == PortDirection::Input && u16::from(port.input_universe) == universe
            {
                self.io.deliver_output(index, data);
            }
        }
        Ok(())
    }

    fn handle_address(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        let reader = PayloadReader::new(payload);

        // A zero first byte means "leave the name alone".
        let short_name = reader.read_slice(layout::ADDRESS_SHORT_NAME_RANGE.clone())?;
        if short_name[0] != 0 {
            self.config.set_short_name(name_bytes(short_name));
            self.status = NodeStatus::ShortNameSuccess;
        }
        let long_name = reader.read_slice(layout::ADDRESS_LONG_NAME_RANGE.clone())?;
        if long_name[0] != 0 {
            self.config.set_long_name(name_bytes(long_name));
            self.status = NodeStatus::LongNameSuccess;
        }

        let port_count = self.config.port_count();
        for port in 0..port_count {
            let switch = reader.read_u8(layout::ADDRESS_SWITCH_BASE + port)?;
            if let Some(universe) = switch_value(switch) {
                self.config.set_input_universe(port, universe);
            }
        }
        for port in 0..port_count {
            let switch = reader.read_u8(layout::ADDRESS_SWITCH_BASE + port_count + port)?;
            if let Some(universe) = switch_value(switch) {
                self.config.set_output_universe(port, universe);
            }
        }

        let subnet_switch = reader.read_u8(layout::ADDRESS_SWITCH_BASE + 2 * port_count)?;
        if let Some(subnet) = switch_value(subnet_switch) {
            self.config.set_subnet(subnet);
        }

        let command = reader.read_u8(layout::ADDRESS_SWITCH_BASE + 2 * port_count + 2)?;
        match command {
            layout::ADDRESS_COMMAND_RESET_MIN..=layout::ADDRESS_COMMAND_RESET_MAX => {
                // Selects a per-port data reset. Recognized but not
                // implemented: this node does no merge arbitration, so
                // there is no per-port merge state to reset.
                let port = usize::from(command & 0x03);
                debug!(port, "port reset command not implemented");
            }
            _ => {}
        }

        self.send_poll_reply(true);
        Ok(())
    }

    fn handle_input(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        let reader = PayloadReader::new(payload);
        for port in 0..self.config.port_count() {
            let bits = reader.read_u8(layout::INPUT_PORT_BASE + port)?;
            let requested = if bits & layout::INPUT_DIRECTION_BIT != 0 {
                PortDirection::Output
            } else {
                PortDirection::Input
            };
            if self.config.ports()[port].direction != requested {
                self.config.set_direction(port, requested);
                self.io.on_direction_changed(port, requested);
            }
        }
        Ok(())
    }

    fn handle_ip_prog(
        &mut self,
        sender_ip: [u8; 4],
        sender_port: u16,
        payload: &[u8],
    ) -> Result<(), DecodeError> {
        let reader = PayloadReader::new(payload);
        let command = reader.read_u8(layout::IPPROG_COMMAND_OFFSET)?;

        if command & layout::IPPROG_ENABLE_BIT == 0 {
            self.send_ip_prog_reply(sender_ip, sender_port);
            return Ok(());
        }

        let mut mode = IpConfigurationMode::Custom;
        if command & layout::IPPROG_DHCP_BIT != 0 && !self.config.dhcp_enabled() {
            mode = IpConfigurationMode::Dhcp;
        }
        if command & layout::IPPROG_DEFAULT_BIT != 0 {
            mode = IpConfigurationMode::Primary;
        }

        let new_ip = if command & layout::IPPROG_SET_IP_BIT != 0 {
            Some(reader.read_ipv4(layout::IPPROG_IP_RANGE.clone())?)
        } else {
            None
        };
        let new_subnet = if command & layout::IPPROG_SET_SUBNET_BIT != 0 {
            Some(reader.read_ipv4(layout::IPPROG_SUBNET_RANGE.clone())?)
        } else {
            None
        };
        if command & layout::IPPROG_SET_PORT_BIT != 0 {
            // Port programming is not supported; the node listens on 6454.
            debug!("ignoring port programming request");
        }

        // The reply is owed after the host applies the settings and
        // reboots; save the requester so the next configure() can answer.
        self.config.set_pending_reboot(sender_ip, sender_port);
        self.io.request_ip_reconfiguration(mode, new_ip, new_subnet);
        Ok(())
    }

    /// Discovery-reply gate.
    ///
    /// Unforced replies (state-change announcements) only go out when the
    /// controller asked for them via the always-send diagnostic flag, and
    /// they bump the unsolicited-poll counter that feeds the node report.
    /// Destination is the broadcast address or the last poll sender,
    /// depending on the broadcast diagnostic flag.
    pub fn send_poll_reply(&mut self, forced: bool) {
        if !forced && self.diagnostic_flags & layout::TALK_ALWAYS == 0 {
            return;
        }
        if !forced {
            self.counters.unsolicited_polls_sent += 1;
        }

        let dest_ip = if self.diagnostic_flags & layout::TALK_BROADCAST != 0 {
            BROADCAST_IP
        } else {
            self.poll_target
        };

        let report = format!(
            "#{:x} {} {}",
            self.status.code(),
            self.counters.unsolicited_polls_sent,
            self.status_message
        );
        encode_poll_reply(
            &self.config,
            &self.input_status,
            &self.output_status,
            &report,
            &mut self.reply_buf,
        );
        self.io
            .transmit(&self.reply_buf, layout::UDP_PORT, dest_ip, layout::UDP_PORT);

        self.status = NodeStatus::PowerOk;
        self.status_message = STATUS_MESSAGE_OK;
    }

    fn send_ip_prog_reply(&mut self, dest_ip: [u8; 4], dest_port: u16) {
        encode_ip_prog_reply(&self.config, &mut self.reply_buf);
        self.io
            .transmit(&self.reply_buf, layout::UDP_PORT, dest_ip, dest_port);
    }

    pub fn short_name(&self) -> &[u8; layout::SHORT_NAME_LEN] {
        self.config.short_name()
    }

    pub fn set_short_name(&mut self, name: &str) {
        self.config.set_short_name(name.as_bytes());
    }

    pub fn long_name(&self) -> &[u8; layout::LONG_NAME_LEN] {
        self.config.long_name()
    }

    pub fn set_long_name(&mut self, name: &str) {
        self.config.set_long_name(name.as_bytes());
    }

    pub fn subnet(&self) -> u8 {
        self.config.subnet()
    }

    pub fn set_subnet(&mut self, subnet: u8) {
        self.config.set_subnet(subnet);
    }

    /// Stored input universe for `port`, or 0 when out of range.
    pub fn input_universe(&self, port: usize) -> u8 {
        self.config.input_universe(port)
    }

    pub fn set_input_universe(&mut self, port: usize, universe: u8) {
        self.config.set_input_universe(port, universe);
    }

    pub fn packet_count(&self) -> u32 {
        self.counters.packets_received
    }

    pub fn fail_count(&self) -> u32 {
        self.counters.packets_failed
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Lowest diagnostic priority the controller asked to receive, as the
    /// raw wire byte (see [`DiagnosticPriority`] for the defined levels).
    pub fn diagnostic_priority(&self) -> u8 {
        self.diagnostic_priority
    }

    /// Raise a node condition for the next reply's node report; the reply
    /// path resets it to power-ok after transmission.
    pub fn set_status(&mut self, status: NodeStatus, message: &'static str) {
        self.status = status;
        self.status_message = message;
    }

    /// Update the per-port status bytes reported in discovery replies.
    pub fn set_port_status(&mut self, port: usize, input: u8, output: u8) {
        if port < self.input_status.len() {
            self.input_status[port] = input;
            self.output_status[port] = output;
        }
    }

    /// Serializable state summary for the host's diagnostics channel.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            short_name: name_to_string(self.config.short_name()),
            long_name: name_to_string(self.config.long_name()),
            ip: format_ip(self.config.ip()),
            mac: format_mac(self.config.mac()),
            dhcp_enabled: self.config.dhcp_enabled(),
            subnet: self.config.subnet(),
            ports: self
                .config
                .ports()
                .iter()
                .map(|port| PortSnapshot {
                    input_universe: port.input_universe,
                    output_universe: port.output_universe,
                    direction: port.direction,
                })
                .collect(),
            status_code: self.status.code(),
            status_message: self.status_message.to_string(),
            counters: self.counters,
        }
    }
}

/// Universe/subnet programming byte: 0x7f is the no-change sentinel, the
/// high bit marks the low 7 bits as the value to apply.
fn switch_value(switch: u8) -> Option<u8> {
    if switch != layout::SWITCH_NO_CHANGE && switch & layout::SWITCH_APPLY_BIT != 0 {
        Some(switch & !layout::SWITCH_APPLY_BIT)
    } else {
        None
    }
}

fn name_bytes(field: &[u8]) -> &[u8] {
    match field.iter().position(|byte| *byte == 0) {
        Some(end) => &field[..end],
        None => field,
    }
}

fn name_to_string(slot: &[u8]) -> String {
    String::from_utf8_lossy(name_bytes(slot)).into_owned()
}

fn format_ip(ip: [u8; 4]) -> String {
    format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])
}

fn format_mac(mac: [u8; 6]) -> String {
    mac.map(|byte| format!("{byte:02x}")).join(":")
}
