//! Device-side Art-Net protocol engine.
//!
//! This crate implements the receiving-node half of Art-Net for a
//! resource-constrained network node: the host loop hands raw UDP payloads
//! to [`ArtNode::process_packet`], which validates the header, dispatches
//! on opcode, mutates the persisted device state and answers through the
//! injected [`NodeIo`] collaborators. All I/O (network transmit, DMX bus
//! delivery, IP reprogramming, persistent storage) stays on the host side
//! of the [`NodeIo`] and [`ConfigStore`] traits.
//!
//! Invariants:
//! - Decoding is zero-copy and bounds-checked; malformed datagrams are
//!   dropped, never over-read.
//! - Device state writes are incremental and skip unchanged values.
//! - An IP-programming request persists its reply target so the exchange
//!   completes across the reboot, on the next [`ArtNode::configure`].
//! - Processing is single-threaded and non-reentrant; the host serializes
//!   datagram delivery.
//!
//! Version française (résumé):
//! Moteur Art-Net côté nœud : l'hôte fournit les datagrammes bruts, le
//! moteur décode, aiguille par opcode, met à jour l'état persistant et
//! répond via les traits `NodeIo`/`ConfigStore`. Décodage borné sans
//! copie, écritures incrémentales, échange de reprogrammation IP complété
//! après redémarrage. Traitement strictement séquentiel.
//!
//! # Examples
//! ```
//! use artnode_core::{ArtNode, IpConfigurationMode, MemoryStore, NodeIo, PortDirection};
//!
//! struct NullIo;
//!
//! impl NodeIo for NullIo {
//!     fn transmit(&mut self, _payload: &[u8], _src: u16, _dest_ip: [u8; 4], _dest: u16) {}
//!     fn deliver_output(&mut self, _port: usize, _data: &[u8]) {}
//!     fn on_direction_changed(&mut self, _port: usize, _direction: PortDirection) {}
//!     fn request_ip_reconfiguration(
//!         &mut self,
//!         _mode: IpConfigurationMode,
//!         _new_ip: Option<[u8; 4]>,
//!         _new_subnet: Option<[u8; 4]>,
//!     ) {
//!     }
//! }
//!
//! let mac = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
//! let mut node = ArtNode::new(mac, 0, 4, MemoryStore::new(256), NullIo);
//! node.configure(false, [192, 168, 1, 20]);
//! assert_eq!(node.packet_count(), 0);
//! ```

use serde::{Deserialize, Serialize};

mod config;
mod node;
mod protocol;

pub use config::{ConfigSchema, ConfigStore, MemoryStore, Port, PortDirection};
pub use node::{
    ArtNode, Counters, DiagnosticPriority, IpConfigurationMode, NodeIo, NodeStatus,
    STATUS_MESSAGE_OK,
};
pub use protocol::layout::UDP_PORT;
pub use protocol::{DecodeError, DecodedPacket, Opcode, decode};

/// Serializable state summary for the host's diagnostics channel.
///
/// # Examples
/// ```
/// use artnode_core::{Counters, NodeSnapshot};
///
/// let snapshot = NodeSnapshot {
///     short_name: "rig".to_string(),
///     long_name: String::new(),
///     ip: "192.168.1.20".to_string(),
///     mac: "02:00:00:00:00:01".to_string(),
///     dhcp_enabled: false,
///     subnet: 0,
///     ports: Vec::new(),
///     status_code: 1,
///     status_message: "Node Ok".to_string(),
///     counters: Counters::default(),
/// };
/// assert_eq!(snapshot.status_code, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Short node name (up to 17 bytes on the wire).
    pub short_name: String,
    /// Long node name (up to 63 bytes on the wire).
    pub long_name: String,
    /// Node address in dotted form.
    pub ip: String,
    /// MAC address in colon-separated hex.
    pub mac: String,
    /// Whether the host brought the IP stack up via DHCP.
    pub dhcp_enabled: bool,
    /// Device subnet (universe bank selector).
    pub subnet: u8,
    /// Per-port state in port order.
    pub ports: Vec<PortSnapshot>,
    /// Current node-report status code.
    pub status_code: u16,
    /// Current node-report message.
    pub status_message: String,
    /// Packet counters since construction.
    pub counters: Counters,
}

/// Per-port entry of a [`NodeSnapshot`].
///
/// # Examples
/// ```
/// use artnode_core::{PortDirection, PortSnapshot};
///
/// let port = PortSnapshot {
///     input_universe: 5,
///     output_universe: 0,
///     direction: PortDirection::Input,
/// };
/// assert_eq!(port.input_universe, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSnapshot {
    pub input_universe: u8,
    pub output_universe: u8,
    pub direction: PortDirection,
}

#[cfg(test)]
mod tests {
    use super::{Counters, NodeSnapshot, PortDirection, PortSnapshot};

    #[test]
    fn snapshot_serializes_ports_in_order() {
        let snapshot = NodeSnapshot {
            short_name: "rig".to_string(),
            long_name: "front of house rig".to_string(),
            ip: "10.0.0.2".to_string(),
            mac: "02:00:00:00:00:01".to_string(),
            dhcp_enabled: true,
            subnet: 1,
            ports: vec![
                PortSnapshot {
                    input_universe: 0,
                    output_universe: 0,
                    direction: PortDirection::Input,
                },
                PortSnapshot {
                    input_universe: 5,
                    output_universe: 2,
                    direction: PortDirection::Output,
                },
            ],
            status_code: 1,
            status_message: "Node Ok".to_string(),
            counters: Counters {
                packets_received: 3,
                packets_failed: 1,
                unsolicited_polls_sent: 0,
            },
        };

        let value = serde_json::to_value(&snapshot).expect("snapshot json");
        assert_eq!(value["ports"][1]["input_universe"], 5);
        assert_eq!(value["ports"][1]["direction"], "output");
        assert_eq!(value["counters"]["packets_failed"], 1);
    }
}
