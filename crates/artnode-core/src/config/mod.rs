//! Persisted device identity and port state.
//!
//! `DeviceConfig` is the in-memory cache of everything the node keeps in
//! persistent storage: names, subnet, per-port universes and directions,
//! and the pending-reboot slot that carries an IP-programming exchange
//! across a restart. It is loaded once at construction through
//! `ConfigSchema` (the single address map) and written back incrementally
//! as fields change; universe and subnet writes are skipped when the value
//! is unchanged so flash-backed stores are not worn down by no-op
//! reprogramming.
//!
//! Version française (résumé):
//! Cache mémoire de l'état persistant du nœud (noms, subnet, univers et
//! directions par port, indicateur de redémarrage). Chargé une fois via
//! `ConfigSchema`, réécrit champ par champ; les écritures sans changement
//! de valeur sont évitées.

use serde::{Deserialize, Serialize};

pub mod schema;
pub mod store;

pub use schema::ConfigSchema;
pub use store::{ConfigStore, MemoryStore};

use crate::protocol::layout::{LONG_NAME_LEN, SHORT_NAME_LEN};
use schema::INIT_MARKER;

/// Whether a port listens for DMX data from the network (`Input`) or feeds
/// the local bus back into it (`Output`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn from_byte(value: u8) -> Self {
        if value == 0 {
            PortDirection::Input
        } else {
            PortDirection::Output
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            PortDirection::Input => 0,
            PortDirection::Output => 1,
        }
    }
}

/// One DMX connection point on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub input_universe: u8,
    pub output_universe: u8,
    pub direction: PortDirection,
}

/// In-memory cache of the persisted device state, kept in sync with the
/// backing `ConfigStore`.
#[derive(Debug)]
pub struct DeviceConfig<S: ConfigStore> {
    store: S,
    schema: ConfigSchema,
    short_name: [u8; SHORT_NAME_LEN],
    long_name: [u8; LONG_NAME_LEN],
    subnet: u8,
    ports: Vec<Port>,
    dhcp_enabled: bool,
    ip: [u8; 4],
    mac: [u8; 6],
}

impl<S: ConfigStore> DeviceConfig<S> {
    /// Load the cache from the store, initializing the reserved region on
    /// first boot (marker byte mismatch).
    pub fn load(mac: [u8; 6], base: u16, port_count: u8, mut store: S) -> Self {
        let schema = ConfigSchema::new(base, port_count);

        if store.read_byte(schema.marker_addr()) != INIT_MARKER {
            Self::init_region(&mut store, &schema);
        }

        let mut short_name = [0u8; SHORT_NAME_LEN];
        for (i, slot) in short_name.iter_mut().enumerate() {
            *slot = store.read_byte(schema.short_name_addr(i));
        }
        let mut long_name = [0u8; LONG_NAME_LEN];
        for (i, slot) in long_name.iter_mut().enumerate() {
            *slot = store.read_byte(schema.long_name_addr(i));
        }

        let mut subnet = store.read_byte(schema.subnet_addr());
        if subnet == 0xff {
            // Erased EEPROM reads as 0xff; treat it as the default subnet.
            subnet = 0;
        }

        let ports = (0..schema.port_count())
            .map(|i| Port {
                input_universe: store.read_byte(schema.input_universe_addr(i)),
                output_universe: store.read_byte(schema.output_universe_addr(i)),
                direction: PortDirection::from_byte(store.read_byte(schema.direction_addr(i))),
            })
            .collect();

        Self {
            store,
            schema,
            short_name,
            long_name,
            subnet,
            ports,
            dhcp_enabled: false,
            ip: [0; 4],
            mac,
        }
    }

    fn init_region(store: &mut S, schema: &ConfigSchema) {
        for i in 0..SHORT_NAME_LEN {
            store.write_byte(schema.short_name_addr(i), 0);
        }
        for i in 0..LONG_NAME_LEN {
            store.write_byte(schema.long_name_addr(i), 0);
        }
        store.write_byte(schema.subnet_addr(), 0);
        store.write_byte(schema.pending_reboot_addr(), 0);
        for i in 0..schema.port_count() {
            store.write_byte(schema.input_universe_addr(i), 0);
            store.write_byte(schema.output_universe_addr(i), 0);
            store.write_byte(schema.direction_addr(i), PortDirection::Input.to_byte());
        }
        store.write_byte(schema.marker_addr(), INIT_MARKER);
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn ip(&self) -> [u8; 4] {
        self.ip
    }

    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    pub fn dhcp_enabled(&self) -> bool {
        self.dhcp_enabled
    }

    pub fn subnet(&self) -> u8 {
        self.subnet
    }

    pub fn short_name(&self) -> &[u8; SHORT_NAME_LEN] {
        &self.short_name
    }

    pub fn long_name(&self) -> &[u8; LONG_NAME_LEN] {
        &self.long_name
    }

    /// Runtime network identity; supplied by the host at bring-up, not
    /// persisted here (the IP stack owns it).
    pub fn set_network(&mut self, dhcp_enabled: bool, ip: [u8; 4]) {
        self.dhcp_enabled = dhcp_enabled;
        self.ip = ip;
    }

    /// Store a new short name: up to 17 bytes plus a guaranteed terminator.
    pub fn set_short_name(&mut self, name: &[u8]) {
        let mut slot = [0u8; SHORT_NAME_LEN];
        let n = name.len().min(SHORT_NAME_LEN - 1);
        slot[..n].copy_from_slice(&name[..n]);
        for (i, byte) in slot.iter().enumerate() {
            self.store.write_byte(self.schema.short_name_addr(i), *byte);
        }
        self.short_name = slot;
    }

    /// Store a new long name: up to 63 bytes plus a guaranteed terminator.
    pub fn set_long_name(&mut self, name: &[u8]) {
        let mut slot = [0u8; LONG_NAME_LEN];
        let n = name.len().min(LONG_NAME_LEN - 1);
        slot[..n].copy_from_slice(&name[..n]);
        for (i, byte) in slot.iter().enumerate() {
            self.store.write_byte(self.schema.long_name_addr(i), *byte);
        }
        self.long_name = slot;
    }

    pub fn set_subnet(&mut self, subnet: u8) {
        if self.subnet == subnet {
            return;
        }
        self.subnet = subnet;
        self.store.write_byte(self.schema.subnet_addr(), subnet);
    }

    pub fn input_universe(&self, port: usize) -> u8 {
        self.ports.get(port).map_or(0, |p| p.input_universe)
    }

    pub fn set_input_universe(&mut self, port: usize, universe: u8) {
        let Some(entry) = self.ports.get_mut(port) else {
            return;
        };
        if entry.input_universe == universe {
            return;
        }
        entry.input_universe = universe;
        self.store
            .write_byte(self.schema.input_universe_addr(port), universe);
    }

    pub fn set_output_universe(&mut self, port: usize, universe: u8) {
        let Some(entry) = self.ports.get_mut(port) else {
            return;
        };
        if entry.output_universe == universe {
            return;
        }
        entry.output_universe = universe;
        self.store
            .write_byte(self.schema.output_universe_addr(port), universe);
    }

    pub fn set_direction(&mut self, port: usize, direction: PortDirection) {
        let Some(entry) = self.ports.get_mut(port) else {
            return;
        };
        if entry.direction == direction {
            return;
        }
        entry.direction = direction;
        self.store
            .write_byte(self.schema.direction_addr(port), direction.to_byte());
    }

    /// Persist the deferred reply target for an IP-programming exchange that
    /// completes after the host reboots the device.
    pub fn set_pending_reboot(&mut self, reply_ip: [u8; 4], reply_port: u16) {
        for (i, byte) in reply_ip.iter().enumerate() {
            self.store.write_byte(self.schema.reply_ip_addr(i), *byte);
        }
        for (i, byte) in reply_port.to_le_bytes().iter().enumerate() {
            self.store.write_byte(self.schema.reply_port_addr(i), *byte);
        }
        self.store.write_byte(self.schema.pending_reboot_addr(), 1);
    }

    /// Consume the pending-reboot flag. Returns the saved reply target when
    /// the previous run left an IP-programming exchange open; the reply slot
    /// bytes are meaningless unless the flag was set.
    pub fn take_pending_reboot(&mut self) -> Option<([u8; 4], u16)> {
        if self.store.read_byte(self.schema.pending_reboot_addr()) != 1 {
            return None;
        }
        self.store.write_byte(self.schema.pending_reboot_addr(), 0);
        let mut ip = [0u8; 4];
        for (i, slot) in ip.iter_mut().enumerate() {
            *slot = self.store.read_byte(self.schema.reply_ip_addr(i));
        }
        let port = u16::from_le_bytes([
            self.store.read_byte(self.schema.reply_port_addr(0)),
            self.store.read_byte(self.schema.reply_port_addr(1)),
        ]);
        Some((ip, port))
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceConfig, MemoryStore, PortDirection};
    use super::schema::{ConfigSchema, INIT_MARKER};
    use crate::config::store::ConfigStore;

    const MAC: [u8; 6] = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01];

    fn fresh_config() -> DeviceConfig<MemoryStore> {
        DeviceConfig::load(MAC, 0, 4, MemoryStore::new(256))
    }

    #[test]
    fn first_boot_initializes_region() {
        let config = fresh_config();
        assert_eq!(config.subnet(), 0);
        assert_eq!(config.short_name()[0], 0);
        assert_eq!(config.ports().len(), 4);
        for port in config.ports() {
            assert_eq!(port.input_universe, 0);
            assert_eq!(port.direction, PortDirection::Input);
        }
        let schema = ConfigSchema::new(0, 4);
        assert_eq!(config.store().read_byte(schema.marker_addr()), INIT_MARKER);
    }

    #[test]
    fn reload_preserves_state() {
        let mut config = fresh_config();
        config.set_short_name(b"studio rig");
        config.set_subnet(3);
        config.set_input_universe(2, 5);
        config.set_direction(1, PortDirection::Output);

        let store = config.store().clone();
        let reloaded = DeviceConfig::load(MAC, 0, 4, store);
        assert_eq!(&reloaded.short_name()[..10], b"studio rig");
        assert_eq!(reloaded.subnet(), 3);
        assert_eq!(reloaded.ports()[2].input_universe, 5);
        assert_eq!(reloaded.ports()[1].direction, PortDirection::Output);
    }

    #[test]
    fn unchanged_universe_skips_store_write() {
        let mut config = fresh_config();
        config.set_input_universe(0, 9);
        let writes = config.store().write_count();
        config.set_input_universe(0, 9);
        assert_eq!(config.store().write_count(), writes);
        config.set_input_universe(0, 10);
        assert_eq!(config.store().write_count(), writes + 1);
    }

    #[test]
    fn out_of_range_port_is_ignored() {
        let mut config = fresh_config();
        config.set_input_universe(9, 5);
        assert_eq!(config.input_universe(9), 0);
    }

    #[test]
    fn short_name_is_always_terminated() {
        let mut config = fresh_config();
        config.set_short_name(&[b'x'; 32]);
        assert_eq!(config.short_name()[17], 0);
    }

    #[test]
    fn pending_reboot_round_trip() {
        let mut config = fresh_config();
        assert_eq!(config.take_pending_reboot(), None);

        config.set_pending_reboot([10, 0, 0, 7], 0x1936);
        let store = config.store().clone();
        let mut reloaded = DeviceConfig::load(MAC, 0, 4, store);
        assert_eq!(reloaded.take_pending_reboot(), Some(([10, 0, 0, 7], 0x1936)));
        assert_eq!(reloaded.take_pending_reboot(), None);
    }
}
