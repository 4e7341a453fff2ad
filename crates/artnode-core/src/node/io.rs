use crate::config::PortDirection;

/// How the host should reprogram the IP stack before rebooting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpConfigurationMode {
    /// Factory-default primary address.
    Primary,
    /// Factory-default secondary address.
    Secondary,
    /// Address from DHCP.
    Dhcp,
    /// Explicit address/netmask carried in the request.
    Custom,
}

/// Side-effect collaborators injected at construction.
///
/// The engine never performs I/O itself: replies go out through `transmit`,
/// DMX channel data is handed to the local bus driver, and IP reprogramming
/// is delegated to the host, which is expected to apply the settings and
/// reboot the device. All calls are synchronous and bounded-latency.
pub trait NodeIo {
    /// Hand a fully-encoded reply datagram to the network stack.
    fn transmit(&mut self, payload: &[u8], source_port: u16, dest_ip: [u8; 4], dest_port: u16);

    /// Deliver DMX channel data to a local output port.
    fn deliver_output(&mut self, port_index: usize, data: &[u8]);

    /// A port's stored direction changed; reconfigure the bus driver.
    fn on_direction_changed(&mut self, port_index: usize, direction: PortDirection);

    /// Apply new IP settings and reboot. The engine has already persisted
    /// the reply target; the exchange completes on the next `configure`.
    fn request_ip_reconfiguration(
        &mut self,
        mode: IpConfigurationMode,
        new_ip: Option<[u8; 4]>,
        new_subnet: Option<[u8; 4]>,
    );
}
