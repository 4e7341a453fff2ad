use serde::{Deserialize, Serialize};

/// Node condition reported in the ArtPollReply node-report field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Debug,
    PowerOk,
    PowerFail,
    ReadFail,
    ParseFail,
    WriteFail,
    ShortNameSuccess,
    LongNameSuccess,
    DmxErrors,
    WriteBufferFull,
    ReadBufferFull,
    UniverseConflict,
    ConfigurationFail,
    DmxOutputShort,
    FirmwareFail,
    UserFail,
}

impl NodeStatus {
    /// Numeric code rendered in hex at the front of the node report.
    pub fn code(self) -> u16 {
        match self {
            NodeStatus::Debug => 0x0000,
            NodeStatus::PowerOk => 0x0001,
            NodeStatus::PowerFail => 0x0002,
            NodeStatus::ReadFail => 0x0003,
            NodeStatus::ParseFail => 0x0004,
            NodeStatus::WriteFail => 0x0005,
            NodeStatus::ShortNameSuccess => 0x0006,
            NodeStatus::LongNameSuccess => 0x0007,
            NodeStatus::DmxErrors => 0x0008,
            NodeStatus::WriteBufferFull => 0x0009,
            NodeStatus::ReadBufferFull => 0x000a,
            NodeStatus::UniverseConflict => 0x000b,
            NodeStatus::ConfigurationFail => 0x000c,
            NodeStatus::DmxOutputShort => 0x000d,
            NodeStatus::FirmwareFail => 0x000e,
            NodeStatus::UserFail => 0x000f,
        }
    }
}

/// Default node-report message.
pub const STATUS_MESSAGE_OK: &str = "Node Ok";

/// Diagnostic message priority requested by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticPriority {
    Low,
    Med,
    High,
    Critical,
    Volatile,
}

impl DiagnosticPriority {
    pub fn as_byte(self) -> u8 {
        match self {
            DiagnosticPriority::Low => 0x10,
            DiagnosticPriority::Med => 0x40,
            DiagnosticPriority::High => 0x80,
            DiagnosticPriority::Critical => 0xe0,
            DiagnosticPriority::Volatile => 0xff,
        }
    }
}

/// Process-wide packet counters, reset only at construction.
///
/// `packets_received` counts every datagram whose signature matched,
/// whatever happens afterwards; `packets_failed` counts signature
/// mismatches only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub packets_received: u32,
    pub packets_failed: u32,
    pub unsolicited_polls_sent: u32,
}
