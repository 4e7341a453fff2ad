use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("datagram does not start with the Art-Net signature")]
    BadMagic,
    #[error("payload too short: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("invalid ArtDmx length: {length}")]
    InvalidLength { length: u16 },
}
