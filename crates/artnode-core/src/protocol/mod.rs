//! Art-Net wire protocol: datagram decoding and reply encoding.
//!
//! `decode` validates the signature and header, then hands back a typed
//! opcode plus a borrowed payload view; every later field access goes
//! through `PayloadReader`, which checks offsets against the received
//! length instead of trusting fixed offsets. The two reply encoders emit
//! complete datagram bodies whose byte layout is dictated by the protocol
//! standard. Byte offsets and constants live in `layout`.
//!
//! Version française (résumé):
//! Décodage des datagrammes Art-Net (signature, opcode, vue empruntée sur
//! la charge utile, accès bornés via `PayloadReader`) et encodage des deux
//! réponses standard. Les positions et constantes sont dans `layout`.

pub mod encoder;
pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::DecodeError;
pub use parser::{DecodedPacket, Opcode, decode};
