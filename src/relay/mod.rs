//! Transport relays: plain UDP and QUIC-over-TLS.

pub mod quic;
pub mod udp;
