//! Library-internal error types

use std::net::IpAddr;

/// Errors surfaced by the adaptive transport core.
///
/// Mirrors the teacher's layered error design: a `thiserror`-derived enum
/// for anything a caller might want to match on, with `anyhow::Result` used
/// at the binary/orchestration boundary (see `main.rs`).
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// I/O failure on a UDP or QUIC operation.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// QUIC connection establishment or stream failure.
    #[error("QUIC error: {0}")]
    Quic(String),

    /// TLS configuration could not be built.
    #[error("TLS setup error: {0}")]
    Tls(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A per-query relay attempt exceeded its deadline.
    #[error("relay to {0} timed out")]
    Timeout(IpAddr),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
