//! One-shot UDP relay
//!
//! Grounded on the original's `udpClientSend`/`udpServerSend` (`client.go`,
//! `server.go`): a fresh unconnected socket per call, one write, one
//! blocking read. No retry, no internal timeout (the caller wraps the call
//! in a deadline — see `client::dispatch`).

use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Sends `msg` to `addr` and returns the single response datagram, up to
/// `buff_size` bytes.
pub async fn relay(addr: SocketAddr, msg: &[u8], buff_size: usize) -> std::io::Result<Vec<u8>> {
    let local: SocketAddr = if addr.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    }
    .parse()
    .expect("hardcoded wildcard address is always valid");

    let socket = UdpSocket::bind(local).await?;
    socket.send_to(msg, addr).await?;

    let mut buf = vec![0u8; buff_size];
    let n = socket.recv(&mut buf).await?;
    buf.truncate(n);
    Ok(buf)
}
