//! Server-side QUIC terminator and UDP pass-through
//!
//! Grounded on the original's `startServer`/`startServerUDP`/`udpServerSend`
//! (`server.go`): a QUIC listener whose accepted sessions forward streams to
//! a local nameserver over UDP, running concurrently with a plain UDP
//! pass-through for destinations that never upgrade.

use crate::config::Config;
use crate::relay::{quic, udp};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Runs both server loops concurrently until either exits with an error.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let quic_cfg = Arc::clone(&config);
    let udp_cfg = Arc::clone(&config);

    tokio::try_join!(run_quic_listener(quic_cfg), run_udp_listener(udp_cfg))?;
    Ok(())
}

async fn run_quic_listener(config: Arc<Config>) -> anyhow::Result<()> {
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", config.quic_port).parse()?;
    let endpoint = quic::server_endpoint(listen_addr)?;
    log::info!("QUIC server listening on {listen_addr}");

    while let Some(incoming) = endpoint.accept().await {
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let connection = match incoming.await {
                Ok(connection) => connection,
                Err(e) => {
                    log::warn!("QUIC handshake failed: {e}");
                    return;
                }
            };
            log::debug!("accepted QUIC session from {}", connection.remote_address());
            if let Err(e) = handle_session(connection, config).await {
                log::debug!("QUIC session ended: {e}");
            }
        });
    }

    Ok(())
}

async fn handle_session(connection: quinn::Connection, config: Arc<Config>) -> anyhow::Result<()> {
    loop {
        let (mut send, mut recv) = match connection.accept_bi().await {
            Ok(stream) => stream,
            Err(e) => return Err(e.into()),
        };

        let request = recv.read_to_end(config.buff_size).await?;
        let nameserver: SocketAddr = format!("127.0.0.1:{}", config.udp_server_port).parse()?;
        let response = udp::relay(nameserver, &request, config.buff_size).await?;

        send.write_all(&response).await?;
        send.finish()?;
    }
}

async fn run_udp_listener(config: Arc<Config>) -> anyhow::Result<()> {
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", config.udp_port).parse()?;
    let socket = UdpSocket::bind(listen_addr).await?;
    log::info!("UDP server listening on {listen_addr}");

    let nameserver: SocketAddr = format!("127.0.0.1:{}", config.udp_server_port).parse()?;
    let mut buf = vec![0u8; config.buff_size];
    loop {
        let (n, src) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("error reading from UDP listener: {e}");
                continue;
            }
        };
        let request = buf[..n].to_vec();
        match udp::relay(nameserver, &request, config.buff_size).await {
            Ok(response) => {
                if let Err(e) = socket.send_to(&response, src).await {
                    log::warn!("failed to send response to {src}: {e}");
                }
            }
            Err(e) => log::warn!("failed to relay to local nameserver: {e}"),
        }
    }
}
