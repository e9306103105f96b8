//! Client-side orchestrator
//!
//! Binds the local UDP socket the resolver sends queries to, and for each
//! datagram runs the decision pipeline of `SPEC_FULL.md` §4.6, grounded on
//! the original's `startClient`/`clientSend` (`client.go`). Per the redesign
//! flag in `SPEC_FULL.md`, each datagram is dispatched to its own task
//! instead of being processed to completion on the receive loop.

use crate::cache::SessionCache;
use crate::config::Config;
use crate::dns::clear_do;
use crate::error::ProxyError;
use crate::estimator::RateEstimator;
use crate::relay::{quic, udp};
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;

/// Shared state threaded through every spawned query task, replacing the
/// original's package-level `connWindows`/`clientCache` globals with an
/// explicit context object.
pub struct ClientContext {
    config: Config,
    cache: Mutex<SessionCache<quinn::Connection>>,
    estimator: Mutex<RateEstimator>,
    quic_endpoint: quinn::Endpoint,
}

impl ClientContext {
    pub fn new(config: Config) -> crate::error::Result<Self> {
        let quic_endpoint = quic::client_endpoint()?;
        let estimator = Mutex::new(RateEstimator::new(
            config.alpha,
            std::time::Duration::from_secs_f64(config.window_size),
        ));
        let cache = Mutex::new(SessionCache::new(config.client_cache_capacity));
        Ok(Self {
            config,
            cache,
            estimator,
            quic_endpoint,
        })
    }
}

/// Runs the client orchestrator until the local socket errors unrecoverably.
pub async fn run(ctx: Arc<ClientContext>) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = format!("127.0.0.1:{}", ctx.config.udp_client_port).parse()?;
    let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
    log::info!("client listening on {bind_addr}");

    let mut buf = vec![0u8; ctx.config.buff_size];
    loop {
        let (n, src) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("error reading from resolver socket: {e}");
                continue;
            }
        };
        let query = buf[..n].to_vec();
        let ctx = Arc::clone(&ctx);
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            match dispatch(&ctx, src.ip(), &query).await {
                Ok(response) => {
                    if let Err(e) = socket.send_to(&response, src).await {
                        log::warn!("failed to send response back to resolver: {e}");
                    }
                }
                Err(e) => {
                    log::debug!("query to {} dropped: {e}", src.ip());
                }
            }
        });
    }
}

/// Runs the decision pipeline for a single query and returns the response to
/// deliver back to the resolver, or an error if the query should be dropped.
pub async fn dispatch(ctx: &ClientContext, ip: IpAddr, raw: &[u8]) -> crate::error::Result<Vec<u8>> {
    let (msg, is_do) = clear_do(raw);
    let udp_addr = SocketAddr::new(ip, ctx.config.udp_port);

    if !is_do {
        return udp_relay(ctx, ip, udp_addr, &msg).await;
    }

    let (first_sighting, score) = ctx
        .estimator
        .lock()
        .unwrap()
        .record_and_was_first_sighting(ip, Instant::now());

    if first_sighting {
        return udp_relay(ctx, ip, udp_addr, &msg).await;
    }

    if score < ctx.config.threshold {
        match quic_attempt(ctx, ip, &msg, false).await {
            Ok(response) => Ok(response),
            Err(_) => udp_relay(ctx, ip, udp_addr, &msg).await,
        }
    } else {
        quic_attempt(ctx, ip, &msg, true).await
    }
}

async fn udp_relay(
    ctx: &ClientContext,
    ip: IpAddr,
    addr: SocketAddr,
    msg: &[u8],
) -> crate::error::Result<Vec<u8>> {
    match tokio::time::timeout(ctx.config.relay_timeout, udp::relay(addr, msg, ctx.config.buff_size))
        .await
    {
        Ok(result) => result.map_err(ProxyError::Io),
        Err(_) => Err(ProxyError::Timeout(ip)),
    }
}

/// Relays `msg` over a cached (or freshly dialed) QUIC session to `ip`,
/// implementing the reconnect-and-retry-once semantics of the original's
/// `quicClientSend`/`getQuicSession` when `force` is set.
async fn quic_attempt(
    ctx: &ClientContext,
    ip: IpAddr,
    msg: &[u8],
    force: bool,
) -> crate::error::Result<Vec<u8>> {
    let cached = ctx.cache.lock().unwrap().get(&ip);
    let session = match cached {
        Some(session) => session,
        None => {
            if !force {
                return Err(ProxyError::Quic("no cached session".to_string()));
            }
            dial_and_cache(ctx, ip).await?
        }
    };

    let deadline = ctx.config.relay_timeout;
    match tokio::time::timeout(deadline, quic::relay_on_session(&session, msg, ctx.config.buff_size))
        .await
    {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(_)) | Err(_) if force => {
            log::debug!("first QUIC stream attempt to {ip} failed, reconnecting");
            let session = dial_and_cache(ctx, ip).await?;
            tokio::time::timeout(deadline, quic::relay_on_session(&session, msg, ctx.config.buff_size))
                .await
                .map_err(|_| ProxyError::Timeout(ip))?
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ProxyError::Timeout(ip)),
    }
}

async fn dial_and_cache(ctx: &ClientContext, ip: IpAddr) -> crate::error::Result<quinn::Connection> {
    let addr = SocketAddr::new(ip, ctx.config.quic_port);
    let session = quic::dial(&ctx.quic_endpoint, addr).await?;
    ctx.cache
        .lock()
        .unwrap()
        .add_and_close_evicted(ip, session.clone());
    Ok(session)
}
