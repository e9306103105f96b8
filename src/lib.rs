//! adadoq: adaptive split DNS transport proxy
//!
//! Upgrades DNS traffic from UDP to QUIC on a per-destination basis, driven
//! by an exponentially-weighted estimate of how often each destination sends
//! DNSSEC-OK (`DO`) queries. See `SPEC_FULL.md` for the full design.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use adadoq::{client::ClientContext, config::Config};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ctx = Arc::new(ClientContext::new(Config::default())?);
//! adadoq::client::run(ctx).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod estimator;
pub mod relay;
pub mod server;

pub use config::Config;
pub use error::{ProxyError, Result};
