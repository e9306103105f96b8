//! adadoq - adaptive split DNS transport proxy
//!
//! Upgrades DNS traffic from UDP to QUIC on a per-destination basis.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use adadoq::client::ClientContext;
use adadoq::config::Config;

#[derive(Parser)]
#[command(name = "adadoq")]
#[command(author = "Sina Rabbani")]
#[command(version)]
#[command(about = "Adaptive split DNS transport proxy", long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the client-side adaptive transport selector
    Client {
        /// Local port to receive resolver queries on
        #[arg(long)]
        udp_client_port: Option<u16>,

        /// Remote authoritative-server UDP port
        #[arg(long)]
        udp_port: Option<u16>,

        /// Remote authoritative-server QUIC port
        #[arg(long)]
        quic_port: Option<u16>,

        /// Score at/above which QUIC is used without UDP fallback
        #[arg(long)]
        threshold: Option<f64>,

        /// EWMA smoothing factor, in [0, 1)
        #[arg(long)]
        alpha: Option<f64>,

        /// Width of one rate-estimator window, in seconds
        #[arg(long)]
        window_size: Option<f64>,

        /// Maximum DNS message size in bytes
        #[arg(long)]
        buff_size: Option<usize>,

        /// Maximum number of concurrently cached QUIC sessions
        #[arg(long)]
        client_cache_capacity: Option<usize>,
    },

    /// Run the server-side QUIC terminator and UDP pass-through
    Server {
        /// Local QUIC listen port
        #[arg(long)]
        quic_port: Option<u16>,

        /// Local UDP listen port
        #[arg(long)]
        udp_port: Option<u16>,

        /// Local nameserver UDP port to forward decoded queries to
        #[arg(long)]
        udp_server_port: Option<u16>,

        /// Maximum DNS message size in bytes
        #[arg(long)]
        buff_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose >= 3 {
        logger.filter_module("adadoq", log::LevelFilter::Trace);
        logger.filter_level(log::LevelFilter::Debug);
    } else {
        logger.filter_level(log_level);
    }
    logger.format_timestamp_millis().format_module_path(true).init();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Client {
            udp_client_port,
            udp_port,
            quic_port,
            threshold,
            alpha,
            window_size,
            buff_size,
            client_cache_capacity,
        } => {
            if let Some(v) = udp_client_port {
                config.udp_client_port = v;
            }
            if let Some(v) = udp_port {
                config.udp_port = v;
            }
            if let Some(v) = quic_port {
                config.quic_port = v;
            }
            if let Some(v) = threshold {
                config.threshold = v;
            }
            if let Some(v) = alpha {
                config.alpha = v;
            }
            if let Some(v) = window_size {
                config.window_size = v;
            }
            if let Some(v) = buff_size {
                config.buff_size = v;
            }
            if let Some(v) = client_cache_capacity {
                config.client_cache_capacity = v;
            }
            config.validate().map_err(anyhow::Error::msg)?;

            let ctx = Arc::new(ClientContext::new(config)?);
            adadoq::client::run(ctx).await
        }
        Commands::Server {
            quic_port,
            udp_port,
            udp_server_port,
            buff_size,
        } => {
            if let Some(v) = quic_port {
                config.quic_port = v;
            }
            if let Some(v) = udp_port {
                config.udp_port = v;
            }
            if let Some(v) = udp_server_port {
                config.udp_server_port = v;
            }
            if let Some(v) = buff_size {
                config.buff_size = v;
            }
            config.validate().map_err(anyhow::Error::msg)?;

            adadoq::server::run(config).await
        }
    }
}
