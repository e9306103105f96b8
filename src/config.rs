//! Runtime configuration
//!
//! Replaces the original proxy's compile-time constants (`settings.go`) with a
//! typed struct loadable from an optional TOML file and overridable by CLI flags,
//! following the teacher's `NooshdarooConfig` pattern.

use serde::{Deserialize, Serialize};

fn default_udp_client_port() -> u16 {
    9998
}
fn default_udp_port() -> u16 {
    9997
}
fn default_udp_server_port() -> u16 {
    9999
}
fn default_quic_port() -> u16 {
    4242
}
fn default_buff_size() -> usize {
    65536
}
fn default_client_cache_capacity() -> usize {
    10
}
fn default_threshold() -> f64 {
    5.0
}
fn default_alpha() -> f64 {
    0.5
}
fn default_window_size() -> f64 {
    10.0
}
fn default_relay_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(5)
}

/// Tunable parameters for the adaptive transport core.
///
/// Field names and defaults mirror `settings.go` in the original implementation;
/// `relay_timeout` is new (see `REDESIGN FLAGS` in `SPEC_FULL.md`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local port the client binds to receive resolver queries.
    #[serde(default = "default_udp_client_port")]
    pub udp_client_port: u16,

    /// Remote port on authoritative nameservers for UDP relay.
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    /// Local port of the co-located nameserver the server half forwards to.
    #[serde(default = "default_udp_server_port")]
    pub udp_server_port: u16,

    /// Remote/listen QUIC port.
    #[serde(default = "default_quic_port")]
    pub quic_port: u16,

    /// Maximum DNS message size in bytes.
    #[serde(default = "default_buff_size")]
    pub buff_size: usize,

    /// Maximum number of concurrently cached QUIC sessions.
    #[serde(default = "default_client_cache_capacity")]
    pub client_cache_capacity: usize,

    /// Score at or above which QUIC is used without UDP fallback.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// EWMA smoothing factor, in `[0, 1)`.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Width of one rate-estimator window, in seconds.
    #[serde(default = "default_window_size")]
    pub window_size: f64,

    /// Deadline for a single relay attempt (UDP or QUIC).
    #[serde(default = "default_relay_timeout", with = "humantime_serde")]
    pub relay_timeout: std::time::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            udp_client_port: default_udp_client_port(),
            udp_port: default_udp_port(),
            udp_server_port: default_udp_server_port(),
            quic_port: default_quic_port(),
            buff_size: default_buff_size(),
            client_cache_capacity: default_client_cache_capacity(),
            threshold: default_threshold(),
            alpha: default_alpha(),
            window_size: default_window_size(),
            relay_timeout: default_relay_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any field the file omits.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Validate field ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..1.0).contains(&self.alpha) {
            return Err("alpha must be in [0.0, 1.0)".to_string());
        }
        if self.threshold <= 0.0 {
            return Err("threshold must be positive".to_string());
        }
        if self.window_size <= 0.0 {
            return Err("window_size must be positive".to_string());
        }
        if self.client_cache_capacity == 0 {
            return Err("client_cache_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_constants() {
        let config = Config::default();
        assert_eq!(config.udp_client_port, 9998);
        assert_eq!(config.udp_port, 9997);
        assert_eq!(config.udp_server_port, 9999);
        assert_eq!(config.quic_port, 4242);
        assert_eq!(config.buff_size, 65536);
        assert_eq!(config.client_cache_capacity, 10);
        assert_eq!(config.threshold, 5.0);
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.window_size, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_alpha() {
        let config = Config {
            alpha: 1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_toml_with_defaults() {
        let dir = std::env::temp_dir().join(format!("adadoq-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "threshold = 8.0\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.threshold, 8.0);
        assert_eq!(config.alpha, 0.5);
        std::fs::remove_dir_all(&dir).ok();
    }
}
