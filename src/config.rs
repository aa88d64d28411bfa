use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::data_room::share_link_expiry;
use crate::valuation::DEFAULT_EBITDA_MARGIN;

/// Platform configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite file holding published listings
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Root folder for uploaded documents
    #[serde(default = "default_data_room_dir")]
    pub data_room_dir: PathBuf,

    /// Optional buyer catalog (JSON or CSV); the built-in demo catalog otherwise
    #[serde(default)]
    pub buyer_catalog_path: Option<PathBuf>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// EBITDA margin assumed when only revenue is reported
    #[serde(default = "default_ebitda_margin")]
    pub default_ebitda_margin: f64,

    /// Lifetime of data-room share links
    #[serde(default = "default_share_link_expiry_hours")]
    pub share_link_expiry_hours: i64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            database_path: default_database_path(),
            data_room_dir: default_data_room_dir(),
            buyer_catalog_path: None,
            log_level: default_log_level(),
            default_ebitda_margin: default_ebitda_margin(),
            share_link_expiry_hours: default_share_link_expiry_hours(),
        }
    }
}

impl PlatformConfig {
    /// Load configuration from `.env`, an optional `exit-platform.toml` and
    /// `EXIT_PLATFORM__*` environment variables (highest precedence)
    pub fn load() -> anyhow::Result<Self> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("exit-platform").required(false))
            .add_source(config::Environment::with_prefix("EXIT_PLATFORM").separator("__"));

        let config: PlatformConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.default_ebitda_margin) {
            anyhow::bail!(
                "default_ebitda_margin must be within [0, 1], got {}",
                self.default_ebitda_margin
            );
        }
        share_link_expiry(self.share_link_expiry_hours)
            .map_err(|e| anyhow::anyhow!("share_link_expiry_hours: {}", e))?;
        Ok(())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("business_exit.db")
}

fn default_data_room_dir() -> PathBuf {
    PathBuf::from("data_rooms")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ebitda_margin() -> f64 {
    DEFAULT_EBITDA_MARGIN
}

fn default_share_link_expiry_hours() -> i64 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = PlatformConfig::default();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.default_ebitda_margin, 0.25);
        assert_eq!(cfg.share_link_expiry_hours, 24);
        assert!(cfg.buyer_catalog_path.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = PlatformConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_rejects_out_of_range_margin() {
        let cfg = PlatformConfig {
            default_ebitda_margin: 1.5,
            ..PlatformConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_link_expiry() {
        for hours in [0, i64::MAX] {
            let cfg = PlatformConfig {
                share_link_expiry_hours: hours,
                ..PlatformConfig::default()
            };
            assert!(cfg.validate().is_err(), "accepted {}", hours);
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: PlatformConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "port = 9100\nlog_level = \"debug\"",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.bind_addr, "0.0.0.0");
    }
}
