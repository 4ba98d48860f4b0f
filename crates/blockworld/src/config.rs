//! Server configuration loaded from TOML.
//!
//! A missing file is created with the defaults so a first run leaves an
//! editable configuration behind.

use anyhow::{bail, Context};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;
use world_server::{FlatTerrain, ServerConfig};

/// Largest accepted terrain edge, in blocks.
pub const MAX_WORLD_SIZE: u32 = 1024;
/// Largest accepted terrain depth, in blocks.
pub const MAX_WORLD_DEPTH: u32 = 64;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    #[serde(default)]
    pub world: WorldSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Network and session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to listen on (e.g. "127.0.0.1:9001")
    pub bind_address: String,
    /// Connections past this count are refused
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds allowed for the WebSocket handshake
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Per-client outbound queue; a client that fills it is disconnected
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Where joining players appear
    #[serde(default = "default_spawn_position")]
    pub spawn_position: Vec3,
}

/// Initial terrain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    pub size: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    pub json_format: bool,
}

fn default_max_connections() -> usize {
    1000
}

fn default_connection_timeout() -> u64 {
    60
}

fn default_outbound_queue_capacity() -> usize {
    1024
}

fn default_spawn_position() -> Vec3 {
    Vec3::new(0.0, 1.0, 0.0)
}

impl Default for WorldSettings {
    fn default() -> Self {
        let terrain = FlatTerrain::default();
        Self {
            size: terrain.size,
            depth: terrain.depth,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:9001".to_string(),
                max_connections: default_max_connections(),
                connection_timeout: default_connection_timeout(),
                outbound_queue_capacity: default_outbound_queue_capacity(),
                spawn_position: default_spawn_position(),
            },
            world: WorldSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, writing the defaults there first if it does not exist.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config).context("serializing default config")?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            bail!("Invalid bind address: {}", self.server.bind_address);
        }
        if self.server.max_connections == 0 {
            bail!("max_connections must be at least 1");
        }
        if self.server.outbound_queue_capacity == 0 {
            bail!("outbound_queue_capacity must be at least 1");
        }
        if !self.server.spawn_position.is_finite() {
            bail!("spawn_position must be finite");
        }
        if self.world.size > MAX_WORLD_SIZE {
            bail!("World size {} exceeds {}", self.world.size, MAX_WORLD_SIZE);
        }
        if self.world.depth > MAX_WORLD_DEPTH {
            bail!("World depth {} exceeds {}", self.world.depth, MAX_WORLD_DEPTH);
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                LOG_LEVELS
            );
        }
        Ok(())
    }

    pub fn to_server_config(&self) -> anyhow::Result<ServerConfig> {
        Ok(ServerConfig {
            bind_address: self
                .server
                .bind_address
                .parse()
                .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            outbound_queue_capacity: self.server.outbound_queue_capacity,
            spawn_position: self.server.spawn_position,
            terrain: FlatTerrain {
                size: self.world.size,
                depth: self.world.depth,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn default_config_is_valid_and_matches_server_defaults() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let server_config = config.to_server_config().unwrap();
        let defaults = ServerConfig::default();
        assert_eq!(server_config.bind_address, defaults.bind_address);
        assert_eq!(server_config.max_connections, defaults.max_connections);
        assert_eq!(server_config.connection_timeout, defaults.connection_timeout);
        assert_eq!(server_config.outbound_queue_capacity, defaults.outbound_queue_capacity);
        assert_eq!(server_config.spawn_position, defaults.spawn_position);
        assert_eq!(server_config.terrain, defaults.terrain);
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn existing_file_is_parsed_with_defaults_for_omitted_keys() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:9100"
outbound_queue_capacity = 64
spawn_position = [5.0, 3.0, 5.0]

[world]
size = 16
depth = 4

[logging]
level = "debug"
json_format = true
"#;
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:9100");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.connection_timeout, 60);
        assert_eq!(config.server.outbound_queue_capacity, 64);
        assert_eq!(config.server.spawn_position, Vec3::new(5.0, 3.0, 5.0));
        assert_eq!(config.world, WorldSettings { size: 16, depth: 4 });
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.terrain.block_count(), 16 * 16 * 4);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "[server\nbind_address = 3").await.unwrap();
        assert!(AppConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.outbound_queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.spawn_position = Vec3::new(f32::NAN, 0.0, 0.0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.world.size = MAX_WORLD_SIZE + 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.world.depth = MAX_WORLD_DEPTH + 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn every_log_level_is_accepted() {
        for level in LOG_LEVELS {
            let mut config = AppConfig::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{level} should be valid");
        }
    }

    #[test]
    fn empty_world_is_allowed() {
        let mut config = AppConfig::default();
        config.world = WorldSettings { size: 0, depth: 0 };
        assert!(config.validate().is_ok());
        assert_eq!(config.to_server_config().unwrap().terrain, FlatTerrain::EMPTY);
    }
}
