/*!
ztnet Server 配置模块

定义和加载服务器配置，包括：
- 网络配置（网络ID、home目录、libzt路径）
- 服务器配置（端口、backlog、读缓冲区）
*/

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use ztnet::{NetworkId, DEFAULT_BACKLOG, DEFAULT_BUFFER_SIZE};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// 服务器配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub network: Network,
    pub server: Server,
}

/// 网络配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Network {
    pub id: NetworkId,
    pub home: Option<String>,
    pub library: Option<String>,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            id: NetworkId::EARTH,
            home: None,
            library: None,
        }
    }
}

/// 服务器基本配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Server {
    pub port: u16,
    pub backlog: i32,
    pub buffer_size: usize,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            port: 8888,
            backlog: DEFAULT_BACKLOG,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// 生成默认配置
pub fn default_config() -> ServerConfig {
    ServerConfig::default()
}

/// 保存配置到文件
pub fn save_config(config: &ServerConfig, path: &str) -> Result<(), ConfigError> {
    let toml_str = toml::to_string_pretty(config)?;
    fs::write(path, toml_str)?;
    Ok(())
}

/// 加载配置，文件不存在时使用默认配置
pub fn load_or_default(path: &str) -> Result<ServerConfig, ConfigError> {
    if Path::new(path).exists() {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    } else {
        log::debug!("Config file {} not found, using defaults", path);
        Ok(default_config())
    }
}

/// 验证配置
pub fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid("server.port must be greater than 0".to_string()));
    }

    if config.server.backlog <= 0 {
        return Err(ConfigError::Invalid("server.backlog must be greater than 0".to_string()));
    }

    if config.server.buffer_size == 0 {
        return Err(ConfigError::Invalid("server.buffer_size must be greater than 0".to_string()));
    }

    if matches!(&config.network.home, Some(home) if home.is_empty()) {
        return Err(ConfigError::Invalid("network.home must not be empty".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo() {
        let config = default_config();
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.server.backlog, 1);
        assert_eq!(config.server.buffer_size, 1024);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn file_overrides_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [network]
            id = "8056c2e21c000001"
            home = "/var/lib/ztnet"

            [server]
            backlog = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.network.home.as_deref(), Some("/var/lib/ztnet"));
        assert_eq!(config.server.backlog, 16);
        assert_eq!(config.server.port, 8888);
    }

    #[test]
    fn rejects_zero_values() {
        let mut config = default_config();
        config.server.buffer_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = default_config();
        config.server.backlog = 0;
        assert!(validate_config(&config).is_err());

        let mut config = default_config();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ztnet-server.toml");
        let path = path.to_str().unwrap().to_string();

        let mut config = default_config();
        config.server.port = 9100;
        save_config(&config, &path).unwrap();

        let loaded = load_or_default(&path).unwrap();
        assert_eq!(loaded.server.port, 9100);
        assert_eq!(loaded.network.id, NetworkId::EARTH);
    }
}
