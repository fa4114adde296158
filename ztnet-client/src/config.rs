/*!
ztnet Client 配置模块

定义和加载客户端配置，包括：
- 网络配置（网络ID、home目录、libzt路径）
- 客户端配置（端口、消息、等待时间）
*/

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use ztnet::NetworkId;

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

    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// 客户端配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub network: Network,
    pub client: Client,
}

/// 网络配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Network {
    pub id: NetworkId,
    /// 未设置时使用临时目录
    pub home: Option<String>,
    /// libzt路径，未设置时按默认库名加载
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

/// 客户端基本配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Client {
    pub port: u16,
    pub message: String,
    /// 发送后关闭前的等待时间（毫秒）
    pub linger_ms: u64,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            port: 8888,
            message: "hello world\n".to_string(),
            linger_ms: 2000,
        }
    }
}

/// 生成默认配置
pub fn default_config() -> ClientConfig {
    ClientConfig::default()
}

/// 保存配置到文件
pub fn save_config(config: &ClientConfig, path: &str) -> Result<(), ConfigError> {
    let toml_str = toml::to_string_pretty(config)?;
    fs::write(path, toml_str)?;
    Ok(())
}

/// 加载配置，文件不存在时使用默认配置
pub fn load_or_default(path: &str) -> Result<ClientConfig, ConfigError> {
    if Path::new(path).exists() {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    } else {
        log::debug!("Config file {} not found, using defaults", path);
        Ok(default_config())
    }
}

/// 验证配置
pub fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.client.port == 0 {
        return Err(ConfigError::Invalid("client.port must be greater than 0".to_string()));
    }

    if config.client.message.is_empty() {
        return Err(ConfigError::Missing("client.message".to_string()));
    }

    if let Some(home) = &config.network.home {
        if home.is_empty() {
            return Err(ConfigError::Invalid("network.home must not be empty".to_string()));
        }
    }

    Ok(())
}
