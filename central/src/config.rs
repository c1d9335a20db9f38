//! 中心端配置
//!
//! JSON 格式，默认位于 `<config_dir>/ble-chess/central.json`。

use std::path::{Path, PathBuf};
use std::time::Duration;

use ble_chess_protocol::INITIAL_FEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 格式错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 中心端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralConfig {
    /// 外设（或 BLE 桥接程序）的 TCP 地址
    pub peripheral_addr: String,
    /// 追加到 `RUST_LOG` 之后的日志指令
    pub log_directives: Vec<String>,
    /// 等待外设回复的超时（秒），为空表示一直等待
    pub reply_timeout_secs: Option<u64>,
    /// 中心端事件队列长度
    pub event_queue_capacity: usize,
    /// 新对局的初始局面
    pub start_fen: String,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            peripheral_addr: "127.0.0.1:9530".to_string(),
            log_directives: vec![
                "ble_chess_central=debug".to_string(),
                "ble_chess_protocol=debug".to_string(),
            ],
            reply_timeout_secs: None,
            event_queue_capacity: 64,
            start_fen: INITIAL_FEN.to_string(),
        }
    }
}

impl CentralConfig {
    /// 获取默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("ble-chess");
            path.push("central.json");
            path
        })
    }

    /// 从默认路径加载，失败时使用默认配置
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            tracing::warn!("无法获取配置目录，使用默认配置");
            return Self::default();
        };

        if !path.exists() {
            tracing::info!("配置文件不存在，使用默认配置");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!("已加载配置: {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件无效: {}，使用默认配置", e);
                Self::default()
            }
        }
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 保存到指定文件
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // 确保目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("配置已保存: {:?}", path);
        Ok(())
    }

    /// 等待外设回复的超时
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_secs.map(Duration::from_secs)
    }
}
