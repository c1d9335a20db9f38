//! BLE 棋盘中心端
//!
//! 包含:
//! - 配置加载与保存
//! - 同步会话（串行处理外设命令与中心端回调）
//! - 回环中心端（调试外设用）

pub mod config;
pub mod loopback;
pub mod session;

pub use config::{CentralConfig, ConfigError};
pub use loopback::LoopbackCentral;
pub use session::{Session, SessionEvent, SessionHandle, SpawnedSession};
