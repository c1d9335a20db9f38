//! 协议常量定义

use std::time::Duration;

/// 棋盘边长（行数、列数）
pub const BOARD_SIZE: usize = 8;

/// 单行命令最大字节数
pub const MAX_LINE_LEN: usize = 1024;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 命令动词
pub mod verbs {
    pub const FEATURE: &str = "feature";
    pub const VARIANT: &str = "variant";
    pub const FEN: &str = "fen";
    pub const LAST_MOVE: &str = "last_move";
    pub const MOVE: &str = "move";
    pub const PROMOTE: &str = "promote";
    pub const MSG: &str = "msg";
    pub const OK: &str = "ok";
    pub const NOK: &str = "nok";
}

/// 可协商的外设功能名
pub mod feature_names {
    /// 自由文本消息
    pub const MSG: &str = "msg";
    /// 上一步走法
    pub const LAST_MOVE: &str = "last_move";
}
