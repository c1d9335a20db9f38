//! 错误类型定义

use thiserror::Error;

/// 棋局数据解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessError {
    /// 无效的格子
    #[error("Invalid square: {0:?}")]
    InvalidSquare(String),

    /// 无效的 UCI 走法
    #[error("Invalid UCI move: {0:?}")]
    InvalidUci(String),

    /// 无效的 FEN 字符串
    #[error("Invalid FEN string: {reason}")]
    InvalidFen { reason: String },
}

/// 链路错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 行长度超限
    #[error("Line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    /// 行不是合法 UTF-8
    #[error("Line is not valid UTF-8")]
    InvalidUtf8,

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,
}

/// 链路操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
