//! BLE 棋盘同步协议库
//!
//! 包含:
//! - 棋子、格子、棋盘与中心端局面快照
//! - FEN（棋盘 + 走子方）与容错比较
//! - UCI 走法与文本命令编解码
//! - 功能协商与同步状态机 (BleChessProtocol)
//! - 按行收发的链路抽象 (Link, Connector traits)

mod board;
mod command;
mod constants;
mod error;
mod features;
mod fen;
mod machine;
mod piece;
mod transport;
mod uci;

pub use board::{Board, BoardSnapshot, Variant};
pub use command::Command;
pub use constants::*;
pub use error::{ChessError, ProtocolError, Result};
pub use features::FeatureSet;
pub use fen::{Fen, INITIAL_FEN};
pub use machine::{BleChessProtocol, MoveOrigin, Notice, Output, ProtocolState};
pub use piece::{Color, Piece, Role, Square};
pub use transport::{Connector, LineLink, LineReader, LineWriter, Link, TcpConnector, TcpLink};
pub use uci::{has_promotion_suffix, UciMove};
