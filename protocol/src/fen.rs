//! FEN 格式解析、生成与容错比较
//!
//! 协议只使用 FEN 的前两段：
//! `<棋盘> <走子方>`
//!
//! 示例：
//! `rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b`

use crate::board::{Board, BoardSnapshot};
use crate::constants::BOARD_SIZE;
use crate::error::ChessError;
use crate::piece::{Color, Piece, Square};

/// 初始局面 FEN（棋盘 + 走子方）
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w";

/// 未知格子
const UNKNOWN: char = '?';

/// FEN 格式处理
pub struct Fen;

impl Fen {
    /// 解析 FEN 字符串为快照，第三段起的字段被忽略
    pub fn parse(fen: &str) -> Result<BoardSnapshot, ChessError> {
        let mut parts = fen.split_whitespace();
        let Some(placement) = parts.next() else {
            return Err(ChessError::InvalidFen {
                reason: "Empty FEN string".to_string(),
            });
        };

        let board = Self::parse_placement(placement)?;

        // 解析走子方（默认白方）
        let turn = match parts.next() {
            Some(token) => {
                let mut chars = token.chars();
                match (chars.next().and_then(Color::from_fen_char), chars.next()) {
                    (Some(color), None) => color,
                    _ => {
                        return Err(ChessError::InvalidFen {
                            reason: format!("Invalid side to move: {}", token),
                        })
                    }
                }
            }
            None => Color::White,
        };

        Ok(BoardSnapshot::new(board, turn))
    }

    /// 解析棋盘部分
    pub fn parse_placement(placement: &str) -> Result<Board, ChessError> {
        let mut board = Board::empty();
        let rows: Vec<&str> = placement.split('/').collect();

        if rows.len() != BOARD_SIZE {
            return Err(ChessError::InvalidFen {
                reason: format!("Expected {} ranks, got {}", BOARD_SIZE, rows.len()),
            });
        }

        // FEN 从上到下是第 8 行到第 1 行
        for (row_idx, row) in rows.iter().enumerate() {
            let rank = (BOARD_SIZE - 1 - row_idx) as u8;
            let mut file = 0usize;

            for c in row.chars() {
                if file >= BOARD_SIZE {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Rank {} has too many files", rank + 1),
                    });
                }

                if let Some(empty_count) = c.to_digit(10) {
                    file += empty_count as usize;
                } else if let Some(piece) = Piece::from_fen_char(c) {
                    board.set(Square::new_unchecked(file as u8, rank), Some(piece));
                    file += 1;
                } else {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Invalid piece character: {}", c),
                    });
                }
            }

            if file != BOARD_SIZE {
                return Err(ChessError::InvalidFen {
                    reason: format!(
                        "Rank {} has {} files, expected {}",
                        rank + 1,
                        file,
                        BOARD_SIZE
                    ),
                });
            }
        }

        Ok(board)
    }

    /// 将棋盘转换为 FEN 棋盘部分
    pub fn board_to_string(board: &Board) -> String {
        let mut rows = Vec::with_capacity(BOARD_SIZE);

        for rank in (0..BOARD_SIZE as u8).rev() {
            let mut row = String::new();
            let mut empty_count = 0;

            for file in 0..BOARD_SIZE as u8 {
                if let Some(piece) = board.get(Square::new_unchecked(file, rank)) {
                    if empty_count > 0 {
                        row.push_str(&empty_count.to_string());
                        empty_count = 0;
                    }
                    row.push(piece.to_fen_char());
                } else {
                    empty_count += 1;
                }
            }

            if empty_count > 0 {
                row.push_str(&empty_count.to_string());
            }

            rows.push(row);
        }

        rows.join("/")
    }

    /// 棋盘 + 走子方，协议中 `fen` 命令的参数
    pub fn full_fen(snapshot: &BoardSnapshot) -> String {
        format!(
            "{} {}",
            Self::board_to_string(&snapshot.board),
            snapshot.turn.to_fen_char()
        )
    }

    /// 容错比较两个 FEN
    ///
    /// 只比较到较短字符串的长度，外设可以只上报前缀。
    pub fn same_board(lhs: &str, rhs: &str) -> bool {
        lhs.chars().zip(rhs.chars()).all(|(l, r)| same_char(l, r))
    }
}

/// 单字符容错比较：`?` 匹配任意字符，`w`/`b` 匹配对应颜色的棋子
fn same_char(lhs: char, rhs: char) -> bool {
    lhs == UNKNOWN
        || rhs == UNKNOWN
        || lhs == rhs
        || matches_color(lhs, rhs)
        || matches_color(rhs, lhs)
}

fn matches_color(token: char, piece: char) -> bool {
    match Color::from_fen_char(token) {
        Some(color) => Piece::from_fen_char(piece).is_some_and(|p| p.color == color),
        None => false,
    }
}
