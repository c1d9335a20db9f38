//! 棋盘与中心端局面快照

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::piece::{Color, Piece, Role, Square};

/// 初始底线排列
const BACK_RANK: [Role; BOARD_SIZE] = [
    Role::Rook,
    Role::Knight,
    Role::Bishop,
    Role::Queen,
    Role::King,
    Role::Bishop,
    Role::Knight,
    Role::Rook,
];

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// 8x8 棋盘，索引为 rank * 8 + file，使用 Vec 以支持 serde
    squares: Vec<Option<Piece>>,
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: vec![None; BOARD_SIZE * BOARD_SIZE],
        }
    }

    /// 创建初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();

        for (file, role) in BACK_RANK.iter().enumerate() {
            let file = file as u8;
            board.set(Square::new_unchecked(file, 0), Some(Piece::new(*role, Color::White)));
            board.set(Square::new_unchecked(file, 1), Some(Piece::new(Role::Pawn, Color::White)));
            board.set(Square::new_unchecked(file, 6), Some(Piece::new(Role::Pawn, Color::Black)));
            board.set(Square::new_unchecked(file, 7), Some(Piece::new(*role, Color::Black)));
        }

        board
    }

    /// 获取指定格子的棋子
    pub fn get(&self, square: Square) -> Option<Piece> {
        self.squares.get(square.to_index()).copied().flatten()
    }

    /// 设置指定格子的棋子
    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        if let Some(slot) = self.squares.get_mut(square.to_index()) {
            *slot = piece;
        }
    }

    /// 移动棋子（不检查规则），返回被吃的棋子
    pub fn move_piece(&mut self, from: Square, to: Square) -> Option<Piece> {
        let piece = self.get(from);
        let captured = self.get(to);
        self.set(from, None);
        self.set(to, piece);
        captured
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

/// 棋类变体
///
/// 快照携带变体，但同步时始终宣告 `standard`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Variant {
    #[default]
    Standard,
    Chess960,
    FromPosition,
    KingOfTheHill,
    ThreeCheck,
    Antichess,
    Atomic,
    Horde,
    RacingKings,
    Crazyhouse,
}

impl Variant {
    /// 协议中的变体名
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::Chess960 => "chess960",
            Variant::FromPosition => "fromPosition",
            Variant::KingOfTheHill => "kingOfTheHill",
            Variant::ThreeCheck => "threeCheck",
            Variant::Antichess => "antichess",
            Variant::Atomic => "atomic",
            Variant::Horde => "horde",
            Variant::RacingKings => "racingKings",
            Variant::Crazyhouse => "crazyhouse",
        }
    }
}

/// 中心端局面快照
///
/// 协议只持有一份快照，每次中心端上报时整体替换。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board: Board,
    /// 走子方
    pub turn: Color,
    /// 上一步走法（起点, 终点）
    pub last_move: Option<(Square, Square)>,
    /// 上一步的升变棋子（待选或刚选定）
    pub promotion: Option<Role>,
    pub variant: Variant,
}

impl BoardSnapshot {
    /// 创建没有上一步走法的快照
    pub fn new(board: Board, turn: Color) -> Self {
        Self {
            board,
            turn,
            last_move: None,
            promotion: None,
            variant: Variant::Standard,
        }
    }

    /// 设置上一步走法
    pub fn with_last_move(mut self, from: Square, to: Square, promotion: Option<Role>) -> Self {
        self.last_move = Some((from, to));
        self.promotion = promotion;
        self
    }
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self::new(Board::initial(), Color::White)
    }
}
