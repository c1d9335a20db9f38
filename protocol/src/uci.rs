//! UCI 坐标走法

use serde::{Deserialize, Serialize};

use crate::board::BoardSnapshot;
use crate::error::ChessError;
use crate::piece::{Role, Square};

/// UCI 走法：起点、终点和可选的升变棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl UciMove {
    /// 创建新走法
    pub fn new(from: Square, to: Square, promotion: Option<Role>) -> Self {
        Self { from, to, promotion }
    }

    /// 解析 4 或 5 个字符的 UCI 走法，如 `e2e4`、`e7e8q`
    pub fn parse(text: &str) -> Result<Self, ChessError> {
        let invalid = || ChessError::InvalidUci(text.to_string());
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return Err(invalid());
        }

        let from = Square::parse(&text[0..2]).map_err(|_| invalid())?;
        let to = Square::parse(&text[2..4]).map_err(|_| invalid())?;
        let promotion = match text[4..].chars().next() {
            Some(c) => Some(Role::from_promotion_char(c).ok_or_else(invalid)?),
            None => None,
        };

        Ok(Self { from, to, promotion })
    }

    /// 快照中的上一步走法
    pub fn last_move(snapshot: &BoardSnapshot) -> Option<Self> {
        snapshot
            .last_move
            .map(|(from, to)| Self::new(from, to, snapshot.promotion))
    }
}

impl std::fmt::Display for UciMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.to_char())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for UciMove {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 走法字符串是否带有第五位升变字符
pub fn has_promotion_suffix(uci: &str) -> bool {
    uci.chars()
        .nth(4)
        .and_then(Role::from_promotion_char)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_move() {
        let mv = UciMove::parse("e2e4").unwrap();
        assert_eq!(mv.from, Square::parse("e2").unwrap());
        assert_eq!(mv.to, Square::parse("e4").unwrap());
        assert_eq!(mv.promotion, None);
        assert_eq!(mv.to_string(), "e2e4");
    }

    #[test]
    fn test_parse_promotion() {
        let mv = UciMove::parse("e7e8q").unwrap();
        assert_eq!(mv.promotion, Some(Role::Queen));
        assert_eq!(mv.to_string(), "e7e8q");

        let mv: UciMove = "b2a1n".parse().unwrap();
        assert_eq!(mv.promotion, Some(Role::Knight));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(UciMove::parse("").is_err());
        assert!(UciMove::parse("e2").is_err());
        assert!(UciMove::parse("e2e9").is_err());
        assert!(UciMove::parse("e7e8x").is_err());
        assert!(UciMove::parse("e7e8qq").is_err());
        assert!(UciMove::parse("é2e4").is_err());
    }

    #[test]
    fn test_has_promotion_suffix() {
        assert!(has_promotion_suffix("e7e8q"));
        assert!(has_promotion_suffix("a2a1r"));
        assert!(!has_promotion_suffix("e2e4"));
        assert!(!has_promotion_suffix("e7e8"));
        assert!(!has_promotion_suffix("e7e8x"));
    }

    #[test]
    fn test_last_move() {
        let snapshot = BoardSnapshot::default();
        assert_eq!(UciMove::last_move(&snapshot), None);

        let e7 = Square::parse("e7").unwrap();
        let e8 = Square::parse("e8").unwrap();
        let snapshot = snapshot.with_last_move(e7, e8, Some(Role::Queen));
        assert_eq!(UciMove::last_move(&snapshot).unwrap().to_string(), "e7e8q");
    }
}
