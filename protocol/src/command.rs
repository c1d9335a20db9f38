//! 文本命令编解码
//!
//! 每条命令占一行：`<动词>[ <参数>]`，参数是第一个空格之后的全部内容。

use serde::{Deserialize, Serialize};

use crate::board::{BoardSnapshot, Variant};
use crate::constants::verbs;
use crate::fen::Fen;
use crate::uci::UciMove;

/// 中心端与外设之间的一条命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub verb: String,
    pub param: Option<String>,
}

impl Command {
    /// 创建新命令
    pub fn new(verb: impl Into<String>, param: Option<String>) -> Self {
        Self {
            verb: verb.into(),
            param,
        }
    }

    /// 解析一行文本，不会失败
    pub fn parse(line: &str) -> Self {
        match line.split_once(' ') {
            Some((verb, param)) => Self::new(verb, Some(param.to_string())),
            None => Self::new(line, None),
        }
    }

    /// 格式化为一行文本
    pub fn format(verb: &str, param: Option<&str>) -> String {
        match param {
            Some(param) => format!("{} {}", verb, param),
            None => verb.to_string(),
        }
    }

    /// 动词相同且没有参数
    pub fn is_bare(&self, verb: &str) -> bool {
        self.verb == verb && self.param.is_none()
    }

    /// 动词相同时返回参数
    pub fn param_of(&self, verb: &str) -> Option<&str> {
        if self.verb == verb {
            self.param.as_deref()
        } else {
            None
        }
    }

    pub fn ok() -> Self {
        Self::new(verbs::OK, None)
    }

    pub fn nok() -> Self {
        Self::new(verbs::NOK, None)
    }

    pub fn feature(name: &str) -> Self {
        Self::new(verbs::FEATURE, Some(name.to_string()))
    }

    pub fn variant(variant: Variant) -> Self {
        Self::new(verbs::VARIANT, Some(variant.as_str().to_string()))
    }

    pub fn fen(snapshot: &BoardSnapshot) -> Self {
        Self::new(verbs::FEN, Some(Fen::full_fen(snapshot)))
    }

    pub fn last_move(mv: UciMove) -> Self {
        Self::new(verbs::LAST_MOVE, Some(mv.to_string()))
    }

    pub fn mv(mv: UciMove) -> Self {
        Self::new(verbs::MOVE, Some(mv.to_string()))
    }

    pub fn promote(mv: UciMove) -> Self {
        Self::new(verbs::PROMOTE, Some(mv.to_string()))
    }

    pub fn msg(text: &str) -> Self {
        Self::new(verbs::MSG, Some(text.to_string()))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&Self::format(&self.verb, self.param.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_without_param() {
        let cmd = Command::parse("ok");
        assert_eq!(cmd.verb, "ok");
        assert_eq!(cmd.param, None);
        assert!(cmd.is_bare(verbs::OK));
    }

    #[test]
    fn test_parse_splits_at_first_space() {
        let cmd = Command::parse("fen 8/8/8/8/8/8/8/8 w");
        assert_eq!(cmd.verb, "fen");
        assert_eq!(cmd.param.as_deref(), Some("8/8/8/8/8/8/8/8 w"));
        assert_eq!(cmd.param_of(verbs::FEN), Some("8/8/8/8/8/8/8/8 w"));
        assert_eq!(cmd.param_of(verbs::MOVE), None);

        let cmd = Command::parse("msg hello  board");
        assert_eq!(cmd.param.as_deref(), Some("hello  board"));
    }

    #[test]
    fn test_ok_with_param_is_not_bare() {
        assert!(!Command::parse("ok please").is_bare(verbs::OK));
    }

    #[test]
    fn test_format() {
        assert_eq!(Command::format("ok", None), "ok");
        assert_eq!(Command::format("move", Some("e2e4")), "move e2e4");
        assert_eq!(Command::feature("last_move").to_string(), "feature last_move");
        assert_eq!(Command::variant(Variant::Standard).to_string(), "variant standard");
        assert_eq!(
            Command::fen(&BoardSnapshot::default()).to_string(),
            "fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w"
        );
        assert_eq!(Command::msg("hi").to_string(), "msg hi");
    }

    #[test]
    fn test_parse_of_formatted_move() {
        let mv = UciMove::parse("a7a8n").unwrap();
        let line = Command::promote(mv).to_string();
        assert_eq!(line, "promote a7a8n");
        assert_eq!(Command::parse(&line), Command::promote(mv));
    }
}
