//! 阵营与升变棋子定义

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 阵营（即座位颜色）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// 白方（先手）
    White,
    /// 黑方（后手）
    Black,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// 线协议中的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }

    pub(crate) fn from_color(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("white") {
            Ok(Side::White)
        } else if s.eq_ignore_ascii_case("black") {
            Ok(Side::Black)
        } else {
            Err(())
        }
    }
}

/// 兵升变的目标棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Promotion {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl Promotion {
    /// 小写字母记号（`q`/`r`/`b`/`n`）
    pub fn to_char(self) -> char {
        match self {
            Promotion::Queen => 'q',
            Promotion::Rook => 'r',
            Promotion::Bishop => 'b',
            Promotion::Knight => 'n',
        }
    }

    /// 从字母解析，大小写不敏感
    pub fn from_char(c: char) -> Option<Promotion> {
        match c.to_ascii_lowercase() {
            'q' => Some(Promotion::Queen),
            'r' => Some(Promotion::Rook),
            'b' => Some(Promotion::Bishop),
            'n' => Some(Promotion::Knight),
            _ => None,
        }
    }

    pub(crate) fn to_role(self) -> shakmaty::Role {
        match self {
            Promotion::Queen => shakmaty::Role::Queen,
            Promotion::Rook => shakmaty::Role::Rook,
            Promotion::Bishop => shakmaty::Role::Bishop,
            Promotion::Knight => shakmaty::Role::Knight,
        }
    }

    pub(crate) fn from_role(role: shakmaty::Role) -> Option<Promotion> {
        match role {
            shakmaty::Role::Queen => Some(Promotion::Queen),
            shakmaty::Role::Rook => Some(Promotion::Rook),
            shakmaty::Role::Bishop => Some(Promotion::Bishop),
            shakmaty::Role::Knight => Some(Promotion::Knight),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::White.opponent(), Side::Black);
        assert_eq!(Side::Black.opponent(), Side::White);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("white".parse::<Side>(), Ok(Side::White));
        assert_eq!("BLACK".parse::<Side>(), Ok(Side::Black));
        assert!("red".parse::<Side>().is_err());
        assert_eq!(Side::Black.to_string(), "black");
    }

    #[test]
    fn test_promotion_char() {
        assert_eq!(Promotion::from_char('Q'), Some(Promotion::Queen));
        assert_eq!(Promotion::from_char('n'), Some(Promotion::Knight));
        assert_eq!(Promotion::from_char('k'), None);
        assert_eq!(Promotion::Rook.to_char(), 'r');
    }
}
