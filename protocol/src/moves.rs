//! 坐标走法记号
//!
//! 走法由起点、终点和可选的升变字母组成，编码为 4 或 5 个字符：
//! 线协议使用大写格子（`E2E4`、`E7E8q`），UCI 引擎使用全小写（`e7e8q`）。
//! 解析时大小写不敏感。

use std::fmt;
use std::str::FromStr;

use shakmaty::uci::UciMove;
use shakmaty::Square;

use crate::error::ChessError;
use crate::piece::Promotion;

/// 走法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    /// 起始格
    pub from: Square,
    /// 目标格
    pub to: Square,
    /// 升变棋子（如果有）
    pub promotion: Option<Promotion>,
}

impl Move {
    /// 解析 4/5 字符的坐标记号
    pub fn parse(token: &str) -> Result<Move, ChessError> {
        let invalid = || ChessError::InvalidMove {
            token: token.to_string(),
        };

        let token = token.trim();
        if !token.is_ascii() || !(4..=5).contains(&token.len()) {
            return Err(invalid());
        }

        let lower = token.to_ascii_lowercase();
        let from = Square::from_ascii(&lower.as_bytes()[0..2]).map_err(|_| invalid())?;
        let to = Square::from_ascii(&lower.as_bytes()[2..4]).map_err(|_| invalid())?;
        let promotion = match lower.chars().nth(4) {
            Some(c) => Some(Promotion::from_char(c).ok_or_else(invalid)?),
            None => None,
        };

        Ok(Move {
            from,
            to,
            promotion,
        })
    }

    /// 线协议记号：大写格子 + 小写升变字母
    pub fn to_wire(&self) -> String {
        let mut s = format!("{}{}", self.from, self.to).to_ascii_uppercase();
        if let Some(p) = self.promotion {
            s.push(p.to_char());
        }
        s
    }

    /// UCI 记号：全小写
    pub fn to_uci(&self) -> String {
        let mut s = format!("{}{}", self.from, self.to);
        if let Some(p) = self.promotion {
            s.push(p.to_char());
        }
        s
    }

    pub(crate) fn to_uci_move(self) -> UciMove {
        UciMove::Normal {
            from: self.from,
            to: self.to,
            promotion: self.promotion.map(Promotion::to_role),
        }
    }

    pub(crate) fn from_uci_move(uci: UciMove) -> Option<Move> {
        match uci {
            UciMove::Normal {
                from,
                to,
                promotion,
            } => Some(Move {
                from,
                to,
                promotion: promotion.and_then(Promotion::from_role),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl FromStr for Move {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Move::parse(s)
    }
}
