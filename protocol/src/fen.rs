//! FEN 局面快照
//!
//! 标准 FEN 格式：
//! `<棋盘> <走子方> <易位权> <吃过路兵目标格> <半回合计数> <回合数>`
//!
//! 示例：
//! `rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1`
//!
//! [`Fen`] 是不可变值：走棋、重置或加载时整体替换，从不原地修改。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use shakmaty::fen::Fen as RawFen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};

use crate::error::ChessError;
use crate::piece::Side;

/// 初始局面 FEN
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// 经过校验和规范化的局面快照
#[derive(Clone)]
pub struct Fen {
    text: String,
    position: Chess,
}

impl Fen {
    /// 初始局面
    pub fn initial() -> Self {
        Self::from_position(Chess::default())
    }

    /// 解析 FEN 字符串，非法局面返回 [`ChessError::InvalidFen`]
    pub fn parse(fen: &str) -> Result<Fen, ChessError> {
        let fen = fen.trim();
        if fen.is_empty() {
            return Err(ChessError::InvalidFen {
                reason: "Empty FEN string".to_string(),
            });
        }

        let raw: RawFen = fen.parse().map_err(|e| ChessError::InvalidFen {
            reason: format!("{}", e),
        })?;
        let position: Chess =
            raw.into_position(CastlingMode::Standard)
                .map_err(|e| ChessError::InvalidFen {
                    reason: format!("{}", e),
                })?;

        Ok(Self::from_position(position))
    }

    pub(crate) fn from_position(position: Chess) -> Self {
        // 吃过路兵目标格按 FEN 规范输出（双步推进后总是记录）
        let text = RawFen::from_position(&position, EnPassantMode::Always).to_string();
        Self { text, position }
    }

    pub(crate) fn position(&self) -> &Chess {
        &self.position
    }

    /// FEN 文本
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// 走子方
    pub fn side_to_move(&self) -> Side {
        Side::from_color(self.position.turn())
    }

    /// 半回合计数（自上次吃子或动兵）
    pub fn halfmove_clock(&self) -> u32 {
        self.position.halfmoves()
    }

    /// 回合数
    pub fn fullmove_number(&self) -> u32 {
        self.position.fullmoves().get()
    }
}

impl Default for Fen {
    fn default() -> Self {
        Self::initial()
    }
}

impl PartialEq for Fen {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Fen {}

impl Hash for Fen {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Debug for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fen").field(&self.text).finish()
    }
}

impl fmt::Display for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Fen {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fen::parse(s)
    }
}
