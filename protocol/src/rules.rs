//! 规则引擎接口
//!
//! 合法性判定属于外部协作者：核心逻辑只通过 [`RulesEngine`] 询问
//! "走法 M 在局面 P 下是否合法" 和 "对 P 执行 M 得到 P'"，
//! 以及终局判定所需的局面探测。默认实现 [`StandardRules`] 基于 `shakmaty`。

use shakmaty::zobrist::Zobrist64;
use shakmaty::{CastlingMode, EnPassantMode, Position};

use crate::error::ChessError;
use crate::fen::Fen;
use crate::moves::Move;
use crate::piece::Side;

/// 终局判定所需的局面信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionProbe {
    /// 走子方
    pub side_to_move: Side,
    /// 走子方是否被将军
    pub in_check: bool,
    /// 走子方是否还有合法走法
    pub has_legal_move: bool,
    /// 双方子力均不足以将死
    pub insufficient_material: bool,
    /// 半回合计数
    pub halfmove_clock: u32,
    /// 重复局面判定用的哈希（不含回合计数）
    pub repetition_key: u64,
}

/// 合法性判定接口
pub trait RulesEngine: Send + Sync {
    /// 走法是否合法
    fn is_legal(&self, position: &Fen, mv: &Move) -> bool;

    /// 执行走法，返回新局面
    fn apply(&self, position: &Fen, mv: &Move) -> Result<Fen, ChessError>;

    /// 所有合法走法
    fn legal_moves(&self, position: &Fen) -> Vec<Move>;

    /// 探测局面状态
    fn probe(&self, position: &Fen) -> PositionProbe;
}

/// 标准国际象棋规则
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl RulesEngine for StandardRules {
    fn is_legal(&self, position: &Fen, mv: &Move) -> bool {
        mv.to_uci_move().to_move(position.position()).is_ok()
    }

    fn apply(&self, position: &Fen, mv: &Move) -> Result<Fen, ChessError> {
        let illegal = || ChessError::IllegalMove {
            token: mv.to_wire(),
            fen: position.to_string(),
        };

        let m = mv
            .to_uci_move()
            .to_move(position.position())
            .map_err(|_| illegal())?;
        let next = position.position().clone().play(m).map_err(|_| illegal())?;

        Ok(Fen::from_position(next))
    }

    fn legal_moves(&self, position: &Fen) -> Vec<Move> {
        position
            .position()
            .legal_moves()
            .iter()
            .filter_map(|m| Move::from_uci_move(m.to_uci(CastlingMode::Standard)))
            .collect()
    }

    fn probe(&self, position: &Fen) -> PositionProbe {
        let pos = position.position();
        PositionProbe {
            side_to_move: position.side_to_move(),
            in_check: pos.is_check(),
            has_legal_move: !pos.legal_moves().is_empty(),
            insufficient_material: pos.is_insufficient_material(),
            halfmove_clock: pos.halfmoves(),
            repetition_key: pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0,
        }
    }
}
