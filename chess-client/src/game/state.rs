//! 客户端走子状态机

use protocol::{
    Fen, Move, RulesEngine, Side, StandardRules, FIFTY_MOVE_HALFMOVES, REPETITION_COUNT,
};

use crate::error::TurnError;

/// 终局原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    Checkmate { winner: Side },
    Stalemate,
    /// 三次重复局面
    Repetition,
    /// 双方子力不足
    InsufficientMaterial,
    /// 五十回合规则
    FiftyMoveRule,
}

impl GameOverReason {
    pub fn winner(&self) -> Option<Side> {
        match self {
            GameOverReason::Checkmate { winner } => Some(*winner),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GameOverReason::Checkmate { winner: Side::White } => "将死，白方胜",
            GameOverReason::Checkmate { winner: Side::Black } => "将死，黑方胜",
            GameOverReason::Stalemate => "逼和",
            GameOverReason::Repetition => "三次重复局面，和棋",
            GameOverReason::InsufficientMaterial => "子力不足，和棋",
            GameOverReason::FiftyMoveRule => "五十回合规则，和棋",
        }
    }
}

/// 走子状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// 轮到本方
    LocalTurn,
    /// 等待对方
    RemoteTurn,
    /// 对局结束（不可逆，直到重新开局或载入局面）
    GameOver(GameOverReason),
}

/// 走子状态机
///
/// 持有当前局面与重复局面历史，所有合法性判定委托给 [`RulesEngine`]。
pub struct TurnMachine<R = StandardRules> {
    rules: R,
    side: Option<Side>,
    position: Fen,
    state: TurnState,
    /// 自开局或载入以来每个局面的重复判定哈希
    history: Vec<u64>,
    last_move: Option<Move>,
    /// 本地双人：双方都由本地走子
    hot_seat: bool,
}

impl TurnMachine<StandardRules> {
    pub fn new() -> Self {
        Self::with_rules(StandardRules)
    }
}

impl Default for TurnMachine<StandardRules> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RulesEngine> TurnMachine<R> {
    pub fn with_rules(rules: R) -> Self {
        let position = Fen::initial();
        let history = vec![rules.probe(&position).repetition_key];
        Self {
            rules,
            side: None,
            position,
            state: TurnState::RemoteTurn,
            history,
            last_move: None,
            hot_seat: false,
        }
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn position(&self) -> &Fen {
        &self.position
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_hot_seat(&self) -> bool {
        self.hot_seat
    }

    pub fn is_local_turn(&self) -> bool {
        self.state == TurnState::LocalTurn
    }

    pub fn game_over(&self) -> Option<GameOverReason> {
        match self.state {
            TurnState::GameOver(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.rules.legal_moves(&self.position)
    }

    /// 握手分配阵营，同时退出本地双人模式
    pub fn assign_side(&mut self, side: Side) {
        self.side = Some(side);
        self.hot_seat = false;
    }

    /// 本地双人开局：不分阵营，始终轮到本地
    pub fn start_hot_seat(&mut self) {
        self.side = None;
        self.hot_seat = true;
        self.start();
    }

    /// 对局开始：回到初始局面，等待 `YOUR_TURN`
    pub fn start(&mut self) {
        self.reset_to(Fen::initial());
        self.state = if self.hot_seat {
            TurnState::LocalTurn
        } else {
            TurnState::RemoteTurn
        };
    }

    /// 重新开局，与 [`start`](Self::start) 相同
    pub fn reset(&mut self) {
        self.start();
    }

    /// 收到 `YOUR_TURN`；终局后保持不变
    pub fn grant_turn(&mut self) {
        if self.game_over().is_none() {
            self.state = TurnState::LocalTurn;
        }
    }

    /// 载入局面（本地读档或对方 `LOADFEN`）
    ///
    /// 走子方与本方一致时轮到本方，并重新判定终局。
    pub fn load_position(&mut self, fen: Fen) {
        let to_move = fen.side_to_move();
        self.reset_to(fen);

        self.state = if self.hot_seat || self.side == Some(to_move) {
            TurnState::LocalTurn
        } else {
            TurnState::RemoteTurn
        };
        if let Some(reason) = self.evaluate() {
            self.state = TurnState::GameOver(reason);
        }
    }

    /// 本方走子：通过本地合法性检查后立即生效，随后由调用方发送
    ///
    /// 本地双人模式下走子方即当前轮到的一方，走完仍轮到本地。
    pub fn apply_local(&mut self, mv: Move) -> Result<TurnState, TurnError> {
        if self.game_over().is_some() {
            return Err(TurnError::GameEnded);
        }
        if self.hot_seat {
            return self.play(mv, TurnState::LocalTurn);
        }

        let Some(side) = self.side else {
            return Err(TurnError::NoSide);
        };
        if self.state != TurnState::LocalTurn || self.position.side_to_move() != side {
            return Err(TurnError::NotYourTurn);
        }

        self.play(mv, TurnState::RemoteTurn)
    }

    /// 对方走子：只在等待对方且轮到对方棋子时接受，非法走法被拒绝，局面保持不变
    pub fn apply_remote(&mut self, mv: Move) -> Result<TurnState, TurnError> {
        if self.game_over().is_some() {
            return Err(TurnError::GameEnded);
        }

        let to_move = self.position.side_to_move();
        if self.hot_seat
            || self.state != TurnState::RemoteTurn
            || self.side.map(|side| side.opponent()) != Some(to_move)
        {
            return Err(TurnError::OutOfSequence);
        }

        self.play(mv, TurnState::LocalTurn)
    }

    fn play(&mut self, mv: Move, next: TurnState) -> Result<TurnState, TurnError> {
        let position = self
            .rules
            .apply(&self.position, &mv)
            .map_err(|_| TurnError::IllegalMove(mv))?;

        self.position = position;
        self.history
            .push(self.rules.probe(&self.position).repetition_key);
        self.last_move = Some(mv);

        self.state = match self.evaluate() {
            Some(reason) => TurnState::GameOver(reason),
            None => next,
        };
        Ok(self.state)
    }

    /// 终局判定：将死 → 逼和 → 三次重复 → 子力不足 → 五十回合
    pub fn evaluate(&self) -> Option<GameOverReason> {
        let probe = self.rules.probe(&self.position);

        if !probe.has_legal_move {
            return Some(if probe.in_check {
                GameOverReason::Checkmate {
                    winner: probe.side_to_move.opponent(),
                }
            } else {
                GameOverReason::Stalemate
            });
        }

        let repeats = self
            .history
            .iter()
            .filter(|&&key| key == probe.repetition_key)
            .count();
        if repeats >= REPETITION_COUNT {
            return Some(GameOverReason::Repetition);
        }

        if probe.insufficient_material {
            return Some(GameOverReason::InsufficientMaterial);
        }

        if probe.halfmove_clock >= FIFTY_MOVE_HALFMOVES {
            return Some(GameOverReason::FiftyMoveRule);
        }

        None
    }

    fn reset_to(&mut self, fen: Fen) {
        self.history.clear();
        self.history.push(self.rules.probe(&fen).repetition_key);
        self.position = fen;
        self.last_move = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(token: &str) -> Move {
        Move::parse(token).unwrap()
    }

    /// 执白并轮到本方的状态机
    fn white_to_move() -> TurnMachine {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::White);
        machine.start();
        machine.grant_turn();
        machine
    }

    #[test]
    fn test_start_waits_for_turn() {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::White);
        machine.start();
        assert_eq!(machine.state(), TurnState::RemoteTurn);
        assert_eq!(machine.apply_local(mv("e2e4")), Err(TurnError::NotYourTurn));

        machine.grant_turn();
        assert!(machine.is_local_turn());
    }

    #[test]
    fn test_no_side() {
        let mut machine = TurnMachine::new();
        machine.grant_turn();
        assert_eq!(machine.apply_local(mv("e2e4")), Err(TurnError::NoSide));
    }

    #[test]
    fn test_local_then_remote() {
        let mut machine = white_to_move();

        assert_eq!(machine.apply_local(mv("e2e4")), Ok(TurnState::RemoteTurn));
        assert_eq!(machine.last_move(), Some(mv("e2e4")));
        assert_eq!(machine.position().side_to_move(), Side::Black);

        assert_eq!(machine.apply_remote(mv("e7e5")), Ok(TurnState::LocalTurn));
        assert_eq!(
            machine.position().as_str(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2"
        );
    }

    #[test]
    fn test_remote_move_out_of_sequence() {
        let mut machine = white_to_move();

        // 轮到本方时对方走法被拒绝，本方棋子也不会被对方移动
        assert_eq!(
            machine.apply_remote(mv("e2e4")),
            Err(TurnError::OutOfSequence)
        );
        assert_eq!(machine.position(), &Fen::initial());
        assert!(machine.is_local_turn());

        // 未分配阵营时同样拒绝
        let mut fresh = TurnMachine::new();
        assert_eq!(fresh.apply_remote(mv("e2e4")), Err(TurnError::OutOfSequence));
    }

    #[test]
    fn test_local_move_needs_own_side_to_move() {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::White);
        machine.load_position(
            Fen::parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap(),
        );
        assert_eq!(machine.state(), TurnState::RemoteTurn);

        // 多余的 YOUR_TURN 不能让白方替黑方走子
        machine.grant_turn();
        assert_eq!(machine.apply_local(mv("e7e5")), Err(TurnError::NotYourTurn));
        assert_eq!(machine.position().side_to_move(), Side::Black);
    }

    #[test]
    fn test_hot_seat_plays_both_sides() {
        let mut machine = TurnMachine::new();
        machine.start_hot_seat();
        assert!(machine.is_hot_seat());
        assert_eq!(machine.side(), None);
        assert!(machine.is_local_turn());

        assert_eq!(machine.apply_local(mv("e2e4")), Ok(TurnState::LocalTurn));
        assert_eq!(machine.apply_local(mv("e7e5")), Ok(TurnState::LocalTurn));
        assert_eq!(
            machine.position().as_str(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2"
        );
        assert_eq!(
            machine.apply_remote(mv("g1f3")),
            Err(TurnError::OutOfSequence)
        );

        machine.reset();
        assert!(machine.is_local_turn());
        assert_eq!(machine.position(), &Fen::initial());

        // 分配阵营后回到联机规则
        machine.assign_side(Side::Black);
        machine.start();
        assert!(!machine.is_hot_seat());
        assert_eq!(machine.state(), TurnState::RemoteTurn);
    }

    #[test]
    fn test_hot_seat_fools_mate() {
        let mut machine = TurnMachine::new();
        machine.start_hot_seat();

        for token in ["f2f3", "e7e5", "g2g4"] {
            machine.apply_local(mv(token)).unwrap();
        }
        let state = machine.apply_local(mv("d8h4")).unwrap();
        assert_eq!(
            state,
            TurnState::GameOver(GameOverReason::Checkmate {
                winner: Side::Black
            })
        );
    }

    #[test]
    fn test_illegal_local_move_rejected() {
        let mut machine = white_to_move();
        let before = machine.position().clone();

        assert_eq!(
            machine.apply_local(mv("e2e5")),
            Err(TurnError::IllegalMove(mv("e2e5")))
        );
        assert_eq!(machine.position(), &before);
        assert!(machine.is_local_turn());
    }

    #[test]
    fn test_illegal_remote_move_rejected() {
        let mut machine = white_to_move();
        machine.apply_local(mv("e2e4")).unwrap();
        let before = machine.position().clone();

        // 轮到黑方时白方棋子不能动
        assert!(machine.apply_remote(mv("d2d4")).is_err());
        assert_eq!(machine.position(), &before);
        assert_eq!(machine.state(), TurnState::RemoteTurn);
    }

    #[test]
    fn test_checkmate_is_sticky() {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::Black);
        machine.start();

        machine.apply_remote(mv("f2f3")).unwrap();
        machine.apply_local(mv("e7e5")).unwrap();
        machine.apply_remote(mv("g2g4")).unwrap();
        let state = machine.apply_local(mv("d8h4")).unwrap();

        let reason = GameOverReason::Checkmate {
            winner: Side::Black,
        };
        assert_eq!(state, TurnState::GameOver(reason));
        assert_eq!(reason.winner(), Some(Side::Black));

        machine.grant_turn();
        assert_eq!(machine.state(), TurnState::GameOver(reason));
        assert_eq!(machine.apply_local(mv("a7a6")), Err(TurnError::GameEnded));
        assert_eq!(machine.apply_remote(mv("a2a3")), Err(TurnError::GameEnded));

        machine.reset();
        assert_eq!(machine.state(), TurnState::RemoteTurn);
        assert_eq!(machine.position(), &Fen::initial());
    }

    #[test]
    fn test_stalemate() {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::White);
        machine.load_position(Fen::parse("7k/8/8/8/8/8/5Q2/K7 w - - 0 1").unwrap());
        assert!(machine.is_local_turn());

        let state = machine.apply_local(mv("f2f7")).unwrap();
        assert_eq!(state, TurnState::GameOver(GameOverReason::Stalemate));
    }

    #[test]
    fn test_threefold_repetition() {
        let mut machine = white_to_move();

        // 双方马来回跳两次，初始局面第三次出现
        for _ in 0..2 {
            machine.apply_local(mv("g1f3")).unwrap();
            machine.apply_remote(mv("g8f6")).unwrap();
            machine.grant_turn();
            machine.apply_local(mv("f3g1")).unwrap();
            machine.apply_remote(mv("f6g8")).unwrap();
            machine.grant_turn();
        }

        assert_eq!(
            machine.state(),
            TurnState::GameOver(GameOverReason::Repetition)
        );
    }

    #[test]
    fn test_insufficient_material() {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::White);
        machine.load_position(Fen::parse("4k3/8/8/8/8/8/3p4/4K3 w - - 0 1").unwrap());

        let state = machine.apply_local(mv("e1d2")).unwrap();
        assert_eq!(
            state,
            TurnState::GameOver(GameOverReason::InsufficientMaterial)
        );
    }

    #[test]
    fn test_fifty_move_rule() {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::White);
        machine.load_position(Fen::parse("4k3/8/8/8/8/8/R7/4K3 w - - 99 80").unwrap());

        let state = machine.apply_local(mv("a2a3")).unwrap();
        assert_eq!(state, TurnState::GameOver(GameOverReason::FiftyMoveRule));
    }

    #[test]
    fn test_checkmate_before_fifty_move_rule() {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::White);
        machine.load_position(Fen::parse("6k1/5ppp/8/8/8/8/8/R5K1 w - - 99 80").unwrap());

        let state = machine.apply_local(mv("a1a8")).unwrap();
        assert_eq!(
            state,
            TurnState::GameOver(GameOverReason::Checkmate {
                winner: Side::White
            })
        );
    }

    #[test]
    fn test_load_position_turn() {
        let fen = Fen::parse("4k3/8/8/8/8/8/4P3/4K3 b - - 0 1").unwrap();

        let mut white = TurnMachine::new();
        white.assign_side(Side::White);
        white.load_position(fen.clone());
        assert_eq!(white.state(), TurnState::RemoteTurn);

        let mut black = TurnMachine::new();
        black.assign_side(Side::Black);
        black.load_position(fen.clone());
        assert_eq!(black.state(), TurnState::LocalTurn);
        assert_eq!(black.position(), &fen);

        // 载入已终局的局面
        let mated = Fen::parse("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3").unwrap();
        black.load_position(mated);
        assert_eq!(
            black.game_over(),
            Some(GameOverReason::Checkmate {
                winner: Side::Black
            })
        );
    }

    #[test]
    fn test_promotion_move() {
        let mut machine = TurnMachine::new();
        machine.assign_side(Side::White);
        machine.load_position(Fen::parse("k7/4P3/8/8/8/8/8/4K3 w - - 0 1").unwrap());

        // 不带升变字母的兵到底线走法不合法
        assert!(machine.apply_local(mv("e7e8")).is_err());
        machine.apply_local(mv("E7E8q")).unwrap();
        assert!(machine.position().as_str().starts_with("k3Q3/"));
    }
}
