//! 对局会话
//!
//! 一个会话只有白、黑两个席位。入座、通知与转发全部在同一把锁内完成，
//! 因此"寻找空位 → 绑定 → 通知"对并发连接是原子的。

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use protocol::{Message, Side};
use thiserror::Error;

/// 连接 ID
pub type ConnId = u64;

/// 连接的出站消息通道
pub type Outbound = mpsc::UnboundedSender<Message>;

/// 入座失败
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    #[error("Both seats are occupied")]
    GameFull,
}

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// 两个席位都空
    WaitingForFirst,
    /// 只坐了一人
    WaitingForSecond,
    /// 双方就座，对局进行中
    Active,
}

/// 会话状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub white_bound: bool,
    pub black_bound: bool,
    /// 当前轮到哪一方（仅对局进行中有值）
    pub turn: Option<Side>,
}

/// 席位绑定
struct SeatBinding {
    conn_id: ConnId,
    tx: Outbound,
}

/// 席位表
#[derive(Default)]
struct SeatTable {
    white: Option<SeatBinding>,
    black: Option<SeatBinding>,
    turn: Option<Side>,
}

impl SeatTable {
    fn seat(&self, side: Side) -> Option<&SeatBinding> {
        match side {
            Side::White => self.white.as_ref(),
            Side::Black => self.black.as_ref(),
        }
    }

    fn seat_mut(&mut self, side: Side) -> &mut Option<SeatBinding> {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }

    /// 先白后黑的第一个空位
    fn free_side(&self) -> Option<Side> {
        [Side::White, Side::Black]
            .into_iter()
            .find(|&side| self.seat(side).is_none())
    }

    fn is_full(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    fn is_bound(&self, side: Side, conn_id: ConnId) -> bool {
        self.seat(side).is_some_and(|seat| seat.conn_id == conn_id)
    }

    fn phase(&self) -> SessionPhase {
        match (self.white.is_some(), self.black.is_some()) {
            (false, false) => SessionPhase::WaitingForFirst,
            (true, true) => SessionPhase::Active,
            _ => SessionPhase::WaitingForSecond,
        }
    }

    /// 发送给指定席位，席位为空时返回 false
    fn send(&self, side: Side, msg: Message) -> bool {
        let Some(seat) = self.seat(side) else {
            return false;
        };

        debug!("-> {} [{}]: {}", side, seat.conn_id, msg);
        if seat.tx.send(msg).is_err() {
            // 写任务已结束，等读端发现断线后释放席位
            debug!("{} 席位的写通道已关闭", side);
            return false;
        }
        true
    }

    /// 双方就座时开局：双方收到 START，白方收到 YOUR_TURN
    fn start_game(&mut self) {
        self.send(Side::White, Message::Start);
        self.send(Side::Black, Message::Start);
        self.send(Side::White, Message::YourTurn);
        self.turn = Some(Side::White);
    }
}

/// 对局会话
pub struct Session {
    seats: Mutex<SeatTable>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            seats: Mutex::new(SeatTable::default()),
        }
    }

    /// 为新连接分配席位
    ///
    /// 成功时已通过 `tx` 发出 `COLOR:`，若因此坐满还会发出开局消息。
    /// 席位已满时发出 `GAME_FULL` 并丢弃 `tx`，连接的写端随之关闭。
    pub async fn admit(&self, conn_id: ConnId, tx: Outbound) -> Result<Side, AdmitError> {
        let mut seats = self.seats.lock().await;

        let Some(side) = seats.free_side() else {
            info!("连接 {} 被拒绝：席位已满", conn_id);
            let _ = tx.send(Message::GameFull);
            return Err(AdmitError::GameFull);
        };

        *seats.seat_mut(side) = Some(SeatBinding { conn_id, tx });
        seats.send(side, Message::Color(side));
        info!("连接 {} 入座 {}", conn_id, side);

        if seats.is_full() {
            info!("双方就座，对局开始");
            seats.start_game();
        }

        Ok(side)
    }

    /// 处理来自 `side` 席位的消息
    ///
    /// 走法不做合法性校验，只检查是否轮到该方。
    pub async fn on_message(&self, side: Side, conn_id: ConnId, msg: Message) {
        if msg.is_server_only() {
            warn!("忽略来自 {} 的服务端消息 {}", side, msg);
            return;
        }

        let mut seats = self.seats.lock().await;

        if !seats.is_bound(side, conn_id) {
            warn!("连接 {} 已不在 {} 席位，忽略消息 {}", conn_id, side, msg);
            return;
        }

        let opponent = side.opponent();
        match msg {
            Message::Move(mv) => {
                if !seats.is_full() {
                    warn!("{} 在对手未就座时走棋 {}，已忽略", side, mv);
                    return;
                }
                if seats.turn != Some(side) {
                    warn!("{} 不在走棋回合，忽略走法 {}", side, mv);
                    return;
                }

                seats.send(opponent, Message::Move(mv));
                seats.send(opponent, Message::YourTurn);
                seats.turn = Some(opponent);
            }
            Message::Chat(text) => {
                if !seats.send(opponent, Message::Chat(text)) {
                    debug!("{} 的聊天消息无人接收", side);
                }
            }
            Message::Reset => {
                info!("{} 请求重新开局", side);
                seats.send(Side::White, Message::Reset);
                seats.send(Side::Black, Message::Reset);
                seats.send(Side::White, Message::YourTurn);
                seats.turn = seats.is_full().then_some(Side::White);
            }
            Message::LoadFen(fen) => {
                info!("{} 载入局面 {}", side, fen);
                let to_move = fen.side_to_move();
                if seats.send(opponent, Message::LoadFen(fen)) && seats.is_full() {
                    seats.turn = Some(to_move);
                }
            }
            Message::Color(_) | Message::Start | Message::YourTurn | Message::GameFull => {}
        }
    }

    /// 连接断开，释放其席位
    ///
    /// 只有席位仍绑定在该连接上时才会释放，返回是否释放。
    pub async fn on_disconnect(&self, side: Side, conn_id: ConnId) -> bool {
        let mut seats = self.seats.lock().await;

        if !seats.is_bound(side, conn_id) {
            return false;
        }

        *seats.seat_mut(side) = None;
        seats.turn = None;
        info!("连接 {} 离开 {} 席位", conn_id, side);
        true
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let seats = self.seats.lock().await;
        SessionSnapshot {
            phase: seats.phase(),
            white_bound: seats.white.is_some(),
            black_bound: seats.black.is_some(),
            turn: seats.turn,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Fen, Move};

    fn channel() -> (Outbound, mpsc::UnboundedReceiver<Message>) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    /// 两人就座后的会话
    async fn seated() -> (
        Session,
        mpsc::UnboundedReceiver<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let session = Session::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        session.admit(1, tx1).await.unwrap();
        session.admit(2, tx2).await.unwrap();
        drain(&mut rx1);
        drain(&mut rx2);
        (session, rx1, rx2)
    }

    #[tokio::test]
    async fn test_admit_order() {
        let session = Session::new();
        assert_eq!(session.snapshot().await.phase, SessionPhase::WaitingForFirst);

        let (tx1, mut rx1) = channel();
        assert_eq!(session.admit(1, tx1).await, Ok(Side::White));
        assert_eq!(drain(&mut rx1), vec![Message::Color(Side::White)]);
        assert_eq!(session.snapshot().await.phase, SessionPhase::WaitingForSecond);

        let (tx2, mut rx2) = channel();
        assert_eq!(session.admit(2, tx2).await, Ok(Side::Black));
        assert_eq!(
            drain(&mut rx1),
            vec![Message::Start, Message::YourTurn]
        );
        assert_eq!(
            drain(&mut rx2),
            vec![Message::Color(Side::Black), Message::Start]
        );

        let (tx3, mut rx3) = channel();
        assert_eq!(session.admit(3, tx3).await, Err(AdmitError::GameFull));
        assert_eq!(rx3.recv().await, Some(Message::GameFull));
        // 发送端已丢弃
        assert_eq!(rx3.recv().await, None);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.turn, Some(Side::White));
        assert!(drain(&mut rx1).is_empty());
        assert!(drain(&mut rx2).is_empty());
    }

    #[tokio::test]
    async fn test_move_relay_flips_turn() {
        let (session, mut rx1, mut rx2) = seated().await;
        let e2e4 = Move::parse("E2E4").unwrap();
        let e7e5 = Move::parse("E7E5").unwrap();

        session.on_message(Side::White, 1, Message::Move(e2e4)).await;
        assert_eq!(drain(&mut rx2), vec![Message::Move(e2e4), Message::YourTurn]);
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(session.snapshot().await.turn, Some(Side::Black));

        // 白方连走两步被忽略
        session.on_message(Side::White, 1, Message::Move(e2e4)).await;
        assert!(drain(&mut rx2).is_empty());

        session.on_message(Side::Black, 2, Message::Move(e7e5)).await;
        assert_eq!(drain(&mut rx1), vec![Message::Move(e7e5), Message::YourTurn]);
        assert_eq!(session.snapshot().await.turn, Some(Side::White));
    }

    #[tokio::test]
    async fn test_move_without_opponent_dropped() {
        let session = Session::new();
        let (tx1, mut rx1) = channel();
        session.admit(1, tx1).await.unwrap();
        drain(&mut rx1);

        let mv = Move::parse("E2E4").unwrap();
        session.on_message(Side::White, 1, Message::Move(mv)).await;
        assert_eq!(session.snapshot().await.turn, None);
        assert!(drain(&mut rx1).is_empty());
    }

    #[tokio::test]
    async fn test_chat_relay() {
        let (session, mut rx1, mut rx2) = seated().await;

        session
            .on_message(Side::Black, 2, Message::Chat("good luck: have fun".into()))
            .await;
        assert_eq!(
            drain(&mut rx1),
            vec![Message::Chat("good luck: have fun".into())]
        );
        assert!(drain(&mut rx2).is_empty());
    }

    #[tokio::test]
    async fn test_reset() {
        let (session, mut rx1, mut rx2) = seated().await;
        let mv = Move::parse("E2E4").unwrap();
        session.on_message(Side::White, 1, Message::Move(mv)).await;
        drain(&mut rx2);

        session.on_message(Side::Black, 2, Message::Reset).await;
        assert_eq!(drain(&mut rx1), vec![Message::Reset, Message::YourTurn]);
        assert_eq!(drain(&mut rx2), vec![Message::Reset]);
        assert_eq!(session.snapshot().await.turn, Some(Side::White));
    }

    #[tokio::test]
    async fn test_load_fen_sets_turn() {
        let (session, mut rx1, mut rx2) = seated().await;
        let fen = Fen::parse("4k3/8/8/8/8/8/4P3/4K3 b - - 0 1").unwrap();

        session
            .on_message(Side::White, 1, Message::LoadFen(fen.clone()))
            .await;
        assert_eq!(drain(&mut rx2), vec![Message::LoadFen(fen)]);
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(session.snapshot().await.turn, Some(Side::Black));
    }

    #[tokio::test]
    async fn test_server_only_messages_ignored() {
        let (session, mut rx1, mut rx2) = seated().await;

        for msg in [
            Message::Start,
            Message::YourTurn,
            Message::GameFull,
            Message::Color(Side::Black),
        ] {
            session.on_message(Side::White, 1, msg).await;
        }
        assert!(drain(&mut rx1).is_empty());
        assert!(drain(&mut rx2).is_empty());
        assert_eq!(session.snapshot().await.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn test_disconnect_frees_one_seat() {
        let (session, mut rx1, mut rx2) = seated().await;

        assert!(session.on_disconnect(Side::White, 1).await);
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::WaitingForSecond);
        assert!(!snapshot.white_bound);
        assert!(snapshot.black_bound);
        assert_eq!(snapshot.turn, None);

        // 白方发送端已丢弃，黑方不受影响
        assert_eq!(rx1.recv().await, None);
        assert!(drain(&mut rx2).is_empty());

        // 下一个连接坐到空出的白方
        let (tx3, mut rx3) = channel();
        assert_eq!(session.admit(3, tx3).await, Ok(Side::White));
        assert_eq!(
            drain(&mut rx3),
            vec![Message::Color(Side::White), Message::Start, Message::YourTurn]
        );
        assert_eq!(drain(&mut rx2), vec![Message::Start]);
    }

    #[tokio::test]
    async fn test_stale_connection_cannot_free_seat() {
        let (session, _rx1, _rx2) = seated().await;
        session.on_disconnect(Side::White, 1).await;

        let (tx3, _rx3) = channel();
        session.admit(3, tx3).await.unwrap();

        // 旧连接的迟到消息与断线都不影响新绑定
        assert!(!session.on_disconnect(Side::White, 1).await);
        session.on_message(Side::White, 1, Message::Reset).await;
        assert!(session.snapshot().await.white_bound);
    }
}
