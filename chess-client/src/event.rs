//! 控制器事件
//!
//! 网络读任务与引擎工作任务都把结果作为 [`ClientEvent`] 送入
//! 同一个通道，由唯一持有对局状态的控制器消费。

use protocol::{Fen, Message, Move};

/// 送往控制器的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// 收到服务端消息
    Server(Message),
    /// 连接已断开
    Disconnected,
    /// 提示结果
    Hint(HintResult),
    /// 引擎为 `fen` 选出的走法（对弈模式）
    EngineMove { fen: Fen, mv: Option<Move> },
    /// 引擎查询失败
    EngineFailed { reason: String, fatal: bool },
}

/// 提示结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintResult {
    /// 查询时的局面
    pub fen: Fen,
    pub best_move: Option<Move>,
    /// 走子方视角的厘兵分
    pub score_cp: i32,
}

impl HintResult {
    /// 以兵为单位格式化评估分：`+0.35`、`-1.20`、`0.00`
    pub fn formatted_score(&self) -> String {
        format_score(self.score_cp)
    }
}

/// 以兵为单位格式化厘兵分
pub fn format_score(cp: i32) -> String {
    let pawns = cp as f64 / 100.0;
    if cp > 0 {
        format!("+{:.2}", pawns)
    } else if cp < 0 {
        format!("{:.2}", pawns)
    } else {
        "0.00".to_string()
    }
}
