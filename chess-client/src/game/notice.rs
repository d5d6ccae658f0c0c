//! 控制器反馈给界面的通知

use std::fmt;
use std::path::PathBuf;

use protocol::{Fen, Move, Side};

use crate::error::TurnError;
use crate::event::HintResult;
use crate::game::state::GameOverReason;
use crate::settings::ThinkTime;
use crate::storage::SavedPosition;

/// 一次事件或命令处理后需要展示的信息
#[derive(Debug, Clone)]
pub enum Notice {
    /// 服务端分配了阵营
    SideAssigned(Side),
    GameStarted,
    YourTurn,
    /// 本地双人模式下轮到的一方
    ToMove(Side),
    /// 本方走子已生效
    Moved(Move),
    OpponentMoved(Move),
    /// 对方发来的非法走法，局面未变
    IllegalRemoteMove(Move),
    /// 本地拒绝的操作
    Rejected(TurnError),
    GameOver(GameOverReason),
    /// 聊天消息
    Chat { mine: bool, text: String },
    /// 棋局已重置
    Reset,
    /// 已请求重新开局，等待服务端
    ResetRequested,
    PositionLoaded(Fen),
    Saved(PathBuf),
    SaveList(Vec<SavedPosition>),
    /// 当前局面的合法走法
    LegalMoves(Vec<Move>),
    ThinkTime(ThinkTime),
    HintRequested,
    Hint(HintResult),
    EngineThinking,
    EngineMoved(Move),
    /// 引擎没有找到走法
    EngineNoMove,
    EngineFailed { reason: String, fatal: bool },
    Disconnected,
    Info(String),
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SideAssigned(side) => write!(f, "你执{}", side_name(*side)),
            Notice::GameStarted => write!(f, "对局开始"),
            Notice::YourTurn => write!(f, "轮到你走"),
            Notice::ToMove(side) => write!(f, "轮到{}方走", side_name(*side)),
            Notice::Moved(mv) => write!(f, "你走了 {}", mv),
            Notice::OpponentMoved(mv) => write!(f, "对方走了 {}", mv),
            Notice::IllegalRemoteMove(mv) => write!(f, "对方走法 {} 不合法，已忽略", mv),
            Notice::Rejected(e) => write!(f, "操作被拒绝: {}", e),
            Notice::GameOver(reason) => write!(f, "对局结束: {}", reason.display_name()),
            Notice::Chat { mine: true, text } => write!(f, "[我] {}", text),
            Notice::Chat { mine: false, text } => write!(f, "[对方] {}", text),
            Notice::Reset => write!(f, "棋局已重置"),
            Notice::ResetRequested => write!(f, "已请求重新开局"),
            Notice::PositionLoaded(fen) => write!(f, "已载入局面: {}", fen),
            Notice::Saved(path) => write!(f, "局面已保存到 {}", path.display()),
            Notice::SaveList(saves) if saves.is_empty() => write!(f, "没有存档"),
            Notice::SaveList(saves) => {
                write!(f, "存档列表:")?;
                for save in saves {
                    write!(
                        f,
                        "\n  {}  {}  {}",
                        save.formatted_time(),
                        save.name,
                        save.path.display()
                    )?;
                }
                Ok(())
            }
            Notice::LegalMoves(moves) if moves.is_empty() => write!(f, "没有合法走法"),
            Notice::LegalMoves(moves) => {
                write!(f, "合法走法（{}）:", moves.len())?;
                for mv in moves {
                    write!(f, " {}", mv)?;
                }
                Ok(())
            }
            Notice::ThinkTime(think_time) => {
                write!(f, "AI 思考时间: {}", think_time.display_name())
            }
            Notice::HintRequested => write!(f, "正在计算提示..."),
            Notice::Hint(hint) => match hint.best_move {
                Some(mv) => write!(f, "提示: {}  评估: {}", mv, hint.formatted_score()),
                None => write!(f, "提示: 无可走之棋  评估: {}", hint.formatted_score()),
            },
            Notice::EngineThinking => write!(f, "AI 思考中..."),
            Notice::EngineMoved(mv) => write!(f, "AI 走了 {}", mv),
            Notice::EngineNoMove => write!(f, "AI 无法找到走法"),
            Notice::EngineFailed { reason, fatal: true } => {
                write!(f, "引擎不可用，已关闭提示功能: {}", reason)
            }
            Notice::EngineFailed { reason, fatal: false } => {
                write!(f, "引擎查询失败: {}", reason)
            }
            Notice::Disconnected => write!(f, "与服务器的连接已断开"),
            Notice::Info(text) => write!(f, "{}", text),
            Notice::Error(text) => write!(f, "错误: {}", text),
        }
    }
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::White => "白",
        Side::Black => "黑",
    }
}
