//! 国际象棋联机客户端
//!
//! 无界面的客户端核心：连接端点、走子状态机、引擎工作任务和
//! 持有对局状态的控制器。终端界面见 `main.rs`。

pub mod command;
pub mod error;
pub mod event;
pub mod game;
pub mod network;
pub mod settings;
pub mod storage;

pub use command::UserCommand;
pub use error::{ClientError, CommandError, TurnError};
pub use event::{format_score, ClientEvent, HintResult};
pub use game::{
    ChatLine, EngineJob, EngineWorker, GameController, GameMode, GameOverReason, Notice,
    TurnMachine, TurnState,
};
pub use network::Endpoint;
pub use settings::{ClientSettings, ThinkTime};
pub use storage::{load_position, save_position, SavedPosition, SnapshotStore};
