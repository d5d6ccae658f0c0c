//! 对局逻辑
//!
//! 走子状态机、引擎工作任务与持有二者的控制器

mod ai;
mod controller;
mod notice;
mod state;

pub use ai::{EngineJob, EngineWorker};
pub use controller::{ChatLine, GameController, GameMode};
pub use notice::Notice;
pub use state::{GameOverReason, TurnMachine, TurnState};
