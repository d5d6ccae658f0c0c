//! 对局控制器
//!
//! 唯一持有走子状态机的地方。网络读任务与引擎工作任务的结果都以
//! [`ClientEvent`] 送入控制器的通道，用户命令由 [`GameController::handle_command`]
//! 处理，二者都返回需要展示的 [`Notice`]。

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use chess_engine::EngineError;
use protocol::{Fen, Message, Move, Side};

use crate::command::UserCommand;
use crate::error::{ClientError, TurnError};
use crate::event::{ClientEvent, HintResult};
use crate::game::ai::{EngineJob, EngineWorker};
use crate::game::notice::Notice;
use crate::game::state::{TurnMachine, TurnState};
use crate::network::Endpoint;
use crate::settings::{ClientSettings, ThinkTime};
use crate::storage::{self, SnapshotStore};

/// 对局模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// 未开始任何对局
    Idle,
    /// 联机对局
    Online,
    /// 与本地引擎对弈
    VersusEngine { engine_side: Side },
    /// 本地双人，同一终端轮流走子
    Local,
}

/// 聊天记录中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub mine: bool,
    pub text: String,
}

/// 对局控制器
pub struct GameController {
    settings: ClientSettings,
    machine: TurnMachine,
    mode: GameMode,
    endpoint: Option<Endpoint>,
    engine: Option<EngineWorker>,
    hints_enabled: bool,
    chat_log: Vec<ChatLine>,
    store: Option<SnapshotStore>,
    /// 修改设置后写回的文件
    settings_file: Option<PathBuf>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl GameController {
    pub fn new(settings: ClientSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            settings,
            machine: TurnMachine::new(),
            mode: GameMode::Idle,
            endpoint: None,
            engine: None,
            hints_enabled: false,
            chat_log: Vec::new(),
            store: None,
            settings_file: ClientSettings::settings_path(),
            events_tx,
            events_rx,
        }
    }

    /// 使用指定的存档目录
    pub fn with_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    /// 设置写回指定文件
    pub fn with_settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_file = Some(path.into());
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn machine(&self) -> &TurnMachine {
        &self.machine
    }

    pub fn position(&self) -> &Fen {
        self.machine.position()
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn side(&self) -> Option<Side> {
        self.machine.side()
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn hints_enabled(&self) -> bool {
        self.hints_enabled
    }

    pub fn chat_log(&self) -> &[ChatLine] {
        &self.chat_log
    }

    /// 事件通道的发送端
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ClientEvent> {
        self.events_tx.clone()
    }

    /// 连接服务器并完成握手
    pub async fn connect(&mut self, addr: &str) -> Result<Side, ClientError> {
        if self.endpoint.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let endpoint =
            Endpoint::connect(addr, self.settings.connect_timeout(), self.events_tx.clone())
                .await?;

        let side = endpoint.side();
        self.machine.assign_side(side);
        self.machine.start();
        self.endpoint = Some(endpoint);
        self.mode = GameMode::Online;
        Ok(side)
    }

    /// 启动引擎，成功后开启提示功能
    pub async fn attach_engine(&mut self) -> Result<(), EngineError> {
        let worker = EngineWorker::spawn(
            self.settings.engine_config(),
            self.settings.ai_timeout(),
            self.events_tx.clone(),
        )
        .await?;
        self.set_engine(worker);
        Ok(())
    }

    /// 使用已启动的引擎工作任务
    pub fn set_engine(&mut self, worker: EngineWorker) {
        self.engine = Some(worker);
        self.hints_enabled = true;
        tracing::info!("引擎已就绪");
    }

    /// 开始与引擎对弈，`side` 为玩家一方
    pub fn start_versus_engine(&mut self, side: Side) -> Result<Vec<Notice>, ClientError> {
        if self.endpoint.is_some() {
            return Err(ClientError::AlreadyConnected);
        }
        if !self.engine_alive() {
            return Err(ClientError::EngineUnavailable);
        }

        self.mode = GameMode::VersusEngine {
            engine_side: side.opponent(),
        };
        self.machine.assign_side(side);
        tracing::info!("开始人机对弈，玩家执 {}", side);

        let mut notices = vec![Notice::SideAssigned(side)];
        notices.extend(self.restart_versus_engine());
        Ok(notices)
    }

    /// 开始本地双人对局
    pub fn start_local(&mut self) -> Result<Vec<Notice>, ClientError> {
        if self.endpoint.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        self.mode = GameMode::Local;
        self.machine.start_hot_seat();
        tracing::info!("开始本地双人对局");
        Ok(vec![Notice::GameStarted, self.to_move_notice()])
    }

    /// 等待下一个事件
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events_rx.recv().await
    }

    /// 取出已到达的事件，不等待
    pub fn try_next_event(&mut self) -> Option<ClientEvent> {
        self.events_rx.try_recv().ok()
    }

    /// 处理网络或引擎事件
    pub fn handle_event(&mut self, event: ClientEvent) -> Vec<Notice> {
        match event {
            ClientEvent::Server(msg) => self.handle_server_message(msg),
            ClientEvent::Disconnected => {
                if self.endpoint.take().is_none() {
                    return Vec::new();
                }
                tracing::info!("与服务器断开连接");
                self.mode = GameMode::Idle;
                vec![Notice::Disconnected]
            }
            ClientEvent::Hint(hint) => self.handle_hint(hint),
            ClientEvent::EngineMove { fen, mv } => self.handle_engine_move(fen, mv),
            ClientEvent::EngineFailed { reason, fatal } => {
                if fatal {
                    self.engine = None;
                    self.hints_enabled = false;
                }
                vec![Notice::EngineFailed { reason, fatal }]
            }
        }
    }

    fn handle_server_message(&mut self, msg: Message) -> Vec<Notice> {
        match msg {
            Message::Color(side) => {
                self.machine.assign_side(side);
                vec![Notice::SideAssigned(side)]
            }
            Message::Start => {
                self.machine.start();
                vec![Notice::GameStarted]
            }
            Message::YourTurn => {
                self.machine.grant_turn();
                if self.machine.is_local_turn() {
                    vec![Notice::YourTurn]
                } else {
                    Vec::new()
                }
            }
            Message::Move(mv) => match self.machine.apply_remote(mv) {
                Ok(state) => with_game_over(vec![Notice::OpponentMoved(mv)], state),
                Err(e) => {
                    tracing::warn!("拒绝对方走法 {}: {}", mv, e);
                    vec![Notice::IllegalRemoteMove(mv)]
                }
            },
            Message::Chat(text) => {
                self.chat_log.push(ChatLine {
                    mine: false,
                    text: text.clone(),
                });
                vec![Notice::Chat { mine: false, text }]
            }
            Message::Reset => {
                self.machine.reset();
                vec![Notice::Reset]
            }
            Message::LoadFen(fen) => {
                self.machine.load_position(fen.clone());
                with_game_over(vec![Notice::PositionLoaded(fen)], self.machine.state())
            }
            Message::GameFull => {
                tracing::warn!("对局中收到 GAME_FULL，忽略");
                Vec::new()
            }
        }
    }

    fn handle_hint(&mut self, hint: HintResult) -> Vec<Notice> {
        if &hint.fen != self.machine.position() {
            tracing::debug!("提示计算期间局面已改变，丢弃提示");
            return Vec::new();
        }
        vec![Notice::Hint(hint)]
    }

    fn handle_engine_move(&mut self, fen: Fen, mv: Option<Move>) -> Vec<Notice> {
        if !matches!(self.mode, GameMode::VersusEngine { .. }) || &fen != self.machine.position()
        {
            tracing::warn!("AI 计算期间游戏状态已改变，丢弃 AI 走法");
            return Vec::new();
        }

        let Some(mv) = mv else {
            tracing::warn!("AI 无法找到合法走法");
            return vec![Notice::EngineNoMove];
        };

        match self.machine.apply_remote(mv) {
            Ok(state) => {
                tracing::info!("AI 走棋: {}", mv);
                with_game_over(vec![Notice::EngineMoved(mv)], state)
            }
            Err(e) => {
                tracing::error!("AI 走法不合法: {}: {}", mv, e);
                vec![Notice::IllegalRemoteMove(mv)]
            }
        }
    }

    /// 处理用户命令
    pub async fn handle_command(&mut self, command: UserCommand) -> Vec<Notice> {
        match command {
            UserCommand::Move(mv) => self.play_move(mv).await,
            UserCommand::Chat(text) => self.send_chat(text).await,
            UserCommand::Reset => self.request_reset().await,
            UserCommand::Save(path) => vec![self.save(path.as_deref())],
            UserCommand::Load(path) => self.load(&path).await,
            UserCommand::Hint => vec![self.request_hint()],
            UserCommand::Saves => vec![self.list_saves()],
            UserCommand::Moves => vec![Notice::LegalMoves(self.machine.legal_moves())],
            UserCommand::Think(think_time) => self.set_think_time(think_time),
            UserCommand::Help => vec![Notice::Info(UserCommand::help().to_string())],
            UserCommand::Quit => Vec::new(),
        }
    }

    async fn play_move(&mut self, mv: Move) -> Vec<Notice> {
        let state = match self.machine.apply_local(mv) {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!("本地拒绝走法 {}: {}", mv, e);
                return vec![Notice::Rejected(e)];
            }
        };

        let mut notices = with_game_over(vec![Notice::Moved(mv)], state);
        match self.mode {
            GameMode::Online => {
                if let Err(e) = self.send(&Message::Move(mv)).await {
                    notices.push(Notice::Error(e.to_string()));
                }
            }
            GameMode::VersusEngine { .. } => notices.extend(self.request_engine_move()),
            GameMode::Local => {
                if self.machine.game_over().is_none() {
                    notices.push(self.to_move_notice());
                }
            }
            GameMode::Idle => {}
        }
        notices
    }

    async fn send_chat(&mut self, text: String) -> Vec<Notice> {
        if let Err(e) = self.send(&Message::Chat(text.clone())).await {
            return vec![Notice::Error(e.to_string())];
        }
        self.chat_log.push(ChatLine {
            mine: true,
            text: text.clone(),
        });
        vec![Notice::Chat { mine: true, text }]
    }

    async fn request_reset(&mut self) -> Vec<Notice> {
        match self.mode {
            // 联机时等待服务端广播 RESET
            GameMode::Online => match self.send(&Message::Reset).await {
                Ok(()) => vec![Notice::ResetRequested],
                Err(e) => vec![Notice::Error(e.to_string())],
            },
            GameMode::VersusEngine { .. } => {
                let mut notices = vec![Notice::Reset];
                notices.extend(self.restart_versus_engine());
                notices
            }
            GameMode::Local => {
                self.machine.reset();
                vec![Notice::Reset, self.to_move_notice()]
            }
            GameMode::Idle => {
                self.machine.reset();
                vec![Notice::Reset]
            }
        }
    }

    fn save(&mut self, path: Option<&Path>) -> Notice {
        let fen = self.machine.position().clone();

        let result = match path {
            Some(path) => storage::save_position(path, &fen).map(|()| path.to_path_buf()),
            None => {
                let label = self.save_label();
                self.store().and_then(|store| store.save(&fen, label))
            }
        };

        match result {
            Ok(path) => Notice::Saved(path),
            Err(e) => {
                tracing::warn!("保存局面失败: {:#}", e);
                Notice::Error(format!("{:#}", e))
            }
        }
    }

    async fn load(&mut self, path: &Path) -> Vec<Notice> {
        let fen = match storage::load_position(path) {
            Ok(fen) => fen,
            Err(e) => {
                tracing::warn!("载入局面失败: {:#}", e);
                return vec![Notice::Error(format!("{:#}", e))];
            }
        };

        self.machine.load_position(fen.clone());
        tracing::info!("已载入局面: {}", fen);
        let mut notices = with_game_over(
            vec![Notice::PositionLoaded(fen.clone())],
            self.machine.state(),
        );

        match self.mode {
            GameMode::Online => {
                if let Err(e) = self.send(&Message::LoadFen(fen)).await {
                    notices.push(Notice::Error(e.to_string()));
                }
            }
            GameMode::VersusEngine { .. } => notices.extend(self.request_engine_move()),
            GameMode::Local => {
                if self.machine.game_over().is_none() {
                    notices.push(self.to_move_notice());
                }
            }
            GameMode::Idle => {}
        }
        notices
    }

    fn list_saves(&mut self) -> Notice {
        match self.store().and_then(|store| store.list()) {
            Ok(saves) => Notice::SaveList(saves),
            Err(e) => Notice::Error(format!("{:#}", e)),
        }
    }

    /// 修改思考时间并写回设置文件；不给值时切换到下一档
    fn set_think_time(&mut self, think_time: Option<ThinkTime>) -> Vec<Notice> {
        let think_time = think_time.unwrap_or_else(|| self.settings.think_time.next());
        self.settings.think_time = think_time;
        tracing::info!("AI 思考时间: {}", think_time.display_name());

        let mut notices = vec![Notice::ThinkTime(think_time)];
        if let Some(path) = &self.settings_file {
            if let Err(e) = self.settings.save_to(path) {
                tracing::warn!("保存设置失败: {:#}", e);
                notices.push(Notice::Error(format!("{:#}", e)));
            }
        }
        notices
    }

    fn to_move_notice(&self) -> Notice {
        Notice::ToMove(self.machine.position().side_to_move())
    }

    fn request_hint(&mut self) -> Notice {
        if !self.hints_enabled {
            return Notice::Error(ClientError::EngineUnavailable.to_string());
        }
        if self.machine.game_over().is_some() {
            return Notice::Rejected(TurnError::GameEnded);
        }

        let think_ms = self.settings.think_time.to_millis();
        let job = EngineJob::Hint {
            fen: self.machine.position().clone(),
            think_ms,
            depth: self.settings.hint_depth(),
        };
        if self.submit(job) {
            Notice::HintRequested
        } else {
            Notice::Error(ClientError::EngineUnavailable.to_string())
        }
    }

    /// 人机对弈回到初始局面，白方先走
    fn restart_versus_engine(&mut self) -> Vec<Notice> {
        self.machine.start();
        let mut notices = vec![Notice::GameStarted];
        if self.machine.side() == Some(Side::White) {
            self.machine.grant_turn();
            notices.push(Notice::YourTurn);
        } else {
            notices.extend(self.request_engine_move());
        }
        notices
    }

    /// 轮到引擎时提交走子查询
    fn request_engine_move(&mut self) -> Option<Notice> {
        let GameMode::VersusEngine { engine_side } = self.mode else {
            return None;
        };
        if self.machine.game_over().is_some()
            || self.machine.position().side_to_move() != engine_side
        {
            return None;
        }

        let job = EngineJob::Move {
            fen: self.machine.position().clone(),
            think_ms: self.settings.think_time.to_millis(),
        };
        if self.submit(job) {
            Some(Notice::EngineThinking)
        } else {
            Some(Notice::Error(ClientError::EngineUnavailable.to_string()))
        }
    }

    fn submit(&mut self, job: EngineJob) -> bool {
        match &self.engine {
            Some(worker) if worker.submit(job) => true,
            _ => {
                self.engine = None;
                self.hints_enabled = false;
                false
            }
        }
    }

    fn engine_alive(&self) -> bool {
        self.engine.as_ref().is_some_and(EngineWorker::is_alive)
    }

    async fn send(&mut self, msg: &Message) -> Result<(), ClientError> {
        let endpoint = self.endpoint.as_mut().ok_or(ClientError::NotConnected)?;
        endpoint.send(msg).await
    }

    fn store(&mut self) -> anyhow::Result<&SnapshotStore> {
        if self.store.is_none() {
            self.store = Some(SnapshotStore::new()?);
        }
        self.store
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("存档目录不可用"))
    }

    fn save_label(&self) -> &'static str {
        match self.mode {
            GameMode::VersusEngine { .. } => "engine",
            GameMode::Local => "local",
            _ => self.machine.side().map(|side| side.as_str()).unwrap_or("position"),
        }
    }

    /// 事件循环：同时处理用户命令与网络、引擎事件，直到退出
    pub async fn run<F>(mut self, mut commands: mpsc::UnboundedReceiver<UserCommand>, mut show: F)
    where
        F: FnMut(&Notice),
    {
        loop {
            let notices = tokio::select! {
                command = commands.recv() => match command {
                    None | Some(UserCommand::Quit) => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            };

            for notice in &notices {
                show(notice);
            }
        }

        self.shutdown().await;
    }

    /// 关闭连接与引擎
    pub async fn shutdown(mut self) {
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.close().await;
        }
        if let Some(worker) = self.engine.take() {
            worker.shutdown().await;
        }
        tracing::info!("客户端已退出");
    }
}

/// 走子后进入终局时追加终局通知
fn with_game_over(mut notices: Vec<Notice>, state: TurnState) -> Vec<Notice> {
    if let TurnState::GameOver(reason) = state {
        tracing::info!("对局结束: {}", reason.display_name());
        notices.push(Notice::GameOver(reason));
    }
    notices
}
