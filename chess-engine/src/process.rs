//! 引擎子进程管理
//!
//! 通过标准输入输出与 UCI 引擎通信。输出由后台任务逐行读取后送入通道，
//! 查询时在通道与取消信号之间 select，因此取消不会丢失引擎输出。

use std::process::{ExitStatus, Stdio};

use protocol::{Fen, Move};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::uci::{parse_line, EngineLine, ScoreTracker};

/// 引擎查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineRequest {
    /// 在给定思考时间内搜索最佳走法
    BestMove { fen: Fen, movetime_ms: u64 },
    /// 搜索到给定深度并返回评估分
    Evaluate { fen: Fen, depth: u32 },
}

/// 引擎应答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineResponse {
    /// 无合法走法时为 `None`
    BestMove(Option<Move>),
    /// 走子方视角的厘兵分
    Evaluation(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Ready,
    /// 已发出 go 但尚未读到 bestmove
    Searching,
    /// 中止搜索后未能等到 bestmove
    Desynced,
    Closed,
}

/// 运行中的引擎进程
pub struct EngineProcess {
    config: EngineConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    lines: mpsc::UnboundedReceiver<String>,
    reader: JoinHandle<()>,
    state: EngineState,
}

impl EngineProcess {
    /// 启动引擎并完成握手
    ///
    /// 握手为 `uci`/`uciok` 与 `isready`/`readyok` 两步，随后按配置设置
    /// `Hash` 与 `Threads`。任一步失败都会结束进程。
    pub async fn spawn(config: EngineConfig) -> Result<Self> {
        let path = config.path.display().to_string();
        let unavailable = |source: std::io::Error| EngineError::Unavailable {
            path: path.clone(),
            source,
        };

        let mut child = Command::new(&config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(unavailable)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| unavailable(std::io::Error::other("stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| unavailable(std::io::Error::other("stdout not captured")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_lines(stdout, tx));

        let mut engine = Self {
            config,
            child,
            stdin: Some(stdin),
            lines: rx,
            reader,
            state: EngineState::Ready,
        };

        // 失败时 engine 被丢弃，kill_on_drop 负责回收进程
        engine.initialize().await?;
        info!("引擎已就绪: {}", path);
        Ok(engine)
    }

    async fn initialize(&mut self) -> Result<()> {
        self.send_command("uci").await?;
        self.wait_for(EngineLine::UciOk, "uciok").await?;

        self.send_command("isready").await?;
        self.wait_for(EngineLine::ReadyOk, "readyok").await?;

        let hash = format!("setoption name Hash value {}", self.config.hash_mb);
        let threads = format!("setoption name Threads value {}", self.config.threads);
        self.send_command(&hash).await?;
        self.send_command(&threads).await?;
        Ok(())
    }

    /// 最佳走法查询
    pub async fn best_move(&mut self, fen: &Fen, movetime_ms: u64) -> Result<Option<Move>> {
        self.search_best_move(fen, movetime_ms, &CancelToken::never())
            .await
    }

    /// 局面评估查询
    pub async fn evaluate(&mut self, fen: &Fen, depth: u32) -> Result<i32> {
        self.search_score(fen, depth, &CancelToken::never()).await
    }

    /// 可取消的最佳走法查询
    pub async fn search_best_move(
        &mut self,
        fen: &Fen,
        movetime_ms: u64,
        cancel: &CancelToken,
    ) -> Result<Option<Move>> {
        let go = format!("go movetime {}", movetime_ms);
        let (mv, _) = self.search(fen, &go, cancel).await?;
        Ok(mv)
    }

    /// 可取消的评估查询，取最深一层的分数
    pub async fn search_score(&mut self, fen: &Fen, depth: u32, cancel: &CancelToken) -> Result<i32> {
        let go = format!("go depth {}", depth);
        let (_, scores) = self.search(fen, &go, cancel).await?;
        Ok(scores.score())
    }

    /// 执行一次查询，可被 `cancel` 中止
    ///
    /// 取消时向引擎发送 `stop` 并读完剩余输出直到 `bestmove`，
    /// 然后返回 [`EngineError::Cancelled`]，引擎可继续接受下一次查询。
    pub async fn run(
        &mut self,
        request: EngineRequest,
        cancel: &CancelToken,
    ) -> Result<EngineResponse> {
        match request {
            EngineRequest::BestMove { fen, movetime_ms } => self
                .search_best_move(&fen, movetime_ms, cancel)
                .await
                .map(EngineResponse::BestMove),
            EngineRequest::Evaluate { fen, depth } => self
                .search_score(&fen, depth, cancel)
                .await
                .map(EngineResponse::Evaluation),
        }
    }

    /// 发出 `position` 与 `go`，读到 `bestmove` 为止
    async fn search(
        &mut self,
        fen: &Fen,
        go: &str,
        cancel: &CancelToken,
    ) -> Result<(Option<Move>, ScoreTracker)> {
        match self.state {
            EngineState::Ready => {}
            // 上一次查询的 future 在读到 bestmove 前被丢弃
            EngineState::Searching => self.abort_search().await?,
            EngineState::Desynced => return Err(EngineError::Desynced),
            EngineState::Closed => return Err(EngineError::Exited),
        }

        let mut cancel = cancel.clone();
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        self.send_command(&format!("position fen {}", fen)).await?;
        self.send_command(go).await?;
        self.state = EngineState::Searching;

        let mut scores = ScoreTracker::default();
        loop {
            let line = tokio::select! {
                line = self.lines.recv() => line,
                _ = cancel.cancelled() => {
                    debug!("引擎查询被取消，停止搜索");
                    self.abort_search().await?;
                    return Err(EngineError::Cancelled);
                }
            };

            let Some(line) = line else {
                self.state = EngineState::Closed;
                return Err(EngineError::Exited);
            };

            match parse_line(&line) {
                EngineLine::Info(info) => scores.observe(&info),
                EngineLine::BestMove(mv) => {
                    self.state = EngineState::Ready;
                    return Ok((mv, scores));
                }
                _ => {}
            }
        }
    }

    /// 发送 stop 并丢弃输出直到 bestmove
    async fn abort_search(&mut self) -> Result<()> {
        if let Err(e) = self.send_command("stop").await {
            self.state = EngineState::Closed;
            return Err(e);
        }

        let drained = timeout(self.config.drain_timeout(), async {
            while let Some(line) = self.lines.recv().await {
                if matches!(parse_line(&line), EngineLine::BestMove(_)) {
                    return true;
                }
            }
            false
        })
        .await;

        match drained {
            Ok(true) => {
                self.state = EngineState::Ready;
                Ok(())
            }
            Ok(false) => {
                self.state = EngineState::Closed;
                Err(EngineError::Exited)
            }
            Err(_) => {
                warn!("引擎未能及时响应 stop");
                self.state = EngineState::Desynced;
                Err(EngineError::Desynced)
            }
        }
    }

    /// 进程是否仍在运行
    ///
    /// 只看子进程本身；输出已关闭但进程尚未退出时仍为 true。
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// 发送 quit 并等待退出，超时则强制结束
    ///
    /// 无论结果如何都会释放进程的输入输出。
    pub async fn shutdown(mut self) -> Result<()> {
        let result = self.quit_and_wait().await;
        self.release();
        result.map(|status| debug!("引擎进程已退出: {}", status))
    }

    async fn quit_and_wait(&mut self) -> Result<ExitStatus> {
        if let Err(e) = self.send_command("quit").await {
            debug!("发送 quit 失败: {}", e);
        }
        self.stdin.take();

        match timeout(self.config.shutdown_timeout(), self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!("引擎未在时限内退出，强制结束");
                self.child.kill().await?;
                Ok(self.child.wait().await?)
            }
        }
    }

    fn release(&mut self) {
        self.stdin.take();
        self.reader.abort();
        self.lines.close();
        self.state = EngineState::Closed;
    }

    async fn send_command(&mut self, command: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(EngineError::Exited)?;
        debug!("-> engine: {}", command);

        let mut data = String::with_capacity(command.len() + 1);
        data.push_str(command);
        data.push('\n');
        stdin.write_all(data.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn wait_for(&mut self, expected: EngineLine, token: &str) -> Result<()> {
        while let Some(line) = self.lines.recv().await {
            if parse_line(&line) == expected {
                return Ok(());
            }
        }
        self.state = EngineState::Closed;
        Err(EngineError::Protocol {
            expected: token.to_string(),
        })
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_lines(stdout: ChildStdout, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!("<- engine: {}", line);
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("读取引擎输出失败: {}", e);
                break;
            }
        }
    }
}
