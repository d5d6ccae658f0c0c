//! 引擎工作任务
//!
//! 引擎进程由一个专用任务独占，查询结果以 [`ClientEvent`] 送回控制器，
//! 控制器自身从不等待引擎。

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chess_engine::{CancelHandle, CancelToken, EngineConfig, EngineError, EngineProcess};
use protocol::Fen;

use crate::event::{ClientEvent, HintResult};

/// 交给引擎工作任务的查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineJob {
    /// 提示：最佳走法加指定深度的评估
    Hint { fen: Fen, think_ms: u64, depth: u32 },
    /// 对弈模式下引擎走子
    Move { fen: Fen, think_ms: u64 },
}

/// 引擎工作任务句柄
pub struct EngineWorker {
    jobs: mpsc::UnboundedSender<EngineJob>,
    task: JoinHandle<()>,
}

impl EngineWorker {
    /// 启动引擎进程并开始工作
    pub async fn spawn(
        config: EngineConfig,
        ai_timeout: Duration,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<Self, EngineError> {
        let engine = EngineProcess::spawn(config).await?;
        Ok(Self::start(engine, ai_timeout, events))
    }

    /// 接管已启动的引擎
    pub fn start(
        engine: EngineProcess,
        ai_timeout: Duration,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(worker_loop(engine, rx, ai_timeout, events));
        Self { jobs, task }
    }

    /// 提交查询；工作任务已退出时返回 false
    pub fn submit(&self, job: EngineJob) -> bool {
        self.jobs.send(job).is_ok()
    }

    pub fn is_alive(&self) -> bool {
        !self.jobs.is_closed()
    }

    /// 处理完已提交的查询后关闭引擎
    pub async fn shutdown(self) {
        let Self { jobs, task } = self;
        drop(jobs);
        if let Err(e) = task.await {
            tracing::warn!("引擎工作任务异常结束: {}", e);
        }
    }
}

async fn worker_loop(
    mut engine: EngineProcess,
    mut jobs: mpsc::UnboundedReceiver<EngineJob>,
    ai_timeout: Duration,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    while let Some(job) = jobs.recv().await {
        let (handle, token) = CancelHandle::new();
        let timer = handle.cancel_after(ai_timeout);
        let started = tokio::time::Instant::now();

        let outcome = run_job(&mut engine, job, &token).await;
        timer.abort();

        let (event, fatal) = match outcome {
            Ok(event) => {
                tracing::debug!("引擎查询完成，耗时: {:?}", started.elapsed());
                (event, false)
            }
            Err(e) => {
                // 超时取消后引擎仍可用，其余错误使引擎失效
                let fatal = !matches!(e, EngineError::Cancelled);
                if fatal {
                    tracing::error!("引擎查询失败，停止使用引擎: {}", e);
                } else {
                    tracing::warn!("AI 计算超时（>{:?}），已取消", ai_timeout);
                }
                let event = ClientEvent::EngineFailed {
                    reason: e.to_string(),
                    fatal,
                };
                (event, fatal)
            }
        };

        // 控制器已退出或引擎失效
        if events.send(event).is_err() || fatal {
            break;
        }
    }

    if let Err(e) = engine.shutdown().await {
        tracing::warn!("关闭引擎失败: {}", e);
    }
}

async fn run_job(
    engine: &mut EngineProcess,
    job: EngineJob,
    cancel: &CancelToken,
) -> Result<ClientEvent, EngineError> {
    match job {
        EngineJob::Hint {
            fen,
            think_ms,
            depth,
        } => {
            let best_move = engine.search_best_move(&fen, think_ms, cancel).await?;
            let score_cp = engine.search_score(&fen, depth, cancel).await?;
            Ok(ClientEvent::Hint(HintResult {
                fen,
                best_move,
                score_cp,
            }))
        }
        EngineJob::Move { fen, think_ms } => {
            let mv = engine.search_best_move(&fen, think_ms, cancel).await?;
            Ok(ClientEvent::EngineMove { fen, mv })
        }
    }
}
