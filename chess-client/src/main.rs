use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chess_client::{ClientSettings, GameController, UserCommand};
use protocol::Side;

/// 启动方式
enum LaunchMode {
    /// 连接服务器，地址缺省时取设置中的地址
    Online(Option<String>),
    /// 与本地引擎对弈，参数为玩家一方
    VersusEngine(Side),
    /// 本地双人
    Local,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<LaunchMode> {
    match args.next().as_deref() {
        None => Ok(LaunchMode::Online(None)),
        Some("--engine") => {
            let side = match args.next() {
                Some(side) => side
                    .parse::<Side>()
                    .map_err(|()| anyhow::anyhow!("无效的阵营: {}（应为 white 或 black）", side))?,
                None => Side::White,
            };
            Ok(LaunchMode::VersusEngine(side))
        }
        Some("--local") => Ok(LaunchMode::Local),
        Some(flag) if flag.starts_with('-') => {
            bail!(
                "用法: chess-client [服务器地址] | chess-client --engine [white|black] | chess-client --local"
            )
        }
        Some(addr) => Ok(LaunchMode::Online(Some(addr.to_string()))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志（输出到 stderr，不干扰终端交互）
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("chess_client=info".parse()?))
        .init();

    let mode = parse_args(std::env::args().skip(1))?;
    let settings = ClientSettings::load();
    let mut controller = GameController::new(settings);

    match mode {
        LaunchMode::Online(addr) => {
            let addr = addr.unwrap_or_else(|| controller.settings().server_address.clone());
            let side = controller
                .connect(&addr)
                .await
                .with_context(|| format!("无法加入 {} 的对局", addr))?;
            println!("已连接 {}，你执{}", addr, if side == Side::White { "白" } else { "黑" });

            // 引擎只用于提示，启动失败不影响联机
            if let Err(e) = controller.attach_engine().await {
                warn!("引擎不可用，提示功能关闭: {}", e);
            }
        }
        LaunchMode::VersusEngine(side) => {
            controller
                .attach_engine()
                .await
                .context("人机对弈需要可用的 UCI 引擎")?;
            for notice in controller.start_versus_engine(side)? {
                println!("{}", notice);
            }
        }
        LaunchMode::Local => {
            if let Err(e) = controller.attach_engine().await {
                warn!("引擎不可用，提示功能关闭: {}", e);
            }
            for notice in controller.start_local()? {
                println!("{}", notice);
            }
        }
    }

    println!("输入 help 查看命令");
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(tx));

    controller.run(rx, |notice| println!("{}", notice)).await;
    info!("再见");
    Ok(())
}

/// 从标准输入逐行读取命令
async fn read_commands(tx: mpsc::UnboundedSender<UserCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("读取标准输入失败: {}", e);
                break;
            }
        };

        match UserCommand::parse(&line) {
            Ok(command) => {
                let quit = command == UserCommand::Quit;
                if tx.send(command).is_err() || quit {
                    break;
                }
            }
            Err(chess_client::CommandError::Empty) => {}
            Err(e) => println!("{}（输入 help 查看命令）", e),
        }
    }
}
