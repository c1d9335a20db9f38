use std::path::PathBuf;

use anyhow::{Context, Result};
use ble_chess_central::{CentralConfig, LoopbackCentral, Session};
use ble_chess_protocol::{Connector, Link, TcpConnector};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => CentralConfig::load_from(&path)
            .with_context(|| format!("无法加载配置文件: {:?}", path))?,
        None => CentralConfig::load(),
    };

    // 初始化日志
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in &config.log_directives {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("BLE 棋盘中心端启动中...");

    let central = LoopbackCentral::from_fen(&config.start_fen).context("初始局面无效")?;

    let link = TcpConnector
        .connect(&config.peripheral_addr)
        .await
        .with_context(|| format!("无法连接外设: {}", config.peripheral_addr))?;
    info!(peer = ?link.peer_addr(), "已连接外设");

    let (reader, writer) = link.split();
    let session = Session::spawn(reader, writer, &config);
    let moves = session.handle.subscribe_to_peripheral_moves().await?;

    let mut notices = session.notices;
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            println!("{}", notice);
        }
    });

    central
        .run(session.handle.clone(), moves, session.states, tokio::io::stdin())
        .await?;

    session.task.await.context("会话任务异常退出")??;
    info!("BLE 棋盘中心端已退出");
    Ok(())
}
