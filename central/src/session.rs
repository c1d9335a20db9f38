//! 单个外设连接的同步会话
//!
//! 会话任务独占一个 [`BleChessProtocol`]，外设命令和中心端回调
//! 都在同一个任务里逐个处理，保证事件按到达顺序串行交给状态机。

use std::time::Duration;

use anyhow::Context;
use ble_chess_protocol::{
    BleChessProtocol, BoardSnapshot, LineReader, LineWriter, Notice, Output, ProtocolError,
    ProtocolState, UciMove,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::CentralConfig;

/// 中心端发给会话的事件
#[derive(Debug)]
pub enum SessionEvent {
    /// 新对局
    CentralStateCreated(BoardSnapshot),
    /// 局面变化（本地走子或接受了外设走法）
    CentralStateChanged(BoardSnapshot),
    /// 外设走法不合法
    MoveRejected,
    /// 订阅外设走法，替换之前的订阅
    Subscribe(mpsc::UnboundedSender<UciMove>),
    /// 取消订阅
    Unsubscribe,
    /// 结束会话
    Shutdown,
}

/// 中心端持有的会话句柄
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    async fn send(&self, event: SessionEvent) -> anyhow::Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("会话已结束"))
    }

    pub async fn on_central_state_created(&self, snapshot: BoardSnapshot) -> anyhow::Result<()> {
        self.send(SessionEvent::CentralStateCreated(snapshot)).await
    }

    pub async fn on_central_state_changed(&self, snapshot: BoardSnapshot) -> anyhow::Result<()> {
        self.send(SessionEvent::CentralStateChanged(snapshot)).await
    }

    pub async fn on_move_rejected_by_central(&self) -> anyhow::Result<()> {
        self.send(SessionEvent::MoveRejected).await
    }

    /// 订阅外设走法，中心端校验后应回调 changed 或 rejected
    pub async fn subscribe_to_peripheral_moves(
        &self,
    ) -> anyhow::Result<mpsc::UnboundedReceiver<UciMove>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.send(SessionEvent::Subscribe(tx)).await?;
        Ok(rx)
    }

    pub async fn unsubscribe_from_peripheral_moves(&self) -> anyhow::Result<()> {
        self.send(SessionEvent::Unsubscribe).await
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send(SessionEvent::Shutdown).await
    }
}

/// 启动后的会话
pub struct SpawnedSession {
    pub handle: SessionHandle,
    /// 用户提示
    pub notices: mpsc::UnboundedReceiver<Notice>,
    /// 协议状态
    pub states: watch::Receiver<ProtocolState>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

/// 一次循环等到的事件
enum Step {
    Line(ble_chess_protocol::Result<String>),
    Event(Option<SessionEvent>),
    ReplyTimeout,
}

/// 同步会话
pub struct Session<R, W> {
    protocol: BleChessProtocol,
    reader: LineReader<R>,
    writer: LineWriter<W>,
    events: mpsc::Receiver<SessionEvent>,
    moves: Option<mpsc::UnboundedSender<UciMove>>,
    notices: mpsc::UnboundedSender<Notice>,
    states: watch::Sender<ProtocolState>,
    reply_timeout: Option<Duration>,
    /// 当前等待的回复期限
    reply_deadline: Option<Instant>,
    /// 上次刷新期限时的状态进入次数
    entered: u64,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// 在新任务中运行会话
    pub fn spawn(
        reader: LineReader<R>,
        writer: LineWriter<W>,
        config: &CentralConfig,
    ) -> SpawnedSession {
        let (event_tx, event_rx) = mpsc::channel(config.event_queue_capacity.max(1));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let protocol = BleChessProtocol::new();
        let (state_tx, state_rx) = watch::channel(protocol.state());

        let session = Self {
            protocol,
            reader,
            writer,
            events: event_rx,
            moves: None,
            notices: notice_tx,
            states: state_tx,
            reply_timeout: config.reply_timeout(),
            reply_deadline: None,
            entered: 0,
        };

        SpawnedSession {
            handle: SessionHandle { events: event_tx },
            notices: notice_rx,
            states: state_rx,
            task: tokio::spawn(session.run()),
        }
    }

    async fn run(mut self) -> anyhow::Result<()> {
        let outputs = self.protocol.start();
        self.flush(outputs).await?;

        loop {
            let deadline = self.reply_deadline;

            let step = tokio::select! {
                line = self.reader.read_line() => Step::Line(line),
                event = self.events.recv() => Step::Event(event),
                _ = wait_until(deadline) => Step::ReplyTimeout,
            };

            let outputs = match step {
                Step::Line(Ok(line)) => self.protocol.on_peripheral_command(&line),
                Step::Line(Err(ProtocolError::ConnectionClosed)) => {
                    info!("外设已断开连接");
                    return Ok(());
                }
                Step::Line(Err(
                    e @ (ProtocolError::InvalidUtf8 | ProtocolError::LineTooLong { .. }),
                )) => {
                    // 坏帧已被读取器丢弃，链路仍然可用
                    warn!(error = %e, "丢弃无法解析的外设数据");
                    vec![Output::Notice(Notice::Unexpected(e.to_string()))]
                }
                Step::Line(Err(e)) => return Err(e).context("读取外设命令失败"),
                Step::Event(Some(event)) => match self.handle_event(event) {
                    Some(outputs) => outputs,
                    None => {
                        info!("会话结束");
                        if let Err(e) = self.writer.shutdown().await {
                            debug!(error = %e, "关闭链路失败");
                        }
                        return Ok(());
                    }
                },
                Step::Event(None) => {
                    info!("中心端句柄已全部释放，会话结束");
                    return Ok(());
                }
                Step::ReplyTimeout => {
                    self.reply_deadline = None;
                    self.protocol.on_reply_timeout()
                }
            };

            self.flush(outputs).await?;
        }
    }

    /// 处理中心端事件，返回 None 表示结束会话
    fn handle_event(&mut self, event: SessionEvent) -> Option<Vec<Output>> {
        let outputs = match event {
            SessionEvent::CentralStateCreated(snapshot) => {
                self.protocol.on_central_state_created(snapshot)
            }
            SessionEvent::CentralStateChanged(snapshot) => {
                self.protocol.on_central_state_changed(snapshot)
            }
            SessionEvent::MoveRejected => self.protocol.on_move_rejected_by_central(),
            SessionEvent::Subscribe(tx) => {
                self.moves = Some(tx);
                Vec::new()
            }
            SessionEvent::Unsubscribe => {
                self.moves = None;
                Vec::new()
            }
            SessionEvent::Shutdown => return None,
        };
        Some(outputs)
    }

    /// 按顺序发送状态机的输出
    async fn flush(&mut self, outputs: Vec<Output>) -> anyhow::Result<()> {
        for output in outputs {
            match output {
                Output::Peripheral(cmd) => {
                    info!("BLE_CHESS: send_cmd: {}", cmd);
                    self.writer
                        .write_line(&cmd.to_string())
                        .await
                        .with_context(|| format!("发送命令失败: {}", cmd))?;
                }
                Output::Central(mv) => {
                    let delivered = match &self.moves {
                        Some(tx) => tx.send(mv).is_ok(),
                        None => false,
                    };
                    if !delivered {
                        warn!(%mv, "没有外设走法订阅者，走法被丢弃");
                        self.moves = None;
                    }
                }
                Output::Notice(notice) => {
                    info!(%notice, "提示");
                    // 没有人接收提示时只记日志
                    let _ = self.notices.send(notice);
                }
            }
        }

        self.states.send_replace(self.protocol.state());
        self.refresh_deadline();
        Ok(())
    }

    /// 进入等待状态时开始计时，同一次等待期间的其他命令不影响期限
    fn refresh_deadline(&mut self) {
        let entered = self.protocol.transition_count();
        match self
            .reply_timeout
            .filter(|_| self.protocol.awaiting_peripheral_reply())
        {
            Some(timeout) => {
                if entered != self.entered || self.reply_deadline.is_none() {
                    self.reply_deadline = Some(Instant::now() + timeout);
                }
            }
            None => self.reply_deadline = None,
        }
        self.entered = entered;
    }
}

/// 等到回复期限，没有期限时永不到期
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
