//! 回环中心端
//!
//! 在没有手机应用时扮演中心端：直接在本地棋盘上应用双方走法，
//! 只检查起点上有走子方的棋子，不做规则校验。
//! 控制台每行一个命令：`new` 开新局，UCI 走法代表中心端本地走子，`quit` 退出。

use anyhow::Context;
use ble_chess_protocol::{
    BoardSnapshot, ChessError, Fen, LineReader, Piece, ProtocolError, ProtocolState, Role,
    UciMove,
};
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::session::SessionHandle;

/// 回环中心端
#[derive(Debug, Clone)]
pub struct LoopbackCentral {
    start: BoardSnapshot,
    snapshot: BoardSnapshot,
}

impl LoopbackCentral {
    /// 从初始局面创建
    pub fn new(start: BoardSnapshot) -> Self {
        Self {
            snapshot: start.clone(),
            start,
        }
    }

    /// 从 FEN 创建
    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        Ok(Self::new(Fen::parse(fen)?))
    }

    /// 当前局面
    pub fn snapshot(&self) -> &BoardSnapshot {
        &self.snapshot
    }

    /// 回到初始局面
    pub fn reset(&mut self) -> BoardSnapshot {
        self.snapshot = self.start.clone();
        self.snapshot.clone()
    }

    /// 应用走法，成功时返回新局面
    ///
    /// 兵走到底线而走法没有升变后缀时自动升变为后。
    pub fn apply(&mut self, mv: UciMove) -> Option<BoardSnapshot> {
        let turn = self.snapshot.turn;
        let piece = self.snapshot.board.get(mv.from)?;
        if piece.color != turn || mv.from == mv.to {
            return None;
        }

        let reaches_last_rank = piece.role == Role::Pawn && mv.to.rank == turn.promotion_rank();
        let promotion = match (reaches_last_rank, mv.promotion) {
            (true, Some(role)) if role != Role::King => Some(role),
            (true, None) => Some(Role::Queen),
            (false, None) => None,
            _ => return None,
        };

        let mut next = self.snapshot.clone();
        next.board.move_piece(mv.from, mv.to);
        if let Some(role) = promotion {
            next.board.set(mv.to, Some(Piece::new(role, turn)));
        }
        next.turn = turn.opponent();
        next.last_move = Some((mv.from, mv.to));
        next.promotion = promotion;

        self.snapshot = next.clone();
        Some(next)
    }

    /// 驱动会话直到会话结束或控制台退出
    ///
    /// 功能协商完成（进入 Idle）后才创建对局。
    pub async fn run<C>(
        mut self,
        handle: SessionHandle,
        mut moves: mpsc::UnboundedReceiver<UciMove>,
        mut states: watch::Receiver<ProtocolState>,
        console: C,
    ) -> anyhow::Result<()>
    where
        C: AsyncRead + Unpin + Send,
    {
        let negotiated = states
            .wait_for(|state| *state == ProtocolState::Idle)
            .await
            .is_ok();
        if !negotiated {
            return Ok(());
        }
        handle.on_central_state_created(self.snapshot.clone()).await?;

        let mut console = LineReader::new(console);
        let mut console_open = true;

        loop {
            tokio::select! {
                mv = moves.recv() => match mv {
                    Some(mv) => self.on_peripheral_move(&handle, mv).await?,
                    None => return Ok(()),
                },
                line = console.read_line(), if console_open => match line {
                    Ok(line) => {
                        if !self.on_console_line(&handle, line.trim()).await? {
                            return Ok(());
                        }
                    }
                    Err(ProtocolError::ConnectionClosed) => console_open = false,
                    Err(e) => return Err(e).context("读取控制台失败"),
                },
            }
        }
    }

    async fn on_peripheral_move(
        &mut self,
        handle: &SessionHandle,
        mv: UciMove,
    ) -> anyhow::Result<()> {
        match self.apply(mv) {
            Some(snapshot) => {
                info!(%mv, fen = %Fen::full_fen(&snapshot), "接受外设走法");
                handle.on_central_state_changed(snapshot).await
            }
            None => {
                warn!(%mv, "拒绝外设走法");
                handle.on_move_rejected_by_central().await
            }
        }
    }

    /// 处理控制台命令，返回 false 表示退出
    async fn on_console_line(
        &mut self,
        handle: &SessionHandle,
        line: &str,
    ) -> anyhow::Result<bool> {
        match line {
            "quit" => {
                handle.shutdown().await?;
                return Ok(false);
            }
            "new" => {
                let snapshot = self.reset();
                handle.on_central_state_created(snapshot).await?;
            }
            text => match UciMove::parse(text).ok().and_then(|mv| self.apply(mv)) {
                Some(snapshot) => handle.on_central_state_changed(snapshot).await?,
                None => warn!(cmd = text, "无效的中心端走法"),
            },
        }
        Ok(true)
    }
}
