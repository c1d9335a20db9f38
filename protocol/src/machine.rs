//! 中心端同步状态机
//!
//! 单线程、事件驱动：每个事件（外设命令或中心端回调）同步处理完毕，
//! 产生的输出按顺序收集后返回给宿主，由宿主负责发送。
//! 任何时刻最多只有一步走法未确认。

use tracing::{debug, warn};

use crate::board::{BoardSnapshot, Variant};
use crate::command::Command;
use crate::constants::{feature_names, verbs};
use crate::features::FeatureSet;
use crate::fen::Fen;
use crate::uci::{has_promotion_suffix, UciMove};

/// 协议状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    Init,
    CheckFeatureMsg,
    CheckFeatureLastMove,
    Idle,
    SynchronizeVariant,
    SynchronizeFen,
    SynchronizeLastMove,
    Unsynchronized,
    Synchronized,
    /// 中心端走法已发出，等待外设确认
    SynchronizeCentralMove,
    /// 外设走法已转交中心端，等待裁决
    SynchronizePeripheralMove,
    Promote,
    /// 外设带升变的走法已转交中心端，等待裁决
    SynchronizePeripheralPromotedMove,
}

/// 未确认走法的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOrigin {
    Central,
    Peripheral,
}

/// 需要展示给用户的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Unsynchronized,
    Synchronized,
    /// 外设走法被中心端拒绝
    Rejected,
    /// 当前状态不接受的外设命令
    Unexpected(String),
    /// 外设发来的自由文本
    Message(String),
}

impl Notice {
    /// 本地化键，自由文本和意外命令没有键
    pub fn i18n_key(&self) -> Option<&'static str> {
        match self {
            Notice::Unsynchronized => Some("unsynchronizd"),
            Notice::Synchronized => Some("synchronizd"),
            Notice::Rejected => Some("rejected"),
            Notice::Unexpected(_) | Notice::Message(_) => None,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Unsynchronized => f.write_str("unsynchronized"),
            Notice::Synchronized => f.write_str("synchronized"),
            Notice::Rejected => f.write_str("rejected"),
            Notice::Unexpected(cmd) => write!(f, "unexpected: {}", cmd),
            Notice::Message(text) => f.write_str(text),
        }
    }
}

/// 状态机产生的输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// 发给外设的命令
    Peripheral(Command),
    /// 请中心端校验并应用的走法
    Central(UciMove),
    /// 用户提示
    Notice(Notice),
}

/// 状态处理结果，未处理的命令交给默认处理
enum Handling {
    Handled,
    Unhandled,
}

/// `ok` / `nok` 回复
fn reply(cmd: &Command) -> Option<bool> {
    if cmd.is_bare(verbs::OK) {
        Some(true)
    } else if cmd.is_bare(verbs::NOK) {
        Some(false)
    } else {
        None
    }
}

/// BLE 棋盘同步协议
///
/// 每个连接创建一个实例，先调用 [`BleChessProtocol::start`] 开始功能协商。
#[derive(Debug)]
pub struct BleChessProtocol {
    state: ProtocolState,
    snapshot: BoardSnapshot,
    features: FeatureSet,
    outputs: Vec<Output>,
    transitions: u64,
}

impl BleChessProtocol {
    /// 创建新的协议实例，处于 Init 状态
    pub fn new() -> Self {
        Self {
            state: ProtocolState::Init,
            snapshot: BoardSnapshot::default(),
            features: FeatureSet::default(),
            outputs: Vec::new(),
            transitions: 0,
        }
    }

    /// 当前状态
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// 当前局面快照
    pub fn snapshot(&self) -> &BoardSnapshot {
        &self.snapshot
    }

    /// 已协商的功能
    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// 累计进入状态的次数，重新进入同一状态也计数
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    /// 未确认走法的来源
    pub fn pending_move(&self) -> Option<MoveOrigin> {
        match self.state {
            ProtocolState::SynchronizeCentralMove | ProtocolState::Promote => {
                Some(MoveOrigin::Central)
            }
            ProtocolState::SynchronizePeripheralMove
            | ProtocolState::SynchronizePeripheralPromotedMove => Some(MoveOrigin::Peripheral),
            _ => None,
        }
    }

    /// 协商完成后是否在等待外设回复
    pub fn awaiting_peripheral_reply(&self) -> bool {
        matches!(
            self.state,
            ProtocolState::SynchronizeVariant
                | ProtocolState::SynchronizeFen
                | ProtocolState::SynchronizeLastMove
                | ProtocolState::SynchronizeCentralMove
                | ProtocolState::Promote
        )
    }

    /// 进入 Init 并重新协商功能
    pub fn start(&mut self) -> Vec<Output> {
        self.features = FeatureSet::default();
        self.transition_to(ProtocolState::Init);
        self.take_outputs()
    }

    /// 中心端创建了新对局
    pub fn on_central_state_created(&mut self, snapshot: BoardSnapshot) -> Vec<Output> {
        debug!(state = ?self.state, "中心端创建对局");
        self.snapshot = snapshot;

        match self.state {
            ProtocolState::Init
            | ProtocolState::CheckFeatureMsg
            | ProtocolState::CheckFeatureLastMove => {
                debug!("功能协商中，仅保存局面");
            }
            _ => self.transition_to(ProtocolState::SynchronizeVariant),
        }

        self.take_outputs()
    }

    /// 中心端局面发生变化
    pub fn on_central_state_changed(&mut self, snapshot: BoardSnapshot) -> Vec<Output> {
        debug!(state = ?self.state, "中心端局面变化");
        self.snapshot = snapshot;

        match self.state {
            ProtocolState::Unsynchronized => self.transition_to(ProtocolState::SynchronizeFen),
            ProtocolState::Synchronized => match UciMove::last_move(&self.snapshot) {
                Some(mv) => {
                    self.send(Command::mv(mv));
                    self.transition_to(ProtocolState::SynchronizeCentralMove);
                }
                None => {
                    warn!("局面变化但没有上一步走法，重新同步 FEN");
                    self.transition_to(ProtocolState::SynchronizeFen);
                }
            },
            ProtocolState::SynchronizePeripheralMove => {
                self.send(Command::ok());
                if self.snapshot.promotion.is_some() {
                    self.transition_to(ProtocolState::Promote);
                } else {
                    self.transition_to(ProtocolState::Synchronized);
                }
            }
            ProtocolState::SynchronizePeripheralPromotedMove => {
                self.send(Command::ok());
                self.transition_to(ProtocolState::Synchronized);
            }
            _ => debug!("仅更新局面"),
        }

        self.take_outputs()
    }

    /// 中心端拒绝了转交的外设走法
    pub fn on_move_rejected_by_central(&mut self) -> Vec<Output> {
        match self.state {
            ProtocolState::SynchronizePeripheralMove
            | ProtocolState::SynchronizePeripheralPromotedMove => {
                warn!("外设走法被中心端拒绝");
                self.send(Command::nok());
                self.transition_to(ProtocolState::Synchronized);
                self.notify(Notice::Rejected);
            }
            state => debug!(?state, "没有待裁决的外设走法，忽略拒绝"),
        }

        self.take_outputs()
    }

    /// 处理外设发来的一行命令
    pub fn on_peripheral_command(&mut self, line: &str) -> Vec<Output> {
        debug!(cmd = line, state = ?self.state, "收到外设命令");
        let cmd = Command::parse(line);

        if let Handling::Unhandled = self.handle_command(&cmd) {
            warn!(cmd = line, state = ?self.state, "意外的外设命令");
            self.notify(Notice::Unexpected(line.to_string()));
        }

        self.take_outputs()
    }

    /// 等待外设回复超时
    ///
    /// 只有配置了超时的宿主才会调用，默认情况下等待没有期限。
    pub fn on_reply_timeout(&mut self) -> Vec<Output> {
        if self.awaiting_peripheral_reply() {
            warn!(state = ?self.state, "等待外设回复超时，重新同步 FEN");
            self.transition_to(ProtocolState::Unsynchronized);
            self.transition_to(ProtocolState::SynchronizeFen);
        }

        self.take_outputs()
    }

    fn handle_command(&mut self, cmd: &Command) -> Handling {
        match self.state {
            ProtocolState::CheckFeatureMsg => match reply(cmd) {
                Some(supported) => {
                    if supported {
                        self.features.msg = true;
                    }
                    self.transition_to(ProtocolState::CheckFeatureLastMove);
                    Handling::Handled
                }
                None => Handling::Unhandled,
            },
            ProtocolState::CheckFeatureLastMove => match reply(cmd) {
                Some(supported) => {
                    if supported {
                        self.features.last_move = true;
                    }
                    self.transition_to(ProtocolState::Idle);
                    Handling::Handled
                }
                None => Handling::Unhandled,
            },
            ProtocolState::Idle => {
                // Idle 静默丢弃其余命令
                self.handle_message(cmd);
                Handling::Handled
            }
            ProtocolState::SynchronizeVariant => match reply(cmd) {
                Some(true) => self.handled_transition(ProtocolState::SynchronizeFen),
                Some(false) => self.handled_transition(ProtocolState::Idle),
                None => Handling::Unhandled,
            },
            ProtocolState::SynchronizeFen => match reply(cmd) {
                Some(true) => self.handled_transition(ProtocolState::SynchronizeLastMove),
                Some(false) => self.handled_transition(ProtocolState::Unsynchronized),
                None => Handling::Unhandled,
            },
            ProtocolState::SynchronizeLastMove
            | ProtocolState::SynchronizeCentralMove
            | ProtocolState::Promote => match reply(cmd) {
                Some(true) => self.handled_transition(ProtocolState::Synchronized),
                _ => Handling::Unhandled,
            },
            ProtocolState::Unsynchronized => self.handle_unsynchronized(cmd),
            ProtocolState::Synchronized => self.handle_synchronized(cmd),
            ProtocolState::Init
            | ProtocolState::SynchronizePeripheralMove
            | ProtocolState::SynchronizePeripheralPromotedMove => Handling::Unhandled,
        }
    }

    fn handle_unsynchronized(&mut self, cmd: &Command) -> Handling {
        let Some(peripheral_fen) = cmd.param_of(verbs::FEN) else {
            return self.handle_message(cmd);
        };

        if Fen::same_board(peripheral_fen, &Fen::full_fen(&self.snapshot)) {
            self.send(Command::ok());
            self.notify(Notice::Synchronized);
            self.transition_to(ProtocolState::SynchronizeLastMove);
        } else {
            self.send(Command::nok());
        }
        Handling::Handled
    }

    fn handle_synchronized(&mut self, cmd: &Command) -> Handling {
        if let Some(text) = cmd.param_of(verbs::MOVE) {
            let mv = match UciMove::parse(text) {
                Ok(mv) => mv,
                Err(e) => {
                    warn!(error = %e, "无法解析外设走法");
                    return Handling::Unhandled;
                }
            };
            if has_promotion_suffix(text) {
                self.transition_to(ProtocolState::SynchronizePeripheralPromotedMove);
            } else {
                self.transition_to(ProtocolState::SynchronizePeripheralMove);
            }
            debug!(%mv, "转交外设走法给中心端");
            self.outputs.push(Output::Central(mv));
            return Handling::Handled;
        }

        if let Some(peripheral_fen) = cmd.param_of(verbs::FEN) {
            if Fen::same_board(peripheral_fen, &Fen::full_fen(&self.snapshot)) {
                self.send(Command::ok());
            } else {
                self.send(Command::nok());
                self.transition_to(ProtocolState::Unsynchronized);
            }
            return Handling::Handled;
        }

        self.handle_message(cmd)
    }

    /// `msg` 命令：回复 ok 并展示文本
    fn handle_message(&mut self, cmd: &Command) -> Handling {
        if cmd.verb != verbs::MSG {
            return Handling::Unhandled;
        }
        self.send(Command::ok());
        self.notify(Notice::Message(cmd.param.clone().unwrap_or_default()));
        Handling::Handled
    }

    fn handled_transition(&mut self, state: ProtocolState) -> Handling {
        self.transition_to(state);
        Handling::Handled
    }

    /// 切换状态并执行进入动作，进入动作可能继续切换
    fn transition_to(&mut self, state: ProtocolState) {
        let mut next = Some(state);
        while let Some(state) = next.take() {
            debug!(from = ?self.state, to = ?state, "状态切换");
            self.state = state;
            self.transitions += 1;
            next = self.on_enter();
        }
    }

    fn on_enter(&mut self) -> Option<ProtocolState> {
        match self.state {
            ProtocolState::Init => Some(ProtocolState::CheckFeatureMsg),
            ProtocolState::CheckFeatureMsg => {
                self.send(Command::feature(feature_names::MSG));
                None
            }
            ProtocolState::CheckFeatureLastMove => {
                self.send(Command::feature(feature_names::LAST_MOVE));
                None
            }
            ProtocolState::SynchronizeVariant => {
                // TODO: 按快照中的变体同步，外设目前只认 standard
                self.send(Command::variant(Variant::Standard));
                None
            }
            ProtocolState::SynchronizeFen => {
                let cmd = Command::fen(&self.snapshot);
                self.send(cmd);
                None
            }
            ProtocolState::SynchronizeLastMove => match UciMove::last_move(&self.snapshot) {
                Some(mv) if self.features.last_move => {
                    self.send(Command::last_move(mv));
                    None
                }
                _ => Some(ProtocolState::Synchronized),
            },
            ProtocolState::Unsynchronized => {
                self.notify(Notice::Unsynchronized);
                None
            }
            ProtocolState::Promote => match UciMove::last_move(&self.snapshot) {
                Some(mv) => {
                    self.send(Command::promote(mv));
                    None
                }
                None => {
                    warn!("升变局面没有上一步走法");
                    Some(ProtocolState::Synchronized)
                }
            },
            ProtocolState::Idle
            | ProtocolState::Synchronized
            | ProtocolState::SynchronizeCentralMove
            | ProtocolState::SynchronizePeripheralMove
            | ProtocolState::SynchronizePeripheralPromotedMove => None,
        }
    }

    fn send(&mut self, cmd: Command) {
        debug!(%cmd, "send_cmd");
        self.outputs.push(Output::Peripheral(cmd));
    }

    fn notify(&mut self, notice: Notice) {
        self.outputs.push(Output::Notice(notice));
    }

    fn take_outputs(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.outputs)
    }
}

impl Default for BleChessProtocol {
    fn default() -> Self {
        Self::new()
    }
}
