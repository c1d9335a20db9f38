//! 外设功能协商结果

use serde::{Deserialize, Serialize};

/// 每次连接协商一次的外设功能
///
/// 同一连接内标志只会从 false 变为 true。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// 支持 `msg` 自由文本
    pub msg: bool,
    /// 支持 `last_move`
    pub last_move: bool,
}
