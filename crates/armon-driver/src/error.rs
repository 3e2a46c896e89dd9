//! 驱动层错误类型定义

use armon_link::LinkError;
use armon_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
///
/// 只在驱动内部与构造阶段传播；对外的设备操作把失败折叠为 `false` / `None`。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 链路错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议不匹配（标志或长度）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 应答内容无法解释（如非法时钟）
    #[error("Invalid reply: {0}")]
    InvalidReply(String),
}

impl DriverError {
    /// 是否为协议不匹配（会置位驱动错误标志）
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(
            self,
            DriverError::Protocol(_) | DriverError::InvalidReply(_)
        )
    }
}
