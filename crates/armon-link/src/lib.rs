//! # Armon Link Layer
//!
//! 设备链路抽象层：TCP 流或固定波特率串口，统一为 [`Link`] 接口，
//! 由 [`Transport`] 在其上完成一次阻塞式请求 → 应答交互。
//!
//! ## 模块
//!
//! - `tcp`: TCP 流链路
//! - `serial`: 串口链路
//! - `state`: 链路状态（连接 / 最近存活时间），供生命周期管理只读访问
//! - `transport`: 请求/应答交互
//! - `mock`: 设备模拟器（`mock` feature 或测试）

use std::time::Duration;
use thiserror::Error;

pub use armon_protocol::{Frame, ProtocolError};

pub mod serial;
pub mod state;
pub mod tcp;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use serial::SerialLink;
pub use state::{LinkState, is_link_alive};
pub use tcp::TcpLink;
pub use transport::{DEFAULT_RECEIVE_TIMEOUT, Transport};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockLink;

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Receive timeout after {0:?}")]
    Timeout(Duration),
    #[error("Link not connected")]
    NotConnected,
    #[error("Link closed by peer")]
    Closed,
    #[error("Malformed reply: {0}")]
    Malformed(String),
    #[error("Invalid link settings: {0}")]
    InvalidSettings(String),
}

impl LinkError {
    /// 是否意味着底层通道已不可用
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinkError::Io(_) | LinkError::Serial(_) | LinkError::NotConnected | LinkError::Closed
        )
    }
}

/// 设备链路
///
/// 实现者只负责字节收发，不理解帧格式。
pub trait Link: Send {
    /// 打开通道（已打开时为 no-op）
    fn connect(&mut self) -> Result<(), LinkError>;

    /// 关闭通道，幂等
    fn disconnect(&mut self);

    /// 通道是否处于打开状态
    fn is_connected(&self) -> bool;

    /// 完整写出一段字节
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// 读取一个数据块，最多等待 `timeout`
    ///
    /// 超时返回 `Ok(0)`；对端关闭返回 `Err(LinkError::Closed)`。
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError>;

    /// 用于日志的链路描述
    fn describe(&self) -> String;
}

/// 链路类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LinkKind {
    #[default]
    Tcp,
    Serial,
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkKind::Tcp => write!(f, "tcp"),
            LinkKind::Serial => write!(f, "serial"),
        }
    }
}

impl std::str::FromStr for LinkKind {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(LinkKind::Tcp),
            "serial" => Ok(LinkKind::Serial),
            other => Err(LinkError::InvalidSettings(format!(
                "unknown link kind '{}'",
                other
            ))),
        }
    }
}

/// 运行期选定的链路（静态分发）
pub enum AnyLink {
    Tcp(TcpLink),
    Serial(SerialLink),
}

impl AnyLink {
    /// 按链路类型构造（不打开通道）
    pub fn build(
        kind: LinkKind,
        address: &str,
        port_name: &str,
        baud_rate: u32,
    ) -> Result<Self, LinkError> {
        match kind {
            LinkKind::Tcp => Ok(AnyLink::Tcp(TcpLink::new(address)?)),
            LinkKind::Serial => Ok(AnyLink::Serial(SerialLink::new(port_name, baud_rate)?)),
        }
    }

    pub fn kind(&self) -> LinkKind {
        match self {
            AnyLink::Tcp(_) => LinkKind::Tcp,
            AnyLink::Serial(_) => LinkKind::Serial,
        }
    }
}

impl Link for AnyLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        match self {
            AnyLink::Tcp(link) => link.connect(),
            AnyLink::Serial(link) => link.connect(),
        }
    }

    fn disconnect(&mut self) {
        match self {
            AnyLink::Tcp(link) => link.disconnect(),
            AnyLink::Serial(link) => link.disconnect(),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            AnyLink::Tcp(link) => link.is_connected(),
            AnyLink::Serial(link) => link.is_connected(),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        match self {
            AnyLink::Tcp(link) => link.write_all(bytes),
            AnyLink::Serial(link) => link.write_all(bytes),
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError> {
        match self {
            AnyLink::Tcp(link) => link.read_chunk(buf, timeout),
            AnyLink::Serial(link) => link.read_chunk(buf, timeout),
        }
    }

    fn describe(&self) -> String {
        match self {
            AnyLink::Tcp(link) => link.describe(),
            AnyLink::Serial(link) => link.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_kind_parse() {
        assert_eq!("tcp".parse::<LinkKind>().unwrap(), LinkKind::Tcp);
        assert_eq!(" Serial ".parse::<LinkKind>().unwrap(), LinkKind::Serial);
        assert!(matches!(
            "can".parse::<LinkKind>(),
            Err(LinkError::InvalidSettings(_))
        ));
        assert_eq!(LinkKind::Serial.to_string(), "serial");
    }

    #[test]
    fn test_build_tcp_link() {
        let link = AnyLink::build(LinkKind::Tcp, "127.0.0.1:27011", "", 0).unwrap();
        assert_eq!(link.kind(), LinkKind::Tcp);
        assert!(!link.is_connected());
        assert!(link.describe().contains("127.0.0.1:27011"));
    }

    #[test]
    fn test_build_rejects_bad_settings() {
        assert!(AnyLink::build(LinkKind::Tcp, "not-an-address", "", 0).is_err());
        assert!(AnyLink::build(LinkKind::Serial, "", "", 19200).is_err());
        assert!(AnyLink::build(LinkKind::Serial, "", "/dev/ttyUSB0", 0).is_err());
    }

    #[test]
    fn test_error_fatality() {
        assert!(LinkError::Closed.is_fatal());
        assert!(LinkError::NotConnected.is_fatal());
        assert!(!LinkError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(!LinkError::Malformed("x".into()).is_fatal());
    }

    #[test]
    fn test_link_error_display() {
        let err: LinkError = ProtocolError::ContentTooLong { len: 300, max: 252 }.into();
        assert!(err.to_string().contains("Content too long"));
    }
}
