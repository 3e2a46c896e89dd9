//! Builder 模式实现
//!
//! 提供链式构造 `ProtocolDriver` 实例的便捷方式。

use crate::driver::ProtocolDriver;
use crate::error::DriverError;
use armon_link::{AnyLink, DEFAULT_RECEIVE_TIMEOUT, Link, LinkKind, Transport};
use std::time::Duration;

/// 默认 TCP 设备地址
pub const DEFAULT_ADDRESS: &str = "169.254.6.100:27011";

/// Driver Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use armon_driver::DriverBuilder;
/// use armon_link::LinkKind;
///
/// let mut driver = DriverBuilder::new()
///     .link_kind(LinkKind::Serial)
///     .port_name("/dev/ttyUSB0")
///     .baud_rate(19200)
///     .build()
///     .unwrap();
/// driver.connect().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DriverBuilder {
    link_kind: LinkKind,
    address: String,
    port_name: String,
    baud_rate: u32,
    receive_timeout: Duration,
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self {
            link_kind: LinkKind::Tcp,
            address: DEFAULT_ADDRESS.to_string(),
            port_name: String::new(),
            baud_rate: armon_link::serial::DEFAULT_BAUD_RATE,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    /// 链路类型（默认 TCP）
    pub fn link_kind(mut self, kind: LinkKind) -> Self {
        self.link_kind = kind;
        self
    }

    /// TCP 设备地址
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// 串口名称
    pub fn port_name(mut self, port_name: impl Into<String>) -> Self {
        self.port_name = port_name.into();
        self
    }

    /// 串口波特率（默认 19200）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// 单次交互的接收预算（默认 1 秒）
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// 按配置构造 TCP / 串口驱动（不连接）
    pub fn build(self) -> Result<ProtocolDriver<AnyLink>, DriverError> {
        let link = AnyLink::build(
            self.link_kind,
            &self.address,
            &self.port_name,
            self.baud_rate,
        )?;
        Ok(self.build_with(link))
    }

    /// 使用给定链路构造驱动（不连接）
    pub fn build_with<L: Link>(self, link: L) -> ProtocolDriver<L> {
        let transport = Transport::new(link).with_receive_timeout(self.receive_timeout);
        ProtocolDriver::new(transport)
    }
}
