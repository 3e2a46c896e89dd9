//! 协议驱动
//!
//! 在 [`Transport`] 之上实现设备命令：握手、读写时钟、读取实时数据。
//! 每个应答都会校验两点：
//!
//! 1. 应答标志 == 请求标志 | 0x80
//! 2. 内容长度符合该命令的固定形状
//!
//! 校验失败或没有应答时，对应操作返回 `false` / `None` 并记录日志，
//! 不会 panic，也不会把错误抛给调用方。

use crate::error::DriverError;
use crate::status::DriverMonitor;
use armon_link::{Link, Transport};
use armon_protocol::{
    CLOCK7_LEN, CommandFlag, Frame, ProtocolError, decode_clock7, encode_clock7,
};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// 握手应答内容长度
pub const HELLO_REPLY_LEN: usize = 12;

/// 实时数据应答内容长度（大端 u32）
pub const DASHBOARD_REPLY_LEN: usize = 4;

/// 设备身份信息（握手获得）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIdentity {
    /// 固件版本，如 `V3`
    pub firmware_version: Option<String>,
    /// 硬件版本，如 `V1R2`
    pub hardware_version: Option<String>,
}

impl DeviceIdentity {
    /// 从 12 字节握手应答解析
    ///
    /// 固件版本 = `V{c[1]}`，硬件版本 = `V{c[3]}R{c[2]}`。
    pub fn from_hello(content: &[u8]) -> Option<Self> {
        if content.len() != HELLO_REPLY_LEN {
            return None;
        }
        Some(Self {
            firmware_version: Some(format!("V{}", content[1])),
            hardware_version: Some(format!("V{}R{}", content[3], content[2])),
        })
    }
}

/// 协议驱动
pub struct ProtocolDriver<L: Link> {
    transport: Transport<L>,
    identity: DeviceIdentity,
    error: Arc<AtomicBool>,
}

impl<L: Link> ProtocolDriver<L> {
    pub fn new(transport: Transport<L>) -> Self {
        Self {
            transport,
            identity: DeviceIdentity::default(),
            error: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 只读监视视图
    pub fn monitor(&self) -> DriverMonitor {
        DriverMonitor::new(self.transport.state(), Arc::clone(&self.error))
    }

    pub fn connect(&mut self) -> Result<(), DriverError> {
        self.transport.connect()?;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn has_error(&self) -> bool {
        self.error.load(Ordering::Acquire)
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn link(&self) -> &L {
        self.transport.link()
    }

    /// 握手
    ///
    /// 成功时更新固件 / 硬件版本。
    pub fn hello(&mut self) -> bool {
        match self.request(CommandFlag::Hello, Vec::new(), HELLO_REPLY_LEN) {
            Ok(content) => match DeviceIdentity::from_hello(&content) {
                Some(identity) => {
                    info!(
                        "Device handshake ok: firmware {}, hardware {}",
                        identity.firmware_version.as_deref().unwrap_or("-"),
                        identity.hardware_version.as_deref().unwrap_or("-")
                    );
                    self.identity = identity;
                    true
                },
                None => false,
            },
            Err(e) => {
                warn!("Device handshake failed: {}", e);
                false
            },
        }
    }

    /// 读取设备时钟
    ///
    /// 时钟未设置（无法组成合法日期）视为失败。
    pub fn get_clock(&mut self) -> Option<NaiveDateTime> {
        let content = match self.request(CommandFlag::GetTime, Vec::new(), CLOCK7_LEN) {
            Ok(content) => content,
            Err(e) => {
                warn!("Read device clock failed: {}", e);
                return None;
            },
        };
        let time = decode_clock7(&content);
        if time.is_none() {
            warn!("Device clock is unset: {:02X?}", content);
        }
        time
    }

    /// 设置设备时钟
    pub fn set_clock(&mut self, time: &NaiveDateTime) -> bool {
        let content = encode_clock7(time).to_vec();
        match self.request(CommandFlag::SetTime, content, 0) {
            Ok(_) => {
                info!("Device clock set to {}", time);
                true
            },
            Err(e) => {
                warn!("Set device clock failed: {}", e);
                false
            },
        }
    }

    /// 读取实时数据（大端 u32）
    ///
    /// 失败时返回 `None`，不会返回部分填充的值。
    pub fn read_dashboard(&mut self) -> Option<u32> {
        match self.request(CommandFlag::GetDashboard, Vec::new(), DASHBOARD_REPLY_LEN) {
            Ok(content) => {
                let value = u32::from_be_bytes([content[0], content[1], content[2], content[3]]);
                debug!("Dashboard value {}", value);
                Some(value)
            },
            Err(e) => {
                warn!("Read dashboard failed: {}", e);
                None
            },
        }
    }

    /// 一次完整交互并校验应答
    ///
    /// 协议不匹配置位错误标志；合法应答清除错误标志；链路失败不改变标志。
    fn request(
        &mut self,
        flag: CommandFlag,
        content: Vec<u8>,
        expected_len: usize,
    ) -> Result<Vec<u8>, DriverError> {
        let request = Frame::new(flag, content);
        let reply = self.transport.send(&request)?;

        match validate_reply(flag, expected_len, &reply) {
            Ok(()) => {
                self.error.store(false, Ordering::Release);
                Ok(reply.content)
            },
            Err(e) => {
                self.error.store(true, Ordering::Release);
                Err(e.into())
            },
        }
    }
}

/// 校验应答标志与内容长度
pub fn validate_reply(
    request: CommandFlag,
    expected_len: usize,
    reply: &Frame,
) -> Result<(), ProtocolError> {
    if !reply.is_reply_to(request.into()) {
        return Err(ProtocolError::UnexpectedFlag {
            expected: request.reply(),
            actual: reply.flag,
        });
    }
    if reply.content_len() != expected_len {
        return Err(ProtocolError::InvalidLength {
            expected: expected_len,
            actual: reply.content_len(),
        });
    }
    Ok(())
}
