//! 记录类型

use crate::entity::{Entity, RecordMeta};
use armon_link::LinkKind;
use serde::{Deserialize, Serialize};

/// 实时数据采样
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub value: u32,
}

impl Dashboard {
    pub fn new(value: u32) -> Self {
        Self {
            meta: RecordMeta::default(),
            value,
        }
    }
}

impl Entity for Dashboard {
    const KIND: &'static str = "dashboard";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

/// 设备线路配置（持久化，最新一条生效）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub link: LinkKind,
    pub address: String,
    pub port_name: String,
    pub baud_rate: u32,
    #[serde(default)]
    pub device_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            meta: RecordMeta::default(),
            link: LinkKind::Tcp,
            address: "169.254.6.100:27011".to_string(),
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: 19200,
            device_name: "Demo".to_string(),
        }
    }
}

impl ServiceConfig {
    /// 校验线路设置
    ///
    /// 串口需要非空端口名与非零波特率；TCP 需要可解析的 `ip:port`。
    pub fn validate(&self) -> Result<(), String> {
        match self.link {
            LinkKind::Serial => {
                if self.port_name.trim().is_empty() {
                    return Err("serial port name is empty".to_string());
                }
                if self.baud_rate == 0 {
                    return Err("baud rate must be non-zero".to_string());
                }
            },
            LinkKind::Tcp => {
                if self.address.trim().parse::<std::net::SocketAddr>().is_err() {
                    return Err(format!("invalid tcp address '{}'", self.address));
                }
            },
        }
        Ok(())
    }

    /// 复制线路设置，丢弃元数据（用于另存为新记录）
    pub fn detached(&self) -> Self {
        Self {
            meta: RecordMeta::default(),
            ..self.clone()
        }
    }
}

impl Entity for ServiceConfig {
    const KIND: &'static str = "service_config";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
