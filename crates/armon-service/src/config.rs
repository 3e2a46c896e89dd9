//! 网关配置（TOML）
//!
//! 启动时加载一次，每个键都有默认值，缺失的段落或键按默认值补全。
//!
//! ```toml
//! [service]
//! name = "armon-gateway"
//!
//! [device]
//! link = "serial"
//! port_name = "/dev/ttyUSB0"
//! baud_rate = 19200
//!
//! [lifecycle]
//! liveness_period_secs = 10
//!
//! [publisher]
//! bind = "0.0.0.0:5555"
//!
//! [storage]
//! path = "data/records"
//! in_memory = false
//! ```

use crate::error::ServiceError;
use armon_link::LinkKind;
use armon_store::ServiceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 网关配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub service: ServiceSection,
    pub device: DeviceSection,
    pub lifecycle: LifecycleSection,
    pub publisher: PublisherSection,
    pub storage: StorageSection,
}

/// 服务标识
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// 外部查询接口端口
    pub http_port: u16,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "armon-gateway".to_string(),
            display_name: "Armon Gateway".to_string(),
            description: "Armon measurement device gateway".to_string(),
            http_port: 8085,
        }
    }
}

/// 默认设备线路（仅首次启动、尚无持久化配置时使用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub link: LinkKind,
    pub address: String,
    pub port_name: String,
    pub baud_rate: u32,
    pub device_name: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        let defaults = ServiceConfig::default();
        Self {
            link: defaults.link,
            address: defaults.address,
            port_name: defaults.port_name,
            baud_rate: defaults.baud_rate,
            device_name: defaults.device_name,
        }
    }
}

impl DeviceSection {
    /// 转换为待持久化的线路配置
    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig {
            link: self.link,
            address: self.address.clone(),
            port_name: self.port_name.clone(),
            baud_rate: self.baud_rate,
            device_name: self.device_name.clone(),
            ..ServiceConfig::default()
        }
    }
}

/// 周期动作参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSection {
    pub liveness_period_secs: u64,
    pub sampling_period_secs: u64,
    pub alive_window_secs: u64,
    pub receive_timeout_ms: u64,
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            liveness_period_secs: 10,
            sampling_period_secs: 2,
            alive_window_secs: 30,
            receive_timeout_ms: 1000,
        }
    }
}

impl LifecycleSection {
    pub fn settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            liveness_period: Duration::from_secs(self.liveness_period_secs),
            sampling_period: Duration::from_secs(self.sampling_period_secs),
            alive_window: Duration::from_secs(self.alive_window_secs),
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
        }
    }
}

/// 生命周期管理的运行参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// 存活检查周期
    pub liveness_period: Duration,
    /// 采样周期
    pub sampling_period: Duration,
    /// 存活窗口
    pub alive_window: Duration,
    /// 单次交互接收预算
    pub receive_timeout: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        LifecycleSection::default().settings()
    }
}

/// 发布端参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSection {
    pub bind: String,
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5555".to_string(),
        }
    }
}

/// 持久层参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// JSON Lines 目录
    pub path: PathBuf,
    /// 使用进程内存储（忽略 `path`）
    pub in_memory: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/records"),
            in_memory: false,
        }
    }
}

impl GatewayConfig {
    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ServiceError::ConfigFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            ServiceError::InvalidConfig(message) => ServiceError::ConfigFile {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// 从 TOML 文本解析并校验
    pub fn from_toml(text: &str) -> Result<Self, ServiceError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ServiceError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        let l = &self.lifecycle;
        if l.liveness_period_secs == 0 || l.sampling_period_secs == 0 {
            return Err(ServiceError::InvalidConfig(
                "periods must be at least one second".to_string(),
            ));
        }
        if l.receive_timeout_ms == 0 {
            return Err(ServiceError::InvalidConfig(
                "receive timeout must be non-zero".to_string(),
            ));
        }
        if self.publisher.bind.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "publisher bind address is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = GatewayConfig::from_toml("").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.device.address, "169.254.6.100:27011");
        assert_eq!(config.device.baud_rate, 19200);
        assert_eq!(config.publisher.bind, "0.0.0.0:5555");
        assert_eq!(config.service.http_port, 8085);

        let settings = config.lifecycle.settings();
        assert_eq!(settings.liveness_period, Duration::from_secs(10));
        assert_eq!(settings.sampling_period, Duration::from_secs(2));
        assert_eq!(settings.alive_window, Duration::from_secs(30));
        assert_eq!(settings.receive_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_partial_sections() {
        let config = GatewayConfig::from_toml(
            r#"
            [device]
            link = "serial"
            port_name = "/dev/ttyS3"

            [lifecycle]
            sampling_period_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.device.link, LinkKind::Serial);
        assert_eq!(config.device.port_name, "/dev/ttyS3");
        assert_eq!(config.device.baud_rate, 19200);
        assert_eq!(config.lifecycle.sampling_period_secs, 5);
        assert_eq!(config.lifecycle.liveness_period_secs, 10);

        let record = config.device.to_service_config();
        assert_eq!(record.link, LinkKind::Serial);
        assert!(record.meta.record_id.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(GatewayConfig::from_toml("[lifecycle]\nsampling_period_secs = 0").is_err());
        assert!(GatewayConfig::from_toml("[device]\nlink = \"can\"").is_err());
        assert!(GatewayConfig::from_toml("[publisher]\nbind = \"\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[storage]\npath = \"/var/lib/armon\"\n").unwrap();

        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/armon"));
        assert!(!config.storage.in_memory);

        let missing = GatewayConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ServiceError::ConfigFile { .. })));
    }
}
