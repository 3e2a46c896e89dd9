//! # Armon Service
//!
//! 网关服务层：设备生命周期管理（存活检查 + 采样）、消息发布与服务宿主。
//!
//! ## 模块
//!
//! - `config`: TOML 网关配置
//! - `periodic`: 可取消的周期动作
//! - `local`: 设备生命周期管理与查询接口
//! - `publisher`: 消息队列与发布线程
//! - `tcp_sink`: TCP 发布通道
//! - `host`: 固定服务集合的启动 / 关闭顺序

pub mod config;
mod error;
pub mod host;
pub mod local;
pub mod periodic;
pub mod publisher;
pub mod tcp_sink;

pub use config::{GatewayConfig, LifecycleSettings};
pub use error::ServiceError;
pub use host::{HostedService, Service, ServicesHost};
pub use local::{
    DEVICE_TYPE, DefaultLinkFactory, LinkFactory, LocalService, LocalServiceBuilder, Nameplate,
};
pub use periodic::PeriodicTask;
pub use publisher::{
    AnySink, ChannelSink, DASHBOARD_TOPIC, PubMessage, PubSink, Publisher, SinkConfig,
};
pub use tcp_sink::TcpPubSink;
