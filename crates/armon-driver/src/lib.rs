//! # Armon Driver
//!
//! 设备协议驱动：握手、读写时钟、读取实时数据，以及供生命周期管理使用的
//! 工作状态与只读监视视图。

mod builder;
mod driver;
mod error;
pub mod status;

pub use builder::{DEFAULT_ADDRESS, DriverBuilder};
pub use driver::{
    DASHBOARD_REPLY_LEN, DeviceIdentity, HELLO_REPLY_LEN, ProtocolDriver, validate_reply,
};
pub use error::DriverError;
pub use status::{DriverMonitor, WorkStatus};
