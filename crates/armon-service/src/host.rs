//! 服务宿主
//!
//! 固定的服务集合：先启动发布服务再启动设备生命周期服务；
//! 关闭时逆序：先停止周期动作并断开设备，最后停止发布。
//! 单个服务失败只记录日志，不影响其余服务。

use crate::error::ServiceError;
use crate::local::{LinkFactory, LocalService};
use crate::publisher::Publisher;
use armon_store::RecordStore;
use std::sync::Arc;
use tracing::{error, info};

/// 可启停的服务
pub trait Service {
    fn name(&self) -> &str;

    fn start(&self) -> Result<(), ServiceError>;

    fn stop(&self);
}

/// 宿主管理的服务
pub enum HostedService<F: LinkFactory, S: RecordStore> {
    Publisher(Arc<Publisher>),
    Local(Arc<LocalService<F, S>>),
}

impl<F: LinkFactory, S: RecordStore> Service for HostedService<F, S> {
    fn name(&self) -> &str {
        match self {
            HostedService::Publisher(service) => service.name(),
            HostedService::Local(service) => service.name(),
        }
    }

    fn start(&self) -> Result<(), ServiceError> {
        match self {
            HostedService::Publisher(service) => service.start(),
            HostedService::Local(service) => service.start(),
        }
    }

    fn stop(&self) {
        match self {
            HostedService::Publisher(service) => service.stop(),
            HostedService::Local(service) => service.stop(),
        }
    }
}

/// 服务宿主
pub struct ServicesHost<F: LinkFactory, S: RecordStore> {
    /// 启动顺序
    services: Vec<HostedService<F, S>>,
}

impl<F: LinkFactory, S: RecordStore> ServicesHost<F, S> {
    pub fn new(publisher: Arc<Publisher>, local: Arc<LocalService<F, S>>) -> Self {
        Self {
            services: vec![HostedService::Publisher(publisher), HostedService::Local(local)],
        }
    }

    pub fn services(&self) -> &[HostedService<F, S>] {
        &self.services
    }

    /// 按顺序启动，返回启动成功的服务数
    pub fn start(&self) -> usize {
        let mut started = 0;
        for service in &self.services {
            match service.start() {
                Ok(()) => {
                    info!("Service '{}' started", service.name());
                    started += 1;
                },
                Err(e) => error!("Failed to start service '{}': {}", service.name(), e),
            }
        }
        started
    }

    /// 逆序停止
    pub fn stop(&self) {
        for service in self.services.iter().rev() {
            service.stop();
            info!("Service '{}' stopped", service.name());
        }
    }
}
