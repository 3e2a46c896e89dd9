//! 组件装配
//!
//! 所有组件在这里构造一次，通过 `Arc` 共享。

use anyhow::{Context, Result};
use armon_service::config::StorageSection;
use armon_service::{
    DefaultLinkFactory, GatewayConfig, LocalService, Publisher, ServicesHost, SinkConfig,
};
use armon_store::{AnyStore, Dashboard, JsonLinesStore, MemoryStore, ObjectCache};
use std::sync::Arc;
use tracing::{info, warn};

pub type GatewayService = LocalService<DefaultLinkFactory, AnyStore>;

/// 装配完成的网关
pub struct Gateway {
    pub publisher: Arc<Publisher>,
    pub local: Arc<GatewayService>,
    pub host: ServicesHost<DefaultLinkFactory, AnyStore>,
}

/// 按配置打开持久层
pub fn open_store(storage: &StorageSection) -> Result<AnyStore> {
    if storage.in_memory {
        info!("Using in-memory record store");
        return Ok(AnyStore::Memory(MemoryStore::new()));
    }
    let store = JsonLinesStore::open(&storage.path).with_context(|| {
        format!(
            "Failed to open record store at {}",
            storage.path.display()
        )
    })?;
    info!("Using record store at {}", storage.path.display());
    Ok(AnyStore::JsonLines(store))
}

impl Gateway {
    pub fn build(config: &GatewayConfig) -> Result<Self> {
        let store = Arc::new(open_store(&config.storage)?);

        let dashboards: Arc<ObjectCache<Dashboard, AnyStore>> =
            Arc::new(ObjectCache::new(Arc::clone(&store)));
        match dashboards.warm_up() {
            Ok(n) => info!("Dashboard cache warmed up with {} records", n),
            Err(e) => warn!("Failed to warm up dashboard cache: {}", e),
        }

        let publisher = Arc::new(Publisher::new(SinkConfig::Tcp {
            bind: config.publisher.bind.clone(),
        }));

        let local = Arc::new(
            LocalService::builder(DefaultLinkFactory, dashboards)
                .name(config.service.name.clone())
                .publisher(Arc::clone(&publisher))
                .settings(config.lifecycle.settings())
                .default_config(config.device.to_service_config())
                .build(),
        );

        let host = ServicesHost::new(Arc::clone(&publisher), Arc::clone(&local));
        Ok(Self {
            publisher,
            local,
            host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armon_service::Service;

    fn test_config(dir: &std::path::Path) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.storage.path = dir.join("records");
        config.publisher.bind = "127.0.0.1:0".to_string();
        // 本机不可达地址
        config.device.address = "127.0.0.1:9".to_string();
        config
    }

    #[test]
    fn test_open_store_backends() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageSection {
            path: dir.path().join("records"),
            in_memory: false,
        };
        assert!(matches!(open_store(&storage).unwrap(), AnyStore::JsonLines(_)));
        assert!(dir.path().join("records").is_dir());

        storage.in_memory = true;
        assert!(matches!(open_store(&storage).unwrap(), AnyStore::Memory(_)));
    }

    #[test]
    fn test_build_and_host_without_device() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Gateway::build(&test_config(dir.path())).unwrap();

        assert_eq!(gateway.host.start(), 2);
        assert!(gateway.publisher.local_addr().is_some());
        assert_eq!(gateway.local.name(), "armon-gateway");
        assert_eq!(gateway.local.config().address, "127.0.0.1:9");

        gateway.host.stop();
        assert!(!gateway.publisher.is_running());
        assert!(!gateway.local.is_running());
    }
}
