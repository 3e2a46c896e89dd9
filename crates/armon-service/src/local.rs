//! 设备生命周期管理
//!
//! 持有驱动、当前线路配置与两个周期动作：
//!
//! - **存活检查**：链路断开或超过存活窗口没有应答时执行 stop → start
//! - **采样**：读取实时数据 → 写入缓存 → 发布到 `Dashboard` 主题
//!
//! 工作状态在读取时由 [`DriverMonitor`] 计算，不需要驱动锁。
//!
//! # 锁
//!
//! - `control`：串行化 start / stop / 重配置；存活检查只 `try_lock`
//! - `driver`：串行化设备交互（采样、读写时钟）
//!
//! 获取顺序固定为 `control` → `driver`；采样线程从不获取 `control`。

use crate::config::LifecycleSettings;
use crate::error::ServiceError;
use crate::host::Service;
use crate::periodic::PeriodicTask;
use crate::publisher::{DASHBOARD_TOPIC, Publisher};
use arc_swap::{ArcSwap, ArcSwapOption};
use armon_driver::{DeviceIdentity, DriverBuilder, DriverMonitor, ProtocolDriver, WorkStatus};
use armon_link::{AnyLink, Link, LinkError};
use armon_store::{Dashboard, ObjectCache, RecordQuery, RecordStore, ServiceConfig};
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// 铭牌中的设备类型
pub const DEVICE_TYPE: &str = "Demo";

/// 按线路配置构造链路
pub trait LinkFactory: Send + Sync + 'static {
    type Link: Link + 'static;

    fn create(&self, config: &ServiceConfig) -> Result<Self::Link, LinkError>;
}

/// TCP / 串口链路工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLinkFactory;

impl LinkFactory for DefaultLinkFactory {
    type Link = AnyLink;

    fn create(&self, config: &ServiceConfig) -> Result<AnyLink, LinkError> {
        AnyLink::build(
            config.link,
            &config.address,
            &config.port_name,
            config.baud_rate,
        )
    }
}

/// 设备铭牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nameplate {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,
    /// 网关软件版本
    pub version: String,
}

/// 生命周期管理服务构造器
pub struct LocalServiceBuilder<F: LinkFactory, S: RecordStore> {
    name: String,
    factory: F,
    dashboards: Arc<ObjectCache<Dashboard, S>>,
    publisher: Option<Arc<Publisher>>,
    settings: LifecycleSettings,
    defaults: ServiceConfig,
}

impl<F: LinkFactory, S: RecordStore> LocalServiceBuilder<F, S> {
    /// 服务名（同时作为铭牌中的设备 ID）
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn publisher(mut self, publisher: Arc<Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn settings(mut self, settings: LifecycleSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 尚无持久化配置时使用的默认线路配置
    pub fn default_config(mut self, config: ServiceConfig) -> Self {
        self.defaults = config;
        self
    }

    pub fn build(self) -> LocalService<F, S> {
        LocalService {
            inner: Arc::new(Inner {
                name: self.name,
                factory: self.factory,
                dashboards: self.dashboards,
                publisher: self.publisher,
                settings: self.settings,
                defaults: self.defaults,
                driver: Mutex::new(None),
                monitor: ArcSwapOption::empty(),
                identity: ArcSwap::from_pointee(DeviceIdentity::default()),
                config: ArcSwapOption::empty(),
                tasks: Mutex::new(Vec::new()),
                control: Mutex::new(()),
            }),
        }
    }
}

/// 设备生命周期管理服务
pub struct LocalService<F: LinkFactory, S: RecordStore> {
    inner: Arc<Inner<F, S>>,
}

struct Inner<F: LinkFactory, S: RecordStore> {
    name: String,
    factory: F,
    dashboards: Arc<ObjectCache<Dashboard, S>>,
    publisher: Option<Arc<Publisher>>,
    settings: LifecycleSettings,
    defaults: ServiceConfig,
    driver: Mutex<Option<ProtocolDriver<F::Link>>>,
    monitor: ArcSwapOption<DriverMonitor>,
    identity: ArcSwap<DeviceIdentity>,
    /// 当前生效的线路配置（首次启动时从持久层加载）
    config: ArcSwapOption<ServiceConfig>,
    tasks: Mutex<Vec<PeriodicTask>>,
    control: Mutex<()>,
}

impl<F: LinkFactory, S: RecordStore> LocalService<F, S> {
    pub fn builder(
        factory: F,
        dashboards: Arc<ObjectCache<Dashboard, S>>,
    ) -> LocalServiceBuilder<F, S> {
        LocalServiceBuilder {
            name: "armon-gateway".to_string(),
            factory,
            dashboards,
            publisher: None,
            settings: LifecycleSettings::default(),
            defaults: ServiceConfig::default(),
        }
    }

    /// 当前工作状态
    pub fn status(&self) -> WorkStatus {
        let monitor = self.inner.monitor.load();
        WorkStatus::evaluate(monitor.as_deref())
    }

    /// 周期动作是否在运行
    pub fn is_running(&self) -> bool {
        !self.inner.tasks.lock().is_empty()
    }

    /// 读取设备时钟
    pub fn get_clock(&self) -> Option<NaiveDateTime> {
        self.inner.driver.lock().as_mut()?.get_clock()
    }

    /// 设置设备时钟
    pub fn set_clock(&self, time: &NaiveDateTime) -> bool {
        match self.inner.driver.lock().as_mut() {
            Some(driver) => driver.set_clock(time),
            None => false,
        }
    }

    /// 最近一次采样记录
    pub fn snapshot(&self) -> Option<Dashboard> {
        self.inner.dashboards.latest()
    }

    /// 实时数据记录查询（缓存优先）
    pub fn dashboards(&self, query: &RecordQuery) -> Result<Vec<Dashboard>, ServiceError> {
        Ok(self.inner.dashboards.query(query)?)
    }

    /// 当前线路配置（尚未启动时为默认配置）
    pub fn config(&self) -> ServiceConfig {
        match self.inner.config.load_full() {
            Some(config) => (*config).clone(),
            None => self.inner.defaults.clone(),
        }
    }

    /// 重配置：校验 → 持久化 → 替换 → stop → start
    ///
    /// 校验失败时返回 [`ServiceError::InvalidConfig`]，当前配置保持生效。
    pub fn set_config(&self, config: ServiceConfig) -> Result<ServiceConfig, ServiceError> {
        config.validate().map_err(ServiceError::InvalidConfig)?;

        let _control = self.inner.control.lock();
        let saved = self.inner.dashboards.store().insert(config.detached())?;
        self.inner.config.store(Some(Arc::new(saved.clone())));
        info!(
            "Service config replaced ({} {} / {})",
            saved.link, saved.address, saved.port_name
        );

        self.inner.stop_locked();
        self.inner.start_locked()?;
        Ok(saved)
    }

    /// 设备铭牌
    pub fn nameplate(&self) -> Nameplate {
        let identity = self.inner.identity.load();
        Nameplate {
            device_id: self.inner.name.clone(),
            device_name: self.config().device_name,
            device_type: DEVICE_TYPE.to_string(),
            firmware_version: identity.firmware_version.clone(),
            hardware_version: identity.hardware_version.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 立即执行一次存活检查
    pub fn check_liveness(&self) {
        self.inner.check_liveness();
    }

    /// 立即执行一次采样
    pub fn sample(&self) {
        self.inner.sample();
    }
}

impl<F: LinkFactory, S: RecordStore> Service for LocalService<F, S> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn start(&self) -> Result<(), ServiceError> {
        let _control = self.inner.control.lock();
        if !self.inner.tasks.lock().is_empty() {
            return Ok(());
        }
        self.inner.start_locked()
    }

    fn stop(&self) {
        let _control = self.inner.control.lock();
        self.inner.stop_locked();
    }
}

impl<F: LinkFactory, S: RecordStore> Drop for LocalService<F, S> {
    fn drop(&mut self) {
        self.inner.stop_locked();
    }
}

impl<F: LinkFactory, S: RecordStore> Inner<F, S> {
    /// 持有 `control` 时调用
    fn start_locked(self: &Arc<Self>) -> Result<(), ServiceError> {
        let config = match self.config.load_full() {
            Some(config) => config,
            None => {
                let loaded = Arc::new(self.load_config()?);
                self.config.store(Some(Arc::clone(&loaded)));
                loaded
            },
        };

        // 先释放旧链路（串口独占）
        drop(self.driver.lock().take());

        let link = self.factory.create(&config)?;
        let mut driver = DriverBuilder::new()
            .receive_timeout(self.settings.receive_timeout)
            .build_with(link);
        let monitor = driver.monitor();

        match driver.connect() {
            Ok(()) => {
                if driver.hello() {
                    self.identity.store(Arc::new(driver.identity().clone()));
                } else {
                    warn!("Handshake failed, liveness check will retry");
                }
            },
            Err(e) => warn!("Failed to connect to device: {}", e),
        }

        *self.driver.lock() = Some(driver);
        self.monitor.store(Some(Arc::new(monitor)));

        let liveness = {
            let weak = Arc::downgrade(self);
            PeriodicTask::spawn("liveness", self.settings.liveness_period, move || {
                if let Some(inner) = Weak::upgrade(&weak) {
                    inner.check_liveness();
                }
            })?
        };
        let sampling = {
            let weak = Arc::downgrade(self);
            PeriodicTask::spawn("sampling", self.settings.sampling_period, move || {
                if let Some(inner) = Weak::upgrade(&weak) {
                    inner.sample();
                }
            })?
        };
        self.tasks.lock().extend([liveness, sampling]);

        info!(
            "Local service started ({} link, {})",
            config.link,
            WorkStatus::evaluate(self.monitor.load().as_deref())
        );
        Ok(())
    }

    /// 持有 `control` 时调用（或在析构中）
    fn stop_locked(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let was_running = !tasks.is_empty();
        for task in tasks {
            task.cancel_and_join();
        }

        if let Some(driver) = self.driver.lock().as_mut() {
            driver.disconnect();
        }
        if was_running {
            info!("Local service stopped");
        }
    }

    /// 最新一条持久化配置；没有则创建并持久化默认配置
    fn load_config(&self) -> Result<ServiceConfig, ServiceError> {
        let store = self.dashboards.store();
        let newest: Vec<ServiceConfig> = store.query(&RecordQuery::new().limit(1))?;
        match newest.into_iter().next() {
            Some(config) => {
                debug!("Loaded service config {:?}", config.meta.record_id);
                Ok(config)
            },
            None => {
                let saved = store.insert(self.defaults.detached())?;
                info!("Created default service config");
                Ok(saved)
            },
        }
    }

    fn check_liveness(self: &Arc<Self>) {
        let (alive, since) = match self.monitor.load().as_deref() {
            Some(monitor) => (
                monitor.is_alive(self.settings.alive_window),
                monitor.since_last_alive(),
            ),
            None => (false, None),
        };
        if alive {
            return;
        }

        // start / stop / 重配置进行中，留给下一次检查
        let Some(_control) = self.control.try_lock() else {
            debug!("Lifecycle busy, skipping liveness restart");
            return;
        };
        match since {
            Some(elapsed) => warn!("Device not alive for {:?}, restarting", elapsed),
            None => warn!("Device not alive, restarting"),
        }

        self.stop_locked();
        if let Err(e) = self.start_locked() {
            error!("Failed to restart local service: {}", e);
        }
    }

    fn sample(&self) {
        let value = match self.driver.lock().as_mut() {
            Some(driver) => driver.read_dashboard(),
            None => return,
        };
        let Some(value) = value else {
            debug!("Dashboard read failed, skipping sample");
            return;
        };

        let record = match self.dashboards.insert(Dashboard::new(value)) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to store dashboard sample: {}", e);
                Dashboard::new(value)
            },
        };
        if let Some(publisher) = &self.publisher {
            publisher.publish(DASHBOARD_TOPIC, &record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armon_link::MockLink;
    use armon_store::MemoryStore;

    struct MockFactory {
        device: MockLink,
    }

    impl LinkFactory for MockFactory {
        type Link = MockLink;

        fn create(&self, _config: &ServiceConfig) -> Result<MockLink, LinkError> {
            Ok(self.device.clone())
        }
    }

    fn service() -> (LocalService<MockFactory, MemoryStore>, MockLink) {
        let device = MockLink::new();
        let cache = Arc::new(ObjectCache::new(Arc::new(MemoryStore::new())));
        let service = LocalService::builder(
            MockFactory {
                device: device.clone(),
            },
            cache,
        )
        .name("test-gateway")
        .build();
        (service, device)
    }

    #[test]
    fn test_status_unknown_before_start() {
        let (service, _device) = service();
        assert_eq!(service.status(), WorkStatus::Unknown);
        assert!(service.get_clock().is_none());
        assert!(service.snapshot().is_none());
        assert_eq!(service.config(), ServiceConfig::default());
    }

    #[test]
    fn test_start_and_stop() {
        let (service, _device) = service();
        service.start().unwrap();
        assert!(service.is_running());
        assert_eq!(service.status(), WorkStatus::Normal);

        let nameplate = service.nameplate();
        assert_eq!(nameplate.device_id, "test-gateway");
        assert_eq!(nameplate.device_type, DEVICE_TYPE);
        assert_eq!(nameplate.firmware_version.as_deref(), Some("V3"));
        assert_eq!(nameplate.hardware_version.as_deref(), Some("V1R2"));

        service.stop();
        assert!(!service.is_running());
        assert_eq!(service.status(), WorkStatus::Disconnected);
    }

    #[test]
    fn test_sample_stores_record() {
        let (service, device) = service();
        device.set_dashboard_value(41);
        service.start().unwrap();

        service.sample();
        let latest = service.snapshot().unwrap();
        assert!(latest.value >= 41);
        assert!(latest.meta.record_id.is_some());
        service.stop();
    }

    #[test]
    fn test_invalid_config_keeps_current() {
        let (service, _device) = service();
        service.start().unwrap();
        let before = service.config();

        let bad = ServiceConfig {
            address: "nowhere".to_string(),
            ..ServiceConfig::default()
        };
        assert!(matches!(
            service.set_config(bad),
            Err(ServiceError::InvalidConfig(_))
        ));
        assert_eq!(service.config(), before);
        service.stop();
    }

    #[test]
    fn test_nameplate_serializes_camel_case() {
        let (service, _device) = service();
        let json = serde_json::to_value(service.nameplate()).unwrap();
        assert_eq!(json["deviceId"], "test-gateway");
        assert_eq!(json["deviceName"], "Demo");
        assert!(json["firmwareVersion"].is_null());
    }
}
