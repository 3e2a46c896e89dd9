//! 生命周期管理集成测试（模拟设备）

use armon_driver::WorkStatus;
use armon_link::{LinkError, MockLink};
use armon_service::{
    DASHBOARD_TOPIC, LifecycleSettings, LinkFactory, LocalService, PubMessage, Publisher, Service,
    ServicesHost, SinkConfig,
};
use armon_store::{Dashboard, MemoryStore, ObjectCache, RecordQuery, RecordStore, ServiceConfig};
use crossbeam_channel::{Receiver, unbounded};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct MockFactory {
    device: MockLink,
}

impl LinkFactory for MockFactory {
    type Link = MockLink;

    fn create(&self, _config: &ServiceConfig) -> Result<MockLink, LinkError> {
        Ok(self.device.clone())
    }
}

fn settings(liveness_ms: u64, sampling_ms: u64, window_ms: u64) -> LifecycleSettings {
    LifecycleSettings {
        liveness_period: Duration::from_millis(liveness_ms),
        sampling_period: Duration::from_millis(sampling_ms),
        alive_window: Duration::from_millis(window_ms),
        receive_timeout: Duration::from_millis(200),
    }
}

fn local_service(
    device: &MockLink,
    store: &Arc<MemoryStore>,
    settings: LifecycleSettings,
    publisher: Option<Arc<Publisher>>,
) -> LocalService<MockFactory, MemoryStore> {
    let cache = Arc::new(ObjectCache::new(Arc::clone(store)));
    let mut builder = LocalService::builder(
        MockFactory {
            device: device.clone(),
        },
        cache,
    )
    .settings(settings);
    if let Some(publisher) = publisher {
        builder = builder.publisher(publisher);
    }
    builder.build()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn channel_publisher() -> (Arc<Publisher>, Receiver<PubMessage>) {
    let (tx, rx) = unbounded();
    (Arc::new(Publisher::new(SinkConfig::Channel(tx))), rx)
}

#[test]
fn test_sampling_publishes_dashboard() {
    let device = MockLink::new();
    device.set_dashboard_value(100);
    let store = Arc::new(MemoryStore::new());
    let (publisher, rx) = channel_publisher();
    publisher.start().unwrap();

    let service = local_service(
        &device,
        &store,
        settings(10_000, 30, 30_000),
        Some(Arc::clone(&publisher)),
    );
    service.start().unwrap();

    let message = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(message.topic, DASHBOARD_TOPIC);
    let payload: serde_json::Value = serde_json::from_str(&message.payload).unwrap();
    assert!(payload["value"].as_u64().unwrap() >= 100);
    assert!(payload["recordId"].is_string());
    assert!(payload["createdAt"].is_string());

    service.stop();
    publisher.stop();

    let stored: Vec<Dashboard> = store.query(&RecordQuery::new().limit(100)).unwrap();
    let latest = service.snapshot().unwrap();
    assert!(
        stored
            .iter()
            .any(|d| d.meta.record_id == latest.meta.record_id)
    );
}

#[test]
fn test_restart_after_connection_loss() {
    let device = MockLink::new();
    let store = Arc::new(MemoryStore::new());
    let service = local_service(&device, &store, settings(30, 60_000, 30_000), None);
    service.start().unwrap();
    assert_eq!(device.connect_count(), 1);

    device.drop_connection();
    // 下一次交互发现通道关闭
    service.sample();

    assert!(
        wait_until(Duration::from_secs(2), || device.connect_count() >= 2),
        "liveness check never restarted the link"
    );
    assert!(wait_until(Duration::from_secs(2), || {
        service.status() == WorkStatus::Normal
    }));
    service.stop();
}

#[test]
fn test_restart_when_replies_go_stale() {
    let device = MockLink::new();
    let store = Arc::new(MemoryStore::new());
    let service = local_service(&device, &store, settings(30, 60_000, 80), None);
    service.start().unwrap();

    assert!(
        wait_until(Duration::from_secs(2), || device.connect_count() >= 2),
        "stale link was never restarted"
    );
    service.stop();
    assert_eq!(service.status(), WorkStatus::Disconnected);
}

#[test]
fn test_error_status_on_protocol_mismatch() {
    let device = MockLink::new();
    let store = Arc::new(MemoryStore::new());
    let service = local_service(&device, &store, settings(10_000, 60_000, 30_000), None);
    service.start().unwrap();
    assert_eq!(service.status(), WorkStatus::Normal);

    // 应答标志未置 0x80
    device.set_reply_flag(Some(0x20));
    service.sample();
    assert_eq!(service.status(), WorkStatus::Error);
    assert!(service.snapshot().is_none());

    device.set_reply_flag(None);
    service.sample();
    assert_eq!(service.status(), WorkStatus::Normal);
    assert!(service.snapshot().is_some());
    service.stop();
}

#[test]
fn test_default_config_persisted_once() {
    let device = MockLink::new();
    let store = Arc::new(MemoryStore::new());

    let first = local_service(&device, &store, settings(10_000, 60_000, 30_000), None);
    first.start().unwrap();
    first.stop();
    let configs: Vec<ServiceConfig> = store.query(&RecordQuery::new()).unwrap();
    assert_eq!(configs.len(), 1);
    assert!(configs[0].meta.record_id.is_some());

    let second = local_service(&device, &store, settings(10_000, 60_000, 30_000), None);
    second.start().unwrap();
    assert_eq!(second.config(), configs[0]);
    second.stop();
    let configs: Vec<ServiceConfig> = store.query(&RecordQuery::new()).unwrap();
    assert_eq!(configs.len(), 1);
}

#[test]
fn test_set_config_persists_and_restarts() {
    let device = MockLink::new();
    let store = Arc::new(MemoryStore::new());
    let service = local_service(&device, &store, settings(10_000, 60_000, 30_000), None);
    service.start().unwrap();

    let saved = service
        .set_config(ServiceConfig {
            address: "10.0.0.7:27011".to_string(),
            device_name: "Line 2".to_string(),
            ..ServiceConfig::default()
        })
        .unwrap();
    assert!(saved.meta.record_id.is_some());
    assert_eq!(service.config(), saved);
    assert_eq!(service.nameplate().device_name, "Line 2");
    assert_eq!(device.connect_count(), 2);
    assert!(service.is_running());

    let configs: Vec<ServiceConfig> = store.query(&RecordQuery::new()).unwrap();
    assert_eq!(configs.len(), 2);
    service.stop();
}

#[test]
fn test_reconfiguration_survives_restart() {
    let device = MockLink::new();
    let store = Arc::new(MemoryStore::new());

    // 默认配置与新配置在同一秒内写入
    let first = local_service(&device, &store, settings(10_000, 60_000, 30_000), None);
    first.start().unwrap();
    let saved = first
        .set_config(ServiceConfig {
            device_name: "Line 2".to_string(),
            ..ServiceConfig::default()
        })
        .unwrap();
    first.stop();
    drop(first);

    let restarted = local_service(&device, &store, settings(10_000, 60_000, 30_000), None);
    restarted.start().unwrap();
    assert_eq!(restarted.config(), saved);
    assert_eq!(restarted.nameplate().device_name, "Line 2");
    restarted.stop();
}

#[test]
fn test_clock_round_trip() {
    let device = MockLink::new();
    let store = Arc::new(MemoryStore::new());
    let service = local_service(&device, &store, settings(10_000, 60_000, 30_000), None);
    service.start().unwrap();

    let time = chrono::NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(8, 30, 15)
        .unwrap();
    assert!(service.set_clock(&time));
    assert_eq!(service.get_clock(), Some(time));
    service.stop();
}

#[test]
fn test_host_start_and_shutdown_order() {
    let device = MockLink::new();
    let store = Arc::new(MemoryStore::new());
    let (publisher, _rx) = channel_publisher();
    let local = Arc::new(local_service(
        &device,
        &store,
        settings(10_000, 60_000, 30_000),
        Some(Arc::clone(&publisher)),
    ));

    let host = ServicesHost::new(Arc::clone(&publisher), Arc::clone(&local));
    let names: Vec<&str> = host.services().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["publisher", "armon-gateway"]);

    assert_eq!(host.start(), 2);
    assert!(publisher.is_running());
    assert!(local.is_running());

    host.stop();
    assert!(!local.is_running());
    assert!(!publisher.is_running());
    assert!(!device.is_open());
}
