//! 消息发布
//!
//! `publish` 把 `(topic, JSON)` 放入无界队列后立即返回，不会阻塞采样线程。
//! 发布线程每当发布通道报告可写时最多发送一条消息；队列为空时短暂休眠。
//!
//! TCP 发布通道上的帧格式：
//!
//! ```text
//! [u32 BE 长度][topic][0x00][payload]
//! ```
//!
//! 长度不含自身 4 字节。

use crate::error::ServiceError;
use crate::host::Service;
use crate::tcp_sink::TcpPubSink;
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 实时数据主题
pub const DASHBOARD_TOPIC: &str = "Dashboard";

/// 队列为空时的休眠时长
const IDLE_SLEEP: Duration = Duration::from_millis(3);

/// 单次等待可写的最长时长（同时决定停止响应速度）
const READY_WAIT: Duration = Duration::from_millis(50);

/// 待发布消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubMessage {
    pub topic: String,
    pub payload: String,
}

impl PubMessage {
    /// 编码为 TCP 帧
    pub fn encode(&self) -> Vec<u8> {
        let body_len = self.topic.len() + 1 + self.payload.len();
        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&(body_len as u32).to_be_bytes());
        buf.extend_from_slice(self.topic.as_bytes());
        buf.push(0);
        buf.extend_from_slice(self.payload.as_bytes());
        buf
    }
}

/// 发布通道
pub trait PubSink: Send + 'static {
    /// 等待通道可写，最多 `timeout`
    fn wait_writable(&mut self, timeout: Duration) -> Result<bool, ServiceError>;

    /// 发送一条消息
    fn send(&mut self, message: &PubMessage) -> Result<(), ServiceError>;

    fn describe(&self) -> String;
}

/// 进程内通道（测试或嵌入使用）
pub struct ChannelSink {
    tx: Sender<PubMessage>,
}

impl ChannelSink {
    pub fn new(tx: Sender<PubMessage>) -> Self {
        Self { tx }
    }
}

impl PubSink for ChannelSink {
    fn wait_writable(&mut self, _timeout: Duration) -> Result<bool, ServiceError> {
        Ok(true)
    }

    fn send(&mut self, message: &PubMessage) -> Result<(), ServiceError> {
        self.tx.send(message.clone()).map_err(|_| {
            ServiceError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "subscriber channel closed",
            ))
        })
    }

    fn describe(&self) -> String {
        "channel".to_string()
    }
}

/// 发布通道配置（启动时打开）
#[derive(Debug, Clone)]
pub enum SinkConfig {
    /// TCP 监听地址
    Tcp { bind: String },
    /// 进程内通道
    Channel(Sender<PubMessage>),
}

impl SinkConfig {
    fn open(&self) -> Result<AnySink, ServiceError> {
        match self {
            SinkConfig::Tcp { bind } => Ok(AnySink::Tcp(TcpPubSink::bind(bind)?)),
            SinkConfig::Channel(tx) => Ok(AnySink::Channel(ChannelSink::new(tx.clone()))),
        }
    }
}

/// 运行期选定的发布通道
pub enum AnySink {
    Tcp(TcpPubSink),
    Channel(ChannelSink),
}

impl AnySink {
    /// TCP 通道的实际监听地址
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            AnySink::Tcp(sink) => Some(sink.local_addr()),
            AnySink::Channel(_) => None,
        }
    }
}

impl PubSink for AnySink {
    fn wait_writable(&mut self, timeout: Duration) -> Result<bool, ServiceError> {
        match self {
            AnySink::Tcp(sink) => sink.wait_writable(timeout),
            AnySink::Channel(sink) => sink.wait_writable(timeout),
        }
    }

    fn send(&mut self, message: &PubMessage) -> Result<(), ServiceError> {
        match self {
            AnySink::Tcp(sink) => sink.send(message),
            AnySink::Channel(sink) => sink.send(message),
        }
    }

    fn describe(&self) -> String {
        match self {
            AnySink::Tcp(sink) => sink.describe(),
            AnySink::Channel(sink) => sink.describe(),
        }
    }
}

/// 消息发布服务
pub struct Publisher {
    sink: SinkConfig,
    queue_tx: Sender<PubMessage>,
    queue_rx: Receiver<PubMessage>,
    running: Arc<AtomicBool>,
    published: Arc<AtomicU64>,
    drain: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Publisher {
    pub fn new(sink: SinkConfig) -> Self {
        let (queue_tx, queue_rx) = unbounded();
        Self {
            sink,
            queue_tx,
            queue_rx,
            running: Arc::new(AtomicBool::new(false)),
            published: Arc::new(AtomicU64::new(0)),
            drain: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// TCP 发布通道的监听地址（运行中且为 TCP 通道时）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// 已发送的消息数
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// 队列中待发送的消息数
    pub fn pending(&self) -> usize {
        self.queue_rx.len()
    }

    /// 发布一条消息
    ///
    /// 空主题、`null` 值或发布服务未运行时记录日志并丢弃，返回 `false`。
    pub fn publish<T: Serialize + ?Sized>(&self, topic: &str, value: &T) -> bool {
        if topic.trim().is_empty() {
            warn!("Can't publish message with empty topic");
            return false;
        }
        let payload = match serde_json::to_value(value) {
            Ok(serde_json::Value::Null) => {
                warn!("Can't publish null message on topic '{}'", topic);
                return false;
            },
            Ok(v) => v.to_string(),
            Err(e) => {
                warn!("Failed to serialize message on topic '{}': {}", topic, e);
                return false;
            },
        };
        if !self.is_running() {
            debug!("Publisher not running, dropping message on '{}'", topic);
            return false;
        }

        let queued = self
            .queue_tx
            .send(PubMessage {
                topic: topic.to_string(),
                payload,
            })
            .is_ok();
        // 入队期间被停止：消息留在队列中，由下一次 start 丢弃
        if queued && !self.is_running() {
            debug!("Publisher stopped while queueing, dropping message on '{}'", topic);
            return false;
        }
        queued
    }
}

impl Service for Publisher {
    fn name(&self) -> &str {
        "publisher"
    }

    fn start(&self) -> Result<(), ServiceError> {
        let mut drain = self.drain.lock();
        if drain.is_some() {
            return Ok(());
        }

        // 停止期间残留的消息不进入新一轮发布
        let stale = self.queue_rx.try_iter().count();
        if stale > 0 {
            debug!("Discarding {} messages queued while stopped", stale);
        }

        let mut sink = self.sink.open()?;
        info!("Publisher bound to {}", sink.describe());
        *self.local_addr.lock() = sink.local_addr();

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let published = Arc::clone(&self.published);
        let queue = self.queue_rx.clone();

        let handle = thread::Builder::new()
            .name("pub_drain".into())
            .spawn(move || drain_loop(&mut sink, &queue, &running, &published))
            .map_err(|source| {
                self.running.store(false, Ordering::Release);
                ServiceError::Spawn {
                    name: "pub_drain".to_string(),
                    source,
                }
            })?;
        *drain = Some(handle);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.local_addr.lock().take();
        if let Some(handle) = self.drain.lock().take() {
            if handle.join().is_err() {
                error!("Publisher drain thread panicked");
            }
            info!(
                "Publisher stopped ({} published, {} dropped)",
                self.published(),
                self.pending()
            );
        }
        // 未发送的消息不跨越重启
        while self.queue_rx.try_recv().is_ok() {}
    }
}

fn drain_loop(
    sink: &mut AnySink,
    queue: &Receiver<PubMessage>,
    running: &AtomicBool,
    published: &AtomicU64,
) {
    while running.load(Ordering::Acquire) {
        match sink.wait_writable(READY_WAIT) {
            Ok(true) => {},
            Ok(false) => continue,
            Err(e) => {
                warn!("Publisher channel error: {}", e);
                thread::sleep(IDLE_SLEEP);
                continue;
            },
        }

        match queue.try_recv() {
            Ok(message) => match sink.send(&message) {
                Ok(()) => {
                    published.fetch_add(1, Ordering::Relaxed);
                    trace!("Published message on '{}'", message.topic);
                },
                Err(e) => error!("Pub message error: {}", e),
            },
            Err(TryRecvError::Empty) => thread::sleep(IDLE_SLEEP),
            Err(TryRecvError::Disconnected) => break,
        }
    }
}
