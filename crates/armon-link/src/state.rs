//! 链路状态
//!
//! 由 [`Transport`](crate::Transport) 独占写入，生命周期管理通过 `Arc` 只读访问。
//!
//! 时间戳采用以进程启动为锚点的单调时钟（微秒），存放在 `AtomicU64` 中，
//! 不受系统时钟调整影响。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

/// 从未收到过应答
const NEVER: u64 = u64::MAX;

fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// 链路存活判定
///
/// 通道打开且距最近一次成功解析的应答不超过 `window` 时为存活。
/// 从未收到应答（`since_last_alive == None`）视为不存活。
pub fn is_link_alive(connected: bool, since_last_alive: Option<Duration>, window: Duration) -> bool {
    connected && matches!(since_last_alive, Some(elapsed) if elapsed <= window)
}

/// 链路状态 `{connected, lastAliveAt}`
#[derive(Debug)]
pub struct LinkState {
    connected: AtomicBool,
    last_alive: AtomicU64,
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkState {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            last_alive: AtomicU64::new(NEVER),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// 记录一次成功解析的应答
    pub(crate) fn mark_alive(&self) {
        self.last_alive.store(monotonic_micros(), Ordering::Release);
    }

    /// 距最近一次应答的时长，从未收到应答时为 `None`
    pub fn since_last_alive(&self) -> Option<Duration> {
        let last = self.last_alive.load(Ordering::Acquire);
        if last == NEVER {
            return None;
        }
        Some(Duration::from_micros(monotonic_micros().saturating_sub(last)))
    }

    /// 按存活窗口判定
    pub fn is_alive(&self, window: Duration) -> bool {
        is_link_alive(self.is_connected(), self.since_last_alive(), window)
    }
}
