//! 工作状态与驱动监视视图

use armon_link::LinkState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 设备工作状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WorkStatus {
    /// 尚未建立驱动
    #[default]
    Unknown,
    /// 通道关闭
    Disconnected,
    /// 运行正常
    Normal,
    /// 最近一次应答协议不匹配
    Error,
}

impl WorkStatus {
    /// 读取时计算：无驱动 → Unknown；通道关闭 → Disconnected；
    /// 错误标志 → Error；否则 Normal
    pub fn evaluate(monitor: Option<&DriverMonitor>) -> Self {
        match monitor {
            None => WorkStatus::Unknown,
            Some(m) if !m.is_connected() => WorkStatus::Disconnected,
            Some(m) if m.has_error() => WorkStatus::Error,
            Some(_) => WorkStatus::Normal,
        }
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkStatus::Unknown => "unknown",
            WorkStatus::Disconnected => "disconnected",
            WorkStatus::Normal => "normal",
            WorkStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// 驱动只读视图
///
/// 不持有驱动锁即可读取链路状态与错误标志，采样交互进行中也可查询。
#[derive(Debug, Clone)]
pub struct DriverMonitor {
    link: Arc<LinkState>,
    error: Arc<AtomicBool>,
}

impl DriverMonitor {
    pub(crate) fn new(link: Arc<LinkState>, error: Arc<AtomicBool>) -> Self {
        Self { link, error }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn has_error(&self) -> bool {
        self.error.load(Ordering::Acquire)
    }

    /// 链路存活：通道打开且最近一次应答在窗口内
    pub fn is_alive(&self, window: Duration) -> bool {
        self.link.is_alive(window)
    }

    pub fn since_last_alive(&self) -> Option<Duration> {
        self.link.since_last_alive()
    }

    pub fn status(&self) -> WorkStatus {
        WorkStatus::evaluate(Some(self))
    }
}
