//! 请求/应答传输
//!
//! 每次 `send` 完成一次完整交互：编码 → 写出 → 在接收预算内逐块读取并喂给
//! 解析器 → 解析出一帧或超时。解析器在交互前后都会被清空。
//! 内部不重试，恢复由上层的存活检查负责。

use crate::{Frame, Link, LinkError, LinkState};
use armon_protocol::FrameResolver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 默认接收预算
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

const READ_CHUNK_SIZE: usize = 512;

/// 单通道传输
pub struct Transport<L: Link> {
    link: L,
    resolver: FrameResolver,
    state: Arc<LinkState>,
    receive_timeout: Duration,
}

impl<L: Link> Transport<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            resolver: FrameResolver::new(),
            state: Arc::new(LinkState::new()),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    /// 设置接收预算
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    /// 链路状态只读视图
    pub fn state(&self) -> Arc<LinkState> {
        Arc::clone(&self.state)
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn connect(&mut self) -> Result<(), LinkError> {
        self.resolver.clear();
        let result = self.link.connect();
        self.sync_state();
        if let Err(e) = &result {
            warn!("Failed to connect {}: {}", self.link.describe(), e);
        }
        result
    }

    pub fn disconnect(&mut self) {
        self.link.disconnect();
        self.resolver.clear();
        self.sync_state();
    }

    /// 通道是否打开（与是否收到过应答无关）
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// 发送请求并等待应答
    ///
    /// # 错误
    /// - `LinkError::Protocol`: 请求无法编码（未触碰通道）
    /// - `LinkError::NotConnected`: 通道未打开
    /// - `LinkError::Timeout`: 接收预算耗尽
    /// - `LinkError::Malformed`: 长度匹配但内容无法还原
    /// - 其它: 底层 IO 失败，通道随之关闭
    pub fn send(&mut self, request: &Frame) -> Result<Frame, LinkError> {
        let wire = request.encode()?;
        if !self.link.is_connected() {
            self.sync_state();
            return Err(LinkError::NotConnected);
        }

        self.resolver.clear();
        let result = self.exchange(&wire);
        self.resolver.clear();
        if let Err(e) = &result
            && e.is_fatal()
        {
            warn!("Link {} failed, closing: {}", self.link.describe(), e);
            self.link.disconnect();
        }
        self.sync_state();

        match &result {
            Ok(reply) => {
                self.state.mark_alive();
                trace!(
                    "Exchange 0x{:02X} -> 0x{:02X} ({} bytes)",
                    request.flag,
                    reply.flag,
                    reply.content_len()
                );
            },
            Err(e) => debug!("Exchange 0x{:02X} failed: {}", request.flag, e),
        }
        result
    }

    fn exchange(&mut self, wire: &[u8]) -> Result<Frame, LinkError> {
        self.link.write_all(wire)?;

        let deadline = Instant::now() + self.receive_timeout;
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LinkError::Timeout(self.receive_timeout));
            }

            let n = self.link.read_chunk(&mut chunk, remaining)?;
            if n == 0 {
                continue;
            }
            self.resolver.append(&chunk[..n]);

            if self.resolver.is_complete() {
                return self.resolver.try_resolve().ok_or_else(|| {
                    LinkError::Malformed(format!("{} bytes not decodable", self.resolver.len()))
                });
            }
        }
    }

    fn sync_state(&self) {
        self.state.set_connected(self.link.is_connected());
    }
}

impl<L: Link> Drop for Transport<L> {
    fn drop(&mut self) {
        self.link.disconnect();
        self.state.set_connected(false);
    }
}
