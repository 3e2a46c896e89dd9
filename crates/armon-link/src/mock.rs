//! 设备模拟器
//!
//! 无硬件依赖的 [`Link`] 实现：解析写入的请求帧并按设备协议生成应答，
//! 可脚本化静默、分块、错误标志、截断与断线，用于传输层、驱动与生命周期测试。
//!
//! `MockLink` 可克隆，克隆体共享同一设备状态，测试代码持有一份句柄即可在
//! 链路被传输层占有后继续操控设备。

use crate::{Link, LinkError};
use armon_protocol::{CommandFlag, Frame, FrameResolver, encode, reply_flag};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 无数据时单次读取的最长等待
const IDLE_POLL: Duration = Duration::from_millis(5);

/// 默认握手应答：固件 V3，硬件 V1R2
pub const DEFAULT_HELLO: [u8; 12] = [0x00, 0x03, 0x02, 0x01, 0, 0, 0, 0, 0, 0, 0, 0];

/// 默认设备时钟：2024-03-17（周日）14:05:09
pub const DEFAULT_CLOCK: [u8; 7] = [24, 3, 17, 0, 14, 5, 9];

struct DeviceState {
    open: bool,
    peer_closed: bool,
    fail_connect: bool,
    connect_count: usize,

    silent: bool,
    chunk_size: Option<usize>,
    truncate_next: Option<usize>,
    flag_override: Option<u8>,
    content_override: Option<Vec<u8>>,

    hello: Vec<u8>,
    clock: Vec<u8>,
    dashboard_value: u32,

    inbound: FrameResolver,
    requests: Vec<Frame>,
    pending: VecDeque<Vec<u8>>,
    reads_served: usize,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            open: false,
            peer_closed: false,
            fail_connect: false,
            connect_count: 0,
            silent: false,
            chunk_size: None,
            truncate_next: None,
            flag_override: None,
            content_override: None,
            hello: DEFAULT_HELLO.to_vec(),
            clock: DEFAULT_CLOCK.to_vec(),
            dashboard_value: 0,
            inbound: FrameResolver::new(),
            requests: Vec::new(),
            pending: VecDeque::new(),
            reads_served: 0,
        }
    }
}

impl DeviceState {
    fn handle_request(&mut self, request: Frame) {
        let content = match self.content_override.clone() {
            Some(content) => content,
            None => self.reply_content(&request),
        };
        let flag = self.flag_override.unwrap_or(reply_flag(request.flag));
        self.requests.push(request);

        if self.silent {
            return;
        }
        let Ok(mut wire) = encode(flag, &content) else {
            return;
        };
        if let Some(keep) = self.truncate_next.take() {
            wire.truncate(keep);
        }

        match self.chunk_size {
            Some(size) if size > 0 => {
                for chunk in wire.chunks(size) {
                    self.pending.push_back(chunk.to_vec());
                }
            },
            _ => self.pending.push_back(wire),
        }
    }

    fn reply_content(&mut self, request: &Frame) -> Vec<u8> {
        match CommandFlag::try_from(request.flag) {
            Ok(CommandFlag::Hello) => self.hello.clone(),
            Ok(CommandFlag::GetTime) => self.clock.clone(),
            Ok(CommandFlag::SetTime) => {
                self.clock = request.content.clone();
                Vec::new()
            },
            Ok(CommandFlag::GetDashboard) => {
                let value = self.dashboard_value;
                self.dashboard_value = self.dashboard_value.wrapping_add(1);
                value.to_be_bytes().to_vec()
            },
            _ => Vec::new(),
        }
    }
}

/// 可脚本化的设备模拟链路
#[derive(Clone, Default)]
pub struct MockLink {
    device: Arc<Mutex<DeviceState>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设备不再应答
    pub fn set_silent(&self, silent: bool) {
        self.device.lock().silent = silent;
    }

    /// 应答按固定大小分块到达（`None` 为整帧）
    pub fn set_chunk_size(&self, size: Option<usize>) {
        self.device.lock().chunk_size = size;
    }

    /// 下一次应答只发送前 `keep` 个字节
    pub fn set_truncate_next(&self, keep: Option<usize>) {
        self.device.lock().truncate_next = keep;
    }

    /// 用固定标志替换应答标志
    pub fn set_reply_flag(&self, flag: Option<u8>) {
        self.device.lock().flag_override = flag;
    }

    /// 用固定内容替换应答内容
    pub fn set_reply_content(&self, content: Option<Vec<u8>>) {
        self.device.lock().content_override = content;
    }

    /// 之后的 `connect()` 失败
    pub fn set_fail_connect(&self, fail: bool) {
        self.device.lock().fail_connect = fail;
    }

    pub fn set_hello(&self, content: Vec<u8>) {
        self.device.lock().hello = content;
    }

    pub fn set_clock(&self, content: Vec<u8>) {
        self.device.lock().clock = content;
    }

    /// 设备时钟当前的原始字节
    pub fn clock(&self) -> Vec<u8> {
        self.device.lock().clock.clone()
    }

    /// 下一次实时数据读取返回的值（之后每次递增 1）
    pub fn set_dashboard_value(&self, value: u32) {
        self.device.lock().dashboard_value = value;
    }

    /// 模拟对端断开：下一次读取返回 `Closed`
    pub fn drop_connection(&self) {
        self.device.lock().peer_closed = true;
    }

    /// 设备侧收到的请求帧
    pub fn requests(&self) -> Vec<Frame> {
        self.device.lock().requests.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.device.lock().connect_count
    }

    /// 已交付的非空读取次数
    pub fn reads_served(&self) -> usize {
        self.device.lock().reads_served
    }

    pub fn is_open(&self) -> bool {
        self.device.lock().open
    }
}

impl Link for MockLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        let mut device = self.device.lock();
        if device.fail_connect {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock device refused connection",
            )));
        }
        if !device.open {
            device.open = true;
            device.peer_closed = false;
            device.connect_count += 1;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut device = self.device.lock();
        device.open = false;
        device.inbound.clear();
        device.pending.clear();
    }

    fn is_connected(&self) -> bool {
        self.device.lock().open
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut device = self.device.lock();
        if !device.open {
            return Err(LinkError::NotConnected);
        }
        if device.peer_closed {
            return Ok(());
        }

        device.inbound.append(bytes);
        if device.inbound.is_complete() {
            let request = device.inbound.try_resolve();
            device.inbound.clear();
            if let Some(request) = request {
                device.handle_request(request);
            }
        }
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError> {
        {
            let mut device = self.device.lock();
            if !device.open {
                return Err(LinkError::NotConnected);
            }
            if device.peer_closed {
                device.open = false;
                device.pending.clear();
                return Err(LinkError::Closed);
            }

            if let Some(mut chunk) = device.pending.pop_front() {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    device.pending.push_front(chunk.split_off(n));
                }
                device.reads_served += 1;
                return Ok(n);
            }
        }

        thread::sleep(timeout.min(IDLE_POLL));
        Ok(0)
    }

    fn describe(&self) -> String {
        "mock://device".to_string()
    }
}
