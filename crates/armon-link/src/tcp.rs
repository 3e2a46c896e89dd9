//! TCP 流链路

use crate::{Link, LinkError};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, info, trace};

/// 建立连接的默认超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// `set_read_timeout` 不接受零时长
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// 到固定地址的 TCP 流
pub struct TcpLink {
    address: SocketAddr,
    stream: Option<TcpStream>,
}

impl TcpLink {
    /// 创建链路（不建立连接）
    ///
    /// # 错误
    /// - `LinkError::InvalidSettings`: 地址无法解析为 `ip:port`
    pub fn new(address: &str) -> Result<Self, LinkError> {
        let address = address.trim().parse::<SocketAddr>().map_err(|e| {
            LinkError::InvalidSettings(format!("invalid tcp address '{}': {}", address, e))
        })?;
        Ok(Self {
            address,
            stream: None,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

impl Link for TcpLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = TcpStream::connect_timeout(&self.address, DEFAULT_CONNECT_TIMEOUT)?;
        stream.set_nodelay(true)?;
        info!("TCP link connected to {}", self.address);
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            info!("TCP link to {} closed", self.address);
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
        if let Err(e) = stream.write_all(bytes).and_then(|_| stream.flush()) {
            debug!("TCP write to {} failed: {}", self.address, e);
            self.stream = None;
            return Err(e.into());
        }
        trace!("TCP TX {} bytes", bytes.len());
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError> {
        let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
        stream.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        match stream.read(buf) {
            Ok(0) => {
                debug!("TCP peer {} closed the stream", self.address);
                self.stream = None;
                Err(LinkError::Closed)
            },
            Ok(n) => {
                trace!("TCP RX {} bytes", n);
                Ok(n)
            },
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                self.stream = None;
                Err(e.into())
            },
        }
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}
