//! 串口链路（8N1，无流控）

use crate::{Link, LinkError};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace};

/// 设备默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 19200;

const OPEN_TIMEOUT: Duration = Duration::from_millis(10);

/// 固定波特率串口
pub struct SerialLink {
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLink {
    /// 创建链路（不打开端口）
    ///
    /// # 错误
    /// - `LinkError::InvalidSettings`: 端口名为空或波特率为 0
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self, LinkError> {
        let port_name = port_name.trim();
        if port_name.is_empty() {
            return Err(LinkError::InvalidSettings(
                "serial port name is empty".to_string(),
            ));
        }
        if baud_rate == 0 {
            return Err(LinkError::InvalidSettings(
                "serial baud rate must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            port_name: port_name.to_string(),
            baud_rate,
            port: None,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Link for SerialLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(OPEN_TIMEOUT)
            .open()?;
        info!(
            "Opened serial port: {} at {} baud",
            self.port_name, self.baud_rate
        );
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            info!("Serial port {} closed", self.port_name);
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        if let Err(e) = port.write_all(bytes).and_then(|_| port.flush()) {
            debug!("Serial write to {} failed: {}", self.port_name, e);
            self.port = None;
            return Err(e.into());
        }
        trace!("Serial TX {} bytes", bytes.len());
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        port.set_timeout(timeout)?;

        match port.read(buf) {
            Ok(n) => {
                if n > 0 {
                    trace!("Serial RX {} bytes", n);
                }
                Ok(n)
            },
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                self.port = None;
                Err(e.into())
            },
        }
    }

    fn describe(&self) -> String {
        format!("serial://{}@{}", self.port_name, self.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_validation() {
        assert!(SerialLink::new("  ", DEFAULT_BAUD_RATE).is_err());
        assert!(SerialLink::new("/dev/ttyUSB0", 0).is_err());

        let link = SerialLink::new("/dev/ttyUSB0", DEFAULT_BAUD_RATE).unwrap();
        assert_eq!(link.port_name(), "/dev/ttyUSB0");
        assert_eq!(link.baud_rate(), 19200);
        assert!(!link.is_connected());
        assert_eq!(link.describe(), "serial:///dev/ttyUSB0@19200");
    }

    #[test]
    fn test_open_missing_port_fails() {
        let mut link = SerialLink::new("/dev/armon-does-not-exist", DEFAULT_BAUD_RATE).unwrap();
        assert!(link.connect().is_err());
        assert!(!link.is_connected());
    }

    #[test]
    fn test_io_without_port() {
        let mut link = SerialLink::new("/dev/ttyUSB0", DEFAULT_BAUD_RATE).unwrap();
        assert!(matches!(link.write_all(b"x"), Err(LinkError::NotConnected)));
    }
}
