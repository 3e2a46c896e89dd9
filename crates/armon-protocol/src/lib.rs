//! # Armon Protocol
//!
//! Armon 测量设备串行协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 帧标记、校验占位字节等协议常量
//! - `ids`: 命令标志定义
//! - `resolver`: 字节流 → 完整帧的增量解析器
//! - `clock`: 设备时钟负载编解码
//!
//! ## 线路格式
//!
//! ```text
//! 's' hex(len) hex(flag) hex(content)... hex(0xA5) 't'
//! ```
//!
//! 每个原始字节以两个大写十六进制字符表示，`len = 3 + content.len()`。

pub mod clock;
pub mod constants;
pub mod ids;
pub mod resolver;

pub use clock::*;
pub use constants::*;
pub use ids::*;
pub use resolver::FrameResolver;

use thiserror::Error;

/// 协议帧
///
/// 协议层与传输层之间的中间抽象。每次交互构造一个请求帧，立即序列化，
/// 交互完成后即丢弃。
///
/// # 示例
///
/// ```rust
/// use armon_protocol::{CommandFlag, Frame};
///
/// let frame = Frame::request(CommandFlag::Hello);
/// assert_eq!(frame.encode().unwrap(), b"s0301A5t".to_vec());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// 命令标志（应答 = 请求 | 0x80）
    pub flag: u8,

    /// 帧内容（可为空）
    pub content: Vec<u8>,
}

impl Frame {
    /// 创建帧
    pub fn new(flag: impl Into<u8>, content: Vec<u8>) -> Self {
        Self {
            flag: flag.into(),
            content,
        }
    }

    /// 创建无内容的请求帧
    pub fn request(flag: CommandFlag) -> Self {
        Self::new(flag, Vec::new())
    }

    /// 内容长度
    pub fn content_len(&self) -> usize {
        self.content.len()
    }

    /// 帧声明长度（长度字节 + 标志字节 + 内容 + 校验字节）
    pub fn wire_len(&self) -> usize {
        FRAME_OVERHEAD + self.content.len()
    }

    /// 是否为指定请求标志的应答
    pub fn is_reply_to(&self, request_flag: u8) -> bool {
        self.flag == reply_flag(request_flag)
    }

    /// 序列化为线路字节
    ///
    /// # 错误
    /// - `ProtocolError::ContentTooLong`: 声明长度超过单字节范围
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self.flag, &self.content)
    }
}

/// 序列化一帧
///
/// 构造 `[totalLength, flag, content..., CHECKSUM_SENTINEL]`，逐字节转为两个
/// 大写十六进制字符，再用起止标记包裹。
///
/// 校验字节是固定占位值，接收端不校验，线路完整性未经验证。
pub fn encode(flag: u8, content: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if content.len() > MAX_CONTENT_LEN {
        return Err(ProtocolError::ContentTooLong {
            len: content.len(),
            max: MAX_CONTENT_LEN,
        });
    }

    let mut raw = Vec::with_capacity(FRAME_OVERHEAD + content.len());
    raw.push((FRAME_OVERHEAD + content.len()) as u8);
    raw.push(flag);
    raw.extend_from_slice(content);
    raw.push(CHECKSUM_SENTINEL);

    let hex = hex::encode_upper(&raw);
    let mut wire = Vec::with_capacity(hex.len() + 2);
    wire.push(START_MARKER);
    wire.extend_from_slice(hex.as_bytes());
    wire.push(END_MARKER);
    Ok(wire)
}

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Content too long: {len} bytes (max {max})")]
    ContentTooLong { len: usize, max: usize },

    #[error("Invalid content length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unexpected reply flag: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedFlag { expected: u8, actual: u8 },

    #[error("Unknown command flag: 0x{0:02X}")]
    UnknownFlag(u8),

    #[error("Malformed frame: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_request() {
        let wire = encode(0x01, &[]).unwrap();
        assert_eq!(wire, b"s0301A5t");
    }

    #[test]
    fn test_encode_with_content() {
        let wire = encode(0x02, &[0x19, 0x0A, 0xFF]).unwrap();
        assert_eq!(wire, b"s0602190AFFA5t");
        // 长度字段与线路长度一致：2 + 2 * 6
        assert_eq!(wire.len(), 14);
    }

    #[test]
    fn test_encode_uppercase_hex() {
        let wire = encode(0xAB, &[0xcd]).unwrap();
        let text = std::str::from_utf8(&wire).unwrap();
        assert_eq!(text, "s04ABCDA5t");
    }

    #[test]
    fn test_encode_max_content() {
        let content = vec![0u8; MAX_CONTENT_LEN];
        let wire = encode(0x20, &content).unwrap();
        assert_eq!(wire.len(), 2 + 2 * 255);
        assert_eq!(&wire[1..3], b"FF");
    }

    #[test]
    fn test_encode_rejects_oversized_content() {
        let content = vec![0u8; MAX_CONTENT_LEN + 1];
        let err = encode(0x20, &content).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ContentTooLong {
                len: MAX_CONTENT_LEN + 1,
                max: MAX_CONTENT_LEN
            }
        );
    }

    #[test]
    fn test_frame_reply_flag() {
        let reply = Frame::new(0x81u8, vec![]);
        assert!(reply.is_reply_to(0x01));
        assert!(!reply.is_reply_to(0x02));

        let echoed = Frame::new(0x01u8, vec![]);
        assert!(!echoed.is_reply_to(0x01));
    }

    #[test]
    fn test_frame_lengths() {
        let frame = Frame::new(CommandFlag::SetTime, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(frame.content_len(), 7);
        assert_eq!(frame.wire_len(), 10);
        assert_eq!(frame.flag, 0x02);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::UnexpectedFlag {
            expected: 0x81,
            actual: 0x01,
        };
        assert_eq!(
            err.to_string(),
            "Unexpected reply flag: expected 0x81, got 0x01"
        );

        let err = ProtocolError::InvalidLength {
            expected: 12,
            actual: 4,
        };
        assert!(err.to_string().contains("expected 12, got 4"));
    }
}
