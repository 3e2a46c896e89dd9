//! 报文解析器
//!
//! 单帧累加器：把分块到达的原始字节重新拼装为完整帧。
//!
//! 完整性判定与发送方写入的长度字段耦合：只有当缓冲区字节数恰好等于
//! `2 + 2 × 声明长度` 时才认为完整，截断或粘连的帧在长度匹配前一律不解析。
//!
//! 解析器只检查缓冲区头部的起始标记，不会跳过起始标记前的垃圾字节，
//! 错位输入需由调用方 `clear()`。

use crate::{END_MARKER, FRAME_OVERHEAD, Frame, MIN_ENCODED_LEN, START_MARKER};
use bytes::BytesMut;

/// 报文解析器
///
/// 由一个传输实例独占，每次交互开始前与结束后（成功或超时）都必须清空，
/// 避免上一次交互的残留字节污染下一次。
#[derive(Debug, Default)]
pub struct FrameResolver {
    buf: BytesMut,
}

impl FrameResolver {
    /// 创建空解析器
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(2 * u8::MAX as usize + 2),
        }
    }

    /// 追加原始字节，空输入直接忽略
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// 已累积字节数
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// 缓冲区是否为空
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 清空缓冲区
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// 起始标记后两个十六进制字符给出的声明长度
    fn declared_length(&self) -> Option<usize> {
        if self.buf.len() < 3 || self.buf[0] != START_MARKER {
            return None;
        }
        let mut byte = [0u8; 1];
        hex::decode_to_slice(&self.buf[1..3], &mut byte).ok()?;
        Some(byte[0] as usize)
    }

    /// 缓冲区是否恰好包含一个完整帧
    pub fn is_complete(&self) -> bool {
        let len = self.buf.len();
        if len < MIN_ENCODED_LEN || self.buf[len - 1] != END_MARKER {
            return false;
        }
        matches!(self.declared_length(), Some(declared) if len == 2 + 2 * declared)
    }

    /// 尝试解析
    ///
    /// 未完整时返回 `None`；完整时把标记之间的每对十六进制字符还原为字节，
    /// byte[1] 为标志，byte[2..] 截取声明的内容长度。缓冲区保持不变，
    /// 调用方负责随后 `clear()`。
    pub fn try_resolve(&self) -> Option<Frame> {
        if !self.is_complete() {
            return None;
        }

        let len = self.buf.len();
        let raw = hex::decode(&self.buf[1..len - 1]).ok()?;
        let declared = raw[0] as usize;
        if declared < FRAME_OVERHEAD || raw.len() < declared {
            return None;
        }

        let content_len = declared - FRAME_OVERHEAD;
        Some(Frame {
            flag: raw[1],
            content: raw[2..2 + content_len].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;

    /// 12 字节握手应答
    fn hello_reply() -> Vec<u8> {
        encode(0x81, &[0x00, 0x03, 0x02, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap()
    }

    #[test]
    fn test_empty_resolver_is_incomplete() {
        let resolver = FrameResolver::new();
        assert!(resolver.is_empty());
        assert!(!resolver.is_complete());
        assert!(resolver.try_resolve().is_none());
    }

    #[test]
    fn test_append_ignores_empty_input() {
        let mut resolver = FrameResolver::new();
        resolver.append(&[]);
        assert_eq!(resolver.len(), 0);
    }

    #[test]
    fn test_resolve_single_chunk() {
        let mut resolver = FrameResolver::new();
        resolver.append(&hello_reply());
        assert!(resolver.is_complete());

        let frame = resolver.try_resolve().unwrap();
        assert_eq!(frame.flag, 0x81);
        assert_eq!(frame.content.len(), 12);
        assert_eq!(frame.content[1], 0x03);
    }

    #[test]
    fn test_resolve_two_chunks() {
        let wire = hello_reply();
        let (head, tail) = wire.split_at(11);

        let mut resolver = FrameResolver::new();
        resolver.append(head);
        assert!(!resolver.is_complete());
        resolver.append(tail);
        assert!(resolver.is_complete());
        assert_eq!(resolver.try_resolve().unwrap().content.len(), 12);
    }

    #[test]
    fn test_empty_content_frame() {
        let mut resolver = FrameResolver::new();
        resolver.append(b"s0382A5t");
        let frame = resolver.try_resolve().unwrap();
        assert_eq!(frame.flag, 0x82);
        assert!(frame.content.is_empty());
    }

    #[test]
    fn test_lowercase_hex_accepted() {
        let mut resolver = FrameResolver::new();
        resolver.append(b"s04a0ffa5t");
        let frame = resolver.try_resolve().unwrap();
        assert_eq!(frame.flag, 0xA0);
        assert_eq!(frame.content, vec![0xFF]);
    }

    #[test]
    fn test_concatenated_frames_rejected() {
        let mut resolver = FrameResolver::new();
        resolver.append(b"s0381A5t");
        resolver.append(b"s0381A5t");
        // 长度不再等于 2 + 2 * 3
        assert!(!resolver.is_complete());
        assert!(resolver.try_resolve().is_none());
    }

    #[test]
    fn test_leading_garbage_not_trimmed() {
        let mut resolver = FrameResolver::new();
        resolver.append(b"xx");
        resolver.append(b"s0381A5t");
        assert!(!resolver.is_complete());

        resolver.clear();
        resolver.append(b"s0381A5t");
        assert!(resolver.is_complete());
    }

    #[test]
    fn test_wrong_end_marker() {
        let mut resolver = FrameResolver::new();
        resolver.append(b"s0381A5x");
        assert!(!resolver.is_complete());
    }

    #[test]
    fn test_invalid_length_digits() {
        let mut resolver = FrameResolver::new();
        resolver.append(b"sZZ81A5t");
        assert!(!resolver.is_complete());
    }

    #[test]
    fn test_invalid_body_hex_not_resolved() {
        let mut resolver = FrameResolver::new();
        resolver.append(b"s03G1A5t");
        // 长度匹配但内容无法还原
        assert!(resolver.is_complete());
        assert!(resolver.try_resolve().is_none());
    }

    #[test]
    fn test_clear_resets_buffer() {
        let mut resolver = FrameResolver::new();
        resolver.append(&hello_reply());
        resolver.clear();
        assert!(resolver.is_empty());
        assert!(!resolver.is_complete());
    }
}
