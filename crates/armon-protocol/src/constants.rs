//! 协议常量定义

/// 帧起始标记
pub const START_MARKER: u8 = b's';

/// 帧结束标记
pub const END_MARKER: u8 = b't';

/// 校验字节占位值
///
/// 线路格式保留了校验位，但设备端与本端均不计算也不校验，
/// 调用方不能依赖它判断完整性。
pub const CHECKSUM_SENTINEL: u8 = 0xA5;

/// 长度字节 + 标志字节 + 校验字节
pub const FRAME_OVERHEAD: usize = 3;

/// 声明长度只占一个字节
pub const MAX_WIRE_LEN: usize = u8::MAX as usize;

/// 单帧最大内容长度
pub const MAX_CONTENT_LEN: usize = MAX_WIRE_LEN - FRAME_OVERHEAD;

/// 最短完整帧：起止标记 + 3 字节（6 个十六进制字符）
pub const MIN_ENCODED_LEN: usize = 2 + 2 * FRAME_OVERHEAD;

/// 应答标志位
pub const REPLY_BIT: u8 = 0x80;

/// 由请求标志计算应答标志
pub const fn reply_flag(request_flag: u8) -> u8 {
    request_flag | REPLY_BIT
}
