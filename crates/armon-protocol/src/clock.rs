//! 设备时钟负载编解码
//!
//! 设备使用两种固定布局：
//!
//! | 布局 | 字节 |
//! |------|------|
//! | 7 字节 | `[yy, MM, dd, weekday, hh, mm, ss]` |
//! | 6 字节 | `[yy, MM, dd, hh, mm, ss]` |
//!
//! `yy` 为年份对 100 取模，解码时按 `2000 + yy` 还原；`weekday` 以周日为 0，
//! 解码时忽略。

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// 7 字节布局长度
pub const CLOCK7_LEN: usize = 7;

/// 6 字节布局长度
pub const CLOCK6_LEN: usize = 6;

/// 编码为 7 字节布局（含星期）
pub fn encode_clock7(time: &NaiveDateTime) -> [u8; CLOCK7_LEN] {
    [
        year_byte(time),
        time.month() as u8,
        time.day() as u8,
        time.weekday().num_days_from_sunday() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    ]
}

/// 编码为 6 字节布局（不含星期）
pub fn encode_clock6(time: &NaiveDateTime) -> [u8; CLOCK6_LEN] {
    [
        year_byte(time),
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    ]
}

/// 解码 7 字节布局
///
/// 负载短于 7 字节或日期非法时返回 `None`（未设置），不会 panic。
pub fn decode_clock7(bytes: &[u8]) -> Option<NaiveDateTime> {
    if bytes.len() < CLOCK7_LEN {
        return None;
    }
    // bytes[3] 为星期，由日期推导，不参与还原
    build(bytes[0], bytes[1], bytes[2], bytes[4], bytes[5], bytes[6])
}

/// 解码 6 字节布局
///
/// 负载短于 6 字节或日期非法时返回 `None`（未设置）。
pub fn decode_clock6(bytes: &[u8]) -> Option<NaiveDateTime> {
    if bytes.len() < CLOCK6_LEN {
        return None;
    }
    build(bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5])
}

fn year_byte(time: &NaiveDateTime) -> u8 {
    time.year().rem_euclid(100) as u8
}

fn build(yy: u8, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2000 + yy as i32, month as u32, day as u32)?.and_hms_opt(
        hour as u32,
        minute as u32,
        second as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 17)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_encode_clock7() {
        // 2024-03-17 是星期日
        assert_eq!(encode_clock7(&sample()), [24, 3, 17, 0, 14, 5, 9]);
    }

    #[test]
    fn test_encode_clock6() {
        assert_eq!(encode_clock6(&sample()), [24, 3, 17, 14, 5, 9]);
    }

    #[test]
    fn test_decode_clock7_roundtrip() {
        let bytes = encode_clock7(&sample());
        assert_eq!(decode_clock7(&bytes), Some(sample()));
    }

    #[test]
    fn test_decode_clock7_ignores_weekday() {
        let bytes = [24, 3, 17, 5, 14, 5, 9];
        assert_eq!(decode_clock7(&bytes), Some(sample()));
    }

    #[test]
    fn test_decode_clock6_roundtrip() {
        let bytes = encode_clock6(&sample());
        assert_eq!(decode_clock6(&bytes), Some(sample()));
    }

    #[test]
    fn test_decode_short_payload_is_unset() {
        assert_eq!(decode_clock7(&[24, 3, 17, 0, 14, 5]), None);
        assert_eq!(decode_clock6(&[24, 3, 17]), None);
        assert_eq!(decode_clock7(&[]), None);
    }

    #[test]
    fn test_decode_invalid_date_is_unset() {
        assert_eq!(decode_clock6(&[24, 13, 1, 0, 0, 0]), None);
        assert_eq!(decode_clock6(&[23, 2, 29, 0, 0, 0]), None);
        assert_eq!(decode_clock7(&[24, 1, 1, 1, 24, 0, 0]), None);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = encode_clock7(&sample()).to_vec();
        bytes.push(0xFF);
        assert_eq!(decode_clock7(&bytes), Some(sample()));
    }
}
