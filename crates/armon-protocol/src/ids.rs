//! 命令标志定义

use crate::reply_flag;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 报文命令标志
///
/// 应答帧的标志为请求标志置最高位（`flag | 0x80`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandFlag {
    /// 握手
    Hello = 0x01,
    /// 设置设备时间
    SetTime = 0x02,
    /// 读取设备时间
    GetTime = 0x03,
    /// 设置网络参数
    SetNetworkParams = 0x04,
    /// 读取网络参数
    GetNetworkParams = 0x05,
    /// 设置测量参数
    SetParams = 0x06,
    /// 读取测量参数
    GetParams = 0x07,
    /// 设置平滑时间
    SetSmoothingTime = 0x08,
    /// 读取平滑时间
    GetSmoothingTime = 0x09,

    /// 读取实时数据
    GetDashboard = 0x20,

    /// 历史剂量率
    GetHistoryDoseRate = 0x60,
    /// 历史温度
    GetHistoryTemperature = 0x61,
    /// 历史系统错误码
    GetHistorySysErrCode = 0x62,
    /// 历史秒计数
    GetHistorySecondCnt = 0x63,
    /// 历史高压
    GetHistoryHv = 0x64,
    /// 历史湿度
    GetHistoryRh = 0x65,
    /// 历史前端错误码
    GetHistoryFeeErrCode = 0x66,
}

impl CommandFlag {
    /// 对应的应答标志
    pub fn reply(self) -> u8 {
        reply_flag(self.into())
    }

}
