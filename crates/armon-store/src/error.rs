//! 存储层错误类型定义

use thiserror::Error;

/// 存储层错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 记录类型没有该时间字段
    #[error("Unknown field '{field}' for record type {kind}")]
    UnknownField { kind: &'static str, field: String },

    /// 排序表达式无法解析
    #[error("Invalid order spec: {0}")]
    InvalidOrder(String),

    /// 后端拒绝写入
    #[error("Store rejected record: {0}")]
    Rejected(String),
}
