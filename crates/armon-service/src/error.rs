//! 服务层错误类型定义

use armon_link::LinkError;
use armon_store::StoreError;
use thiserror::Error;

/// 服务层错误类型
#[derive(Error, Debug)]
pub enum ServiceError {
    /// 配置不合法，当前配置保持生效
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 配置文件读取 / 解析失败
    #[error("Failed to load config file {path}: {message}")]
    ConfigFile { path: String, message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 工作线程创建失败
    #[error("Failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
