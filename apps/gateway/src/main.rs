//! Armon 网关主入口
//!
//! 加载配置 → 装配组件 → 启动服务宿主 → 等待 Ctrl+C → 按关闭顺序停止。

mod gateway;

use anyhow::{Context, Result};
use armon_service::GatewayConfig;
use clap::Parser;
use gateway::Gateway;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Armon 设备网关
///
/// 维持与测量设备的链路，周期采样实时数据，写入最近记录缓存并通过 TCP 发布
#[derive(Parser, Debug)]
#[command(name = "armon-gateway")]
#[command(about = "Armon device gateway - sampling, recent-record cache and pub/sub", long_about = None)]
struct Args {
    /// 配置文件路径（TOML）
    ///
    /// 不指定时所有参数使用默认值
    #[arg(long)]
    config: Option<PathBuf>,

    /// 发布端监听地址（覆盖配置文件）
    ///
    /// 格式: IP:PORT (例如: 0.0.0.0:5555)
    #[arg(long)]
    publisher_bind: Option<String>,

    /// 使用进程内存储（覆盖配置文件）
    #[arg(long)]
    in_memory: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("armon=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.publisher_bind {
        config.publisher.bind = bind;
    }
    if args.in_memory {
        config.storage.in_memory = true;
    }
    config.validate()?;

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("Failed to set signal handler")?;

    let gateway = Gateway::build(&config)?;

    info!(
        "{} starting ({} link, publisher {})",
        config.service.display_name, config.device.link, config.publisher.bind
    );
    let started = gateway.host.start();
    info!(
        "{} of {} services started, press Ctrl+C to stop",
        started,
        gateway.host.services().len()
    );
    if let Some(addr) = gateway.publisher.local_addr() {
        info!("Subscribers connect to {}", addr);
    }

    // 发送端随 handler 常驻，recv 仅在收到信号时返回
    let _ = shutdown_rx.recv();
    info!("Received interrupt signal, shutting down");

    gateway.host.stop();
    info!(
        "{} stopped (status {})",
        config.service.display_name,
        gateway.local.status()
    );
    Ok(())
}
