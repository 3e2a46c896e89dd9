//! 可取消的周期动作
//!
//! 每个周期动作独占一个命名线程，`select!` 同时等待节拍与取消信号，
//! 取消信号在每个迭代边界检查：进行中的一次动作会执行完，之后不会再开始新的一次。

use crate::error::ServiceError;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

/// 周期动作句柄
///
/// 丢弃句柄即取消（不等待线程退出）。
pub struct PeriodicTask {
    name: String,
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// 启动周期动作，首次执行在一个周期之后
    pub fn spawn<F>(name: &str, period: Duration, mut action: F) -> Result<Self, ServiceError>
    where
        F: FnMut() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let ticker = tick(period);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(&thread_name, &ticker, &cancel_rx, &mut action))
            .map_err(|source| ServiceError::Spawn {
                name: name.to_string(),
                source,
            })?;

        debug!("Periodic task '{}' started (every {:?})", name, period);
        Ok(Self {
            name: name.to_string(),
            cancel: Some(cancel_tx),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 任务线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 发出取消信号
    pub fn cancel(&mut self) {
        // 关闭发送端即可唤醒 select!
        self.cancel.take();
    }

    /// 取消并等待线程退出
    ///
    /// 在任务自身的线程里调用时只取消、不等待。
    pub fn cancel_and_join(mut self) {
        self.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            trace!("Periodic task '{}' cancelled from its own thread", self.name);
            return;
        }
        if handle.join().is_err() {
            error!("Periodic task '{}' panicked", self.name);
        }
        debug!("Periodic task '{}' stopped", self.name);
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_loop<F: FnMut()>(
    name: &str,
    ticker: &Receiver<Instant>,
    cancel: &Receiver<()>,
    action: &mut F,
) {
    loop {
        select! {
            recv(cancel) -> _ => break,
            recv(ticker) -> _ => {
                // 节拍与取消同时就绪时优先取消
                if is_cancelled(cancel) {
                    break;
                }
                trace!("Periodic task '{}' tick", name);
                action();
            },
        }
    }
}

fn is_cancelled(cancel: &Receiver<()>) -> bool {
    matches!(
        cancel.try_recv(),
        Ok(()) | Err(crossbeam_channel::TryRecvError::Disconnected)
    )
}
