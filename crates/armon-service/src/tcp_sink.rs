//! TCP 发布通道
//!
//! 基于 mio 的非阻塞监听：订阅者随时接入，每个订阅者维护独立的待写缓冲。
//! 没有订阅者时消息直接丢弃（与 PUB 套接字一致）。

use crate::error::ServiceError;
use crate::publisher::{PubMessage, PubSink};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

const LISTENER: Token = Token(0);

/// 单个订阅者允许积压的最大字节数，超出后丢弃新消息
const MAX_BACKLOG: usize = 1 << 20;

struct Subscriber {
    stream: TcpStream,
    addr: SocketAddr,
    backlog: Vec<u8>,
}

impl Subscriber {
    /// 尽量写出积压数据；返回 `false` 表示连接已失效
    fn flush(&mut self) -> bool {
        while !self.backlog.is_empty() {
            match self.stream.write(&self.backlog) {
                Ok(0) => return false,
                Ok(n) => {
                    self.backlog.drain(..n);
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => {
                    debug!("Subscriber {} write failed: {}", self.addr, e);
                    return false;
                },
            }
        }
        true
    }

    /// 读取并丢弃订阅者发来的数据；返回 `false` 表示对端已关闭
    fn discard_input(&mut self) -> bool {
        let mut scratch = [0u8; 256];
        loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => return false,
                Ok(_) => {},
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(_) => return false,
            }
        }
    }
}

/// TCP 发布通道
pub struct TcpPubSink {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    local_addr: SocketAddr,
    subscribers: HashMap<Token, Subscriber>,
    next_token: usize,
}

impl TcpPubSink {
    /// 绑定监听地址（如 `0.0.0.0:5555`，端口 0 表示自动分配）
    pub fn bind(address: &str) -> Result<Self, ServiceError> {
        let addr: SocketAddr = address.parse().map_err(|e| {
            ServiceError::InvalidConfig(format!("bad publisher address '{}': {}", address, e))
        })?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            poll,
            events: Events::with_capacity(64),
            listener,
            local_addr,
            subscribers: HashMap::new(),
            next_token: 1,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn has_backlog(&self) -> bool {
        self.subscribers.values().any(|s| !s.backlog.is_empty())
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        warn!("Failed to register subscriber {}: {}", addr, e);
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    info!("Subscriber connected: {}", addr);
                    self.subscribers.insert(
                        token,
                        Subscriber {
                            stream,
                            addr,
                            backlog: Vec::new(),
                        },
                    );
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Error accepting subscriber: {}", e);
                    break;
                },
            }
        }
    }

    fn remove(&mut self, token: Token) {
        if let Some(mut subscriber) = self.subscribers.remove(&token) {
            let _ = self.poll.registry().deregister(&mut subscriber.stream);
            info!("Subscriber disconnected: {}", subscriber.addr);
        }
    }
}

impl PubSink for TcpPubSink {
    fn wait_writable(&mut self, timeout: Duration) -> Result<bool, ServiceError> {
        // 无积压时只处理已就绪的事件
        let timeout = if self.has_backlog() {
            timeout
        } else {
            Duration::ZERO
        };

        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        let ready: Vec<(Token, bool, bool, bool)> = self
            .events
            .iter()
            .map(|e| {
                (
                    e.token(),
                    e.is_readable(),
                    e.is_writable(),
                    e.is_error() || e.is_read_closed() || e.is_write_closed(),
                )
            })
            .collect();

        let mut dead = Vec::new();
        for (token, readable, writable, closed) in ready {
            if token == LISTENER {
                self.accept_pending();
                continue;
            }
            let Some(subscriber) = self.subscribers.get_mut(&token) else {
                continue;
            };
            let alive = !closed
                && (!readable || subscriber.discard_input())
                && (!writable || subscriber.flush());
            if !alive {
                dead.push(token);
            }
        }
        for token in dead {
            self.remove(token);
        }

        Ok(self.subscribers.is_empty() || self.subscribers.values().any(|s| s.backlog.is_empty()))
    }

    fn send(&mut self, message: &PubMessage) -> Result<(), ServiceError> {
        if self.subscribers.is_empty() {
            return Ok(());
        }

        let frame = message.encode();
        let mut dead = Vec::new();
        for (token, subscriber) in self.subscribers.iter_mut() {
            if subscriber.backlog.len() + frame.len() > MAX_BACKLOG {
                debug!(
                    "Subscriber {} is too slow, dropping message on '{}'",
                    subscriber.addr, message.topic
                );
                continue;
            }
            subscriber.backlog.extend_from_slice(&frame);
            if !subscriber.flush() {
                dead.push(*token);
            }
        }
        for token in dead {
            self.remove(token);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.local_addr)
    }
}
