//! TCP 发布通道端到端测试

use armon_service::{DASHBOARD_TOPIC, Publisher, Service, SinkConfig};
use serde_json::json;
use std::io::Read;
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

fn read_frame(stream: &mut TcpStream) -> (String, serde_json::Value) {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).unwrap();
    let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut body).unwrap();

    let split = body.iter().position(|&b| b == 0).unwrap();
    let topic = String::from_utf8(body[..split].to_vec()).unwrap();
    let payload = serde_json::from_slice(&body[split + 1..]).unwrap();
    (topic, payload)
}

#[test]
fn test_subscriber_receives_framed_messages() {
    let publisher = Publisher::new(SinkConfig::Tcp {
        bind: "127.0.0.1:0".to_string(),
    });
    publisher.start().unwrap();
    let addr = publisher.local_addr().unwrap();

    let mut subscriber = TcpStream::connect(addr).unwrap();
    subscriber
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    // 订阅者接入前发布的消息被丢弃，持续发布直到收到为止
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut seq = 0u32;
    let (topic, payload) = loop {
        assert!(Instant::now() < deadline, "subscriber never received a message");
        publisher.publish(DASHBOARD_TOPIC, &json!({"value": seq}));
        seq += 1;
        thread::sleep(Duration::from_millis(20));

        subscriber.set_nonblocking(true).unwrap();
        let mut peeked = [0u8; 1];
        let ready = matches!(subscriber.peek(&mut peeked), Ok(n) if n > 0);
        subscriber.set_nonblocking(false).unwrap();
        if ready {
            break read_frame(&mut subscriber);
        }
    };
    assert_eq!(topic, DASHBOARD_TOPIC);
    let first = payload["value"].as_u64().unwrap();

    // 之后的消息按发布顺序到达
    publisher.publish(DASHBOARD_TOPIC, &json!({"value": 1000}));
    let mut last = first;
    loop {
        let (_, payload) = read_frame(&mut subscriber);
        let value = payload["value"].as_u64().unwrap();
        assert!(value > last);
        last = value;
        if value == 1000 {
            break;
        }
    }

    publisher.stop();
    assert!(publisher.local_addr().is_none());
}
