//! 字节流传输的端到端回归：以内存双工管道替代真实 stdio，
//! 覆盖读循环终止矩阵、出站写路径与幂等关停。

use courier_contract_tests::support::RecordingObserver;
use courier_core::{ConnectionState, Message, Transport, TransportFailure};
use courier_transport_stdio::{StreamTransport, StreamTransportConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

/// 构造一对“线缆端/传输端”双工管道并在其上启动传输。
///
/// 返回值里 `wire_in` 是向传输灌入入站字节的写端（丢弃即 EOF），
/// `wire_out` 是读取传输出站字节的读端。
fn spawn_over_duplex(
    observer: Arc<RecordingObserver>,
) -> (
    Arc<StreamTransport>,
    courier_core::InboundDrain,
    tokio::io::DuplexStream,
    tokio::io::DuplexStream,
) {
    let (wire_in, transport_rx) = duplex(1024);
    let (transport_tx, wire_out) = duplex(1024);
    let (transport, drain) = StreamTransport::spawn(
        "duplex",
        transport_rx,
        transport_tx,
        observer,
        StreamTransportConfig::default(),
    )
    .expect("全新传输的建连宣告不应失败");
    (transport, drain, wire_in, wire_out)
}

#[tokio::test]
async fn messages_flow_in_order_and_eof_ends_gracefully() {
    let observer = Arc::new(RecordingObserver::new());
    let (_transport, mut drain, mut wire_in, _wire_out) =
        spawn_over_duplex(Arc::clone(&observer));

    wire_in
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .await
        .expect("线缆写入应成功");
    wire_in
        .write_all(b"\n{\"jsonrpc\":\"2.0\",\"method\":\"log\"}\n")
        .await
        .expect("线缆写入应成功");
    drop(wire_in);

    let first = drain
        .next()
        .await
        .expect("第一条消息前不应出现故障")
        .expect("EOF 前应先交付消息");
    assert_eq!(first.correlation().map(ToString::to_string), Some("1".to_owned()));

    let second = drain
        .next()
        .await
        .expect("第二条消息前不应出现故障")
        .expect("空行应被跳过而非终止流");
    assert_eq!(second.correlation(), None);

    assert_eq!(drain.next().await, Ok(None), "EOF 必须表现为优雅完结");
    assert!(observer.contains("transport.entering_read_loop"));
    assert!(observer.contains("transport.message_received"));
    assert!(observer.contains("transport.end_of_stream"));
}

#[tokio::test]
async fn parse_failure_surfaces_after_buffered_messages() {
    let observer = Arc::new(RecordingObserver::new());
    let (_transport, mut drain, mut wire_in, _wire_out) =
        spawn_over_duplex(Arc::clone(&observer));

    wire_in
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ready\"}\n{not json\n")
        .await
        .expect("线缆写入应成功");

    let buffered = drain.next().await.expect("坏行之前的消息必须先交付");
    assert!(buffered.is_some(), "已入队的消息不得因后续坏行丢失");

    let terminal = drain.next().await;
    assert!(
        matches!(terminal, Err(TransportFailure::Decode { .. })),
        "解码失败应作为完结原因浮现，实际为 {terminal:?}"
    );
    assert!(observer.contains("transport.parse_failed"));
}

#[tokio::test]
async fn send_emits_one_ndjson_line_per_message() {
    let observer = Arc::new(RecordingObserver::new());
    let (transport, _drain, _wire_in, wire_out) = spawn_over_duplex(observer);

    let message = Message::from_value(json!({
        "jsonrpc": "2.0",
        "id": 42,
        "result": {"ok": true}
    }));
    transport.send(message).await.expect("在线发送应成功");

    let mut lines = BufReader::new(wire_out).lines();
    let line = lines
        .next_line()
        .await
        .expect("线缆读取应成功")
        .expect("发送后线缆上应有一行");
    let echoed: serde_json::Value = serde_json::from_str(&line).expect("线上帧应为合法 JSON");
    assert_eq!(echoed["id"], json!(42));
    assert_eq!(echoed["result"]["ok"], json!(true));
}

#[tokio::test]
async fn shutdown_is_idempotent_and_closes_queue() {
    let observer = Arc::new(RecordingObserver::new());
    let (transport, mut drain, _wire_in, _wire_out) = spawn_over_duplex(Arc::clone(&observer));

    transport.shutdown().await.expect("首次关停应成功");
    transport.shutdown().await.expect("重复关停必须是 no-op");

    assert_eq!(drain.next().await, Ok(None), "关停后队列必须以优雅完结收束");

    let names = observer.names();
    let shutting_down = names
        .iter()
        .filter(|name| **name == "transport.shutting_down")
        .count();
    let complete = names
        .iter()
        .filter(|name| **name == "transport.shutdown_complete")
        .count();
    assert_eq!(shutting_down, 1, "关停启动事件只应触发一次");
    assert_eq!(complete, 1, "关停完成事件只应触发一次");
    assert!(observer.contains("transport.read_cancelled"));
}

#[tokio::test]
async fn concurrent_shutdown_callers_all_observe_closed_queue() {
    let observer = Arc::new(RecordingObserver::new());
    let (transport, mut drain, _wire_in, _wire_out) = spawn_over_duplex(Arc::clone(&observer));

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                transport.shutdown().await.expect("并发关停应成功");
                // 无论胜负，任何一个 shutdown 返回时状态都必须已收束，
                // 竞速败方不得在胜方完成收尾之前脱身。
                assert_eq!(transport.core().state(), ConnectionState::Disconnected);
            })
        })
        .collect();
    for caller in callers {
        caller.await.expect("关停任务不应 panic");
    }

    assert_eq!(drain.next().await, Ok(None), "所有调用返回后队列必然已关闭");
    let complete = observer
        .names()
        .iter()
        .filter(|name| **name == "transport.shutdown_complete")
        .count();
    assert_eq!(complete, 1, "收尾副作用仍由胜方恰好执行一次");
}

#[tokio::test]
async fn send_after_shutdown_is_rejected() {
    let observer = Arc::new(RecordingObserver::new());
    let (transport, _drain, _wire_in, _wire_out) = spawn_over_duplex(Arc::clone(&observer));

    transport.shutdown().await.expect("关停应成功");

    let outcome = transport
        .send(Message::notification(json!({"jsonrpc": "2.0", "method": "late"})))
        .await;
    assert!(
        matches!(outcome, Err(TransportFailure::Protocol { .. })),
        "断开后的发送应立即失败，实际为 {outcome:?}"
    );
    assert!(observer.contains("transport.send_failed"));
}

#[tokio::test]
async fn shutdown_completes_within_grace_even_with_quiet_peer() {
    let observer = Arc::new(RecordingObserver::new());
    let (wire_in, transport_rx) = duplex(64);
    let (transport_tx, _wire_out) = duplex(64);
    let (transport, mut drain) = StreamTransport::spawn(
        "quiet-peer",
        transport_rx,
        transport_tx,
        observer,
        StreamTransportConfig::default().with_shutdown_grace(Duration::from_millis(500)),
    )
    .expect("建连宣告不应失败");

    // 对端保持沉默（既不发数据也不关闭），关停仍须在宽限期内返回。
    let outcome = tokio::time::timeout(Duration::from_secs(2), transport.shutdown()).await;
    assert!(outcome.is_ok(), "关停等待必须有界");
    outcome.expect("已断言有界").expect("关停应成功");
    assert_eq!(drain.next().await, Ok(None));
    drop(wire_in);
}
