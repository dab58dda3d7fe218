//! “生命周期”主题套件：连接幂等、断开吸收、重连禁止与会话标识语义。

use crate::case::{ContractCase, ContractSuite};
use crate::support::{RecordingObserver, request_message};
use courier_core::{
    ConnectionState, NoopObserver, SessionId, TransportCore, TransportError, TransportFailure,
};
use futures::executor::block_on;
use std::sync::Arc;

const CASES: &[ContractCase] = &[
    ContractCase {
        name: "mark_connected_is_idempotent",
        test: mark_connected_is_idempotent,
    },
    ContractCase {
        name: "disconnect_is_absorbing_and_first_error_wins",
        test: disconnect_is_absorbing_and_first_error_wins,
    },
    ContractCase {
        name: "reconnect_after_disconnect_is_fatal",
        test: reconnect_after_disconnect_is_fatal,
    },
    ContractCase {
        name: "connect_enqueue_disconnect_then_drain",
        test: connect_enqueue_disconnect_then_drain,
    },
    ContractCase {
        name: "session_id_is_write_once",
        test: session_id_is_write_once,
    },
];

const SUITE: ContractSuite = ContractSuite {
    name: "lifecycle",
    cases: CASES,
};

/// 返回“生命周期”主题的测试套件。
pub const fn suite() -> &'static ContractSuite {
    &SUITE
}

/// 任意次数的 `mark_connected` 均成功且状态保持 `Connected`。
fn mark_connected_is_idempotent() {
    let (core, _drain) = TransportCore::channel("tck-idempotent", Arc::new(NoopObserver));

    for round in 0..3 {
        assert!(
            core.mark_connected().is_ok(),
            "第 {round} 次 mark_connected 必须成功"
        );
        assert_eq!(core.state(), ConnectionState::Connected);
        assert!(core.is_connected());
    }
}

/// 并列登记两个不同完结原因时，只有首个原因被消费者观察到。
fn disconnect_is_absorbing_and_first_error_wins() {
    let (core, mut drain) = TransportCore::channel("tck-first-error", Arc::new(NoopObserver));
    core.mark_connected().expect("建连必须成功");

    let first = TransportFailure::Io {
        detail: "broken pipe".to_owned(),
    };
    let second = TransportFailure::Protocol {
        detail: "late duplicate".to_owned(),
    };

    assert!(core.mark_disconnected(Some(first.clone())), "首次断开应执行跃迁");
    assert!(!core.mark_disconnected(Some(second)), "重复断开应为 no-op");
    assert_eq!(core.state(), ConnectionState::Disconnected);

    let outcome = block_on(drain.next());
    assert_eq!(outcome, Err(first), "消费者必须观察到首个登记的完结原因");
    assert_eq!(block_on(drain.next()), Ok(None), "终局之后只返回“序列已结束”");
}

/// 从未建连即关停后：排空为空且干净；随后的重连尝试必须以致命错误失败。
fn reconnect_after_disconnect_is_fatal() {
    let observer = Arc::new(RecordingObserver::new());
    let (core, mut drain) = TransportCore::channel("tck-reconnect", observer.clone());

    assert!(core.mark_disconnected(None), "未建连的关停应直接进入吸收态");
    assert_eq!(block_on(drain.next()), Ok(None), "空队列应干净结束");

    match core.mark_connected() {
        Err(TransportError::AlreadyDisconnected { name }) => {
            assert_eq!(name, "tck-reconnect");
        }
        other => panic!("期望 AlreadyDisconnected，实际为 {other:?}"),
    }
    assert!(
        observer.contains("transport.out_of_order_protocol_event"),
        "非法重连应触发顺序违例事件"
    );
}

/// 基线场景：建连、入队一条消息、优雅关停、排空得到该消息与干净结束。
fn connect_enqueue_disconnect_then_drain() {
    let (core, mut drain) = TransportCore::channel("t1", Arc::new(NoopObserver));

    core.mark_connected().expect("建连必须成功");
    core.enqueue(request_message(1, "hello"))
        .expect("连接态入队必须成功");
    assert!(core.mark_disconnected(None));

    let delivered = block_on(drain.next()).expect("排空不应报错");
    let delivered = delivered.expect("应先交付缓冲消息");
    assert_eq!(delivered.body()["method"], "hello");

    assert_eq!(block_on(drain.next()), Ok(None), "随后应为干净的序列结束");
}

/// 会话标识一次写入后只读。
fn session_id_is_write_once() {
    let (core, _drain) = TransportCore::channel("tck-session", Arc::new(NoopObserver));
    assert!(core.session_id().is_none());

    assert!(core.set_session_id(SessionId::from("sess-1")));
    assert!(!core.set_session_id(SessionId::from("sess-2")), "重复写入不生效");
    assert_eq!(
        core.session_id().map(SessionId::as_str),
        Some("sess-1"),
        "首个写入的标识保持可见"
    );
}
