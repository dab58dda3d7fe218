//! “入站队列”主题套件：写闸门、FIFO 交付与两种完结形态。

use crate::case::{ContractCase, ContractSuite};
use crate::support::{RecordingObserver, notification_message, request_message};
use courier_core::{NoopObserver, TransportCore, TransportError, TransportFailure};
use futures::executor::block_on;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

const CASES: &[ContractCase] = &[
    ContractCase {
        name: "enqueue_before_connect_is_rejected",
        test: enqueue_before_connect_is_rejected,
    },
    ContractCase {
        name: "enqueue_after_disconnect_is_rejected",
        test: enqueue_after_disconnect_is_rejected,
    },
    ContractCase {
        name: "single_producer_fifo_preserved",
        test: single_producer_fifo_preserved,
    },
    ContractCase {
        name: "buffered_messages_delivered_before_failure",
        test: buffered_messages_delivered_before_failure,
    },
    ContractCase {
        name: "graceful_close_never_surfaces_error",
        test: graceful_close_never_surfaces_error,
    },
    ContractCase {
        name: "concurrent_producers_then_fault",
        test: concurrent_producers_then_fault,
    },
    ContractCase {
        name: "high_water_mark_tracks_peak_depth",
        test: high_water_mark_tracks_peak_depth,
    },
];

const SUITE: ContractSuite = ContractSuite {
    name: "inbound_queue",
    cases: CASES,
};

/// 返回“入站队列”主题的测试套件。
pub const fn suite() -> &'static ContractSuite {
    &SUITE
}

/// 建连之前的入队必须被写闸门拒绝，消息不得进入队列，且触发对应事件。
fn enqueue_before_connect_is_rejected() {
    let observer = Arc::new(RecordingObserver::new());
    let (core, mut drain) = TransportCore::channel("tck-gate-early", observer.clone());

    let rejected = core.enqueue(request_message(1, "premature"));
    assert!(
        matches!(rejected, Err(TransportError::NotConnected { .. })),
        "未建连的入队必须返回 NotConnected"
    );
    assert!(
        observer.contains("transport.message_before_connected"),
        "写闸门拒绝必须触发诊断事件"
    );

    // 队列保持纯净：关停后排空为空。
    core.mark_disconnected(None);
    assert_eq!(block_on(drain.next()), Ok(None));
}

/// 断开之后的入队同样被拒绝。
fn enqueue_after_disconnect_is_rejected() {
    let (core, _drain) = TransportCore::channel("tck-gate-late", Arc::new(NoopObserver));
    core.mark_connected().expect("建连必须成功");
    core.mark_disconnected(None);

    let rejected = core.enqueue(notification_message("late"));
    assert!(matches!(rejected, Err(TransportError::NotConnected { .. })));
}

/// 单一生产者按 `m1, m2, m3` 入队，消费者必须按完全相同的顺序排空。
fn single_producer_fifo_preserved() {
    let (core, mut drain) = TransportCore::channel("tck-fifo", Arc::new(NoopObserver));
    core.mark_connected().expect("建连必须成功");

    for id in 1..=3 {
        core.enqueue(request_message(id, "seq")).expect("入队必须成功");
    }
    core.mark_disconnected(None);

    for expected in 1..=3 {
        let message = block_on(drain.next())
            .expect("排空不应报错")
            .expect("应交付缓冲消息");
        assert_eq!(
            message.correlation().map(ToString::to_string),
            Some(expected.to_string()),
            "交付顺序必须与入队顺序一致"
        );
    }
    assert_eq!(block_on(drain.next()), Ok(None));
}

/// 故障完结：缓冲消息全部交付后，故障恰好一次浮现，此后只返回“序列已结束”。
fn buffered_messages_delivered_before_failure() {
    let (core, mut drain) = TransportCore::channel("tck-fault", Arc::new(NoopObserver));
    core.mark_connected().expect("建连必须成功");

    core.enqueue(request_message(1, "first")).expect("入队必须成功");
    core.enqueue(request_message(2, "second")).expect("入队必须成功");

    let fault = TransportFailure::Decode {
        detail: "truncated frame".to_owned(),
    };
    core.mark_disconnected(Some(fault.clone()));

    for _ in 0..2 {
        let delivered = block_on(drain.next());
        assert!(
            matches!(delivered, Ok(Some(_))),
            "故障不得抢占已缓冲的数据，实际为 {delivered:?}"
        );
    }
    assert_eq!(block_on(drain.next()), Err(fault), "故障应在排空后浮现");
    assert_eq!(block_on(drain.next()), Ok(None), "故障只浮现一次");
}

/// 优雅完结：先交付缓冲消息，随后永远是干净的序列结束。
fn graceful_close_never_surfaces_error() {
    let (core, mut drain) = TransportCore::channel("tck-graceful", Arc::new(NoopObserver));
    core.mark_connected().expect("建连必须成功");
    core.enqueue(notification_message("ping")).expect("入队必须成功");
    core.mark_disconnected(None);

    assert!(matches!(block_on(drain.next()), Ok(Some(_))));
    assert_eq!(block_on(drain.next()), Ok(None));
    assert_eq!(block_on(drain.next()), Ok(None), "重复排空保持稳定");
}

/// 两个生产者并发入队后以故障关停；两条消息先以任意相对顺序交付，
/// 随后故障恰好一次浮现。
fn concurrent_producers_then_fault() {
    let (core, mut drain) = TransportCore::channel("tck-producers", Arc::new(NoopObserver));
    core.mark_connected().expect("建连必须成功");

    let writers: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|method| {
            let core = Arc::clone(&core);
            thread::spawn(move || {
                core.enqueue(notification_message(method))
                    .expect("连接态入队必须成功");
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("生产者线程不应 panic");
    }

    let fault = TransportFailure::Io {
        detail: "reset by peer".to_owned(),
    };
    core.mark_disconnected(Some(fault.clone()));

    let mut methods = BTreeSet::new();
    for _ in 0..2 {
        let message = block_on(drain.next())
            .expect("缓冲消息阶段不应报错")
            .expect("两条消息均应交付");
        methods.insert(
            message.body()["method"]
                .as_str()
                .expect("消息载荷应携带 method")
                .to_owned(),
        );
    }
    assert_eq!(
        methods,
        BTreeSet::from(["a".to_owned(), "b".to_owned()]),
        "两个生产者的消息都必须交付且各自完好"
    );
    assert_eq!(block_on(drain.next()), Err(fault));
}

/// 高水位计数反映峰值深度，且不影响任何阻塞行为。
fn high_water_mark_tracks_peak_depth() {
    let (core, mut drain) = TransportCore::channel("tck-highwater", Arc::new(NoopObserver));
    core.mark_connected().expect("建连必须成功");

    for id in 1..=4 {
        core.enqueue(request_message(id, "fill")).expect("入队必须成功");
    }
    assert_eq!(core.queue_depth(), 4);
    assert_eq!(core.queue_high_water(), 4);

    // 排空两条后峰值保持不变。
    for _ in 0..2 {
        let _ = block_on(drain.next()).expect("排空不应报错");
    }
    assert_eq!(core.queue_depth(), 2);
    assert_eq!(core.queue_high_water(), 4);
}
