//! 基于 proptest 的生命周期模型校验：任意操作序列下，
//! 实现行为必须与参考模型逐步一致，终局交付与完结原因可全量核对。

use courier_core::{
    ConnectionState, Message, NoopObserver, TransportCore, TransportError, TransportFailure,
};
use futures::executor::block_on;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

/// 驱动传输底座的抽象操作。
#[derive(Clone, Copy, Debug)]
enum Op {
    Connect,
    /// `true` 表示携带故障关停，`false` 表示优雅关停。
    Disconnect(bool),
    Enqueue,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Connect),
        any::<bool>().prop_map(Op::Disconnect),
        Just(Op::Enqueue),
    ]
}

proptest! {
    /// 参考模型：状态单调、连接幂等、断开吸收、写闸门仅在 `Connected` 放行；
    /// 终局时交付的消息数与模型接受数一致，完结原因等于首个登记的故障。
    #[test]
    fn random_op_sequences_match_reference_model(
        ops in proptest::collection::vec(op_strategy(), 1..32)
    ) {
        let (core, mut drain) = TransportCore::channel("prop", Arc::new(NoopObserver));

        let mut model = ConnectionState::NotConnected;
        let mut accepted = 0usize;
        let mut registered_failure: Option<TransportFailure> = None;

        for (step, op) in ops.iter().enumerate() {
            match op {
                Op::Connect => {
                    let outcome = core.mark_connected();
                    match model {
                        ConnectionState::Disconnected => {
                            prop_assert!(
                                matches!(
                                    outcome,
                                    Err(TransportError::AlreadyDisconnected { .. })
                                ),
                                "expected AlreadyDisconnected, got {:?}",
                                outcome
                            );
                        }
                        _ => {
                            prop_assert!(outcome.is_ok());
                            model = ConnectionState::Connected;
                        }
                    }
                }
                Op::Disconnect(with_failure) => {
                    let failure = with_failure.then(|| TransportFailure::Protocol {
                        detail: format!("step-{step}"),
                    });
                    let won = core.mark_disconnected(failure.clone());
                    let expected_win = model != ConnectionState::Disconnected;
                    prop_assert_eq!(won, expected_win, "跃迁胜负必须与模型一致");
                    if expected_win {
                        registered_failure = failure;
                    }
                    model = ConnectionState::Disconnected;
                }
                Op::Enqueue => {
                    let message =
                        Message::from_value(json!({"jsonrpc": "2.0", "id": step as i64}));
                    let outcome = core.enqueue(message);
                    if model == ConnectionState::Connected {
                        prop_assert!(outcome.is_ok());
                        accepted += 1;
                    } else {
                        prop_assert!(
                            matches!(
                                outcome,
                                Err(TransportError::NotConnected { .. })
                            ),
                            "expected NotConnected, got {:?}",
                            outcome
                        );
                    }
                }
            }
            prop_assert_eq!(core.state(), model, "每一步之后状态快照必须与模型一致");
        }

        // 若序列从未关停，由测试补一刀优雅关停以便排空核对。
        if model != ConnectionState::Disconnected {
            prop_assert!(core.mark_disconnected(None));
        }

        let mut delivered = 0usize;
        let terminal = loop {
            match block_on(drain.next()) {
                Ok(Some(_)) => delivered += 1,
                Ok(None) => break None,
                Err(failure) => break Some(failure),
            }
        };
        prop_assert_eq!(delivered, accepted, "交付数必须等于模型接受数");
        prop_assert_eq!(terminal, registered_failure, "完结原因必须等于首个登记的故障");
    }
}
