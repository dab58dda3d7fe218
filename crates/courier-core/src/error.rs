//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义传输底座对外暴露的两个错误域：调用顺序缺陷（`TransportError`）
//!   与读/写路径故障（`TransportFailure`）；
//! - 前者指向调用方的编程错误，应当记录并修复而非重试；后者作为队列的
//!   完结原因传递给消费者，在缓冲消息全部交付后才浮现。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error`，满足 `Send + Sync + 'static`；
//! - 错误文案携带传输名称等上下文，便于多路复用场景下定位实例。

use crate::state::ConnectionState;
use thiserror::Error;

/// 调用顺序缺陷：传输实现以非法顺序驱动生命周期或写闸门。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“代码写错了”与“网络坏掉了”。本枚举属于前者，
///   出现即说明某个传输实现在宣告连接之前投递数据、或试图复活已断开的实例；
/// - **契约 (What)**：
///   - 两个变体均不可重试；`AlreadyDisconnected` 对调用方而言是致命错误；
///   - `NotConnected` 携带拒绝时刻的状态快照，辅助排查竞速窗口；
/// - **风险 (Trade-offs)**：文案中保留 `String` 形式的传输名，牺牲一次分配
///   换取日志可读性。
#[derive(Debug, Error)]
pub enum TransportError {
    /// 在吸收态上调用 `mark_connected`：断开后的传输禁止重连。
    #[error("transport `{name}` is already disconnected; reconnecting is not permitted")]
    AlreadyDisconnected {
        /// 受影响的传输名称。
        name: String,
    },

    /// 写闸门拒绝：在非 `Connected` 状态下尝试入队。
    #[error("transport `{name}` rejected an inbound message while in state {state:?}")]
    NotConnected {
        /// 受影响的传输名称。
        name: String,
        /// 拒绝时刻观察到的状态。
        state: ConnectionState,
    },
}

/// 终结读路径（或出站发送）的传输故障，作为队列的完结原因交付消费者。
///
/// # 教案式说明
/// - **意图 (Why)**：读循环内部的故障不得“横穿”队列打断已缓冲的消息，
///   而是统一转化为 `mark_disconnected(Some(failure))`，由消费者在排空后观察；
/// - **契约 (What)**：
///   - 变体覆盖 IO 故障、解码失败、协议违例与取消四类终结原因；
///   - 实现 `Clone + PartialEq`，便于契约测试断言“首个错误获胜”；
/// - **风险 (Trade-offs)**：以 `String` 承载细节而非保留原始错误对象，
///   换取跨线程转移与比较语义；根因链路在事件侧已经完整记录。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportFailure {
    /// 底层字节流读写失败。
    #[error("transport i/o failure: {detail}")]
    Io {
        /// 底层 IO 错误的文字描述。
        detail: String,
    },

    /// 入站载荷无法解码为合法的协议信封。
    #[error("failed to decode inbound payload: {detail}")]
    Decode {
        /// 解码器报告的失败原因。
        detail: String,
    },

    /// 对端行为违反协议约定。
    #[error("protocol violation: {detail}")]
    Protocol {
        /// 违例的具体描述。
        detail: String,
    },

    /// 读路径在完成前被取消。
    ///
    /// 常规的外部关停会以“无错误”方式关闭队列；该变体仅用于取消本身
    /// 需要作为故障浮现的场景（例如上层要求区分主动关停与超时取消）。
    #[error("read path was cancelled before completion")]
    Cancelled,
}

impl TransportFailure {
    /// 以统一格式包装底层 IO 错误。
    pub fn from_io(err: &std::io::Error) -> Self {
        TransportFailure::Io {
            detail: err.to_string(),
        }
    }

    /// 以统一格式包装解码错误。
    pub fn from_decode(err: &dyn std::error::Error) -> Self {
        TransportFailure::Decode {
            detail: err.to_string(),
        }
    }
}
