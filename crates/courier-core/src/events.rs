//! # 诊断事件词汇与观察者能力
//!
//! ## 核心意图（Why）
//! - 传输底座不绑定任何日志框架，只定义一组固定命名的诊断事件，
//!   由注入的观察者决定如何记录（tracing、指标、丢弃）；
//! - 事件词汇即契约：具体传输在对应节点必须触发对应事件，
//!   使不同传输实现（stdio、socket、HTTP 流）的可观测面保持一致。
//!
//! ## 契约约束（What）
//! - 事件集合固定为十三个命名事件，新增事件属于破坏性变更，
//!   需同步更新契约文档与所有传输实现；
//! - 事件携带借用形态的上下文（关联 ID、故障描述），观察者若需留存必须自行复制，
//!   换取热路径上零分配的事件分发。

use crate::message::MessageId;
use core::fmt;

/// 传输生命周期内的固定诊断事件词汇。
///
/// # 教案式说明
/// - **意图 (Why)**：以枚举穷举事件而非自由字符串，保证拼写与语义在编译期收敛；
/// - **契约 (What)**：每个变体对应传输生命周期中的一个固定触发点；
///   [`TransportEvent::name`] 返回 `<域>.<语义>` 形式的稳定标识，供观察者做路由或聚合；
/// - **风险 (Trade-offs)**：借用生命周期 `'a` 要求观察者同步消费事件，
///   异步落盘场景需先复制为自有数据。
#[derive(Clone, Copy, Debug)]
pub enum TransportEvent<'a> {
    /// 建连失败（握手未完成即终止）。
    ConnectFailed {
        /// 失败原因描述。
        detail: &'a str,
    },
    /// 出站发送失败。
    SendFailed {
        /// 关联的消息标识（若有）。
        correlation: Option<&'a MessageId>,
        /// 失败原因描述。
        detail: &'a str,
    },
    /// 读循环开始消费字节流。
    EnteringReadLoop,
    /// 对端正常关闭字节流（EOF）。
    EndOfStream,
    /// 一条消息成功解码并进入队列。
    MessageReceived {
        /// 关联的消息标识（若有）。
        correlation: Option<&'a MessageId>,
    },
    /// 入站载荷解码失败。
    ParseFailed {
        /// 解码失败原因。
        detail: &'a str,
    },
    /// 读循环响应取消信号退出。
    ReadCancelled,
    /// 读循环因 IO 故障退出。
    ReadFailed {
        /// 故障描述。
        detail: &'a str,
    },
    /// 关停流程开始。
    ShuttingDown,
    /// 关停过程中资源释放失败（例如读循环未在宽限期内退出）。
    ShutdownFailed {
        /// 失败原因描述。
        detail: &'a str,
    },
    /// 关停流程完成，所有资源已释放。
    ShutdownComplete,
    /// 写闸门拒绝：连接建立前（或断开后）收到入站消息。
    MessageBeforeConnected {
        /// 被拒消息的关联标识（若有）。
        correlation: Option<&'a MessageId>,
    },
    /// 协议事件以非法顺序到达（例如重复握手应答）。
    OutOfOrderProtocolEvent {
        /// 违例描述。
        detail: &'a str,
    },
}

impl TransportEvent<'_> {
    /// 返回事件的稳定标识，遵循 `<域>.<语义>` 命名。
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::ConnectFailed { .. } => "transport.connect_failed",
            TransportEvent::SendFailed { .. } => "transport.send_failed",
            TransportEvent::EnteringReadLoop => "transport.entering_read_loop",
            TransportEvent::EndOfStream => "transport.end_of_stream",
            TransportEvent::MessageReceived { .. } => "transport.message_received",
            TransportEvent::ParseFailed { .. } => "transport.parse_failed",
            TransportEvent::ReadCancelled => "transport.read_cancelled",
            TransportEvent::ReadFailed { .. } => "transport.read_failed",
            TransportEvent::ShuttingDown => "transport.shutting_down",
            TransportEvent::ShutdownFailed { .. } => "transport.shutdown_failed",
            TransportEvent::ShutdownComplete => "transport.shutdown_complete",
            TransportEvent::MessageBeforeConnected { .. } => "transport.message_before_connected",
            TransportEvent::OutOfOrderProtocolEvent { .. } => {
                "transport.out_of_order_protocol_event"
            }
        }
    }
}

impl fmt::Display for TransportEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 诊断事件的接收方能力。
///
/// # 教案式说明
/// - **意图 (Why)**：以能力注入替代全局日志依赖，传输底座可被嵌入
///   任何观测体系（tracing、OTel 导出器、测试录制器）；
/// - **契约 (What)**：
///   - `on_event` 必须快速返回且不得 panic，它运行在读循环与关停路径的热点上；
///   - `transport` 为触发事件的传输名称，同一观察者可服务多个实例；
/// - **风险 (Trade-offs)**：同步回调意味着昂贵的落盘逻辑需要观察者自行异步化。
pub trait TransportObserver: Send + Sync + 'static {
    /// 处理一条诊断事件。
    fn on_event(&self, transport: &str, event: TransportEvent<'_>);
}

impl fmt::Debug for dyn TransportObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportObserver")
    }
}

/// 丢弃全部事件的观察者，适用于基准与不关心诊断的嵌入方。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl TransportObserver for NoopObserver {
    fn on_event(&self, _transport: &str, _event: TransportEvent<'_>) {}
}

/// 将诊断事件映射为 `tracing` 记录的默认观察者。
///
/// # 教案式说明
/// - **意图 (Why)**：绝大多数嵌入方已具备 tracing 订阅器，提供开箱即用的映射
///   可避免各传输实现自行散落日志语句；
/// - **执行 (How)**：按事件严重程度选择级别——故障类（建连失败、读失败、关停失败、
///   顺序违例）记为 `warn`，写闸门拒绝记为 `error`（调用方缺陷），其余生命周期
///   节点记为 `debug`；
/// - **契约 (What)**：每条记录携带 `transport` 与 `event` 字段，上下文细节
///   以结构化字段附加。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl TransportObserver for TracingObserver {
    fn on_event(&self, transport: &str, event: TransportEvent<'_>) {
        match event {
            TransportEvent::ConnectFailed { detail } => {
                tracing::warn!(transport, event = event.name(), detail, "connect failed");
            }
            TransportEvent::SendFailed {
                correlation,
                detail,
            } => {
                let correlation = correlation.map(ToString::to_string);
                tracing::warn!(
                    transport,
                    event = event.name(),
                    correlation,
                    detail,
                    "outbound send failed"
                );
            }
            TransportEvent::EnteringReadLoop => {
                tracing::debug!(transport, event = event.name(), "entering read loop");
            }
            TransportEvent::EndOfStream => {
                tracing::debug!(transport, event = event.name(), "end of stream");
            }
            TransportEvent::MessageReceived { correlation } => {
                let correlation = correlation.map(ToString::to_string);
                tracing::debug!(
                    transport,
                    event = event.name(),
                    correlation,
                    "message received"
                );
            }
            TransportEvent::ParseFailed { detail } => {
                tracing::warn!(
                    transport,
                    event = event.name(),
                    detail,
                    "inbound payload parse failed"
                );
            }
            TransportEvent::ReadCancelled => {
                tracing::debug!(transport, event = event.name(), "read loop cancelled");
            }
            TransportEvent::ReadFailed { detail } => {
                tracing::warn!(transport, event = event.name(), detail, "read loop failed");
            }
            TransportEvent::ShuttingDown => {
                tracing::debug!(transport, event = event.name(), "shutting down");
            }
            TransportEvent::ShutdownFailed { detail } => {
                tracing::warn!(transport, event = event.name(), detail, "shutdown failed");
            }
            TransportEvent::ShutdownComplete => {
                tracing::debug!(transport, event = event.name(), "shutdown complete");
            }
            TransportEvent::MessageBeforeConnected { correlation } => {
                let correlation = correlation.map(ToString::to_string);
                tracing::error!(
                    transport,
                    event = event.name(),
                    correlation,
                    "message delivered before transport was connected"
                );
            }
            TransportEvent::OutOfOrderProtocolEvent { detail } => {
                tracing::warn!(
                    transport,
                    event = event.name(),
                    detail,
                    "out-of-order protocol event"
                );
            }
        }
    }
}
