//! # 传输核心与传输契约
//!
//! ## 核心意图（Why）
//! - `TransportCore` 把状态机、入站队列、写闸门与事件分发组合为每个传输实例
//!   免费获得的公共底座；具体传输只需补齐出站发送与资源回收两项能力；
//! - 期望的驱动顺序（契约而非结构强制）：握手成功后调用
//!   [`mark_connected`](TransportCore::mark_connected)；读循环将解码消息经
//!   [`enqueue`](TransportCore::enqueue) 入队；读循环终止（EOF、取消、故障）时以
//!   触发原因调用 [`mark_disconnected`](TransportCore::mark_disconnected) 后退出。
//!
//! ## 并发模型（How）
//! - 状态跃迁全部经 CAS 线性化；队列关闭由跃迁胜者执行，保证“先写完结原因、
//!   再释放发送端”的顺序对消费者可见；
//! - `enqueue` 的连通性检查与实际入队之间存在竞速窗口：若关停恰好插入其间，
//!   消息被静默丢弃且返回成功——传输正在关闭，这一竞速视为良性。

use crate::error::{TransportError, TransportFailure};
use crate::events::{TransportEvent, TransportObserver};
use crate::message::Message;
use crate::queue::{InboundDrain, QueueShared};
use crate::state::{ConnectionState, StateCell};
use async_trait::async_trait;
use core::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::mpsc;

/// 会话标识，由更高层在握手完成后写入，一次设置后只读。
///
/// # 教案式说明
/// - **意图 (Why)**：HTTP 流式传输等场景在握手应答中取得会话 ID，
///   之后所有诊断与路由都要能读到它；核心层本身不用它做任何路由；
/// - **契约 (What)**：内部为 `Arc<str>`，克隆零拷贝，可安全跨线程共享。
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SessionId(Arc<str>);

impl SessionId {
    /// 以字符串视图读取会话标识。
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(Arc::<str>::from(value))
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(Arc::<str>::from(value))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 每个传输实例共享的公共底座：状态机、入站队列、写闸门与事件分发。
///
/// # 教案式说明
/// - **意图 (Why)**：不同介质的传输（stdio、socket、HTTP 流、测试替身）在生命周期
///   与入站交付上的语义完全一致，应当恰好实现一次；
/// - **契约 (What)**：
///   - `name`：构造时固定的诊断标签，只读；
///   - `session_id`：一次性写入的会话标识，见 [`SessionId`]；
///   - 状态仅经 [`mark_connected`](Self::mark_connected) /
///     [`mark_disconnected`](Self::mark_disconnected) 变更，外部不可直接触碰；
///   - 实例断开后即惰性化，应由持有方丢弃，不可复用；
/// - **风险 (Trade-offs)**：队列无界是明确的资源管理决策（绝不反压线缆读取），
///   [`queue_high_water`](Self::queue_high_water) 提供增长观测而不改变阻塞行为。
#[derive(Debug)]
pub struct TransportCore {
    name: Arc<str>,
    session_id: OnceLock<SessionId>,
    state: StateCell,
    sender: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    queue: Arc<QueueShared>,
    observer: Arc<dyn TransportObserver>,
}

impl TransportCore {
    /// 构造传输底座，返回核心句柄与唯一的消费端句柄。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：构造即拆分读写两侧——传输实现持有 `Arc<TransportCore>`
    ///   驱动生命周期与入队，会话运行时持有 [`InboundDrain`] 排空消息，
    ///   类型上杜绝“消费者反向操纵生命周期”的越权路径；
    /// - **契约 (What)**：
    ///   - `name`：诊断标签，构造后不可变；
    ///   - `observer`：诊断事件接收方，同一观察者可注入多个实例；
    ///   - **后置条件**：状态为 `NotConnected`，队列为空且处于打开状态。
    pub fn channel(
        name: impl Into<String>,
        observer: Arc<dyn TransportObserver>,
    ) -> (Arc<Self>, InboundDrain) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(QueueShared::new());
        let core = Arc::new(Self {
            name: Arc::<str>::from(name.into()),
            session_id: OnceLock::new(),
            state: StateCell::new(),
            sender: Mutex::new(Some(tx)),
            queue: Arc::clone(&queue),
            observer,
        });
        let drain = InboundDrain::new(rx, queue);
        (core, drain)
    }

    /// 诊断标签。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 读取会话标识（若已由上层写入）。
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.get()
    }

    /// 写入会话标识。一次性操作：首次写入返回 `true`，重复写入不生效并返回 `false`。
    pub fn set_session_id(&self, id: SessionId) -> bool {
        self.session_id.set(id).is_ok()
    }

    /// 当前生命周期状态快照。
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// 写路径的同步闸门：当前是否处于 `Connected`。
    pub fn is_connected(&self) -> bool {
        matches!(self.state.load(), ConnectionState::Connected)
    }

    /// 宣告连接建立。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - `NotConnected` 下完成跃迁并返回成功；
    ///   - `Connected` 下为幂等 no-op，同样返回成功；
    ///   - `Disconnected` 下返回 [`TransportError::AlreadyDisconnected`]：
    ///     断开后的实例禁止重连，该错误对调用方是致命的、不可重试的；
    /// - **并发 (How)**：与并发的 `mark_disconnected` 竞速时，先完成有效 CAS 者
    ///   为准；一旦进入吸收态，本方法不可能再成功。
    pub fn mark_connected(&self) -> Result<(), TransportError> {
        self.state.try_connect().map_err(|_| {
            self.emit(TransportEvent::OutOfOrderProtocolEvent {
                detail: "mark_connected called on a disconnected transport",
            });
            TransportError::AlreadyDisconnected {
                name: self.name.to_string(),
            }
        })
    }

    /// 宣告连接断开并关闭入站队列。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：读循环故障、外部关停与取消信号可能并发到达，
    ///   本方法保证恰好一个调用方执行副作用（登记完结原因、释放发送端），
    ///   其余调用观察为“已完成”；
    /// - **契约 (What)**：
    ///   - `failure` 为 `None` 时队列优雅关闭，消费者排空后得到干净结束；
    ///   - `failure` 为 `Some` 时该故障在缓冲消息全部交付后恰好一次浮现；
    ///   - 重复调用为幂等 no-op，首个登记的完结原因获胜；
    ///   - 返回 `true` 表示本调用完成了跃迁；
    /// - **执行 (How)**：先赢得 CAS，再写完结槽位，最后释放发送端——
    ///   释放发送端即消费者观察到通道关闭的信号，顺序保证完结原因必然可见。
    pub fn mark_disconnected(&self, failure: Option<TransportFailure>) -> bool {
        if !self.state.try_disconnect() {
            return false;
        }
        self.queue.store_completion(failure);
        lock_sender(&self.sender).take();
        true
    }

    /// 将一条解码完成的入站消息交付给队列。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：写闸门把“传输实现的驱动顺序缺陷”（建连前投递、断开后投递）
    ///   显式暴露为错误并记录事件，而不是静默吞掉；
    /// - **契约 (What)**：
    ///   - 仅 `Connected` 状态接受消息；否则触发
    ///     [`TransportEvent::MessageBeforeConnected`] 并返回
    ///     [`TransportError::NotConnected`]，消息不会入队；
    ///   - 成功路径永不阻塞、永不因容量失败（无界队列）；
    ///   - 闸门检查与入队之间若恰被关停插入，消息被静默丢弃并返回成功——
    ///     传输正在关闭，该竞速视为良性；
    /// - **并发 (How)**：发送端互斥锁只保护“取用句柄”的短临界区，
    ///   实际 `send` 为无锁快路径。
    pub fn enqueue(&self, message: Message) -> Result<(), TransportError> {
        if !self.is_connected() {
            self.emit(TransportEvent::MessageBeforeConnected {
                correlation: message.correlation(),
            });
            return Err(TransportError::NotConnected {
                name: self.name.to_string(),
                state: self.state.load(),
            });
        }
        let guard = lock_sender(&self.sender);
        if let Some(sender) = guard.as_ref()
            && sender.send(message).is_ok()
        {
            self.queue.record_enqueue();
        }
        Ok(())
    }

    /// 入站队列的历史最大缓冲深度（诊断用途）。
    pub fn queue_high_water(&self) -> usize {
        self.queue.high_water()
    }

    /// 入站队列的当前缓冲深度（诊断用途，瞬时值）。
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// 向观察者分发一条诊断事件，自动附带传输名称。
    pub fn emit(&self, event: TransportEvent<'_>) {
        self.observer.on_event(&self.name, event);
    }
}

fn lock_sender<'a>(
    sender: &'a Mutex<Option<mpsc::UnboundedSender<Message>>>,
) -> std::sync::MutexGuard<'a, Option<mpsc::UnboundedSender<Message>>> {
    match sender.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// 具体传输必须实现的契约。
///
/// # 教案式说明
/// - **意图 (Why)**：stdio、socket、HTTP 流与测试替身共享 [`TransportCore`] 的
///   全部公共能力，差异只剩两件事——如何把消息送往对端、如何回收介质资源；
/// - **契约 (What)**：
///   - [`core`](Transport::core)：暴露共享底座，供会话运行时查询状态与会话标识；
///   - [`send`](Transport::send)：向对端投递一条消息；核心层不强制连通性前置
///     检查（实现可自行决定），失败必须同步浮现给调用方而非吞掉；
///   - [`shutdown`](Transport::shutdown)：幂等地恰好一次释放传输专属资源，
///     并确保 [`TransportCore::mark_disconnected`] 在返回前已经发生，
///     从而关闭队列、让读循环观察到完结；对读循环退出的等待必须有界
///     （宽限期 + 强制放弃），关停不得被失控的读循环无限拖住；
/// - **风险 (Trade-offs)**：trait 经 `async_trait` 保持对象安全，
///   付出一次堆分配换取 `Arc<dyn Transport>` 的统一持有形态。
#[async_trait]
pub trait Transport: Send + Sync {
    /// 访问共享底座。
    fn core(&self) -> &TransportCore;

    /// 诊断标签，默认转发给底座。
    fn name(&self) -> &str {
        self.core().name()
    }

    /// 向对端投递一条出站消息。
    async fn send(&self, message: Message) -> Result<(), TransportFailure>;

    /// 幂等关停：释放介质资源并确保队列已关闭。
    async fn shutdown(&self) -> Result<(), TransportFailure>;
}
