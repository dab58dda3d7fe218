//! # 入站消息队列（单消费者、多生产者、无界）
//!
//! ## 核心意图（Why）
//! - 读循环（或任意数量的生产者）把解码后的消息推入队列时绝不允许阻塞：
//!   慢消费者不能反向拖住线缆读取，这是刻意接受“无界内存增长”换来的不变量；
//! - 队列关闭分两种完结形态：优雅（消费者排空后得到干净的序列结束）与故障
//!   （缓冲消息全部交付后，恰好一次地浮现关闭时登记的故障）。
//!
//! ## 实现约束（How）
//! - 底层复用 `tokio::sync::mpsc` 的无界通道：发送侧同步、永不挂起；
//!   接收侧在“空且未关闭”时挂起，在发送端全部释放后返回 `None`；
//! - 完结原因保存在与接收端共享的互斥槽位中，关闭方先写槽位、再释放发送端，
//!   通道关闭信号的 happens-before 关系保证消费者读槽位时必然可见；
//! - 深度与高水位仅作诊断计数，不参与任何阻塞决策。

use crate::error::TransportFailure;
use crate::message::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// 生产者与消费者共享的队列附属状态。
#[derive(Debug)]
pub(crate) struct QueueShared {
    /// 关闭时登记的完结原因；`None` 表示优雅关闭。
    completion: Mutex<Option<TransportFailure>>,
    /// 当前缓冲深度（诊断用途）。
    depth: AtomicUsize,
    /// 历史最大缓冲深度（诊断用途）。
    high_water: AtomicUsize,
}

impl QueueShared {
    pub(crate) fn new() -> Self {
        Self {
            completion: Mutex::new(None),
            depth: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    /// 登记完结原因。仅状态机跃迁的胜者调用一次，因此不存在覆盖竞争。
    pub(crate) fn store_completion(&self, failure: Option<TransportFailure>) {
        *lock_ignoring_poison(&self.completion) = failure;
    }

    /// 记录一次成功入队，返回更新后的深度。
    pub(crate) fn record_enqueue(&self) {
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
        self.high_water.fetch_max(depth, Ordering::AcqRel);
    }

    fn record_dequeue(&self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub(crate) fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Acquire)
    }

    fn take_completion(&self) -> Option<TransportFailure> {
        lock_ignoring_poison(&self.completion).take()
    }
}

/// 互斥锁仅保护短临界区，持锁方不可能 panic 后留下不一致状态，
/// 毒化时直接接管内部值即可。
fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// 入站消息的唯一消费端句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：会话运行时作为单一消费者持有本句柄排空消息；
///   句柄只代表读取能力，队列生命周期归属 `TransportCore`；
/// - **契约 (What)**：
///   - [`next`](InboundDrain::next) 按 FIFO 交付消息；队列空且未关闭时挂起；
///   - 关闭后先交付全部缓冲消息，随后恰好一次地返回完结结果：
///     `Ok(None)`（优雅）或 `Err(failure)`（故障）；
///   - 终局之后的任何调用均返回 `Ok(None)`（“序列已结束”）；
/// - **风险 (Trade-offs)**：句柄未实现 `Clone`——多消费者语义不在契约内，
///   类型系统直接阻止误用。
#[derive(Debug)]
pub struct InboundDrain {
    rx: mpsc::UnboundedReceiver<Message>,
    shared: std::sync::Arc<QueueShared>,
    finished: bool,
}

impl InboundDrain {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<Message>,
        shared: std::sync::Arc<QueueShared>,
    ) -> Self {
        Self {
            rx,
            shared,
            finished: false,
        }
    }

    /// 取出下一条入站消息，或观察队列的完结形态。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：把“消息流”与“完结原因”合并为单一拉取接口，
    ///   消费者无需在两个通道之间自行对齐顺序；
    /// - **契约 (What)**：
    ///   - 返回 `Ok(Some(message))`：按入队顺序交付的下一条消息；
    ///   - 返回 `Ok(None)`：序列干净结束（或此前已观察过终局）；
    ///   - 返回 `Err(failure)`：关闭时登记的故障，至多浮现一次，
    ///     且必然晚于所有缓冲消息；
    ///   - **前置条件**：调用方为唯一消费者；
    ///   - **后置条件**：终局结果观察后句柄进入惰性状态，后续调用立即返回。
    /// - **执行 (How)**：通道返回 `None` 即代表发送端已被关闭方释放，
    ///   此时读取完结槽位并固化 `finished` 标记。
    pub async fn next(&mut self) -> Result<Option<Message>, TransportFailure> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(message) => {
                self.shared.record_dequeue();
                Ok(Some(message))
            }
            None => {
                self.finished = true;
                match self.shared.take_completion() {
                    Some(failure) => Err(failure),
                    None => Ok(None),
                }
            }
        }
    }

    /// 当前缓冲深度（诊断用途，瞬时值）。
    pub fn depth(&self) -> usize {
        self.shared.depth()
    }

    /// 历史最大缓冲深度（诊断用途）。
    pub fn high_water(&self) -> usize {
        self.shared.high_water()
    }
}
