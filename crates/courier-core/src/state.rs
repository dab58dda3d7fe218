//! # 连接生命周期状态机
//!
//! ## 核心意图（Why）
//! - 传输的“宣告连接”与“宣告断开”可能从不同线程并发到达（读循环故障与外部关停竞速），
//!   状态机必须保证任何时刻只有一个调用方完成有效跃迁；
//! - 状态单调前进：`NotConnected → Connected → Disconnected`，或跳过连接直接
//!   `NotConnected → Disconnected`（从未建连即关停）；`Disconnected` 为吸收态，
//!   已断开的传输禁止复用。
//!
//! ## 实现约束（How）
//! - 状态以单个 `AtomicU8` 承载，跃迁一律经 `compare_exchange` 完成，
//!   不存在跨挂起点持有的锁；
//! - 并发 `mark_connected` / `mark_disconnected` 竞速时，先完成有效 CAS 者为准，
//!   之后到达的调用要么幂等成功、要么观察到吸收态。

use core::sync::atomic::{AtomicU8, Ordering};

/// 连接生命周期的三态枚举。
///
/// # 教案式说明
/// - **意图 (Why)**：让写闸门（入站消息必须在 `Connected` 状态入队）与关停协调
///   共享同一份状态视图；
/// - **契约 (What)**：跃迁合法性由 [`ConnectionState::can_transition_to`] 定义，
///   自环视为幂等允许；
/// - **风险 (Trade-offs)**：枚举刻意不提供“重连”形态——断线重建属于更高层策略，
///   本底座的实例在断开后即应被丢弃。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    /// 尚未完成握手，写闸门关闭。
    NotConnected,
    /// 已建连，入站消息允许进入队列。
    Connected,
    /// 已断开（吸收态），队列已关闭，实例不可复用。
    Disconnected,
}

impl ConnectionState {
    /// 判断状态是否允许跃迁至 `target`。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：以显式矩阵固化状态图，供测试与文档对照；
    /// - **契约 (What)**：自环返回 `true`（幂等调用不报错）；任何指向
    ///   `NotConnected` 或离开 `Disconnected` 的跃迁均为非法；
    /// - **执行 (How)**：匹配 `(self, target)` 元组实现有限状态机判定。
    pub fn can_transition_to(self, target: ConnectionState) -> bool {
        matches!(
            (self, target),
            (ConnectionState::NotConnected, ConnectionState::NotConnected)
                | (ConnectionState::NotConnected, ConnectionState::Connected)
                | (ConnectionState::NotConnected, ConnectionState::Disconnected)
                | (ConnectionState::Connected, ConnectionState::Connected)
                | (ConnectionState::Connected, ConnectionState::Disconnected)
                | (ConnectionState::Disconnected, ConnectionState::Disconnected)
        )
    }

    /// 状态是否已进入终态。
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

/// 原子状态字，封装生命周期跃迁的 CAS 细节。
///
/// # 教案式说明
/// - **意图 (Why)**：将“谁赢得跃迁”这一并发判定收敛到单一类型，
///   `TransportCore` 只消费判定结果而不直接触碰原子操作；
/// - **契约 (What)**：
///   - [`try_connect`](StateCell::try_connect)：仅 `NotConnected → Connected` 产生实际跃迁，
///     `Connected` 下幂等成功，`Disconnected` 下返回错误；
///   - [`try_disconnect`](StateCell::try_disconnect)：返回 `true` 表示本调用完成了跃迁，
///     `false` 表示此前已处于吸收态；
/// - **执行 (How)**：`AcqRel` 成功序 + `Acquire` 失败序，保证跃迁结果对
///   后续读取（含队列关闭动作）可见。
#[derive(Debug)]
pub(crate) struct StateCell {
    word: AtomicU8,
}

impl StateCell {
    const NOT_CONNECTED: u8 = 0;
    const CONNECTED: u8 = 1;
    const DISCONNECTED: u8 = 2;

    pub(crate) fn new() -> Self {
        Self {
            word: AtomicU8::new(Self::NOT_CONNECTED),
        }
    }

    pub(crate) fn load(&self) -> ConnectionState {
        match self.word.load(Ordering::Acquire) {
            Self::NOT_CONNECTED => ConnectionState::NotConnected,
            Self::CONNECTED => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    /// 尝试进入 `Connected`。
    ///
    /// - 返回 `Ok(())`：本次完成跃迁，或此前已连接（幂等）；
    /// - 返回 `Err(state)`：当前为吸收态，`state` 恒为 `Disconnected`。
    pub(crate) fn try_connect(&self) -> Result<(), ConnectionState> {
        match self.word.compare_exchange(
            Self::NOT_CONNECTED,
            Self::CONNECTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) | Err(Self::CONNECTED) => Ok(()),
            Err(_) => Err(ConnectionState::Disconnected),
        }
    }

    /// 尝试进入吸收态 `Disconnected`。
    ///
    /// 多个调用方并发关停时恰有一个返回 `true`；该调用方负责执行队列关闭等
    /// 一次性副作用，其余调用方视为已完成。
    pub(crate) fn try_disconnect(&self) -> bool {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            if current == Self::DISCONNECTED {
                return false;
            }
            match self.word.compare_exchange(
                current,
                Self::DISCONNECTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_matrix_is_monotonic() {
        use ConnectionState::*;
        assert!(NotConnected.can_transition_to(Connected));
        assert!(NotConnected.can_transition_to(Disconnected));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(!Connected.can_transition_to(NotConnected));
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(NotConnected));
        // 自环幂等。
        assert!(Connected.can_transition_to(Connected));
        assert!(Disconnected.can_transition_to(Disconnected));
    }

    #[test]
    fn cell_connect_then_disconnect() {
        let cell = StateCell::new();
        assert_eq!(cell.load(), ConnectionState::NotConnected);

        assert!(cell.try_connect().is_ok());
        assert_eq!(cell.load(), ConnectionState::Connected);
        // 幂等。
        assert!(cell.try_connect().is_ok());

        assert!(cell.try_disconnect());
        assert!(!cell.try_disconnect());
        assert_eq!(cell.load(), ConnectionState::Disconnected);

        assert_eq!(cell.try_connect(), Err(ConnectionState::Disconnected));
    }

    #[test]
    fn never_connected_shutdown_is_valid() {
        let cell = StateCell::new();
        assert!(cell.try_disconnect());
        assert_eq!(cell.load(), ConnectionState::Disconnected);
    }
}
