#![deny(unsafe_code)]
#![doc = "courier-core: JSON-RPC 会话传输底座的核心契约。"]
#![doc = ""]
#![doc = "== 架构定位 =="]
#![doc = "本 crate 位于会话运行时与具体传输实现（stdio、socket、HTTP 长连接）之间，"]
#![doc = "负责三件事：连接生命周期的三态状态机、单消费者多生产者的入站消息队列、"]
#![doc = "以及具体传输必须履行的契约（出站发送与资源回收）。"]
#![doc = ""]
#![doc = "== 并发模型 =="]
#![doc = "状态字以单个原子量承载，所有跃迁经 `compare_exchange` 线性化；"]
#![doc = "入站队列为无界 mpsc，生产者永不阻塞，消费者仅在“队列空且未关闭”时挂起。"]
#![doc = "除上述两处之外不存在共享可变状态，任何锁都不会跨越挂起点持有。"]
#![doc = ""]
#![doc = "== 契约测试 =="]
#![doc = "生命周期与队列语义的可检验性质沉淀在 `courier-contract-tests`，"]
#![doc = "任何对本 crate 契约的变更必须同步更新该套件并保持 100% 通过。"]

pub use async_trait::async_trait;

mod error;
mod events;
mod message;
mod queue;
mod state;
mod transport;

pub use error::{TransportError, TransportFailure};
pub use events::{NoopObserver, TracingObserver, TransportEvent, TransportObserver};
pub use message::{Message, MessageId};
pub use queue::InboundDrain;
pub use state::ConnectionState;
pub use transport::{SessionId, Transport, TransportCore};

/// 常用导出集合，便于下游传输实现一次性引入核心契约。
///
/// # 教案式说明
/// - **意图 (Why)**：具体传输几乎总是同时需要 `TransportCore`、事件词汇与错误域，
///   集中 re-export 可避免零散 `use` 造成的漂移；
/// - **契约 (What)**：仅收录稳定面；内部模块结构调整不影响本模块路径。
pub mod prelude {
    pub use crate::error::{TransportError, TransportFailure};
    pub use crate::events::{TransportEvent, TransportObserver};
    pub use crate::message::{Message, MessageId};
    pub use crate::queue::InboundDrain;
    pub use crate::state::ConnectionState;
    pub use crate::transport::{SessionId, Transport, TransportCore};
}
