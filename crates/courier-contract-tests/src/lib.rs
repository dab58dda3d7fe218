//! courier 契约测试套件（TCK）入口。
//!
//! # 教案式综述（Why / How / What）
//! - **为什么存在**：传输底座的可检验性质（连接幂等、断开吸收、写闸门、FIFO、
//!   完结语义）是所有具体传输共同依赖的地基，将断言沉淀为独立 crate 后，
//!   下游实现只需在 `tests` 目录调用 `run_*` 入口即可完成一键回归；
//! - **如何集成**：构建期依赖 `courier-core` 与本 crate，在标准测试中调用
//!   [`run_lifecycle_suite`] / [`run_inbound_queue_suite`]；用例内部自带运行环境
//!   （线程与 `futures` 执行器），无额外前置；
//! - **测试对象**：全部以 `courier-core` 的稳定面为边界——`TransportCore` 的
//!   生命周期操作、写闸门与 [`InboundDrain`](courier_core::InboundDrain) 的完结语义。
//!
//! # 风险提示（Trade-offs）
//! - 套件使用线程与阻塞执行器模拟并发环境，不依赖任何具体异步运行时；
//! - 若未来 `courier-core` 的契约发生破坏性升级，务必先更新本 crate，
//!   再同步下游仓库，避免“红绿灯”状态错判。

mod lifecycle;
mod queue;
pub mod support;

use case::{ContractSuite, run_suite};

const ALL_SUITES: [&ContractSuite; 2] = [lifecycle::suite(), queue::suite()];

mod case {
    use super::support;
    use std::panic;

    /// 表示单个契约用例的元信息。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：以结构体封装测试函数与名称，便于统一遍历并在失败时
    ///   打印“套件/用例”上下文；
    /// - **契约 (What)**：`test` 必须在失败时 panic，名称会进入错误提示。
    #[derive(Clone, Copy)]
    pub struct ContractCase {
        /// 用例的人类可读名称。
        pub name: &'static str,
        /// 实际执行的断言逻辑。
        pub test: fn(),
    }

    /// 代表同一主题的一组契约用例。
    #[derive(Clone, Copy)]
    pub struct ContractSuite {
        /// 套件名称，供日志使用。
        pub name: &'static str,
        /// 归属该套件的用例集合。
        pub cases: &'static [ContractCase],
    }

    /// 在捕获 panic 的前提下执行整个套件。
    ///
    /// # 教案式说明
    /// - **逻辑 (How)**：遍历 `cases`，借助 [`panic::catch_unwind`] 捕获失败，
    ///   将 payload 交给 [`support::panic_with_context`] 附加上下文后二次抛出；
    /// - **契约 (What)**：全部用例成功时静默返回，任一失败即 panic。
    pub fn run_suite(suite: &ContractSuite) {
        assert!(!suite.cases.is_empty(), "契约套件不应为空");
        for case in suite.cases {
            let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| (case.test)()));
            if let Err(payload) = outcome {
                support::panic_with_context(suite.name, case.name, payload);
            }
        }
    }
}

/// 返回所有已注册的契约套件。
pub fn all_suites() -> &'static [&'static ContractSuite] {
    &ALL_SUITES
}

/// 运行“生命周期”主题的全部用例，覆盖连接幂等、断开吸收与重连禁止。
pub fn run_lifecycle_suite() {
    run_suite(lifecycle::suite());
}

/// 运行“入站队列”主题的全部用例，覆盖写闸门、FIFO 与两种完结形态。
pub fn run_inbound_queue_suite() {
    run_suite(queue::suite());
}
