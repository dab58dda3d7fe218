//! 契约套件的公共支撑设施：panic 上下文包装与事件录制观察者。

use courier_core::{Message, TransportEvent, TransportObserver};
use parking_lot::Mutex;
use serde_json::json;
use std::fmt::Write;
use std::panic;

/// 在附加上下文的情况下重新抛出 panic。
///
/// # 教案式说明
/// - **意图 (Why)**：`case::run_suite` 捕获 panic 后，需要在原始 payload 之上追加
///   “套件/用例”描述，帮助调试者快速定位失败来源；
/// - **逻辑 (How)**：尝试将 payload 解析为 `&str` / `String`，格式化后经
///   [`panic::resume_unwind`] 重新抛出；
/// - **契约 (What)**：调用前必须处于 `catch_unwind` 的错误分支中；
///   函数不会正常返回。
pub fn panic_with_context(suite: &str, case: &str, payload: Box<dyn std::any::Any + Send>) -> ! {
    let mut message = String::new();
    let _ = write!(&mut message, "[courier-tck::{suite}::{case}] 测试失败：");

    if let Some(text) = payload.downcast_ref::<&str>() {
        let _ = write!(&mut message, "{text}");
    } else if let Some(text) = payload.downcast_ref::<String>() {
        let _ = write!(&mut message, "{text}");
    } else {
        let _ = write!(&mut message, "<未知 panic 类型>");
    }

    panic::resume_unwind(Box::new(message));
}

/// 录制事件名称序列的观察者，供套件与下游测试断言事件触发点。
///
/// # 教案式说明
/// - **意图 (Why)**：事件词汇本身是契约的一部分，断言“某操作触发了某事件”
///   需要一个可查询的接收端；
/// - **契约 (What)**：
///   - [`names`](RecordingObserver::names) 返回按触发顺序排列的事件标识快照；
///   - [`contains`](RecordingObserver::contains) 为常用的存在性断言捷径；
/// - **风险 (Trade-offs)**：仅录制事件名而不录制上下文载荷，
///   需要载荷断言的用例应自备专用观察者。
#[derive(Debug, Default)]
pub struct RecordingObserver {
    names: Mutex<Vec<&'static str>>,
}

impl RecordingObserver {
    /// 构造空录制器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回按触发顺序排列的事件标识快照。
    pub fn names(&self) -> Vec<&'static str> {
        self.names.lock().clone()
    }

    /// 判断指定事件是否已被触发。
    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().iter().any(|entry| *entry == name)
    }
}

impl TransportObserver for RecordingObserver {
    fn on_event(&self, _transport: &str, event: TransportEvent<'_>) {
        self.names.lock().push(event.name());
    }
}

/// 构造携带整数关联 ID 的请求形消息，避免用例中重复拼装信封。
pub fn request_message(id: i64, method: &str) -> Message {
    Message::from_value(json!({"jsonrpc": "2.0", "id": id, "method": method}))
}

/// 构造携带字符串载荷的通知形消息。
pub fn notification_message(method: &str) -> Message {
    Message::notification(json!({"jsonrpc": "2.0", "method": method}))
}
