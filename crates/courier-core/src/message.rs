//! # 消息模型（Message / MessageId）
//!
//! ## 核心意图（Why）
//! - 本底座只搬运“已经解码完成”的协议消息，编解码（JSON-RPC 信封的序列化与反序列化）
//!   归属具体传输或更外层的编解码组件；
//! - 队列与诊断事件只需要消息上的关联标识（请求/响应型消息携带、通知型消息缺省），
//!   因此在此对消息体做最小建模：不可变的 JSON 值加可选的关联 ID。
//!
//! ## 契约约束（What）
//! - 核心层除提取关联 ID 外不得检视消息体；
//! - `Message` 满足 `Clone + Send + Sync`，可安全跨线程进入队列并交付消费者。

use core::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 风格的消息关联标识。
///
/// # 教案式说明
/// - **意图 (Why)**：请求与响应之间的配对依赖该标识；通知类消息不携带；
/// - **契约 (What)**：与 JSON-RPC 的 `id` 成员对齐，仅支持整数与字符串两种形态，
///   `serde(untagged)` 保证与线上信封的直接互转；
/// - **风险 (Trade-offs)**：浮点形态的 `id` 在规范中被劝阻，这里直接不支持；
///   若上游发来非整数数值，提取逻辑会将其视为“无关联标识”。
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// 整数形态的标识。
    Number(i64),
    /// 字符串形态的标识。
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(value) => write!(f, "{value}"),
            MessageId::Text(value) => write!(f, "{value}"),
        }
    }
}

/// 已解码的协议消息，对核心层而言是不透明载荷。
///
/// # 教案式说明
/// - **意图 (Why)**：入站队列、出站发送与诊断事件共用同一种消息形态，
///   避免在传输边界上出现两套平行模型；
/// - **契约 (What)**：
///   - `body`：完整的 JSON 信封，核心层不检视其内容；
///   - `correlation`：从信封 `id` 成员提取的关联标识，仅用于日志与诊断；
///   - **后置条件**：构造后不可变，跨线程传递无需额外同步。
/// - **风险 (Trade-offs)**：保留整个 `Value` 意味着一次堆上载荷的所有权转移，
///   换取队列与消费者之间零重解析。
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    body: Value,
    correlation: Option<MessageId>,
}

impl Message {
    /// 从已解码的 JSON 信封构造消息，并提取关联标识。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：传输的读循环在解码成功后统一经由此入口进入队列，
    ///   保证关联标识的提取规则只存在一份；
    /// - **契约 (What)**：
    ///   - `body`：完整信封；`id` 成员为整数或字符串时提取为关联标识，
    ///     缺失、为 `null` 或为其他类型时视为通知；
    ///   - **后置条件**：返回值持有 `body` 的所有权。
    pub fn from_value(body: Value) -> Self {
        let correlation = body.get("id").and_then(|id| match id {
            Value::Number(number) => number.as_i64().map(MessageId::Number),
            Value::String(text) => Some(MessageId::Text(text.clone())),
            _ => None,
        });
        Self { body, correlation }
    }

    /// 构造不携带关联标识的通知消息。
    pub fn notification(body: Value) -> Self {
        Self {
            body,
            correlation: None,
        }
    }

    /// 读取关联标识（若存在）。
    pub fn correlation(&self) -> Option<&MessageId> {
        self.correlation.as_ref()
    }

    /// 以只读视图访问消息体。
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// 取回消息体所有权，供出站路径序列化使用。
    pub fn into_body(self) -> Value {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn correlation_extracted_from_numeric_id() {
        let message = Message::from_value(json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}));
        assert_eq!(message.correlation(), Some(&MessageId::Number(7)));
    }

    #[test]
    fn correlation_extracted_from_text_id() {
        let message = Message::from_value(json!({"jsonrpc": "2.0", "id": "req-1"}));
        assert_eq!(
            message.correlation(),
            Some(&MessageId::Text("req-1".to_owned()))
        );
    }

    #[test]
    fn missing_or_null_id_yields_notification() {
        let absent = Message::from_value(json!({"jsonrpc": "2.0", "method": "notify"}));
        assert!(absent.correlation().is_none());

        let null = Message::from_value(json!({"jsonrpc": "2.0", "id": null}));
        assert!(null.correlation().is_none());
    }

    #[test]
    fn message_id_display_matches_wire_form() {
        assert_eq!(MessageId::Number(42).to_string(), "42");
        assert_eq!(MessageId::Text("abc".to_owned()).to_string(), "abc");
    }
}
