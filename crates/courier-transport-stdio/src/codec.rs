//! NDJSON 帧的编解码：一行一个 JSON-RPC 信封。
//!
//! # 教案式说明
//! - **意图 (Why)**：行分帧是 stdio 类传输的事实标准——无需长度前缀，
//!   人类可读且与既有工具链（逐行日志、管道调试）天然兼容；
//! - **契约 (What)**：
//!   - [`decode_line`]：输入不含换行符的单行文本，输出解码完成的
//!     [`Message`]；非法 JSON 或非对象信封映射为
//!     [`TransportFailure::Decode`]；
//!   - [`encode_message`]：输出紧凑（无空白）序列化结果；紧凑形态下
//!     字符串内的换行一律转义，产出天然满足单行约束；
//! - **风险 (Trade-offs)**：信封合法性只校验到“必须是 JSON 对象”，
//!   字段级校验（`jsonrpc` 版本、`method` 形态）归属更高层的协议栈。

use courier_core::{Message, TransportFailure};
use serde_json::Value;

/// 将一行文本解码为协议消息。
pub fn decode_line(line: &str) -> Result<Message, TransportFailure> {
    let value: Value =
        serde_json::from_str(line).map_err(|err| TransportFailure::from_decode(&err))?;
    if !value.is_object() {
        return Err(TransportFailure::Decode {
            detail: "expected a JSON-RPC envelope object".to_owned(),
        });
    }
    Ok(Message::from_value(value))
}

/// 将协议消息编码为单行文本（不含换行符）。
pub fn encode_message(message: &Message) -> Result<String, TransportFailure> {
    serde_json::to_string(message.body()).map_err(|err| TransportFailure::from_decode(&err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::MessageId;
    use serde_json::json;

    #[test]
    fn decode_extracts_correlation() {
        let message = decode_line(r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#)
            .expect("合法信封应解码成功");
        assert_eq!(message.correlation(), Some(&MessageId::Number(3)));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let outcome = decode_line("{not json");
        assert!(matches!(outcome, Err(TransportFailure::Decode { .. })));
    }

    #[test]
    fn decode_rejects_non_object_envelope() {
        let outcome = decode_line(r#"["not","an","object"]"#);
        assert!(matches!(outcome, Err(TransportFailure::Decode { .. })));
    }

    #[test]
    fn encode_produces_single_line() {
        let message = Message::notification(json!({
            "jsonrpc": "2.0",
            "method": "log",
            "params": {"text": "line one\nline two"}
        }));
        let encoded = encode_message(&message).expect("编码应成功");
        assert!(!encoded.contains('\n'), "紧凑序列化不得包含裸换行");
    }
}
