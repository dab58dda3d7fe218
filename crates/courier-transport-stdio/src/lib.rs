#![deny(unsafe_code)]
#![doc = r#"
# courier-transport-stdio

## 设计动机（Why）
- **定位**：该 crate 提供 courier 在 Tokio 运行时上的最小字节流传输实现，
  以 NDJSON（每行一个 JSON-RPC 信封）为帧格式，覆盖子进程 stdio 与
  任意 `AsyncRead`/`AsyncWrite` 对（测试中使用内存双工管道）。
- **架构角色**：作为 `courier-core` 传输契约的参考实现，完整演示
  “建连 → 读循环入队 → 终止原因登记 → 有界关停”的驱动顺序，
  为后续 socket / HTTP 流实现提供语义参照。

## 核心契约（What）
- **输入条件**：调用方必须在 Tokio 运行时中使用本实现（读循环经
  `tokio::spawn` 派生）；
- **输出保障**：
  - 读循环在对应节点触发 `courier-core` 规定的诊断事件；
  - EOF 产生优雅完结；IO 故障与解码失败作为完结原因在消费者排空后浮现；
  - [`shutdown`](courier_core::Transport::shutdown) 幂等，等待读循环退出的
    时间有界（宽限期后强制放弃），返回前队列必然已关闭。

## 实现策略（How）
- **读路径**：`BufReader::lines` 驱动逐行解码，经 `tokio::select!` 与
  取消信号组合；`next_line` 具备取消安全性，选择分支不会丢失半行数据；
- **取消信号**：`AtomicBool + Notify` 的最小组合，触发恰好一次、
  等待方先查标记再挂起，避免通知竞速；
- **写路径**：异步互斥锁序列化“序列化 → 写入 → 刷新”三步，
  失败同步浮现给调用方并触发 `send_failed` 事件。

## 风险与考量（Trade-offs）
- **并发度**：写路径经互斥锁序列化，单连接场景足够；高并发出站
  需要上层自行做批量或拆分通道；
- **解码失败即终止**：单行解码失败被视为流级故障（对端已不可信），
  不做“跳过坏行继续读”的宽容处理。
"#]

mod codec;
mod transport;

pub use transport::{StreamTransport, StreamTransportConfig};
