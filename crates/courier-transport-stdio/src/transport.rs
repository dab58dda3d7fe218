//! 字节流传输实现：读循环、写路径与有界关停。

use crate::codec;
use courier_core::{
    InboundDrain, Message, Transport, TransportCore, TransportError, TransportEvent,
    TransportFailure, TransportObserver, async_trait,
};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

/// 关停行为的配置项。
///
/// # 教案式说明
/// - **意图 (Why)**：关停对读循环退出的等待必须有界，宽限期长短因部署
///   场景而异（本地子进程 vs 远程慢链路），以显式配置暴露；
/// - **契约 (What)**：[`Default`] 给出 2 秒宽限期；超时后读循环被强制
///   放弃（任务 abort），关停流程继续完成。
#[derive(Clone, Copy, Debug)]
pub struct StreamTransportConfig {
    /// 关停时等待读循环自行退出的宽限期。
    pub shutdown_grace: Duration,
}

impl Default for StreamTransportConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl StreamTransportConfig {
    /// 覆盖关停宽限期。
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// 触发恰好一次的同步信号，承担取消与“关停收尾完成”两种角色。
///
/// 等待方先查标记再挂起，触发方先置标记再通知，
/// 两个顺序相向保证不会丢失唤醒。
#[derive(Debug, Default)]
struct OnceSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl OnceSignal {
    /// 触发信号；返回 `true` 表示本次调用完成了首次触发。
    fn trigger(&self) -> bool {
        if self.flag.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// 挂起直到信号被触发；已触发时立即返回。
    async fn triggered(&self) {
        while !self.flag.load(Ordering::Acquire) {
            let notified = self.notify.notified();
            if self.flag.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

/// 基于 NDJSON 帧的字节流传输。
///
/// # 教案式说明
/// - **意图 (Why)**：以最小介质假设（一个读端、一个写端）实现
///   [`Transport`] 契约，stdio、管道与测试双工管道共用同一实现；
/// - **契约 (What)**：
///   - [`spawn`](StreamTransport::spawn) 即宣告建连并派生读循环，
///     返回传输句柄与唯一消费端；
///   - 出站发送经异步互斥锁序列化，失败同步浮现并触发 `send_failed`；
///   - [`shutdown`](Transport::shutdown) 幂等，返回前队列必然已关闭；
/// - **风险 (Trade-offs)**：读循环由本 crate 派生而非调用方驱动，
///   换取“驱动顺序恒正确”的保证，代价是要求 Tokio 运行时在场。
pub struct StreamTransport {
    core: Arc<TransportCore>,
    writer: AsyncMutex<Box<dyn AsyncWrite + Send + Unpin>>,
    cancel: Arc<OnceSignal>,
    done: OnceSignal,
    read_task: StdMutex<Option<JoinHandle<()>>>,
    shutdown_grace: Duration,
}

impl StreamTransport {
    /// 在给定的读写端上启动传输：宣告建连并派生读循环。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - `name`：诊断标签；`observer`：诊断事件接收方；
    ///   - **前置条件**：处于 Tokio 运行时上下文中；
    ///   - **后置条件**：状态为 `Connected`，读循环已开始消费 `reader`；
    ///   - 返回的 [`InboundDrain`] 交由会话运行时作为唯一消费者持有。
    /// - **执行 (How)**：字节流介质没有独立的握手阶段，打开读写端即视为
    ///   建连完成，因此在派生读循环之前先行 `mark_connected`。
    pub fn spawn<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
        observer: Arc<dyn TransportObserver>,
        config: StreamTransportConfig,
    ) -> Result<(Arc<Self>, InboundDrain), TransportError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (core, drain) = TransportCore::channel(name, observer);
        core.mark_connected()?;

        let cancel = Arc::new(OnceSignal::default());
        let read_task = tokio::spawn(read_loop(Arc::clone(&core), reader, Arc::clone(&cancel)));

        let transport = Arc::new(Self {
            core,
            writer: AsyncMutex::new(Box::new(writer)),
            cancel,
            done: OnceSignal::default(),
            read_task: StdMutex::new(Some(read_task)),
            shutdown_grace: config.shutdown_grace,
        });
        Ok((transport, drain))
    }

    /// 绑定当前进程的标准输入/输出，构造 stdio 传输。
    pub fn stdio(
        name: impl Into<String>,
        observer: Arc<dyn TransportObserver>,
        config: StreamTransportConfig,
    ) -> Result<(Arc<Self>, InboundDrain), TransportError> {
        Self::spawn(name, tokio::io::stdin(), tokio::io::stdout(), observer, config)
    }

    fn take_read_task(&self) -> Option<JoinHandle<()>> {
        match self.read_task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl Transport for StreamTransport {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    /// 序列化并写出一条出站消息。
    ///
    /// 本实现选择在写路径上自查连通性：断开后的发送立即失败，
    /// 避免把字节写进已然无主的半关闭管道。
    async fn send(&self, message: Message) -> Result<(), TransportFailure> {
        if !self.core.is_connected() {
            let failure = TransportFailure::Protocol {
                detail: "send on a transport that is not connected".to_owned(),
            };
            let detail = failure.to_string();
            self.core.emit(TransportEvent::SendFailed {
                correlation: message.correlation(),
                detail: &detail,
            });
            return Err(failure);
        }

        let line = codec::encode_message(&message)?;
        let mut writer = self.writer.lock().await;
        let outcome = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        drop(writer);

        if let Err(err) = outcome {
            let failure = TransportFailure::from_io(&err);
            let detail = failure.to_string();
            self.core.emit(TransportEvent::SendFailed {
                correlation: message.correlation(),
                detail: &detail,
            });
            return Err(failure);
        }
        Ok(())
    }

    /// 幂等关停：取消读循环、有界等待、释放写端并确保队列关闭。
    async fn shutdown(&self) -> Result<(), TransportFailure> {
        if !self.cancel.trigger() {
            // 竞速败方不得提前返回：等待胜方完成收尾，
            // 保证任何一个 shutdown 调用返回时队列都已关闭。
            self.done.triggered().await;
            return Ok(());
        }
        self.core.emit(TransportEvent::ShuttingDown);

        if let Some(read_task) = self.take_read_task() {
            let abort = read_task.abort_handle();
            match tokio::time::timeout(self.shutdown_grace, read_task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    // 读循环 panic 属于缺陷而非常规关停路径，记录后继续收尾。
                    tracing::warn!(
                        transport = self.core.name(),
                        error = %join_err,
                        "read loop terminated abnormally during shutdown"
                    );
                    let detail = join_err.to_string();
                    self.core
                        .emit(TransportEvent::ShutdownFailed { detail: &detail });
                }
                Err(_elapsed) => {
                    abort.abort();
                    self.core.emit(TransportEvent::ShutdownFailed {
                        detail: "read loop did not exit within the shutdown grace period",
                    });
                }
            }
        }

        // 读循环正常退出时已登记完结原因；强制放弃或从未派生的路径
        // 由这里兜底，保证返回前队列必然关闭。
        self.core.mark_disconnected(None);

        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.shutdown().await {
            let failure = TransportFailure::from_io(&err);
            let detail = failure.to_string();
            self.core
                .emit(TransportEvent::ShutdownFailed { detail: &detail });
        }
        drop(writer);

        self.core.emit(TransportEvent::ShutdownComplete);
        self.done.trigger();
        Ok(())
    }
}

/// 读循环：逐行解码入队，终止时以触发原因登记断开。
///
/// # 教案式说明
/// - **终止矩阵 (What)**：
///   - EOF → `end_of_stream` 事件 + 优雅完结；
///   - IO 故障 → `read_failed` 事件 + 故障完结；
///   - 解码失败 → `parse_failed` 事件 + 故障完结；
///   - 取消 → `read_cancelled` 事件 + 优雅完结；若故障已先行登记，
///     断开的吸收语义保证故障作为记录在案的完结原因胜出；
/// - **执行 (How)**：`select!` 的 `biased` 次序让取消优先于继续读取，
///   `next_line` 的取消安全性保证未选中分支不丢失半行数据。
async fn read_loop<R>(core: Arc<TransportCore>, reader: R, cancel: Arc<OnceSignal>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    core.emit(TransportEvent::EnteringReadLoop);
    let mut lines = BufReader::new(reader).lines();

    let completion = loop {
        tokio::select! {
            biased;
            _ = cancel.triggered() => {
                core.emit(TransportEvent::ReadCancelled);
                break None;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        tracing::trace!(transport = core.name(), "skipping blank line");
                        continue;
                    }
                    match codec::decode_line(trimmed) {
                        Ok(message) => {
                            core.emit(TransportEvent::MessageReceived {
                                correlation: message.correlation(),
                            });
                            if core.enqueue(message).is_err() {
                                // 写闸门拒绝只可能源于并发关停，静默退出即可。
                                break None;
                            }
                        }
                        Err(failure) => {
                            let detail = failure.to_string();
                            core.emit(TransportEvent::ParseFailed { detail: &detail });
                            break Some(failure);
                        }
                    }
                }
                Ok(None) => {
                    core.emit(TransportEvent::EndOfStream);
                    break None;
                }
                Err(err) => {
                    let failure = TransportFailure::from_io(&err);
                    let detail = failure.to_string();
                    core.emit(TransportEvent::ReadFailed { detail: &detail });
                    break Some(failure);
                }
            }
        }
    };

    core.mark_disconnected(completion);
}
