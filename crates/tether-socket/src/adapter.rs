//! # 连接状态控制器
//!
//! ## 核心意图（Why）
//! - 独占持有能力句柄与读写端点，把建连、升级、优雅终止与销毁的编排
//!   收敛在单一控制器内；读泵与关闭信号监视器只在其授意下行动；
//! - 经典双工流语义（随时可写、持续读事件、半关闭）与能力套接字的
//!   一次性资源模型之间的全部冲突，都在这里化解。
//!
//! ## 并发结构（How）
//! - `Inner`（状态、相位、句柄槽、读端槽、代际计数）由一把异步互斥锁
//!   保护，锁从不跨越传输层的挂起点持有；
//! - 写端独享一把公平互斥锁：写入按调用顺序串行转发，升级期间写槽锁
//!   被持有，迟到的写入自然排队到新写端就位之后；
//! - **锁序约束**：允许先取写槽锁再取 `Inner` 锁；持有 `Inner` 锁期间
//!   禁止获取写槽锁。
//!
//! ## 代际计数（What）
//! - 每次句柄附着或遗忘使代数递增；读取结果与关闭信号携带发起时的
//!   代数归来，不匹配即作废。销毁之后任何迟到结果都无法再产生通知。

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, Semaphore, mpsc};

use tether_core::{
    EndpointAddr, SocketError, SocketEvent, SocketOptions, TlsOptions, TransportFactory,
    TransportHandle, TransportReader, TransportWriter,
};

use crate::monitor;
use crate::pump;
use crate::sink::EventSink;
use crate::state::{ConnState, TlsPhase};

pub(crate) struct Inner {
    pub(crate) state: ConnState,
    pub(crate) phase: TlsPhase,
    pub(crate) transport: Option<Arc<dyn TransportHandle>>,
    pub(crate) reader: Option<Box<dyn TransportReader>>,
    pub(crate) generation: u64,
    pub(crate) terminal_error: Option<SocketError>,
}

impl Inner {
    /// 受控状态跃迁：非法跃迁被拒绝并留痕，状态保持原样。
    pub(crate) fn transition(&mut self, target: ConnState) {
        if self.state == target {
            return;
        }
        if self.state.can_transition_to(target) {
            tracing::debug!(from = self.state.name(), to = target.name(), "state transition");
            self.state = target;
        } else {
            tracing::warn!(
                from = self.state.name(),
                to = target.name(),
                "state transition rejected"
            );
        }
    }

    /// 遗忘当前句柄与读端并递增代数，返回被遗忘的句柄（若有）。
    pub(crate) fn forget_transport(&mut self) -> Option<Arc<dyn TransportHandle>> {
        self.generation = self.generation.wrapping_add(1);
        self.reader = None;
        self.transport.take()
    }

    /// 终态错误优先：已有终态错误时复述它，否则采用给定的回退错误。
    pub(crate) fn terminal_or(&self, fallback: SocketError) -> SocketError {
        self.terminal_error.clone().unwrap_or(fallback)
    }
}

pub(crate) struct Shared {
    pub(crate) factory: Arc<dyn TransportFactory>,
    pub(crate) options: SocketOptions,
    pub(crate) inner: Mutex<Inner>,
    pub(crate) writer: Mutex<Option<Box<dyn TransportWriter>>>,
    pub(crate) demand: Semaphore,
    pub(crate) events: EventSink,
}

/// 拆除连接：请求关闭（若句柄仍在）、清空全部资源引用并进入终态。
///
/// # 教案式注释
/// - **契约 (What)**：幂等——终态下调用立即返回；`error` 作为触发原因
///   先于 `Closed` 以错误通知浮出；拆除期间的关闭请求失败只记录日志，
///   不再产生第二条错误通知（触发错误优先）；
/// - **执行 (How)**：先在锁内转入 `Closed` 并遗忘引用，使重入与迟到
///   事件立即失效；句柄若已被提前遗忘（对端先行完结），关闭请求被
///   整体跳过，不会出现第二次关闭。
pub(crate) async fn teardown(shared: &Arc<Shared>, error: Option<SocketError>) {
    let transport = {
        let mut inner = shared.inner.lock().await;
        if inner.state.is_terminal() {
            return;
        }
        match &error {
            Some(err) => {
                inner.terminal_error.get_or_insert_with(|| err.clone());
            }
            None => {
                inner.terminal_error.get_or_insert(SocketError::Destroyed);
            }
        }
        inner.transition(ConnState::Closed);
        inner.forget_transport()
    };
    shared.writer.lock().await.take();
    shared.demand.close();
    if let Some(transport) = transport {
        // 关闭确认可能因对端先行离线而永不到来；读到流终点的路径已经
        // 提前遗忘句柄，不会走到这里。
        if let Err(err) = transport.close().await {
            tracing::warn!(error = %err, "close request during teardown failed");
        }
    }
    if let Some(err) = error {
        shared.events.error(err);
    }
    shared.events.closed();
}

/// 能力型套接字之上的双工流适配器。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 让按经典流式套接字语义编写的协议客户端，不加改造地运行在只提供
///   受限能力原语的沙箱平台上；
/// - 所有结果都经由事件通道或操作自身的 `Result` 呈现，任何路径都不以
///   panic 逃逸。
///
/// ## 契约（What）
/// - `connect`：发起建连；成败一律通过通知呈现，本方法不同步失败；
/// - `request_read`：授予一份读取信用，一份信用至多换来一次读取；
/// - `write`：零长度立即完成；非空数据按调用顺序转发给活动写端；
/// - `start_tls`：一次性的在位升级；重复调用只产生错误通知；
/// - `end`：写侧终止并显式请求关闭，终态由关闭信号监视器驱动；
/// - `destroy`：强制拆除；幂等，之后的操作复述终态错误。
///
/// ## 注意事项（Trade-offs）
/// - 实例面向单一调用方设计，多个调用方并发驱动同一实例不在契约之内；
/// - 不设任何内部超时，建连与操作超时由调用方或平台裁决。
#[derive(Clone)]
pub struct SocketAdapter {
    shared: Arc<Shared>,
}

impl SocketAdapter {
    /// 构造适配器并交出事件接收端。
    ///
    /// - **契约 (What)**：`factory` 为平台能力入口；`options` 中的 TLS
    ///   策略自此固定；返回的接收端是事件的唯一出口。
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        options: SocketOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (events, rx) = EventSink::new();
        let shared = Arc::new(Shared {
            factory,
            options,
            inner: Mutex::new(Inner {
                state: ConnState::Idle,
                phase: TlsPhase::NotUpgraded,
                transport: None,
                reader: None,
                generation: 0,
                terminal_error: None,
            }),
            writer: Mutex::new(None),
            demand: Semaphore::new(0),
            events,
        });
        (Self { shared }, rx)
    }

    /// 发起建连。
    ///
    /// # 教案式注释
    ///
    /// ## 意图（Why）
    /// - 打开句柄、附着关闭信号监视器、取得读写端点，再等待打开确认；
    ///   调用方不得因本方法返回就假定成功——成功只由 `Connected`
    ///   通知宣告。
    ///
    /// ## 逻辑（How）
    /// - 打开确认在独立任务中等待：证书被对端拒绝等故障只触发关闭
    ///   信号，打开信号可能永不出结果，在调用方栈上等待会永久悬挂；
    /// - 建连各阶段失败一律转入 `Errored` 并发出错误通知。
    pub async fn connect(&self, host: &str, port: u16) {
        let addr = EndpointAddr::new(host, port);
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.state != ConnState::Idle {
                let err = inner.terminal_or(SocketError::InvalidState {
                    operation: "connect",
                    state: inner.state.name(),
                });
                drop(inner);
                self.shared.events.error(err);
                return;
            }
            inner.transition(ConnState::Connecting);
        }
        let handle = match self
            .shared
            .factory
            .open(&addr, self.shared.options.open_mode())
        {
            Ok(handle) => handle,
            Err(err) => {
                self.fail_connect(&addr, err).await;
                return;
            }
        };
        let generation = {
            let mut inner = self.shared.inner.lock().await;
            if inner.state != ConnState::Connecting {
                // 建连间隙已被销毁
                return;
            }
            inner.generation = inner.generation.wrapping_add(1);
            inner.transport = Some(Arc::clone(&handle));
            inner.generation
        };
        monitor::attach(&self.shared, Arc::clone(&handle), generation);
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.generation != generation {
                return;
            }
            match handle.take_reader() {
                Ok(reader) => inner.reader = Some(reader),
                Err(err) => {
                    drop(inner);
                    self.fail_connect(&addr, err).await;
                    return;
                }
            }
        }
        match handle.take_writer() {
            Ok(writer) => {
                *self.shared.writer.lock().await = Some(writer);
            }
            Err(err) => {
                self.fail_connect(&addr, err).await;
                return;
            }
        }
        pump::spawn(&self.shared);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let outcome = handle.opened().await;
            let mut inner = shared.inner.lock().await;
            if inner.generation != generation || inner.state != ConnState::Connecting {
                return;
            }
            match outcome {
                Ok(()) => {
                    inner.transition(ConnState::Open);
                    drop(inner);
                    shared.events.connected();
                }
                Err(cause) => {
                    let err = SocketError::ConnectFailed {
                        endpoint: addr.to_string(),
                        detail: cause.to_string(),
                    };
                    inner.transition(ConnState::Errored);
                    inner.terminal_error.get_or_insert_with(|| err.clone());
                    inner.forget_transport();
                    drop(inner);
                    shared.writer.lock().await.take();
                    shared.events.error(err);
                }
            }
        });
    }

    /// 建连失败的统一收尾：转入 `Errored`、清空引用并发出错误通知。
    async fn fail_connect(&self, addr: &EndpointAddr, cause: SocketError) {
        let err = SocketError::ConnectFailed {
            endpoint: addr.to_string(),
            detail: cause.to_string(),
        };
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.state.is_terminal() {
                return;
            }
            inner.transition(ConnState::Errored);
            inner.terminal_error.get_or_insert_with(|| err.clone());
            inner.forget_transport();
        }
        self.shared.writer.lock().await.take();
        self.shared.events.error(err);
    }

    /// 授予一份读取信用；一份信用至多换来一次读取。
    pub fn request_read(&self) {
        self.shared.demand.add_permits(1);
    }

    /// 写出一段数据。
    ///
    /// - **契约 (What)**：零长度立即成功且不触达传输层；写失败只通过
    ///   本次调用的 `Result` 上报，连接保持原状，是否放弃由调用方裁决；
    /// - **执行 (How)**：公平写槽锁保证转发顺序即调用顺序；完成顺序
    ///   遵循底层写端自身的契约。
    pub async fn write(&self, chunk: Bytes) -> Result<(), SocketError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let mut slot = self.shared.writer.lock().await;
        match slot.as_mut() {
            Some(writer) => writer.write(chunk).await,
            None => {
                drop(slot);
                let inner = self.shared.inner.lock().await;
                Err(inner.terminal_or(SocketError::InvalidState {
                    operation: "write",
                    state: inner.state.name(),
                }))
            }
        }
    }

    /// 发起一次性的 starttls 在位升级。
    ///
    /// # 教案式注释
    ///
    /// ## 意图（Why）
    /// - 在同一条逻辑连接上把明文句柄整体替换为 TLS 保护的句柄，应用层
    ///   状态（已交换的协议字节）不受影响；
    /// - 升级不可重复也不可重试：相位一旦离开 `NotUpgraded`，再次调用
    ///   只产生错误通知，绝不触碰现有状态。
    ///
    /// ## 逻辑（How）
    /// - 先释放读端与写端（旧句柄保持存活以承载升级操作），随后调用
    ///   升级原语换取新句柄，再从新句柄取得全新读写端点并重新附着
    ///   关闭信号监视器；
    /// - 旧句柄的自毁由其关闭信号宣告，监视器据 `Upgrading` 相位将其
    ///   判定为预期事件并推进至 `Upgraded`；
    /// - 升级期间写槽锁被持有，并发写入自动排队到新写端就位之后。
    pub async fn start_tls(&self, options: TlsOptions) {
        let old = {
            let mut inner = self.shared.inner.lock().await;
            match inner.phase {
                TlsPhase::Upgrading | TlsPhase::Upgraded => {
                    drop(inner);
                    self.shared.events.error(SocketError::UpgradeNotRepeatable);
                    return;
                }
                TlsPhase::NotUpgraded => {}
            }
            let old = match (&inner.transport, inner.state) {
                (Some(transport), ConnState::Open) => Arc::clone(transport),
                _ => {
                    let err = inner.terminal_or(SocketError::InvalidState {
                        operation: "starttls",
                        state: inner.state.name(),
                    });
                    drop(inner);
                    self.shared.events.error(err);
                    return;
                }
            };
            inner.phase = TlsPhase::Upgrading;
            // 释放读端；写端随后在写槽锁下释放
            inner.reader = None;
            old
        };
        let mut writer_slot = self.shared.writer.lock().await;
        writer_slot.take();
        match old.upgrade(options).await {
            Ok(replacement) => {
                let generation = {
                    let mut inner = self.shared.inner.lock().await;
                    if inner.state.is_terminal() {
                        return;
                    }
                    inner.generation = inner.generation.wrapping_add(1);
                    inner.transport = Some(Arc::clone(&replacement));
                    match replacement.take_reader() {
                        Ok(reader) => inner.reader = Some(reader),
                        Err(err) => {
                            drop(inner);
                            drop(writer_slot);
                            teardown(&self.shared, Some(err)).await;
                            return;
                        }
                    }
                    inner.generation
                };
                monitor::attach(&self.shared, Arc::clone(&replacement), generation);
                match replacement.take_writer() {
                    Ok(writer) => {
                        *writer_slot = Some(writer);
                    }
                    Err(err) => {
                        drop(writer_slot);
                        teardown(&self.shared, Some(err)).await;
                    }
                }
            }
            Err(cause) => {
                drop(writer_slot);
                let err = SocketError::UpgradeFailed {
                    detail: cause.to_string(),
                };
                teardown(&self.shared, Some(err)).await;
            }
        }
    }

    /// 优雅终止：写侧终止信号先行，再显式请求关闭。
    ///
    /// - **意图 (Why)**：只做写侧半关闭而不请求关闭的话，同样在等待
    ///   我方关闭的对端将无限悬挂；
    /// - **执行 (How)**：关闭确认不在本方法中等待——终态由关闭信号
    ///   监视器驱动；句柄已被遗忘时直接走销毁短路。
    pub async fn end(&self) {
        let writer = self.shared.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(err) = writer.finish().await {
                tracing::warn!(error = %err, "write-side finish failed during end");
            }
        }
        let transport = self.shared.inner.lock().await.transport.clone();
        match transport {
            Some(transport) => {
                tokio::spawn(async move {
                    if let Err(err) = transport.close().await {
                        tracing::debug!(error = %err, "close request after end failed");
                    }
                });
            }
            None => teardown(&self.shared, None).await,
        }
    }

    /// 强制拆除连接。
    ///
    /// - **契约 (What)**：幂等；`error` 若给出，先以错误通知浮出，再发
    ///   终态 `Closed`；句柄已被遗忘时立即完成，不会发出第二次关闭
    ///   请求。
    pub async fn destroy(&self, error: Option<SocketError>) {
        teardown(&self.shared, error).await;
    }

    /// 当前连接状态（观测接口）。
    pub async fn state(&self) -> ConnState {
        self.shared.inner.lock().await.state
    }

    /// 当前升级相位（观测接口）。
    pub async fn tls_phase(&self) -> TlsPhase {
        self.shared.inner.lock().await.phase
    }

    /// 是否仍持有活动句柄（观测接口）。
    pub async fn has_active_transport(&self) -> bool {
        self.shared.inner.lock().await.transport.is_some()
    }
}
