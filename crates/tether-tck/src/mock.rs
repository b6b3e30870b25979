//! # 脚本化能力传输替身
//!
//! ## 角色定位（Why）
//! - 在进程内重现沙箱平台套接字的一次性资源语义：打开/关闭信号各只
//!   触发一次、读端与写端只能取走一次、升级以"旧句柄自毁 + 新句柄
//!   接替"的方式完成；
//! - 信号触发时机与读取结果全部由测试脚本控制，时序相关的契约
//!   （延迟打开、升级窗口内的关闭、迟到结果作废）得以精确复现。
//!
//! ## 观测面（What）
//! - 记录每次写入的数据、关闭/升级/写侧终止的调用次数与相对顺序；
//! - 并发读取侦测：读端在前一次读取未完成时被再次调用，立即记下
//!   违例并返回错误，供单飞断言使用。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use tether_core::{
    EndpointAddr, ReadOutcome, SocketError, TlsMode, TlsOptions, TransportFactory,
    TransportHandle, TransportReader, TransportWriter,
};

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("mock 内部状态锁中毒")
}

/// 一次性信号：至多携带一个结果，重复触发被忽略。
///
/// # 教案式说明
/// - **意图 (Why)**：平台的 opened/closed 信号都是一次性承诺；替身用
///   "结果槽 + 通知"复现该语义，首个结果永久生效；
/// - **执行 (How)**：等待方先注册通知再检查结果槽，触发与等待之间
///   不存在丢失窗口。
struct Signal {
    state: StdMutex<Option<Result<(), SocketError>>>,
    notify: Notify,
}

impl Signal {
    fn new() -> Self {
        Self {
            state: StdMutex::new(None),
            notify: Notify::new(),
        }
    }

    fn resolve(&self, outcome: Result<(), SocketError>) {
        let mut slot = lock(&self.state);
        if slot.is_none() {
            *slot = Some(outcome);
            self.notify.notify_waiters();
        }
    }

    async fn wait(&self) -> Result<(), SocketError> {
        loop {
            let notified = self.notify.notified();
            if let Some(outcome) = lock(&self.state).clone() {
                return outcome;
            }
            notified.await;
        }
    }
}

/// 读侧脚本状态：读端与句柄共享，读端被取走后脚本注入依旧生效。
struct ReadScript {
    queue: StdMutex<VecDeque<Result<ReadOutcome, SocketError>>>,
    notify: Notify,
    in_flight: AtomicBool,
    concurrent_seen: AtomicBool,
}

/// 写侧脚本状态与观测记录。
struct WriteScript {
    written: StdMutex<Vec<Bytes>>,
    fault: StdMutex<Option<SocketError>>,
    finish_calls: AtomicUsize,
}

type OpsLog = StdMutex<Vec<&'static str>>;

/// 脚本化能力句柄。
///
/// # 教案式说明
/// - **契约 (What)**：形态与真实平台句柄一致——一次性信号、单次取用的
///   读写端、一次升级；脚本接口（`push_chunk`/`resolve_opened` 等）
///   供测试在任意时刻注入事件；
/// - **风险 (Trade-offs)**：内部以互斥锁与原子量实现，不追求高并发
///   性能，只追求时序可控与断言友好。
pub struct MockTransport {
    opened: Signal,
    closed: Signal,
    reads: Arc<ReadScript>,
    writes: Arc<WriteScript>,
    reader_taken: AtomicBool,
    writer_taken: AtomicBool,
    upgrade_twin: StdMutex<Option<Arc<MockTransport>>>,
    upgrade_fault: StdMutex<Option<SocketError>>,
    close_calls: AtomicUsize,
    upgrade_calls: AtomicUsize,
    ops: Arc<OpsLog>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opened: Signal::new(),
            closed: Signal::new(),
            reads: Arc::new(ReadScript {
                queue: StdMutex::new(VecDeque::new()),
                notify: Notify::new(),
                in_flight: AtomicBool::new(false),
                concurrent_seen: AtomicBool::new(false),
            }),
            writes: Arc::new(WriteScript {
                written: StdMutex::new(Vec::new()),
                fault: StdMutex::new(None),
                finish_calls: AtomicUsize::new(0),
            }),
            reader_taken: AtomicBool::new(false),
            writer_taken: AtomicBool::new(false),
            upgrade_twin: StdMutex::new(None),
            upgrade_fault: StdMutex::new(None),
            close_calls: AtomicUsize::new(0),
            upgrade_calls: AtomicUsize::new(0),
            ops: Arc::new(StdMutex::new(Vec::new())),
        })
    }

    // ---- 脚本接口 ----

    /// 触发打开确认信号。
    pub fn resolve_opened(&self) {
        self.opened.resolve(Ok(()));
    }

    /// 令打开信号以错误收尾。
    pub fn fail_opened(&self, error: SocketError) {
        self.opened.resolve(Err(error));
    }

    /// 触发关闭信号（正常收尾）。
    pub fn resolve_closed(&self) {
        self.closed.resolve(Ok(()));
    }

    /// 令关闭信号以错误收尾。
    pub fn fail_closed(&self, error: SocketError) {
        self.closed.resolve(Err(error));
    }

    /// 注入一段到站数据。
    pub fn push_chunk(&self, chunk: &[u8]) {
        lock(&self.reads.queue).push_back(Ok(ReadOutcome::Chunk(Bytes::copy_from_slice(chunk))));
        self.reads.notify.notify_waiters();
    }

    /// 注入流终点。
    pub fn push_end(&self) {
        lock(&self.reads.queue).push_back(Ok(ReadOutcome::End));
        self.reads.notify.notify_waiters();
    }

    /// 注入一次读取错误。
    pub fn push_read_error(&self, error: SocketError) {
        lock(&self.reads.queue).push_back(Err(error));
        self.reads.notify.notify_waiters();
    }

    /// 设置（或清除）写入故障；故障保持生效直至清除。
    pub fn set_write_fault(&self, fault: Option<SocketError>) {
        *lock(&self.writes.fault) = fault;
    }

    /// 预置升级产出的接替句柄。
    pub fn set_upgrade_twin(&self, twin: Arc<MockTransport>) {
        *lock(&self.upgrade_twin) = Some(twin);
    }

    /// 令下一次升级操作失败。
    pub fn set_upgrade_fault(&self, fault: SocketError) {
        *lock(&self.upgrade_fault) = Some(fault);
    }

    // ---- 观测接口 ----

    /// 写端收到的全部数据，按写入顺序排列。
    pub fn written(&self) -> Vec<Bytes> {
        lock(&self.writes.written).clone()
    }

    /// 显式关闭请求的次数。
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Acquire)
    }

    /// 升级操作的调用次数。
    pub fn upgrade_calls(&self) -> usize {
        self.upgrade_calls.load(Ordering::Acquire)
    }

    /// 写侧终止信号的次数。
    pub fn finish_calls(&self) -> usize {
        self.writes.finish_calls.load(Ordering::Acquire)
    }

    /// 是否观察到并发读取违例。
    pub fn concurrent_read_seen(&self) -> bool {
        self.reads.concurrent_seen.load(Ordering::Acquire)
    }

    /// 关键操作的相对顺序（`finish`/`close`/`upgrade`）。
    pub fn ops(&self) -> Vec<&'static str> {
        lock(&self.ops).clone()
    }
}

#[async_trait]
impl TransportHandle for MockTransport {
    async fn opened(&self) -> Result<(), SocketError> {
        self.opened.wait().await
    }

    async fn closed(&self) -> Result<(), SocketError> {
        self.closed.wait().await
    }

    fn take_reader(&self) -> Result<Box<dyn TransportReader>, SocketError> {
        if self.reader_taken.swap(true, Ordering::AcqRel) {
            return Err(SocketError::capability("reader already taken"));
        }
        Ok(Box::new(MockReader {
            script: Arc::clone(&self.reads),
        }))
    }

    fn take_writer(&self) -> Result<Box<dyn TransportWriter>, SocketError> {
        if self.writer_taken.swap(true, Ordering::AcqRel) {
            return Err(SocketError::capability("writer already taken"));
        }
        Ok(Box::new(MockWriter {
            script: Arc::clone(&self.writes),
            ops: Arc::clone(&self.ops),
        }))
    }

    async fn upgrade(&self, _options: TlsOptions) -> Result<Arc<dyn TransportHandle>, SocketError> {
        self.upgrade_calls.fetch_add(1, Ordering::AcqRel);
        lock(&self.ops).push("upgrade");
        if let Some(fault) = lock(&self.upgrade_fault).take() {
            return Err(fault);
        }
        let Some(twin) = lock(&self.upgrade_twin).take() else {
            return Err(SocketError::capability("no upgrade twin scripted"));
        };
        // 平台语义：旧句柄随升级自毁，其关闭信号随之触发
        self.closed.resolve(Ok(()));
        Ok(twin as Arc<dyn TransportHandle>)
    }

    async fn close(&self) -> Result<(), SocketError> {
        self.close_calls.fetch_add(1, Ordering::AcqRel);
        lock(&self.ops).push("close");
        self.closed.resolve(Ok(()));
        Ok(())
    }
}

struct MockReader {
    script: Arc<ReadScript>,
}

#[async_trait]
impl TransportReader for MockReader {
    async fn read(&mut self) -> Result<ReadOutcome, SocketError> {
        if self.script.in_flight.swap(true, Ordering::AcqRel) {
            self.script.concurrent_seen.store(true, Ordering::Release);
            return Err(SocketError::capability("concurrent read detected"));
        }
        let outcome = loop {
            let notified = self.script.notify.notified();
            if let Some(outcome) = lock(&self.script.queue).pop_front() {
                break outcome;
            }
            notified.await;
        };
        self.script.in_flight.store(false, Ordering::Release);
        outcome
    }
}

struct MockWriter {
    script: Arc<WriteScript>,
    ops: Arc<OpsLog>,
}

#[async_trait]
impl TransportWriter for MockWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SocketError> {
        if let Some(fault) = lock(&self.script.fault).clone() {
            return Err(fault);
        }
        lock(&self.script.written).push(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SocketError> {
        self.script.finish_calls.fetch_add(1, Ordering::AcqRel);
        lock(&self.ops).push("finish");
        Ok(())
    }
}

/// 脚本化能力工厂：按预置顺序交出句柄，并记录每次打开的地址与模式。
///
/// # 教案式说明
/// - **意图 (Why)**：工厂边界是适配器与平台的唯一接缝，替身在此记录
///   打开模式，供 TLS 策略断言使用；
/// - **契约 (What)**：`script` 预置句柄队列；队列耗尽或设置了打开故障
///   时，`open` 返回错误。
pub struct MockFactory {
    scripted: StdMutex<VecDeque<Arc<MockTransport>>>,
    opens: StdMutex<Vec<(EndpointAddr, TlsMode)>>,
    open_fault: StdMutex<Option<SocketError>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripted: StdMutex::new(VecDeque::new()),
            opens: StdMutex::new(Vec::new()),
            open_fault: StdMutex::new(None),
        })
    }

    /// 预置下一个被交出的句柄。
    pub fn script(&self, transport: Arc<MockTransport>) {
        lock(&self.scripted).push_back(transport);
    }

    /// 令下一次打开失败。
    pub fn set_open_fault(&self, fault: SocketError) {
        *lock(&self.open_fault) = Some(fault);
    }

    /// 全部打开请求的地址与模式记录。
    pub fn opens(&self) -> Vec<(EndpointAddr, TlsMode)> {
        lock(&self.opens).clone()
    }
}

impl TransportFactory for MockFactory {
    fn open(
        &self,
        addr: &EndpointAddr,
        mode: TlsMode,
    ) -> Result<Arc<dyn TransportHandle>, SocketError> {
        lock(&self.opens).push((addr.clone(), mode));
        if let Some(fault) = lock(&self.open_fault).take() {
            return Err(fault);
        }
        lock(&self.scripted)
            .pop_front()
            .map(|transport| transport as Arc<dyn TransportHandle>)
            .ok_or_else(|| SocketError::capability("no scripted transport available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 一次性信号只认首个结果，重复触发被忽略。
    #[tokio::test(flavor = "multi_thread")]
    async fn signal_is_one_shot() {
        let signal = Signal::new();
        signal.resolve(Ok(()));
        signal.resolve(Err(SocketError::Destroyed));
        assert_eq!(signal.wait().await, Ok(()));
        assert_eq!(signal.wait().await, Ok(()));
    }

    /// 读端与写端都只能取走一次。
    #[tokio::test(flavor = "multi_thread")]
    async fn endpoints_are_single_use() {
        let transport = MockTransport::new();
        assert!(transport.take_reader().is_ok());
        assert!(transport.take_reader().is_err(), "读端不应允许二次取用");
        assert!(transport.take_writer().is_ok());
        assert!(transport.take_writer().is_err(), "写端不应允许二次取用");
    }

    /// 先注入后读取与先读取后注入均能交付数据。
    #[tokio::test(flavor = "multi_thread")]
    async fn scripted_reads_deliver_in_order() {
        let transport = MockTransport::new();
        transport.push_chunk(b"a");
        let mut reader = transport.take_reader().expect("读端可用");
        assert_eq!(
            reader.read().await,
            Ok(ReadOutcome::Chunk(Bytes::from_static(b"a")))
        );
        let injector = Arc::clone(&transport);
        let pending = tokio::spawn(async move { reader.read().await });
        tokio::task::yield_now().await;
        injector.push_end();
        assert_eq!(
            pending.await.expect("读取任务不应 panic"),
            Ok(ReadOutcome::End)
        );
    }
}
