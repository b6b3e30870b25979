//! # capability 模块说明
//!
//! ## 角色定位（Why）
//! - 抽象受限沙箱平台提供的能力型套接字原语：句柄由工厂一次性打开，
//!   暴露一次性的打开/关闭信号、单次取用的读端与写端，以及一次在位
//!   TLS 升级操作；
//! - 对象安全的 trait 边界让真实平台绑定与测试替身（`tether-tck` 的
//!   脚本化传输）可以互换，适配器实现层只面向本契约编程。
//!
//! ## 契约要点（What）
//! - 信号是一次性的：`opened`/`closed` 各至多产生一个结果；
//! - 读端/写端是独占资源：`take_reader`/`take_writer` 第二次调用必须
//!   返回错误，而非偷偷共享；
//! - `upgrade` 整体替换句柄：旧句柄随后自毁（其关闭信号会触发），新句柄
//!   形态与旧句柄完全一致；
//! - `close` 的确认依赖对端配合：若对端早已停止通信，该调用可能永不
//!   完成，调用方必须为此设防。

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{EndpointAddr, TlsMode, TlsOptions};
use crate::error::SocketError;

/// 单次读取的结果。
///
/// - **意图 (Why)**：把"对端写侧完结"从错误域中分离出来——流的自然终点
///   不是故障，适配器对两者的处置完全不同；
/// - **契约 (What)**：`Chunk` 携带非空数据；`End` 之后读端不会再产生
///   任何结果。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    /// 一段到站数据。
    Chunk(Bytes),
    /// 对端已关闭其写侧，流到达自然终点。
    End,
}

/// 句柄的单消费者读端。
///
/// # 教案式说明
/// - **意图 (Why)**：平台只允许一个消费者持有读端；以 `&mut self` 表达
///   独占，使"同一时刻至多一个在途读取"成为类型层面的事实；
/// - **契约 (What)**：`read` 每次恰好产生一个结果；在前一次 `read` 完成
///   之前不得再次调用（实现可以在违例时返回错误或 panic）；
/// - **风险 (Trade-offs)**：丢弃读端即视为归还平台资源，没有显式的
///   release 操作。
#[async_trait]
pub trait TransportReader: Send {
    /// 执行一次读取，挂起直到数据到站、流完结或出错。
    async fn read(&mut self) -> Result<ReadOutcome, SocketError>;
}

/// 句柄的单生产者写端。
///
/// - **契约 (What)**：`write` 把整段数据交给平台，按调用顺序完成；
///   `finish` 宣告写侧终止（半关闭），之后不得再写；
/// - **风险 (Trade-offs)**：与读端相同，丢弃写端即归还资源。
#[async_trait]
pub trait TransportWriter: Send {
    /// 写出一段数据，完成即表示平台已接收整段内容。
    async fn write(&mut self, chunk: Bytes) -> Result<(), SocketError>;

    /// 宣告写侧终止（end-of-output），对应流式接口的半关闭。
    async fn finish(&mut self) -> Result<(), SocketError>;
}

/// 能力型套接字句柄。
///
/// # 教案式说明
///
/// ## 意图（Why）
/// - 句柄聚合了平台套接字的全部能力面：生命周期信号、读写端点与升级
///   操作；适配器对平台的一切交互都经由本契约；
/// - 升级被建模为"产出新句柄"而非"就地变身"，旧句柄的失效因此显式可见。
///
/// ## 契约（What）
/// - `opened`：等待打开确认；失败表示建连未成形；
/// - `closed`：等待一次性的关闭信号；`Ok` 表示正常关闭（含对端或平台
///   主动关闭），`Err` 表示信号本身以错误收尾；
/// - `take_reader`/`take_writer`：取走独占端点，重复取用返回
///   [`SocketError::Capability`]；
/// - `upgrade`：执行 starttls，成功后返回形态一致的新句柄；旧句柄自毁，
///   其 `closed` 信号随之触发；
/// - `close`：显式请求关闭，完成即表示对端已确认。
///
/// ## 风险（Trade-offs）
/// - `close` 可能永不完成（对端先行离线时）；调用方应当在读到流终点后
///   立即放弃句柄引用，而不是再对其发起关闭。
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// 等待打开确认信号。
    async fn opened(&self) -> Result<(), SocketError>;

    /// 等待一次性的关闭信号。
    async fn closed(&self) -> Result<(), SocketError>;

    /// 取走单消费者读端。
    fn take_reader(&self) -> Result<Box<dyn TransportReader>, SocketError>;

    /// 取走单生产者写端。
    fn take_writer(&self) -> Result<Box<dyn TransportWriter>, SocketError>;

    /// 在位升级为 TLS 保护的句柄，旧句柄随之自毁。
    async fn upgrade(&self, options: TlsOptions) -> Result<Arc<dyn TransportHandle>, SocketError>;

    /// 显式请求关闭，等待对端确认。
    async fn close(&self) -> Result<(), SocketError>;
}

/// 能力型套接字工厂。
///
/// # 教案式说明
/// - **意图 (Why)**：打开本身是同步返回句柄的平台原语，所有等待都发生
///   在句柄的 `opened` 信号上；工厂边界同时是测试替身的注入点；
/// - **契约 (What)**：`open` 根据打开模式产出一个全新句柄；失败表示
///   平台在受理阶段即拒绝（配额、策略等），与建连失败同样以错误通知
///   呈现给客户端库。
pub trait TransportFactory: Send + Sync {
    /// 按指定模式打开一个新句柄。
    fn open(
        &self,
        addr: &EndpointAddr,
        mode: TlsMode,
    ) -> Result<Arc<dyn TransportHandle>, SocketError>;
}
