//! 面向客户端库的异步通知模型。
//!
//! # 教案式说明
//! - **Why**：驱动适配器的客户端库以事件流感知连接生命周期；契约层固定
//!   事件集合与触发次数约束，实现层负责结构性地兑现它们；
//! - **What**：五种事件及其次数契约——`Connected` 至多一次、`Data` 零或
//!   多次、`End` 至多一次、`Error` 零或多次（致命错误之后适配器不可再
//!   用）、`Closed` 至多一次且为终态；
//! - **How**：事件经 `tokio::sync::mpsc` 无界通道投递，相对顺序即发射
//!   顺序；通道由实现层在构造适配器时一并交出。

use bytes::Bytes;

use crate::error::SocketError;

/// 适配器产生的异步通知。
///
/// # 教案式说明
/// - **意图 (Why)**：以单一枚举覆盖连接生命周期的全部可观察事实，使
///   消费侧可以用一个接收循环驱动整个协议客户端；
/// - **契约 (What)**：一条正常生命线的相对顺序为
///   `Connected` … `Data*` … (`End`)? … `Closed`；`Error` 可穿插其间；
///   `Closed` 之后不再有任何事件；
/// - **风险 (Trade-offs)**：`Data` 直接携带 [`Bytes`]，零拷贝转发平台
///   缓冲；消费侧若长期囤积事件，将由无界通道承担内存压力——按需读取
///   的信用机制（见实现层）从源头限制了积压规模。
#[derive(Clone, Debug, PartialEq)]
pub enum SocketEvent {
    /// 连接建立完成（打开信号已确认），至多触发一次。
    Connected,
    /// 一段到站数据。
    Data(Bytes),
    /// 对端写侧完结，至多触发一次。
    End,
    /// 错误通知；致命错误之后适配器不可再用。
    Error(SocketError),
    /// 终态关闭，至多触发一次，此后不再有任何事件。
    Closed,
}

impl SocketEvent {
    /// 事件的简短名称，供日志使用。
    pub fn name(&self) -> &'static str {
        match self {
            SocketEvent::Connected => "connected",
            SocketEvent::Data(_) => "data",
            SocketEvent::End => "end",
            SocketEvent::Error(_) => "error",
            SocketEvent::Closed => "closed",
        }
    }
}
