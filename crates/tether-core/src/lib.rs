#![doc = r#"
# tether-core

## 设计动机（Why）
- **定位**：该 crate 定义 tether 适配层跨 crate 共享的最小契约：错误域、
  事件模型，以及受限沙箱平台暴露的能力型套接字（capability socket）抽象。
- **架构角色**：与实现层（`tether-socket`）、契约测试层（`tether-tck`）
  解耦，任何实现只需依赖本 crate 即可遵循统一语义。
- **设计理念**：平台套接字是"一次性资源"的集合——打开/关闭信号各只触发
  一次，读端与写端只能被取走一次，升级操作整体替换句柄。契约层用所有权
  与 `Result` 把这些一次性语义显式化，而不是依赖调用纪律。

## 核心契约（What）
- **输入条件**：实现方必须保证 `opened`/`closed` 信号的一次性触发语义，
  以及 `take_reader`/`take_writer` 的单次取用约束；
- **输出保障**：所有可观察故障均以 [`SocketError`](error::SocketError)
  呈现，并携带稳定错误码；
- **前置约束**：契约本身不绑定具体异步运行时，对象层接口通过
  `async-trait` 保持 dyn 安全。

## 实现策略（How）
- 错误域以 `thiserror` 枚举承载，变体携带可读上下文与稳定错误码；
- 能力接口拆分为工厂（开启句柄）、句柄（信号与升级）、读端/写端四个
  对象安全 trait，使测试替身与真实平台实现可以互换。
"#]

pub mod capability;
pub mod config;
pub mod error;
pub mod event;

pub use capability::{
    ReadOutcome, TransportFactory, TransportHandle, TransportReader, TransportWriter,
};
pub use config::{EndpointAddr, SocketOptions, TlsMode, TlsOptions};
pub use error::SocketError;
pub use event::SocketEvent;
