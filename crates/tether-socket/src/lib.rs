#![doc = r#"
# tether-socket

## 设计动机（Why）
- **定位**：在受限沙箱的能力型套接字之上，重建经典双工流套接字的语义
  （持续读事件、任意写入、半关闭），供按该语义编写的数据库协议客户端
  直接驱动。
- **架构角色**：实现 `tether-core` 的契约面；平台能力经由工厂注入，
  真实绑定与 `tether-tck` 的脚本化传输可以互换。
- **设计理念**：两套生命周期模型的冲突点全部收敛在一处——连接状态
  控制器独占句柄与读写端点，读泵与关闭信号监视器只在其授意下行动。
  字节不丢失、不双重关闭、升级期间旧通道的自毁不被误判为真实断连。

## 核心契约（What）
- **输入条件**：一个适配器实例服务一条逻辑连接，不支持多调用方并发
  驱动同一实例；
- **输出保障**：连接事件至多一次、终态关闭至多一次、流终点至多一次；
  读取严格串行，一份信用对应至多一次在途读取；
- **前置约束**：必须运行在 Tokio 运行时之内（监视器与读泵均为
  `tokio::spawn` 任务）。

## 实现策略（How）
- **状态机**：显式的连接状态枚举叠加三态升级相位，非法组合不可表示；
- **独占槽位**：读端/写端放入"空即在途"的可选槽位，单飞读取与
  释放-再取用的升级顺序由所有权结构保证；
- **代际计数**：每次句柄附着递增一次代数，迟到的读取结果与关闭信号
  凭代数作废，销毁之后不再产生任何通知。
"#]

mod adapter;
mod monitor;
mod pump;
mod sink;
mod state;

pub use adapter::SocketAdapter;
pub use state::{ConnState, TlsPhase};
