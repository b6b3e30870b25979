#![doc = r#"
# tether-tck

## 章节定位（Why）
- **目标**：为能力型套接字适配器提供最小可运行的契约断言套件（TCK），
  确保实现变更后立即被回归验证覆盖：单飞读取、一次性事件、升级期间
  的关闭信号分类、销毁路径的幂等与静默等关键不变量都有对应断言。
- **组成**：脚本化的能力传输替身（`mock`）重现沙箱平台的一次性资源
  语义；断言套件（`suite`）以真实适配器加替身传输驱动完整场景。

## 使用方式（How）
- 实现 crate 将本 crate 列为 dev 依赖，在集成测试中直接调用
  `suite::assert_*`，由 TCK 维护场景细节，本地只需提供 Tokio 运行时；
- 断言失败时返回 `anyhow` 错误并附带阶段性上下文信息。
"#]

pub mod mock;
pub mod suite;

pub use mock::{MockFactory, MockTransport};
