//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为适配层对外暴露的错误语义提供集中定义，覆盖建连、读写、升级与
//!   生命周期各条路径；
//! - 每个变体绑定一个稳定错误码（`<域>.<语义>` 约定），方便日志、指标
//!   与告警系统做精确归类。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error`，满足 `Send + Sync + 'static`；
//! - 变体派生 `Clone + Eq`，以字符串保存底层上下文而非装箱 `source`，
//!   使终态错误可以在后续调用中原样复述；
//! - 故障只通过事件通知或操作自身的 `Result` 浮出，不允许以 panic 逃逸。

use thiserror::Error;

/// 适配层统一错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合建连失败、读写故障、升级冲突与意外关闭等关键
///   路径的异常，调用方据此决定重试、告警或直接拆除连接；
/// - **契约 (What)**：
///   - 变体均可跨线程传播，并通过 [`code`](SocketError::code) 给出稳定
///     错误码；
///   - 适配器销毁后，终态错误会以克隆形式在后续操作中复述；
/// - **设计权衡 (Trade-offs)**：使用 `String` 保存上下文，牺牲少量堆分配
///   换取 `Clone + Eq`；若未来需要完整根因链，可在变体中补充结构化字段。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SocketError {
    /// 建连失败：打开句柄或等待打开信号阶段出错。
    ///
    /// - **意图 (Why)**：建连失败永远以错误通知呈现，调用方不应假定
    ///   `connect` 的同步返回意味着成功；
    /// - **契约 (What)**：`endpoint` 为目标 `host:port`；`detail` 为底层
    ///   平台给出的描述。
    #[error("connect to `{endpoint}` failed: {detail}")]
    ConnectFailed { endpoint: String, detail: String },

    /// 读取失败：读端返回的致命错误，适配器将携带该原因自毁。
    #[error("transport read failed: {detail}")]
    ReadFailed { detail: String },

    /// 写入失败：仅通过该次写操作的 `Result` 上报，不自动拆除连接。
    ///
    /// - **意图 (Why)**：是否因一次写失败放弃整条连接，由驱动它的客户端
    ///   库决定；适配器保持连接原状。
    #[error("transport write failed: {detail}")]
    WriteFailed { detail: String },

    /// 升级操作本身失败（平台拒绝或句柄更替出错）。
    #[error("tls upgrade failed: {detail}")]
    UpgradeFailed { detail: String },

    /// 重复升级：starttls 不具备幂等性，第二次调用只产生本错误通知，
    /// 不改变适配器状态。
    #[error("tls upgrade already performed; starttls is not repeatable")]
    UpgradeNotRepeatable,

    /// 意外关闭：活动传输的关闭信号在非升级窗口触发。
    ///
    /// - **契约 (What)**：`detail` 可能为空——部分平台故障（例如对端
    ///   静默拒绝不受信证书）只会以一次无说明的关闭信号呈现。
    #[error("transport closed unexpectedly{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    UnexpectedClose { detail: Option<String> },

    /// 操作在当前状态下不可用（例如重复 connect、升级前写入）。
    #[error("operation `{operation}` is not permitted in state `{state}`")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// 适配器已销毁，后续操作只能复述该终态。
    #[error("socket adapter already destroyed")]
    Destroyed,

    /// 平台能力层的其他故障（读端/写端重复取用、能力未就绪等）。
    #[error("platform capability fault: {detail}")]
    Capability { detail: String },
}

impl SocketError {
    /// 返回该错误的稳定错误码。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：错误消息面向排障人员，措辞允许调整；错误码面向
    ///   自动化治理，必须保持稳定；
    /// - **契约 (What)**：返回 `'static` 字符串，遵循 `<域>.<语义>` 约定；
    /// - **风险 (Trade-offs)**：新增变体时必须同步补充错误码，并由单元
    ///   测试钉住既有取值。
    pub fn code(&self) -> &'static str {
        match self {
            SocketError::ConnectFailed { .. } => "socket.connect",
            SocketError::ReadFailed { .. } => "socket.read",
            SocketError::WriteFailed { .. } => "socket.write",
            SocketError::UpgradeFailed { .. } => "socket.upgrade",
            SocketError::UpgradeNotRepeatable => "socket.upgrade.repeated",
            SocketError::UnexpectedClose { .. } => "socket.closed",
            SocketError::InvalidState { .. } => "socket.state",
            SocketError::Destroyed => "socket.destroyed",
            SocketError::Capability { .. } => "socket.capability",
        }
    }

    /// 以平台能力故障的形式包装一段描述。
    pub fn capability(detail: impl Into<String>) -> Self {
        SocketError::Capability {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 错误码一经发布即不可变，本用例将其钉死。
    #[test]
    fn error_codes_are_stable() {
        let cases = [
            (
                SocketError::ConnectFailed {
                    endpoint: "db:5432".into(),
                    detail: "refused".into(),
                },
                "socket.connect",
            ),
            (
                SocketError::ReadFailed {
                    detail: "reset".into(),
                },
                "socket.read",
            ),
            (
                SocketError::WriteFailed {
                    detail: "broken pipe".into(),
                },
                "socket.write",
            ),
            (
                SocketError::UpgradeFailed {
                    detail: "handshake".into(),
                },
                "socket.upgrade",
            ),
            (SocketError::UpgradeNotRepeatable, "socket.upgrade.repeated"),
            (
                SocketError::UnexpectedClose { detail: None },
                "socket.closed",
            ),
            (
                SocketError::InvalidState {
                    operation: "write",
                    state: "idle",
                },
                "socket.state",
            ),
            (SocketError::Destroyed, "socket.destroyed"),
            (SocketError::capability("reader already taken"), "socket.capability"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code, "错误码被意外修改: {err}");
        }
    }

    /// 无说明的意外关闭不应在消息里留下悬空的冒号。
    #[test]
    fn unexpected_close_message_without_detail() {
        let bare = SocketError::UnexpectedClose { detail: None };
        assert_eq!(bare.to_string(), "transport closed unexpectedly");

        let detailed = SocketError::UnexpectedClose {
            detail: Some("peer reset".into()),
        };
        assert_eq!(
            detailed.to_string(),
            "transport closed unexpectedly: peer reset"
        );
    }
}
