//! # 连接状态机与升级相位
//!
//! ## 核心意图（Why）
//! - 把适配器生命周期的关键阶段建模为显式枚举，让状态跃迁具备可验证
//!   约束，避免散落的布尔标志在并发事件下组合出无意义状态；
//! - 升级相位独立于连接状态：`Open` 期间可以处于升级的任一阶段，而
//!   升级相位的单调性（一去不返）正是 starttls 不可重复的结构化表达。
//!
//! ## 状态机约束（What）
//! - 合法跃迁：`Idle → Connecting → Open → Closed`；`Connecting` 可失败
//!   进入 `Errored`；任何非终态均可被销毁进入 `Closed`；
//! - `Closed` 为唯一终态，允许自环以支撑幂等销毁；
//! - 升级相位只允许 `NotUpgraded → Upgrading → Upgraded` 单向推进。

/// 连接状态。
///
/// # 教案式说明
/// - **意图 (Why)**：覆盖适配器生命周期的关键阶段，指导各组件在事件
///   到达时的处置路径；
/// - **契约 (What)**：状态间跃迁受 [`ConnState::can_transition_to`]
///   限制；`Closed` 之后不接受任何跃迁（自环除外）；
/// - **风险 (Trade-offs)**：`Errored` 表示建连失败后的不可用状态，仍可
///   被显式销毁收束到 `Closed`。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnState {
    /// 初始状态，尚未发起建连。
    Idle,
    /// 已打开句柄，正在等待打开确认信号。
    Connecting,
    /// 连接可用，读写均已就绪。
    Open,
    /// 建连失败，等待调用方收尾。
    Errored,
    /// 终态：连接已销毁，所有资源引用均已放弃。
    Closed,
}

impl ConnState {
    /// 判断状态是否允许跃迁至 `target`。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：在控制器内部的受控跃迁中复用，保持状态图与
    ///   实现一致；
    /// - **执行 (How)**：通过匹配元组 `(self, target)` 实现有限状态机
    ///   判定。
    pub fn can_transition_to(self, target: ConnState) -> bool {
        matches!(
            (self, target),
            (ConnState::Idle, ConnState::Connecting)
                | (ConnState::Idle, ConnState::Closed)
                | (ConnState::Connecting, ConnState::Open)
                | (ConnState::Connecting, ConnState::Errored)
                | (ConnState::Connecting, ConnState::Closed)
                | (ConnState::Open, ConnState::Closed)
                | (ConnState::Errored, ConnState::Closed)
                | (ConnState::Closed, ConnState::Closed)
        )
    }

    /// 状态是否为终态。
    ///
    /// - **契约 (What)**：返回 `true` 表示不再接受任何状态变更，迟到的
    ///   异步结果应当被丢弃。
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnState::Closed)
    }

    /// 状态的简短名称，供日志与错误消息使用。
    pub fn name(self) -> &'static str {
        match self {
            ConnState::Idle => "idle",
            ConnState::Connecting => "connecting",
            ConnState::Open => "open",
            ConnState::Errored => "errored",
            ConnState::Closed => "closed",
        }
    }
}

/// TLS 升级相位，独立于连接状态单向推进。
///
/// # 教案式说明
/// - **意图 (Why)**：以三态枚举取代 `upgrading`/`upgraded` 布尔对，
///   "既在升级又已升级"这类矛盾组合从类型上不可表示；
/// - **契约 (What)**：`NotUpgraded → Upgrading → Upgraded` 单向推进；
///   处于 `Upgrading` 时观察到的关闭信号是旧通道的预期自毁，而非断连；
/// - **风险 (Trade-offs)**：相位与"构造时固定的 TLS 策略"正交——策略
///   决定句柄打开模式，相位记录升级进展。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TlsPhase {
    /// 尚未发起升级。
    NotUpgraded,
    /// 升级进行中：读写端已释放，等待旧通道自毁确认。
    Upgrading,
    /// 升级完成，连接处于 TLS 保护之下。
    Upgraded,
}

impl TlsPhase {
    /// 相位的简短名称。
    pub fn name(self) -> &'static str {
        match self {
            TlsPhase::NotUpgraded => "not-upgraded",
            TlsPhase::Upgrading => "upgrading",
            TlsPhase::Upgraded => "upgraded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConnState; 5] = [
        ConnState::Idle,
        ConnState::Connecting,
        ConnState::Open,
        ConnState::Errored,
        ConnState::Closed,
    ];

    /// 状态图的白名单逐项校验：表中列出的跃迁允许，其余一律拒绝。
    #[test]
    fn transition_table_is_exact() {
        let allowed = [
            (ConnState::Idle, ConnState::Connecting),
            (ConnState::Idle, ConnState::Closed),
            (ConnState::Connecting, ConnState::Open),
            (ConnState::Connecting, ConnState::Errored),
            (ConnState::Connecting, ConnState::Closed),
            (ConnState::Open, ConnState::Closed),
            (ConnState::Errored, ConnState::Closed),
            (ConnState::Closed, ConnState::Closed),
        ];
        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "跃迁 {from:?} -> {to:?} 的判定与状态图不符"
                );
            }
        }
    }

    /// 终态判定只认 `Closed`：`Errored` 仍可被销毁收束。
    #[test]
    fn only_closed_is_terminal() {
        for state in ALL {
            assert_eq!(state.is_terminal(), state == ConnState::Closed);
        }
        assert!(ConnState::Errored.can_transition_to(ConnState::Closed));
    }
}
