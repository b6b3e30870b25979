//! 建连参数与升级选项的结构化表示。
//!
//! # 教案式说明
//! - **Why**：平台能力只认识"地址 + 打开模式"，而客户端库只认识
//!   `host:port` 与"是否要求 TLS"；本模块承担两套词汇之间的翻译；
//! - **What**：定义端点地址、打开模式、升级选项与适配器构造参数；
//! - **How**：全部为普通数据结构，不携带行为，便于跨 crate 复制与记录。

use core::fmt;

/// 以主机名表达的端点地址。
///
/// # 教案式说明
/// - **意图 (Why)**：沙箱平台的 open 原语接受主机名而非已解析的 IP，
///   名称解析与出站策略均由平台裁决，适配层不做任何解析；
/// - **契约 (What)**：`host` 原样透传；`port` 为 TCP 端口；`Display`
///   输出 `host:port`，供日志与错误消息复用。
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct EndpointAddr {
    host: String,
    port: u16,
}

impl EndpointAddr {
    /// 构造端点地址。
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// 目标主机名。
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 目标端口。
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for EndpointAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// 句柄的打开模式。
///
/// # 教案式说明
/// - **意图 (Why)**：平台在打开时刻就要确定该连接是纯明文、还是保留
///   中途升级（starttls）的能力；两者之后不可互换；
/// - **契约 (What)**：`Plaintext` 打开后不可升级；`StartTls` 以明文打开
///   并允许一次在位升级；
/// - **风险 (Trade-offs)**：不提供"立即 TLS"模式——本适配层服务的客户
///   端库总是先走明文协商再升级，直连 TLS 属于平台其他入口的职责。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TlsMode {
    /// 纯明文，生命周期内不可升级。
    Plaintext,
    /// 明文打开，保留一次 starttls 升级能力。
    StartTls,
}

/// starttls 升级选项。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TlsOptions {
    /// 证书校验所用的期望服务器名；`None` 时由平台自行取打开时的主机名。
    pub expected_server_name: Option<String>,
}

/// 适配器构造参数，构造后不可变。
///
/// # 教案式说明
/// - **意图 (Why)**：TLS 策略必须在建连之前固定——它决定句柄的打开模式，
///   而打开模式无法事后更改；
/// - **契约 (What)**：`tls_required` 为真时句柄以 [`TlsMode::StartTls`]
///   打开，之后由调用方在协议允许的时机发起升级。
#[derive(Clone, Copy, Debug, Default)]
pub struct SocketOptions {
    /// 该连接最终是否必须处于 TLS 保护之下。
    pub tls_required: bool,
}

impl SocketOptions {
    /// 根据 TLS 策略给出句柄的打开模式。
    pub fn open_mode(&self) -> TlsMode {
        if self.tls_required {
            TlsMode::StartTls
        } else {
            TlsMode::Plaintext
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display_joins_host_and_port() {
        let addr = EndpointAddr::new("db.internal", 5432);
        assert_eq!(addr.to_string(), "db.internal:5432");
    }

    #[test]
    fn tls_policy_selects_open_mode() {
        assert_eq!(
            SocketOptions { tls_required: true }.open_mode(),
            TlsMode::StartTls
        );
        assert_eq!(SocketOptions::default().open_mode(), TlsMode::Plaintext);
    }
}
