//! # 关闭信号监视器
//!
//! ## 核心意图（Why）
//! - 能力句柄的关闭信号身兼两职：既是真实断连的唯一凭据（部分平台
//!   故障，例如对端静默拒绝不受信证书，只会以一次无说明的关闭信号
//!   呈现），也是升级期间旧通道按期自毁的确认；
//! - 监视器在每次句柄附着时重新挂载，依据升级相位区分这两种含义，
//!   绝不把升级中的自毁误判为断连。
//!
//! ## 判定次序（What）
//! 1. 终态下的信号一律丢弃；
//! 2. 相位为 `Upgrading`：旧通道的预期自毁，推进至 `Upgraded`，不做
//!    任何破坏性动作，也不发通知；
//! 3. 代数不匹配：过期附着的迟到信号，丢弃；
//! 4. 其余情形为意外关闭：遗忘全部引用后拆除连接；
//! 5. 信号以错误收尾时仅上报错误通知，不主动拆除。

use std::sync::Arc;

use tether_core::{SocketError, TransportHandle};

use crate::adapter::{Shared, teardown};
use crate::state::TlsPhase;

/// 向指定句柄挂载一次性的关闭信号监视任务。
pub(crate) fn attach(shared: &Arc<Shared>, handle: Arc<dyn TransportHandle>, generation: u64) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        let outcome = handle.closed().await;
        drop(handle);
        match outcome {
            Ok(()) => on_closed(&shared, generation).await,
            Err(err) => {
                // 信号本身出错：上报而非静默拆除
                tracing::warn!(error = %err, "closed-signal settled with an error");
                shared.events.error(err);
            }
        }
    });
}

async fn on_closed(shared: &Arc<Shared>, generation: u64) {
    {
        let mut inner = shared.inner.lock().await;
        if inner.state.is_terminal() {
            return;
        }
        if inner.phase == TlsPhase::Upgrading {
            // 升级中旧通道的预期自毁：新句柄已经就位，只推进相位
            inner.phase = TlsPhase::Upgraded;
            tracing::debug!("pre-upgrade transport retired; upgrade complete");
            return;
        }
        if inner.generation != generation {
            // 过期附着的迟到信号
            return;
        }
        tracing::debug!("active transport closed by peer or platform");
        inner
            .terminal_error
            .get_or_insert(SocketError::UnexpectedClose { detail: None });
        inner.forget_transport();
    }
    shared.writer.lock().await.take();
    teardown(shared, None).await;
}
