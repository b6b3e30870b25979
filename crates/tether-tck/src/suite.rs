//! # 适配器契约断言套件
//!
//! # 教案式说明
//! - **意图（Why）**：集中维护对能力套接字适配器的契约断言，便于在
//!   实现 crate 中作为 Dev 依赖复用，实现回归时提供统一的阻断信号。
//! - **架构定位**：属于"行为验证"层——每条断言以真实适配器加脚本化
//!   传输驱动完整场景，而非针对内部函数的白盒测试。
//! - **设计取舍**：所有断言均以 Tokio 异步形式实现，以保证与生产运行
//!   时一致；使用 `anyhow::Context` 提供阶段性上下文信息，牺牲少量
//!   依赖体积换取调试效率。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, sleep, timeout};

use tether_core::{
    SocketError, SocketEvent, SocketOptions, TlsMode, TlsOptions, TransportFactory,
};
use tether_socket::{ConnState, SocketAdapter, TlsPhase};

use crate::mock::{MockFactory, MockTransport};

const EVENT_WAIT: Duration = Duration::from_secs(1);
const QUIET_WAIT: Duration = Duration::from_millis(50);

/// 一套就绪的被测组合：适配器、事件接收端与脚本化传输。
pub struct Harness {
    pub adapter: SocketAdapter,
    pub events: UnboundedReceiver<SocketEvent>,
    pub factory: Arc<MockFactory>,
    pub transport: Arc<MockTransport>,
}

/// 等待下一条事件，超时视为断言失败。
async fn recv_event(events: &mut UnboundedReceiver<SocketEvent>) -> Result<SocketEvent> {
    timeout(EVENT_WAIT, events.recv())
        .await
        .context("等待事件超时")?
        .context("事件通道已关闭，没有更多事件")
}

/// 静默窗口：给异步任务让出时间后，确认没有任何事件到达。
async fn ensure_quiet(events: &mut UnboundedReceiver<SocketEvent>, stage: &str) -> Result<()> {
    sleep(QUIET_WAIT).await;
    match events.try_recv() {
        Ok(event) => bail!("{stage}：不应有事件，却收到 {event:?}"),
        Err(_) => Ok(()),
    }
}

/// 轮询等待升级相位推进到 `Upgraded`。
async fn wait_for_upgraded(adapter: &SocketAdapter) -> Result<()> {
    let deadline = Instant::now() + EVENT_WAIT;
    loop {
        if adapter.tls_phase().await == TlsPhase::Upgraded {
            return Ok(());
        }
        ensure!(Instant::now() < deadline, "升级相位未在时限内推进到 Upgraded");
        sleep(Duration::from_millis(5)).await;
    }
}

/// 构造已完成建连的被测组合。
pub async fn connected_harness(tls_required: bool) -> Result<Harness> {
    let factory = MockFactory::new();
    let transport = MockTransport::new();
    factory.script(Arc::clone(&transport));
    let (adapter, mut events) = SocketAdapter::new(
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
        SocketOptions { tls_required },
    );
    adapter.connect("db.internal", 5432).await;
    transport.resolve_opened();
    let event = recv_event(&mut events).await.context("等待建连确认")?;
    ensure!(
        event == SocketEvent::Connected,
        "建连后的首个事件应为 Connected，实际为 {event:?}"
    );
    Ok(Harness {
        adapter,
        events,
        factory,
        transport,
    })
}

/// 在已建连的组合上完成一次 starttls 升级并等待相位推进。
pub async fn upgraded_harness() -> Result<(Harness, Arc<MockTransport>)> {
    let mut harness = connected_harness(true).await?;
    let twin = MockTransport::new();
    harness.transport.set_upgrade_twin(Arc::clone(&twin));
    harness.adapter.start_tls(TlsOptions::default()).await;
    wait_for_upgraded(&harness.adapter).await?;
    ensure_quiet(&mut harness.events, "升级完成后").await?;
    Ok((harness, twin))
}

/// 零长度写入立即成功且不触达传输层——无论是否已建连。
pub async fn assert_zero_length_write_skips_transport() -> Result<()> {
    let factory = MockFactory::new();
    let (adapter, _events) = SocketAdapter::new(
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
        SocketOptions::default(),
    );
    adapter
        .write(Bytes::new())
        .await
        .context("未建连时的零长度写入也应成功")?;

    let mut harness = connected_harness(false).await?;
    harness
        .adapter
        .write(Bytes::new())
        .await
        .context("已建连时的零长度写入应成功")?;
    ensure!(
        harness.transport.written().is_empty(),
        "零长度写入不应触达传输层"
    );
    ensure_quiet(&mut harness.events, "零长度写入后").await
}

/// 对端完结流之后，销毁不得再次请求关闭，也不得失败。
pub async fn assert_end_of_stream_then_destroy_is_quiet() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    harness.transport.push_end();
    harness.adapter.request_read();
    let event = recv_event(&mut harness.events).await.context("等待流终点")?;
    ensure!(
        event == SocketEvent::End,
        "流终点事件应为 End，实际为 {event:?}"
    );
    ensure!(
        !harness.adapter.has_active_transport().await,
        "流终点之后应立即遗忘句柄"
    );
    harness.adapter.destroy(None).await;
    ensure!(
        harness.transport.close_calls() == 0,
        "句柄已遗忘，销毁不得再发出关闭请求（实际 {} 次）",
        harness.transport.close_calls()
    );
    let event = recv_event(&mut harness.events).await.context("等待终态")?;
    ensure!(
        event == SocketEvent::Closed,
        "销毁应以 Closed 收尾，实际为 {event:?}"
    );
    ensure_quiet(&mut harness.events, "终态之后").await
}

/// 三段数据后接流终点：顺序交付、恰好一次 End、句柄即时清空。
pub async fn assert_streamed_chunks_then_end() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    for chunk in [&b"alpha"[..], b"beta", b"gamma"] {
        harness.transport.push_chunk(chunk);
    }
    harness.transport.push_end();
    for _ in 0..4 {
        harness.adapter.request_read();
    }
    for expected in [&b"alpha"[..], b"beta", b"gamma"] {
        let event = recv_event(&mut harness.events).await.context("等待数据")?;
        ensure!(
            event == SocketEvent::Data(Bytes::copy_from_slice(expected)),
            "数据应按序到达，期望 {expected:?}，实际 {event:?}"
        );
    }
    let event = recv_event(&mut harness.events).await.context("等待流终点")?;
    ensure!(event == SocketEvent::End, "应恰好收到一次 End，实际 {event:?}");
    ensure!(
        !harness.adapter.has_active_transport().await,
        "End 之后句柄引用应立即清空"
    );
    ensure!(
        !harness.transport.concurrent_read_seen(),
        "读取全程不得并发"
    );
    ensure_quiet(&mut harness.events, "流终点之后").await
}

/// 预授信用也不会让读取并发：单飞由结构保证。
pub async fn assert_reads_never_overlap() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    for _ in 0..3 {
        harness.adapter.request_read();
    }
    sleep(Duration::from_millis(10)).await;
    harness.transport.push_chunk(b"one");
    harness.transport.push_chunk(b"two");
    harness.transport.push_end();
    for expected in [&b"one"[..], b"two"] {
        let event = recv_event(&mut harness.events).await.context("等待数据")?;
        ensure!(
            event == SocketEvent::Data(Bytes::copy_from_slice(expected)),
            "数据应按序到达，期望 {expected:?}，实际 {event:?}"
        );
    }
    let event = recv_event(&mut harness.events).await.context("等待流终点")?;
    ensure!(event == SocketEvent::End, "末尾应为 End，实际 {event:?}");
    ensure!(
        !harness.transport.concurrent_read_seen(),
        "任何时刻都不得有两个在途读取"
    );
    Ok(())
}

/// 建连通知严格晚于打开确认，且恰好一次。
pub async fn assert_connect_notifies_once_after_opened() -> Result<()> {
    let factory = MockFactory::new();
    let transport = MockTransport::new();
    factory.script(Arc::clone(&transport));
    let (adapter, mut events) = SocketAdapter::new(
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
        SocketOptions::default(),
    );
    adapter.connect("db.internal", 5432).await;
    ensure_quiet(&mut events, "打开确认之前").await?;
    transport.resolve_opened();
    let event = recv_event(&mut events).await.context("等待建连确认")?;
    ensure!(
        event == SocketEvent::Connected,
        "打开确认之后应收到 Connected，实际 {event:?}"
    );
    ensure!(
        adapter.state().await == ConnState::Open,
        "建连完成后状态应为 Open"
    );
    ensure_quiet(&mut events, "建连确认之后").await
}

/// starttls 不可重复：第二次调用只产生错误通知，活动句柄不变。
pub async fn assert_upgrade_is_single_shot() -> Result<()> {
    let (mut harness, twin) = upgraded_harness().await?;
    harness.adapter.start_tls(TlsOptions::default()).await;
    let event = recv_event(&mut harness.events)
        .await
        .context("等待重复升级的错误通知")?;
    match &event {
        SocketEvent::Error(err) => ensure!(
            err.code() == "socket.upgrade.repeated",
            "重复升级应报告 socket.upgrade.repeated，实际 {}",
            err.code()
        ),
        other => bail!("重复升级只应产生错误通知，实际 {other:?}"),
    }
    ensure!(
        harness.adapter.tls_phase().await == TlsPhase::Upgraded,
        "重复升级不得改变升级相位"
    );
    harness
        .adapter
        .write(Bytes::from_static(b"after-upgrade"))
        .await
        .context("升级后的写入应成功")?;
    ensure!(
        twin.written() == vec![Bytes::from_static(b"after-upgrade")],
        "写入应落在首次升级产出的句柄上"
    );
    ensure!(
        harness.transport.written().is_empty(),
        "旧句柄不应再收到任何写入"
    );
    ensure!(
        harness.transport.upgrade_calls() == 1 && twin.upgrade_calls() == 0,
        "升级原语只应在旧句柄上调用一次"
    );
    Ok(())
}

/// 升级窗口内的关闭信号是预期自毁：推进相位，无错误、无终态通知。
pub async fn assert_expected_close_completes_upgrade() -> Result<()> {
    let (harness, _twin) = upgraded_harness().await?;
    ensure!(
        harness.adapter.state().await == ConnState::Open,
        "升级完成后连接应保持 Open"
    );
    ensure!(
        harness.adapter.has_active_transport().await,
        "升级完成后应持有接替句柄"
    );
    Ok(())
}

/// 非升级窗口的关闭信号是真实断连：恰好一条终态通知。
pub async fn assert_unexpected_close_tears_down() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    harness.transport.resolve_closed();
    let event = recv_event(&mut harness.events).await.context("等待终态")?;
    ensure!(
        event == SocketEvent::Closed,
        "意外关闭应收敛为一条 Closed，实际 {event:?}"
    );
    ensure!(
        harness.adapter.state().await == ConnState::Closed,
        "意外关闭后状态应为 Closed"
    );
    ensure!(
        harness.transport.close_calls() == 0,
        "对已关闭的句柄不得再发关闭请求"
    );
    ensure_quiet(&mut harness.events, "终态之后").await
}

/// 关闭信号以错误收尾时只上报错误，不拆除连接。
pub async fn assert_closed_signal_rejection_reports_error() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    harness
        .transport
        .fail_closed(SocketError::capability("signal fault"));
    let event = recv_event(&mut harness.events).await.context("等待错误通知")?;
    ensure!(
        event == SocketEvent::Error(SocketError::capability("signal fault")),
        "信号错误应原样上报，实际 {event:?}"
    );
    ensure!(
        harness.adapter.state().await == ConnState::Open,
        "信号错误不应拆除连接"
    );
    ensure!(
        harness.adapter.has_active_transport().await,
        "信号错误后句柄应保持在位"
    );
    ensure_quiet(&mut harness.events, "信号错误之后").await
}

/// 平台受理阶段拒绝：错误通知加 Errored 状态，不得同步失败。
pub async fn assert_open_fault_reports_connect_failure() -> Result<()> {
    let factory = MockFactory::new();
    factory.set_open_fault(SocketError::capability("quota exceeded"));
    let (adapter, mut events) = SocketAdapter::new(
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
        SocketOptions::default(),
    );
    adapter.connect("db.internal", 5432).await;
    let event = recv_event(&mut events).await.context("等待建连失败通知")?;
    match &event {
        SocketEvent::Error(err) => ensure!(
            err.code() == "socket.connect",
            "建连失败应报告 socket.connect，实际 {}",
            err.code()
        ),
        other => bail!("建连失败只应产生错误通知，实际 {other:?}"),
    }
    ensure!(
        adapter.state().await == ConnState::Errored,
        "建连失败后状态应为 Errored"
    );
    Ok(())
}

/// 打开信号以错误收尾：同样以建连失败通知呈现。
pub async fn assert_opened_rejection_reports_connect_failure() -> Result<()> {
    let factory = MockFactory::new();
    let transport = MockTransport::new();
    factory.script(Arc::clone(&transport));
    let (adapter, mut events) = SocketAdapter::new(
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
        SocketOptions::default(),
    );
    adapter.connect("db.internal", 5432).await;
    transport.fail_opened(SocketError::capability("refused by peer"));
    let event = recv_event(&mut events).await.context("等待建连失败通知")?;
    match &event {
        SocketEvent::Error(err) => ensure!(
            err.code() == "socket.connect",
            "打开信号出错应归入 socket.connect，实际 {}",
            err.code()
        ),
        other => bail!("建连失败只应产生错误通知，实际 {other:?}"),
    }
    ensure!(
        adapter.state().await == ConnState::Errored,
        "建连失败后状态应为 Errored"
    );
    Ok(())
}

/// 写失败只通过该次写入的结果上报，连接保持可用。
pub async fn assert_write_failure_is_not_fatal() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    harness.transport.set_write_fault(Some(SocketError::WriteFailed {
        detail: "buffer full".into(),
    }));
    let outcome = harness.adapter.write(Bytes::from_static(b"doomed")).await;
    match outcome {
        Err(err) => ensure!(
            err.code() == "socket.write",
            "写失败应报告 socket.write，实际 {}",
            err.code()
        ),
        Ok(()) => bail!("注入写故障后写入不应成功"),
    }
    ensure!(
        harness.adapter.state().await == ConnState::Open,
        "写失败不应拆除连接"
    );
    ensure_quiet(&mut harness.events, "写失败之后").await?;
    harness.transport.set_write_fault(None);
    harness
        .adapter
        .write(Bytes::from_static(b"recovered"))
        .await
        .context("故障清除后的写入应成功")?;
    ensure!(
        harness.transport.written() == vec![Bytes::from_static(b"recovered")],
        "恢复后的写入应正常落盘"
    );
    Ok(())
}

/// 销毁时触发错误优先浮出，然后才是终态通知。
pub async fn assert_destroy_surfaces_trigger_error() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    let boom = SocketError::capability("caller abort");
    harness.adapter.destroy(Some(boom.clone())).await;
    let event = recv_event(&mut harness.events).await.context("等待触发错误")?;
    ensure!(
        event == SocketEvent::Error(boom),
        "触发错误应先于终态浮出，实际 {event:?}"
    );
    let event = recv_event(&mut harness.events).await.context("等待终态")?;
    ensure!(event == SocketEvent::Closed, "终态应为 Closed，实际 {event:?}");
    ensure!(
        harness.transport.close_calls() == 1,
        "销毁应请求一次关闭（实际 {} 次）",
        harness.transport.close_calls()
    );
    ensure_quiet(&mut harness.events, "终态之后").await
}

/// 销毁之后的操作复述终态错误，重复销毁静默。
pub async fn assert_post_destroy_operations_replay_terminal() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    let boom = SocketError::capability("caller abort");
    harness.adapter.destroy(Some(boom.clone())).await;
    let _ = recv_event(&mut harness.events).await.context("等待触发错误")?;
    let _ = recv_event(&mut harness.events).await.context("等待终态")?;
    let outcome = harness.adapter.write(Bytes::from_static(b"late")).await;
    ensure!(
        outcome == Err(boom),
        "销毁后的写入应复述终态错误，实际 {outcome:?}"
    );
    harness.adapter.destroy(None).await;
    ensure_quiet(&mut harness.events, "重复销毁之后").await
}

/// 优雅终止：写侧终止信号先行，随后请求关闭，终态由监视器驱动。
pub async fn assert_end_finishes_then_closes() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    harness.adapter.end().await;
    let event = recv_event(&mut harness.events).await.context("等待终态")?;
    ensure!(event == SocketEvent::Closed, "end 应收敛为 Closed，实际 {event:?}");
    ensure!(
        harness.transport.finish_calls() == 1,
        "end 应发出一次写侧终止信号"
    );
    ensure!(
        harness.transport.close_calls() == 1,
        "end 应请求一次显式关闭"
    );
    ensure!(
        harness.transport.ops() == vec!["finish", "close"],
        "写侧终止必须先于关闭请求，实际顺序 {:?}",
        harness.transport.ops()
    );
    ensure_quiet(&mut harness.events, "终态之后").await
}

/// 升级原语失败时携带原因拆除连接。
pub async fn assert_upgrade_failure_tears_down() -> Result<()> {
    let mut harness = connected_harness(true).await?;
    harness
        .transport
        .set_upgrade_fault(SocketError::capability("platform denied"));
    harness.adapter.start_tls(TlsOptions::default()).await;
    let event = recv_event(&mut harness.events).await.context("等待升级失败")?;
    match &event {
        SocketEvent::Error(err) => ensure!(
            err.code() == "socket.upgrade",
            "升级失败应报告 socket.upgrade，实际 {}",
            err.code()
        ),
        other => bail!("升级失败应先产生错误通知，实际 {other:?}"),
    }
    let event = recv_event(&mut harness.events).await.context("等待终态")?;
    ensure!(event == SocketEvent::Closed, "升级失败应收敛为 Closed");
    ensure!(
        harness.adapter.state().await == ConnState::Closed,
        "升级失败后状态应为 Closed"
    );
    Ok(())
}

/// 信用先于数据授予时，数据到站后仍能交付。
pub async fn assert_demand_before_data_still_delivers() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    harness.adapter.request_read();
    sleep(Duration::from_millis(20)).await;
    harness.transport.push_chunk(b"late-arrival");
    let event = recv_event(&mut harness.events).await.context("等待数据")?;
    ensure!(
        event == SocketEvent::Data(Bytes::from_static(b"late-arrival")),
        "预授信用的读取应交付后到的数据，实际 {event:?}"
    );
    Ok(())
}

/// TLS 策略决定句柄打开模式。
pub async fn assert_tls_policy_selects_open_mode() -> Result<()> {
    let plain = connected_harness(false).await?;
    ensure!(
        plain.factory.opens().first().map(|(_, mode)| *mode) == Some(TlsMode::Plaintext),
        "未要求 TLS 时应以明文模式打开"
    );
    let tls = connected_harness(true).await?;
    ensure!(
        tls.factory.opens().first().map(|(_, mode)| *mode) == Some(TlsMode::StartTls),
        "要求 TLS 时应以可升级模式打开"
    );
    Ok(())
}

/// 读取错误致命：携带原因拆除连接并请求关闭。
pub async fn assert_read_error_destroys() -> Result<()> {
    let mut harness = connected_harness(false).await?;
    harness.transport.push_read_error(SocketError::ReadFailed {
        detail: "connection reset".into(),
    });
    harness.adapter.request_read();
    let event = recv_event(&mut harness.events).await.context("等待读取错误")?;
    match &event {
        SocketEvent::Error(err) => ensure!(
            err.code() == "socket.read",
            "读取错误应报告 socket.read，实际 {}",
            err.code()
        ),
        other => bail!("读取错误应先产生错误通知，实际 {other:?}"),
    }
    let event = recv_event(&mut harness.events).await.context("等待终态")?;
    ensure!(event == SocketEvent::Closed, "读取错误应收敛为 Closed");
    ensure!(
        harness.transport.close_calls() == 1,
        "读取错误的拆除应请求一次关闭"
    );
    Ok(())
}
