//! tether-socket 通过 `tether-tck` 断言自身实现是否满足适配器契约。
//!
//! # 教案式说明
//! - **Why**：适配器的正确性体现在时序契约上——单飞读取、一次性事件、
//!   升级窗口内关闭信号的分类——实现一旦变更，该测试在 CI 中自动重放
//!   TCK，阻止违反契约的回归。
//! - **How**：直接调用 `tether-tck` 暴露的断言函数，让 TCK 维护场景
//!   细节，本地仅需提供 Tokio 运行时。
//! - **What**：每个测试返回 `()`；断言失败时 panic 并附带阶段性上下文。

use tether_tck::suite;

/// 零长度写入不触达传输层。
///
/// - **Why**：空数据帧在驱动协议里是常见的边界输入，不能为此付出一次
///   平台调用。
#[tokio::test(flavor = "multi_thread")]
async fn tck_zero_length_write_skips_transport() {
    suite::assert_zero_length_write_skips_transport()
        .await
        .expect("零长度写入断言失败：请检查写路径的空帧短路");
}

/// 对端完结流之后，销毁必须静默短路。
///
/// - **Why**：对端认为交换已经结束，第二次关闭请求永远等不到确认。
#[tokio::test(flavor = "multi_thread")]
async fn tck_end_of_stream_then_destroy_is_quiet() {
    suite::assert_end_of_stream_then_destroy_is_quiet()
        .await
        .expect("流终点后的销毁断言失败：请检查句柄遗忘与销毁短路");
}

/// 三段数据按序交付，流终点恰好一次，句柄即时清空。
#[tokio::test(flavor = "multi_thread")]
async fn tck_streamed_chunks_then_end() {
    suite::assert_streamed_chunks_then_end()
        .await
        .expect("数据流断言失败：请检查读泵的交付顺序与终点处理");
}

/// 任何时刻至多一个在途读取。
///
/// - **Why**：能力读端是单消费者资源，并发读取直接违反平台契约。
#[tokio::test(flavor = "multi_thread")]
async fn tck_reads_never_overlap() {
    suite::assert_reads_never_overlap()
        .await
        .expect("单飞读取断言失败：请检查读端槽位的取出/归还路径");
}

/// 建连通知严格晚于打开确认，且恰好一次。
#[tokio::test(flavor = "multi_thread")]
async fn tck_connect_notifies_once_after_opened() {
    suite::assert_connect_notifies_once_after_opened()
        .await
        .expect("建连通知断言失败：请检查打开确认任务与事件去重");
}

/// starttls 不可重复：二次调用只产生错误通知，活动句柄不变。
#[tokio::test(flavor = "multi_thread")]
async fn tck_upgrade_is_single_shot() {
    suite::assert_upgrade_is_single_shot()
        .await
        .expect("重复升级断言失败：请检查升级相位的单向推进");
}

/// 升级窗口内的关闭信号是预期自毁，不产生错误或终态通知。
#[tokio::test(flavor = "multi_thread")]
async fn tck_expected_close_completes_upgrade() {
    suite::assert_expected_close_completes_upgrade()
        .await
        .expect("升级期关闭分类断言失败：请检查监视器的相位判定");
}

/// 非升级窗口的关闭信号收敛为恰好一条终态通知。
#[tokio::test(flavor = "multi_thread")]
async fn tck_unexpected_close_tears_down() {
    suite::assert_unexpected_close_tears_down()
        .await
        .expect("意外关闭断言失败：请检查监视器的拆除路径");
}

/// 关闭信号以错误收尾时只上报错误，不拆除连接。
#[tokio::test(flavor = "multi_thread")]
async fn tck_closed_signal_rejection_reports_error() {
    suite::assert_closed_signal_rejection_reports_error()
        .await
        .expect("信号错误断言失败：监视器不应在信号出错时拆除连接");
}

/// 平台受理阶段拒绝：错误通知加 Errored 状态。
#[tokio::test(flavor = "multi_thread")]
async fn tck_open_fault_reports_connect_failure() {
    suite::assert_open_fault_reports_connect_failure()
        .await
        .expect("打开失败断言失败：建连失败必须以通知呈现");
}

/// 打开信号以错误收尾同样归入建连失败。
#[tokio::test(flavor = "multi_thread")]
async fn tck_opened_rejection_reports_connect_failure() {
    suite::assert_opened_rejection_reports_connect_failure()
        .await
        .expect("打开信号出错断言失败：请检查打开确认任务的错误分支");
}

/// 写失败只通过该次写入的结果上报，连接保持可用。
#[tokio::test(flavor = "multi_thread")]
async fn tck_write_failure_is_not_fatal() {
    suite::assert_write_failure_is_not_fatal()
        .await
        .expect("写失败断言失败：写错误不应拆除连接");
}

/// 销毁时触发错误优先浮出，然后才是终态通知。
#[tokio::test(flavor = "multi_thread")]
async fn tck_destroy_surfaces_trigger_error() {
    suite::assert_destroy_surfaces_trigger_error()
        .await
        .expect("销毁错误顺序断言失败：触发错误应先于 Closed");
}

/// 销毁之后的操作复述终态错误，重复销毁静默。
#[tokio::test(flavor = "multi_thread")]
async fn tck_post_destroy_operations_replay_terminal() {
    suite::assert_post_destroy_operations_replay_terminal()
        .await
        .expect("终态复述断言失败：请检查终态错误的存取");
}

/// 优雅终止：写侧终止先行，随后请求关闭。
#[tokio::test(flavor = "multi_thread")]
async fn tck_end_finishes_then_closes() {
    suite::assert_end_finishes_then_closes()
        .await
        .expect("优雅终止断言失败：请检查 finish 与 close 的次序");
}

/// 升级原语失败时携带原因拆除连接。
#[tokio::test(flavor = "multi_thread")]
async fn tck_upgrade_failure_tears_down() {
    suite::assert_upgrade_failure_tears_down()
        .await
        .expect("升级失败断言失败：请检查升级错误的拆除路径");
}

/// 信用先于数据授予时，数据到站后仍能交付。
#[tokio::test(flavor = "multi_thread")]
async fn tck_demand_before_data_still_delivers() {
    suite::assert_demand_before_data_still_delivers()
        .await
        .expect("预授信用断言失败：请检查读泵的等待逻辑");
}

/// TLS 策略决定句柄打开模式。
#[tokio::test(flavor = "multi_thread")]
async fn tck_tls_policy_selects_open_mode() {
    suite::assert_tls_policy_selects_open_mode()
        .await
        .expect("打开模式断言失败：请检查 TLS 策略到模式的映射");
}

/// 读取错误致命：携带原因拆除连接。
#[tokio::test(flavor = "multi_thread")]
async fn tck_read_error_destroys() {
    suite::assert_read_error_destroys()
        .await
        .expect("读取错误断言失败：请检查读泵的致命错误路径");
}
