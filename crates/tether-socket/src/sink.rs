//! 事件发射器：在发送端结构性兑现"至多一次"契约。
//!
//! # 教案式说明
//! - **Why**：`Connected`/`End`/`Closed` 的次数契约若靠各调用点自律，
//!   迟早会在并发事件下被打破；收口到单一发射器后，重复触发在源头
//!   被吞掉；
//! - **How**：每个至多一次的事件配一枚原子标志，`swap` 决出首发者；
//!   `Closed` 标志同时充当总闸——终态之后的一切事件静默丢弃，迟到的
//!   异步结果不再产生可观察效果；
//! - **What**：接收端关闭（消费者弃用通道）不视为错误，发送失败被
//!   忽略。

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use tether_core::{SocketError, SocketEvent};

pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<SocketEvent>,
    connected: AtomicBool,
    ended: AtomicBool,
    closed: AtomicBool,
}

impl EventSink {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                connected: AtomicBool::new(false),
                ended: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            },
            rx,
        )
    }

    fn emit(&self, event: SocketEvent) {
        tracing::debug!(event = event.name(), "socket event");
        let _ = self.tx.send(event);
    }

    /// 连接建立通知，至多一次。
    pub(crate) fn connected(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if !self.connected.swap(true, Ordering::AcqRel) {
            self.emit(SocketEvent::Connected);
        }
    }

    /// 到站数据转发。
    pub(crate) fn data(&self, chunk: bytes::Bytes) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.emit(SocketEvent::Data(chunk));
    }

    /// 流终点通知，至多一次。
    pub(crate) fn end(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if !self.ended.swap(true, Ordering::AcqRel) {
            self.emit(SocketEvent::End);
        }
    }

    /// 错误通知；终态之后静默丢弃。
    pub(crate) fn error(&self, error: SocketError) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.emit(SocketEvent::Error(error));
    }

    /// 终态关闭通知，至多一次；此后一切事件被抑制。
    pub(crate) fn closed(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.emit(SocketEvent::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<SocketEvent>) -> Vec<SocketEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// 重复触发的 Connected/End/Closed 只发射一次。
    #[test]
    fn at_most_once_events_deduplicate() {
        let (sink, mut rx) = EventSink::new();
        sink.connected();
        sink.connected();
        sink.end();
        sink.end();
        sink.closed();
        sink.closed();
        assert_eq!(
            drain(&mut rx),
            vec![
                SocketEvent::Connected,
                SocketEvent::End,
                SocketEvent::Closed
            ]
        );
    }

    /// 终态之后的一切事件被抑制，包括数据与错误。
    #[test]
    fn events_after_closed_are_suppressed() {
        let (sink, mut rx) = EventSink::new();
        sink.closed();
        sink.connected();
        sink.data(bytes::Bytes::from_static(b"late"));
        sink.error(SocketError::Destroyed);
        sink.end();
        assert_eq!(drain(&mut rx), vec![SocketEvent::Closed]);
    }

    /// 消费者弃用通道后发送不 panic。
    #[test]
    fn dropped_receiver_is_tolerated() {
        let (sink, rx) = EventSink::new();
        drop(rx);
        sink.connected();
        sink.closed();
    }
}
