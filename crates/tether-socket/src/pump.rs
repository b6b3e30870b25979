//! # 读泵：按需驱动的单飞读取
//!
//! ## 核心意图（Why）
//! - 把"消费者的拉取节奏"翻译成"能力读端上的串行读取"：一份信用
//!   换一次读取，消费速度从源头限定读取速率，无需任何内部缓冲或
//!   溢出处置；
//! - 单飞不是运行纪律而是结构事实：读端从槽位取出后才发起读取，
//!   槽位为空即意味着在途，第二次读取无从发起。
//!
//! ## 结果处置（What）
//! - **数据**：读端归还槽位，字节零拷贝转发给消费者；
//! - **流终点**：立即遗忘句柄与读写端——对端认为交换已经结束，此后
//!   的显式关闭请求永不确认——随后发出流终点通知并退出；
//! - **错误**：致命，携带原因拆除连接并退出；
//! - **迟到结果**：代数不匹配（升级或销毁发生在读取期间）即作废，
//!   不产生任何通知。

use std::sync::Arc;

use tether_core::ReadOutcome;

use crate::adapter::{Shared, teardown};

pub(crate) fn spawn(shared: &Arc<Shared>) {
    let shared = Arc::clone(shared);
    tokio::spawn(run(shared));
}

async fn run(shared: Arc<Shared>) {
    loop {
        let permit = match shared.demand.acquire().await {
            Ok(permit) => permit,
            // 信用闸门随拆除关闭
            Err(_) => return,
        };
        permit.forget();
        let (mut reader, generation) = {
            let mut inner = shared.inner.lock().await;
            if inner.state.is_terminal() {
                return;
            }
            let Some(reader) = inner.reader.take() else {
                if inner.transport.is_none() {
                    // 流已完结或句柄已遗忘，读泵使命结束
                    return;
                }
                // 升级窗口内读端不在位：该份信用作废，消费者会再次拉取
                continue;
            };
            (reader, inner.generation)
        };
        let outcome = reader.read().await;
        let mut inner = shared.inner.lock().await;
        if inner.generation != generation {
            // 句柄已更替或连接已销毁：结果作废，旧读端随之丢弃
            if inner.state.is_terminal() {
                return;
            }
            continue;
        }
        match outcome {
            Ok(ReadOutcome::Chunk(chunk)) => {
                inner.reader = Some(reader);
                drop(inner);
                shared.events.data(chunk);
            }
            Ok(ReadOutcome::End) => {
                inner.forget_transport();
                drop(inner);
                shared.writer.lock().await.take();
                shared.events.end();
                return;
            }
            Err(err) => {
                drop(inner);
                teardown(&shared, Some(err)).await;
                return;
            }
        }
    }
}
