//! Async ブリッジ - arm を `Future` として待つ
//!
//! # 学習ポイント
//! - `tokio::sync::oneshot` でコールバックを Future に変換する
//! - コールバックが呼ばれずに捨てられた場合は Sender の drop で検知できる

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::CallbackError;
use crate::rearmable::{BoxCallback, RearmableCallback};

/// Armed は `arm_oneshot` で登録したコールバックの完了を待つ Future
///
/// 完了前に drop すると、次の trigger は受け取り手のないまま消費される。
#[derive(Debug)]
#[must_use = "dropping Armed loses the trigger that fires it"]
pub struct Armed<A> {
    rx: oneshot::Receiver<A>,
}

impl<A: Send + 'static> RearmableCallback<A, BoxCallback<A>> {
    /// oneshot チャネルに送るだけのコールバックを arm する
    ///
    /// backlog があれば返り値の Future は即座に ready になる。
    /// 既に arm されていた場合は `arm` と同じく上書きする。
    ///
    /// # 使用例
    /// ```ignore
    /// let n = writes.arm_oneshot().await?;
    /// ```
    pub fn arm_oneshot(&self) -> Armed<A> {
        let (tx, rx) = oneshot::channel();
        self.arm(Box::new(move |args| {
            if tx.send(args).is_err() {
                debug!("arm_oneshot: waiter was dropped, discarding trigger");
            }
        }));
        Armed { rx }
    }
}

impl<A> Future for Armed<A> {
    type Output = Result<A, CallbackError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map_err(|_| CallbackError::Closed)
    }
}
