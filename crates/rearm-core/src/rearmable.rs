//! RearmableCallback - 発火のたびに再登録が必要な一回きりのコールバック
//!
//! # 学習ポイント
//! - Mutex で「スロット + backlog」をまとめて保護する
//! - ユーザーのコールバックは必ずロックを離してから呼ぶ（再入してもデッドロックしない）
//! - arm と trigger のどちらが先に来ても、相手が来るまで待たせておく
//!
//! # 状態遷移
//! - UnarmedEmpty --arm--> ArmedEmpty
//! - UnarmedEmpty --trigger--> UnarmedBacklogged
//! - UnarmedBacklogged --arm--> 先頭を 1 件消費して即座に呼ぶ
//! - ArmedEmpty --trigger--> コールバックを取り出して呼ぶ（UnarmedEmpty に戻る）
//!
//! # 呼び出し側の責任
//! - backlog は無制限に伸びる。backpressure はこの層の上でかけること
//! - 破棄時に残っているコールバックや backlog は捨てられる。
//!   確実に届けたいなら先に `trigger_if_armed` / `drain_backlog` で流すこと

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::error::AlreadyArmed;
use crate::status::CallbackStatus;

/// 型消去した Send なコールバック
pub type BoxCallback<A> = Box<dyn FnOnce(A) + Send>;

struct Slot<A, F> {
    armed: Option<F>,
    /// arm されていない間に届いた trigger の引数（FIFO）
    backlog: VecDeque<A>,
}

/// RearmableCallback は一つのコールバックスロットと trigger の backlog を持つ
///
/// 複数の引数を渡したい場合は `A` をタプルにする。
///
/// # 使用例
/// ```ignore
/// let reads: RearmableCallback<Result<Vec<u8>, String>> = RearmableCallback::new();
/// reads.trigger(Ok(b"early".to_vec()));      // まだ arm されていないので backlog へ
/// reads.arm(Box::new(|r| println!("{r:?}")));  // backlog の先頭で即座に呼ばれる
/// ```
pub struct RearmableCallback<A, F = BoxCallback<A>> {
    slot: Mutex<Slot<A, F>>,
}

impl<A, F> RearmableCallback<A, F> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                armed: None,
                backlog: VecDeque::new(),
            }),
        }
    }

    // ユーザーコードはロック中に走らないので、poison されても状態は壊れていない
    fn lock(&self) -> MutexGuard<'_, Slot<A, F>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed.is_some()
    }

    pub fn backlog_len(&self) -> usize {
        self.lock().backlog.len()
    }

    pub fn status(&self) -> CallbackStatus {
        let slot = self.lock();
        CallbackStatus {
            armed: slot.armed.is_some(),
            backlog: slot.backlog.len(),
        }
    }

    /// backlog を FIFO 順ですべて取り出す
    ///
    /// 破棄前に、誰にも消費されない trigger を呼び出し側で処理するために使う。
    pub fn drain_backlog(&self) -> Vec<A> {
        let backlog = std::mem::take(&mut self.lock().backlog);
        if !backlog.is_empty() {
            debug!(drained = backlog.len(), "drained backlog");
        }
        Vec::from(backlog)
    }
}

impl<A, F> RearmableCallback<A, F>
where
    F: FnOnce(A),
{
    /// コールバックを登録する
    ///
    /// backlog があれば先頭の 1 件だけを消費し、ロックを離してから `f` を呼ぶ
    /// （`f` は保存されない）。backlog が空なら `f` をスロットに保存する。
    ///
    /// 既に arm されている状態で呼ぶと前のコールバックは黙って捨てられる。
    /// それを避けたい場合は [`try_arm`](Self::try_arm) を使う。
    pub fn arm(&self, f: F) {
        let slot = self.lock();
        Self::arm_locked(slot, f);
    }

    /// スロットが空のときだけコールバックを登録する
    ///
    /// 既に arm されていれば状態を変えずに `f` を [`AlreadyArmed`] で返す。
    pub fn try_arm(&self, f: F) -> Result<(), AlreadyArmed<F>> {
        let slot = self.lock();
        if slot.armed.is_some() {
            return Err(AlreadyArmed(f));
        }
        Self::arm_locked(slot, f);
        Ok(())
    }

    fn arm_locked(mut slot: MutexGuard<'_, Slot<A, F>>, f: F) {
        match slot.backlog.pop_front() {
            Some(args) => {
                let remaining = slot.backlog.len();
                drop(slot);
                trace!(remaining, "arm: consuming queued trigger");
                f(args);
            }
            None => {
                let replaced = slot.armed.replace(f);
                drop(slot);
                if replaced.is_some() {
                    warn!("arm: discarding a callback that was still armed");
                } else {
                    trace!("arm: callback stored");
                }
            }
        }
    }

    /// 完了イベントを通知する
    ///
    /// arm されていればコールバックを取り出し、ロックを離してから呼ぶ。
    /// されていなければ `args` を backlog の末尾に積む。
    pub fn trigger(&self, args: A) {
        let mut slot = self.lock();
        match slot.armed.take() {
            Some(f) => {
                drop(slot);
                trace!("trigger: invoking armed callback");
                f(args);
            }
            None => {
                slot.backlog.push_back(args);
                let backlog = slot.backlog.len();
                drop(slot);
                trace!(backlog, "trigger: queued");
            }
        }
    }

    /// arm されている場合だけ通知する。されていなければ `args` は捨てる
    ///
    /// エラーや終了処理での flush 用。誰も消費しない backlog を新たに作らない。
    pub fn trigger_if_armed(&self, args: A) {
        let armed = self.lock().armed.take();
        match armed {
            Some(f) => {
                trace!("trigger_if_armed: invoking armed callback");
                f(args);
            }
            None => debug!("trigger_if_armed: nothing armed, discarding"),
        }
    }
}

impl<A, F> Default for RearmableCallback<A, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, F> fmt::Debug for RearmableCallback<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("RearmableCallback")
            .field("armed", &status.armed)
            .field("backlog", &status.backlog)
            .finish()
    }
}

impl<A, F> Drop for RearmableCallback<A, F> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if slot.armed.is_some() || !slot.backlog.is_empty() {
            warn!(
                armed = slot.armed.is_some(),
                backlog = slot.backlog.len(),
                "dropping RearmableCallback with pending work; it is discarded"
            );
        }
    }
}
