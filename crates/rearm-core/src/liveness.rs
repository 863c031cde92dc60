//! LivenessGuard - 破棄済みオブジェクトに触れないコールバック
//!
//! # 学習ポイント
//! - `Weak<T>` による非所有参照（ラッパー自身が subject の寿命を延ばさない）
//! - `Weak::upgrade` は最後の `Arc` の drop と競合しても atomic に判定される
//! - upgrade で得た一時的な `Arc` はコールバックが返った直後に解放される
//!
//! # 使用例
//! ```ignore
//! let conn = Arc::new(Connection::new());
//! reads.arm(Box::new(guard(&conn, |conn: &Connection, n: usize| conn.on_read(n))));
//! drop(conn);
//! reads.trigger(42); // conn は破棄済みなので何も起きない
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

/// LivenessGuard は subject が生存している場合にだけ `f` を呼び出す
///
/// subject が破棄済みのときの呼び出しは何もしない（エラーも panic もなし）。
/// 「生きていたか」を呼び出し側に通知する手段ではないので、
/// 安全性のためだけに使うこと。
pub struct LivenessGuard<T, F> {
    subject: Weak<T>,
    f: F,
}

impl<T, F> LivenessGuard<T, F> {
    /// `Arc` から Weak 参照を作ってラップする
    pub fn new(subject: &Arc<T>, f: F) -> Self {
        Self::from_weak(Arc::downgrade(subject), f)
    }

    /// 既に持っている Weak 参照でラップする
    ///
    /// `Arc::new_cyclic` で自分自身への `Weak` を保持している型向け。
    pub fn from_weak(subject: Weak<T>, f: F) -> Self {
        Self { subject, f }
    }

    /// 診断用: subject がまだ生存しているか
    ///
    /// 戻り値は直後に古くなりうる。呼び出しの可否判定には使わないこと。
    pub fn is_alive(&self) -> bool {
        self.subject.strong_count() > 0
    }

    /// subject が生存していれば `f(&subject, args)` を呼ぶ
    pub fn invoke<A>(&self, args: A)
    where
        F: Fn(&T, A),
    {
        if let Some(subject) = self.subject.upgrade() {
            (self.f)(&subject, args);
        }
    }

    /// 一度きりの呼び出し（`FnOnce` 版）
    pub fn invoke_once<A>(self, args: A)
    where
        F: FnOnce(&T, A),
    {
        let Self { subject, f } = self;
        if let Some(subject) = subject.upgrade() {
            f(&subject, args);
        }
    }

    /// `Fn(A)` のクロージャに変換
    pub fn into_fn<A>(self) -> impl Fn(A) + use<T, F, A>
    where
        F: Fn(&T, A),
    {
        move |args| self.invoke(args)
    }

    /// `FnOnce(A)` のクロージャに変換
    pub fn into_fn_once<A>(self) -> impl FnOnce(A) + use<T, F, A>
    where
        F: FnOnce(&T, A),
    {
        move |args| self.invoke_once(args)
    }
}

impl<T, F> fmt::Debug for LivenessGuard<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivenessGuard")
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

/// `subject` が生存しているときだけ `f` を呼ぶクロージャを作る
pub fn guard<T, A, F>(subject: &Arc<T>, f: F) -> impl Fn(A) + use<T, A, F>
where
    F: Fn(&T, A),
{
    LivenessGuard::new(subject, f).into_fn()
}

/// [`guard`] の Weak 参照版
pub fn guard_weak<T, A, F>(subject: Weak<T>, f: F) -> impl Fn(A) + use<T, A, F>
where
    F: Fn(&T, A),
{
    LivenessGuard::from_weak(subject, f).into_fn()
}

/// [`guard`] の `FnOnce` 版（`RearmableCallback::arm` にそのまま渡せる）
pub fn guard_once<T, A, F>(subject: &Arc<T>, f: F) -> impl FnOnce(A) + use<T, A, F>
where
    F: FnOnce(&T, A),
{
    LivenessGuard::new(subject, f).into_fn_once()
}
