//! Errors - エラー型
//!
//! `arm` / `trigger` / `trigger_if_armed` 自体は失敗しない。
//! ここにあるのは厳格版 API と async ブリッジのためのエラーだけ。

use std::fmt;

/// CallbackError は async 側で待っているコールバックの失敗
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    #[error("armed callback was dropped before it was triggered")]
    Closed,
}

/// AlreadyArmed は `try_arm` が拒否したコールバックを呼び出し側に返す
///
/// スロットが埋まっている状態での二重 arm は、`arm` では黙って上書きされる。
/// `try_arm` はそれをエラーとして扱い、状態は一切変更しない。
#[derive(thiserror::Error)]
#[error("callback slot is already armed")]
pub struct AlreadyArmed<F>(pub F);

impl<F> AlreadyArmed<F> {
    /// 拒否されたコールバックを取り出す
    pub fn into_inner(self) -> F {
        self.0
    }
}

// クロージャは Debug を実装しないので手書き
impl<F> fmt::Debug for AlreadyArmed<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AlreadyArmed").finish_non_exhaustive()
    }
}
