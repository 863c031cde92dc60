//! Status - RearmableCallback の状態スナップショット

use serde::{Deserialize, Serialize};

/// CallbackStatus はある時点のスロットと backlog の様子
///
/// ロックを離した直後に古くなりうるので、ログや診断にだけ使う。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackStatus {
    pub armed: bool,
    pub backlog: usize,
}

impl CallbackStatus {
    pub fn state(&self) -> CallbackState {
        CallbackState::from(*self)
    }
}

/// CallbackState は RearmableCallback の状態機械
///
/// armed かつ backlog ありの状態は RearmableCallback では起きない（arm は先に backlog を消費する）。
/// 外から組み立てた CallbackStatus でそうなっていても ArmedEmpty として扱う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackState {
    UnarmedEmpty,
    UnarmedBacklogged,
    ArmedEmpty,
}

impl From<CallbackStatus> for CallbackState {
    fn from(status: CallbackStatus) -> Self {
        match (status.armed, status.backlog) {
            (false, 0) => CallbackState::UnarmedEmpty,
            (false, _) => CallbackState::UnarmedBacklogged,
            (true, _) => CallbackState::ArmedEmpty,
        }
    }
}
