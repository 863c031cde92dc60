//! rearm-core
//!
//! 非同期の完了イベントをコールバック側へ取りこぼしなく橋渡しするための小さな並行プリミティブ。
//!
//! # モジュール構成
//! - **liveness**: subject が破棄済みなら何もしないコールバック（`Weak` ベース）
//! - **rearmable**: arm / trigger を突き合わせる一回きりのコールバックスロット + backlog
//! - **oneshot**: arm を `Future` として待つための tokio ブリッジ
//! - **status**: 状態スナップショット（診断・ログ用）
//! - **error**: 厳格版 API と async ブリッジのエラー

pub mod error;
pub mod liveness;
pub mod oneshot;
pub mod rearmable;
pub mod status;

pub use self::error::{AlreadyArmed, CallbackError};
pub use self::liveness::{LivenessGuard, guard, guard_once, guard_weak};
pub use self::oneshot::Armed;
pub use self::rearmable::{BoxCallback, RearmableCallback};
pub use self::status::{CallbackState, CallbackStatus};
