use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use rearm_core::{CallbackStatus, RearmableCallback, guard_weak};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type ReadResult = Result<Vec<u8>, String>;

/// デモの設定（環境変数から読む）
#[derive(Debug, Clone, Serialize)]
struct DemoConfig {
    producers: usize,
    events_per_producer: usize,
    drop_connection_early: bool,
}

impl DemoConfig {
    fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            producers: var("REARM_PRODUCERS", 4),
            events_per_producer: var("REARM_EVENTS_PER_PRODUCER", 64),
            drop_connection_early: var("REARM_DROP_CONNECTION_EARLY", false),
        }
    }
}

/// Connection より長生きする集計
#[derive(Debug, Default)]
struct Stats {
    reads: AtomicUsize,
    bytes: AtomicUsize,
}

/// 模擬コネクション
///
/// read 完了は producer スレッドから届く。read ループは Connection を所有しない。
struct Connection {
    stats: Arc<Stats>,
}

impl Connection {
    fn on_read(&self, result: ReadResult) {
        match result {
            Ok(buf) => {
                self.stats.reads.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes.fetch_add(buf.len(), Ordering::Relaxed);
            }
            Err(e) => info!(error = %e, "read loop stopped"),
        }
    }
}

/// read 完了を 1 件ずつ待って Connection に渡す
///
/// 再 arm はコールバックの中ではなくこのループで行うので、
/// backlog がどれだけ溜まってもスタックは伸びない。
/// Connection が先に破棄されていれば受け取った結果は捨てられる。
async fn read_loop(conn: Weak<Connection>, reads: Arc<RearmableCallback<ReadResult>>) {
    let on_read = guard_weak(conn, |conn: &Connection, result: ReadResult| {
        conn.on_read(result)
    });
    loop {
        match reads.arm_oneshot().await {
            Ok(Ok(buf)) => on_read(Ok(buf)),
            Ok(Err(e)) => {
                on_read(Err(e));
                break;
            }
            Err(e) => {
                warn!(error = %e, "read callback lost");
                break;
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    config: DemoConfig,
    triggered: usize,
    delivered_reads: usize,
    delivered_bytes: usize,
    undelivered: usize,
    write_acks: Vec<usize>,
    final_status: CallbackStatus,
}

/// write 完了を async に待つ側のデモ
async fn write_loop(writes: Arc<RearmableCallback<usize>>, count: usize) -> Vec<usize> {
    let mut acks = Vec::with_capacity(count);
    for i in 0..count {
        let ack = writes.arm_oneshot();

        let producer = writes.clone();
        let len = (i + 1) * 16;
        tokio::task::spawn_blocking(move || producer.trigger(len));

        match ack.await {
            Ok(n) => acks.push(n),
            Err(e) => {
                warn!(error = %e, "write ack lost");
                break;
            }
        }
    }
    acks
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_ids(true)
        .init();

    let config = DemoConfig::from_env();
    info!(?config, "starting rearm demo");

    // (A) read スロットと Connection を用意して read ループを起動
    let reads: Arc<RearmableCallback<ReadResult>> = Arc::new(RearmableCallback::new());
    let stats = Arc::new(Stats::default());
    let conn = Arc::new(Connection {
        stats: stats.clone(),
    });
    let reader = tokio::spawn(read_loop(Arc::downgrade(&conn), reads.clone()));

    // (B) producer スレッドが read 完了を trigger
    let producers: Vec<_> = (0..config.producers)
        .map(|p| {
            let reads = reads.clone();
            let events = config.events_per_producer;
            thread::spawn(move || {
                for i in 0..events {
                    reads.trigger(Ok(format!("p{p}-e{i}").into_bytes()));
                }
            })
        })
        .collect();

    // 途中で Connection を落としても、guard 済みの on_read は no-op になる
    let conn = if config.drop_connection_early {
        drop(conn);
        info!("connection dropped while producers are running");
        None
    } else {
        Some(conn)
    };

    tokio::task::spawn_blocking(move || {
        producers
            .into_iter()
            .try_for_each(|p| p.join().map(|_| ()))
    })
    .await?
    .map_err(|_| "producer thread panicked")?;

    // read ループが backlog を消化して次の arm に入るまで待つ
    while !reads.is_armed() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // (C) async 側: write 完了を Future として待つ
    let writes: Arc<RearmableCallback<usize>> = Arc::new(RearmableCallback::new());
    let write_acks = write_loop(writes, 3).await;

    // (D) 終了処理: 待っている read にエラーを流して read ループを止める
    reads.trigger_if_armed(Err("shutdown".to_string()));
    reader.await?;
    let undelivered = reads.drain_backlog();
    if !undelivered.is_empty() {
        warn!(count = undelivered.len(), "reads were never consumed");
    }
    drop(conn);

    let summary = Summary {
        triggered: config.producers * config.events_per_producer,
        delivered_reads: stats.reads.load(Ordering::Relaxed),
        delivered_bytes: stats.bytes.load(Ordering::Relaxed),
        undelivered: undelivered.len(),
        write_acks,
        final_status: reads.status(),
        config,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
