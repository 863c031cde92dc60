//! 複数スレッドからの arm / trigger の取りこぼし・重複がないことの確認

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use rearm_core::{BoxCallback, RearmableCallback, guard};

const THREADS: usize = 8;
const PER_THREAD: usize = 200;

fn collector(seen: &Arc<Mutex<Vec<(usize, usize)>>>) -> BoxCallback<(usize, usize)> {
    let seen = seen.clone();
    Box::new(move |args| seen.lock().unwrap().push(args))
}

#[test]
fn concurrent_triggers_on_unarmed_instance_are_all_queued() {
    let cb: Arc<RearmableCallback<(usize, usize)>> = Arc::new(RearmableCallback::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cb = cb.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cb.trigger((t, 0));
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(cb.backlog_len(), THREADS);

    let seen = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..THREADS {
        cb.arm(collector(&seen));
    }

    let threads: HashSet<usize> = seen.lock().unwrap().iter().map(|(t, _)| *t).collect();
    assert_eq!(threads.len(), THREADS);
    assert!(!cb.is_armed());
    assert_eq!(cb.backlog_len(), 0);
}

#[test]
fn per_thread_order_is_preserved_in_backlog() {
    let cb: Arc<RearmableCallback<(usize, usize)>> = Arc::new(RearmableCallback::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cb = cb.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    cb.trigger((t, i));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let drained = cb.drain_backlog();
    assert_eq!(drained.len(), THREADS * PER_THREAD);

    let mut next = vec![0; THREADS];
    for (t, i) in drained {
        assert_eq!(i, next[t], "thread {t} delivered out of order");
        next[t] += 1;
    }
}

#[test]
fn racing_arm_and_trigger_deliver_every_event_once() {
    let cb: Arc<RearmableCallback<(usize, usize)>> = Arc::new(RearmableCallback::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let total = THREADS * PER_THREAD;

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let cb = cb.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    cb.trigger((t, i));
                }
            })
        })
        .collect();

    // 1 本の consumer が直前のコールバックが発火してから次を arm する
    let consumer = {
        let cb = cb.clone();
        let seen = seen.clone();
        thread::spawn(move || {
            let fired = Arc::new(AtomicUsize::new(0));
            for armed in 0..total {
                while fired.load(Ordering::Acquire) < armed {
                    thread::yield_now();
                }
                let seen = seen.clone();
                let fired = fired.clone();
                cb.arm(Box::new(move |args| {
                    seen.lock().unwrap().push(args);
                    fired.fetch_add(1, Ordering::Release);
                }));
            }
            while fired.load(Ordering::Acquire) < total {
                thread::yield_now();
            }
        })
    };

    for p in producers {
        p.join().unwrap();
    }
    consumer.join().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), total);
    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), total);
    assert_eq!(cb.backlog_len(), 0);
    assert!(!cb.is_armed());
}

#[test]
fn guarded_callback_after_subject_drop_is_noop_across_threads() {
    struct Conn {
        hits: AtomicUsize,
    }

    let cb: Arc<RearmableCallback<usize>> = Arc::new(RearmableCallback::new());
    let conn = Arc::new(Conn {
        hits: AtomicUsize::new(0),
    });
    let weak = Arc::downgrade(&conn);

    cb.arm(Box::new(guard(&conn, |c: &Conn, n: usize| {
        c.hits.fetch_add(n, Ordering::SeqCst);
    })));
    drop(conn);

    let producer = {
        let cb = cb.clone();
        thread::spawn(move || cb.trigger(1))
    };
    producer.join().unwrap();

    assert!(weak.upgrade().is_none());
    assert!(!cb.is_armed());
    assert_eq!(cb.backlog_len(), 0);
}
