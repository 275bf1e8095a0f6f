use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use upthread::config::MIN_ABS_SLEEP_NS;
use upthread::errno::Errno;
use upthread::sync::{Condvar, Mutex};
use upthread::task::{self, Priority, ThreadOptions};

const MS: i64 = 1_000_000;

#[test]
fn signal_wakes_a_waiter_holding_the_mutex_again() {
    let result = task::boot(|| {
        let shared = Arc::new((Mutex::default(), Condvar::new(), AtomicBool::new(false)));
        let state = Arc::clone(&shared);
        let waiter = task::create(ThreadOptions::default(), move || {
            let (mutex, cond, ready) = &*state;
            mutex.lock();
            while !ready.load(Ordering::SeqCst) {
                cond.wait(mutex).unwrap();
            }
            assert_eq!(mutex.owner(), Some(task::current_thread().tid()));
            mutex.unlock().unwrap();
            7
        })
        .unwrap();
        task::sleep(MS);
        let (mutex, cond, ready) = &*shared;
        assert_eq!(cond.waiter_count(), 1);
        assert!(!mutex.is_locked());
        mutex.lock();
        ready.store(true, Ordering::SeqCst);
        cond.signal();
        mutex.unlock().unwrap();
        waiter.join().unwrap()
    });
    assert_eq!(result, Ok(7));
}

#[test]
fn broadcast_wakes_every_waiter() {
    let result = task::boot(|| {
        let shared = Arc::new((Mutex::default(), Condvar::new(), AtomicBool::new(false)));
        let woken = Arc::new(AtomicUsize::new(0));
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let (state, woken) = (Arc::clone(&shared), Arc::clone(&woken));
                task::create(ThreadOptions::default(), move || {
                    let (mutex, cond, ready) = &*state;
                    mutex.lock();
                    while !ready.load(Ordering::SeqCst) {
                        cond.wait(mutex).unwrap();
                    }
                    woken.fetch_add(1, Ordering::SeqCst);
                    mutex.unlock().unwrap();
                    0
                })
                .unwrap()
            })
            .collect();
        task::sleep(MS);
        let (mutex, cond, ready) = &*shared;
        assert_eq!(cond.waiter_count(), 3);
        mutex.lock();
        ready.store(true, Ordering::SeqCst);
        cond.broadcast();
        assert_eq!(cond.waiter_count(), 0);
        mutex.unlock().unwrap();
        for waiter in waiters {
            waiter.join().unwrap();
        }
        woken.load(Ordering::SeqCst)
    });
    assert_eq!(result, Ok(3));
}

#[test]
fn signal_wakes_the_most_recent_waiter_first() {
    let result = task::boot(|| {
        let shared = Arc::new((Mutex::default(), Condvar::new()));
        let order = Arc::new(spin::Mutex::new(Vec::new()));
        let mut waiters = Vec::new();
        for id in 1..=3 {
            let (state, order) = (Arc::clone(&shared), Arc::clone(&order));
            let waiter = task::create(ThreadOptions::default(), move || {
                let (mutex, cond) = &*state;
                mutex.lock();
                cond.wait(mutex).unwrap();
                order.lock().push(id);
                mutex.unlock().unwrap();
                0
            })
            .unwrap();
            waiters.push(waiter);
            task::sleep(MS);
        }
        let (_, cond) = &*shared;
        assert_eq!(cond.waiter_count(), 3);
        for _ in 0..3 {
            cond.signal();
            task::sleep(MS);
        }
        for waiter in waiters {
            waiter.join().unwrap();
        }
        let order = order.lock().clone();
        assert_eq!(order, vec![3, 2, 1]);
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn wait_restores_the_recursion_depth() {
    let result = task::boot(|| {
        let shared = Arc::new((Mutex::recursive(), Condvar::new()));
        let state = Arc::clone(&shared);
        let waiter = task::create(ThreadOptions::default(), move || {
            let (mutex, cond) = &*state;
            mutex.lock();
            mutex.lock();
            mutex.lock();
            cond.wait(mutex).unwrap();
            assert_eq!(mutex.owner(), Some(task::current_thread().tid()));
            assert_eq!(mutex.depth(), Some(2));
            for _ in 0..3 {
                mutex.unlock().unwrap();
            }
            assert_eq!(mutex.unlock(), Err(Errno::EPERM));
            0
        })
        .unwrap();
        task::sleep(MS);
        let (mutex, cond) = &*shared;
        assert!(!mutex.is_locked());
        assert_eq!(mutex.depth(), Some(0));
        mutex.lock();
        cond.signal();
        mutex.unlock().unwrap();
        waiter.join().unwrap()
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn timed_wait_past_its_deadline_times_out() {
    let result = task::boot(|| {
        let me = task::current_thread().tid();
        let mutex = Mutex::default();
        let cond = Condvar::new();
        task::sleep(5 * MS);
        mutex.lock();
        let deadline = task::now() - MS;
        assert_eq!(cond.wait_until(&mutex, deadline), Err(Errno::ETIMEDOUT));
        assert_eq!(mutex.owner(), Some(me));
        assert_eq!(cond.waiter_count(), 0);
        assert!(task::sleeping_threads().is_empty());
        mutex.unlock().unwrap();
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn timed_wait_deadline_is_clamped_to_the_minimum() {
    let result = task::boot(|| {
        let mutex = Mutex::default();
        let cond = Condvar::new();
        mutex.lock();
        assert_eq!(cond.wait_until(&mutex, 0), Err(Errno::ETIMEDOUT));
        assert!(task::now() >= MIN_ABS_SLEEP_NS);
        assert!(mutex.is_locked());
        mutex.unlock().unwrap();
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn signal_just_before_the_deadline_wins() {
    let result = task::boot(|| {
        let me = task::current_thread().tid();
        let shared = Arc::new((Mutex::default(), Condvar::new()));
        let deadline = task::now() + 10 * MS;
        let state = Arc::clone(&shared);
        let signaller = task::create(ThreadOptions::default(), move || {
            task::sleep_until(deadline - 1_000);
            let (mutex, cond) = &*state;
            mutex.lock();
            cond.signal();
            mutex.unlock().unwrap();
            0
        })
        .unwrap();
        let (mutex, cond) = &*shared;
        mutex.lock();
        assert_eq!(cond.wait_until(mutex, deadline), Ok(()));
        assert!(task::now() < deadline);
        assert!(!task::sleeping_threads().contains(&me));
        mutex.unlock().unwrap();
        signaller.join().unwrap();
        // the stale deadline must not wake anyone
        task::sleep_until(deadline + MS);
        assert!(task::sleeping_threads().is_empty());
        assert_eq!(cond.waiter_count(), 0);
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn signal_after_a_timeout_finds_no_waiter() {
    let result = task::boot(|| {
        let shared = Arc::new((Mutex::default(), Condvar::new()));
        let deadline = task::now() + 2 * MS;
        let state = Arc::clone(&shared);
        let signaller = task::create(ThreadOptions::default(), move || {
            task::sleep_until(deadline + MS);
            let (mutex, cond) = &*state;
            mutex.lock();
            assert_eq!(cond.waiter_count(), 0);
            cond.signal();
            mutex.unlock().unwrap();
            0
        })
        .unwrap();
        let (mutex, cond) = &*shared;
        mutex.lock();
        assert_eq!(cond.wait_until(mutex, deadline), Err(Errno::ETIMEDOUT));
        assert!(task::now() >= deadline);
        mutex.unlock().unwrap();
        signaller.join().unwrap();
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn signal_after_the_timeout_fired_still_counts_as_a_signal() {
    let result = task::boot(|| {
        let shared = Arc::new((Mutex::default(), Condvar::new()));
        let deadline = task::now() + 5 * MS;
        let seen = Arc::new(AtomicUsize::new(0));
        let (state, waiters_seen) = (Arc::clone(&shared), Arc::clone(&seen));
        let options = ThreadOptions {
            priority: Priority::HIGHEST,
            ..ThreadOptions::default()
        };
        // wakes at the same instant as the timed wait and runs first
        let signaller = task::create(options, move || {
            task::sleep_until(deadline);
            let (mutex, cond) = &*state;
            mutex.lock();
            waiters_seen.store(cond.waiter_count(), Ordering::SeqCst);
            cond.signal();
            mutex.unlock().unwrap();
            0
        })
        .unwrap();
        let (mutex, cond) = &*shared;
        mutex.lock();
        assert_eq!(cond.wait_until(mutex, deadline), Ok(()));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(task::sleeping_threads().is_empty());
        assert_eq!(cond.waiter_count(), 0);
        mutex.unlock().unwrap();
        signaller.join().unwrap()
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn destroy_and_wait_report_misuse() {
    let result = task::boot(|| {
        let shared = Arc::new((Mutex::default(), Condvar::new()));
        let (mutex, cond) = &*shared;
        assert_eq!(cond.wait(mutex), Err(Errno::EPERM));
        assert_eq!(cond.wait_until(mutex, 10 * MS), Err(Errno::EPERM));

        let state = Arc::clone(&shared);
        let waiter = task::create(ThreadOptions::default(), move || {
            let (mutex, cond) = &*state;
            mutex.lock();
            cond.wait(mutex).unwrap();
            mutex.unlock().unwrap();
            0
        })
        .unwrap();
        task::sleep(MS);
        assert_eq!(cond.destroy(), Err(Errno::EBUSY));
        cond.signal();
        waiter.join().unwrap();
        assert_eq!(cond.destroy(), Ok(()));
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn signalling_a_higher_priority_waiter_preempts_the_caller() {
    let trace = Arc::new(spin::Mutex::new(Vec::<&'static str>::new()));
    let log = Arc::clone(&trace);
    let result = task::boot(move || {
        let shared = Arc::new((Mutex::default(), Condvar::new()));
        let (state, waiter_log) = (Arc::clone(&shared), Arc::clone(&log));
        let options = ThreadOptions {
            priority: Priority::HIGHEST,
            ..ThreadOptions::default()
        };
        let waiter = task::create(options, move || {
            let (mutex, cond) = &*state;
            mutex.lock();
            cond.wait(mutex).unwrap();
            waiter_log.lock().push("waiter woken");
            mutex.unlock().unwrap();
            0
        })
        .unwrap();
        let (_, cond) = &*shared;
        assert_eq!(cond.waiter_count(), 1);
        cond.signal();
        log.lock().push("signal returned");
        waiter.join().unwrap()
    });
    assert_eq!(result, Ok(0));
    assert_eq!(*trace.lock(), vec!["waiter woken", "signal returned"]);
}

#[test]
fn broadcasting_to_higher_priority_waiters_preempts_once() {
    let trace = Arc::new(spin::Mutex::new(Vec::<&'static str>::new()));
    let log = Arc::clone(&trace);
    let result = task::boot(move || {
        let shared = Arc::new((Mutex::default(), Condvar::new()));
        let options = ThreadOptions {
            priority: Priority::HIGHEST,
            ..ThreadOptions::default()
        };
        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let (state, waiter_log) = (Arc::clone(&shared), Arc::clone(&log));
                task::create(options, move || {
                    let (mutex, cond) = &*state;
                    mutex.lock();
                    cond.wait(mutex).unwrap();
                    waiter_log.lock().push("waiter woken");
                    mutex.unlock().unwrap();
                    0
                })
                .unwrap()
            })
            .collect();
        let (_, cond) = &*shared;
        assert_eq!(cond.waiter_count(), 2);
        cond.broadcast();
        log.lock().push("broadcast returned");
        for waiter in waiters {
            waiter.join().unwrap();
        }
        0
    });
    assert_eq!(result, Ok(0));
    assert_eq!(
        *trace.lock(),
        vec!["waiter woken", "waiter woken", "broadcast returned"]
    );
}
