use std::sync::atomic::{AtomicUsize, Ordering};
use upthread::config::{PRIORITY_MAX, STACK_DEFAULT_FOR_PTHREAD, STACK_MIN};
use upthread::errno::Errno;
use upthread::posix::*;
use upthread::task::{self, Priority};

const EINVAL: i32 = Errno::EINVAL as i32;

#[test]
fn thread_attributes_validate_their_values() {
    let mut attr = PthreadAttr::default();
    assert_eq!(pthread_attr_init(&mut attr), 0);

    let mut state = -1;
    pthread_attr_getdetachstate(&attr, &mut state);
    assert_eq!(state, PTHREAD_CREATE_JOINABLE);
    assert_eq!(pthread_attr_setdetachstate(&mut attr, 7), EINVAL);
    assert_eq!(pthread_attr_setdetachstate(&mut attr, PTHREAD_CREATE_DETACHED), 0);
    pthread_attr_getdetachstate(&attr, &mut state);
    assert_eq!(state, PTHREAD_CREATE_DETACHED);

    let mut size = 0;
    pthread_attr_getstacksize(&attr, &mut size);
    assert_eq!(size, STACK_DEFAULT_FOR_PTHREAD);
    assert_eq!(pthread_attr_setstacksize(&mut attr, STACK_MIN - 1), EINVAL);
    assert_eq!(pthread_attr_setstacksize(&mut attr, STACK_MIN), 0);
    pthread_attr_getstacksize(&attr, &mut size);
    assert_eq!(size, STACK_MIN);

    let mut param = SchedParam::default();
    pthread_attr_getschedparam(&attr, &mut param);
    assert_eq!(param.sched_priority, 1);
    assert_eq!(pthread_attr_setschedparam(&mut attr, &SchedParam { sched_priority: 4 }), 0);
    pthread_attr_getschedparam(&attr, &mut param);
    assert_eq!(param.sched_priority, 4);
    assert_eq!(pthread_attr_destroy(&mut attr), 0);
}

#[test]
fn priority_bounds_follow_the_kernel_levels() {
    let max = sched_get_priority_max(0);
    assert_eq!(max, PRIORITY_MAX as i32 - 1);
    assert_eq!(sched_get_priority_min(0), 0);
    assert_eq!(Priority::from_posix(max), Priority::HIGHEST);
    assert_eq!(Priority::from_posix(0), Priority::LOWEST);
    assert_eq!(Priority::from_posix(max + 10), Priority::HIGHEST);
    assert_eq!(Priority::from_posix(-3), Priority::LOWEST);
}

#[test]
fn created_thread_runs_at_the_mapped_priority() {
    let result = task::boot(|| {
        let mut attr = PthreadAttr::default();
        pthread_attr_setschedparam(&mut attr, &SchedParam { sched_priority: 5 });
        let mut tid = 0;
        assert_eq!(
            pthread_create(&mut tid, Some(&attr), || {
                task::current_thread().priority().level() as usize
            }),
            0
        );
        let mut level = 0;
        assert_eq!(pthread_join(tid, Some(&mut level)), 0);
        level
    });
    assert_eq!(result, Ok(PRIORITY_MAX - 1 - 5));
}

#[test]
fn join_and_detach_report_errors() {
    let result = task::boot(|| {
        assert_eq!(pthread_join(pthread_self(), None), Errno::EDEADLK.code());
        assert_eq!(pthread_join(usize::MAX, None), Errno::ESRCH.code());
        assert_eq!(pthread_detach(usize::MAX), Errno::ESRCH.code());

        let mut attr = PthreadAttr::default();
        pthread_attr_setdetachstate(&mut attr, PTHREAD_CREATE_DETACHED);
        let mut detached = 0;
        assert_eq!(pthread_create(&mut detached, Some(&attr), || 0), 0);
        assert_eq!(pthread_join(detached, None), EINVAL);

        let mut joinable = 0;
        assert_eq!(pthread_create(&mut joinable, None, || 42), 0);
        assert!(!pthread_equal(joinable, pthread_self()));
        let mut value = 0;
        assert_eq!(pthread_join(joinable, Some(&mut value)), 0);
        assert_eq!(value, 42);
        // reaped by the first join
        assert_eq!(pthread_join(joinable, None), Errno::ESRCH.code());
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn detach_wakes_a_pending_joiner() {
    let result = task::boot(|| {
        let mut target = 0;
        assert_eq!(
            pthread_create(&mut target, None, || {
                task::sleep(2_000_000);
                0
            }),
            0
        );
        let mut joiner = 0;
        assert_eq!(
            pthread_create(&mut joiner, None, move || {
                assert_eq!(pthread_join(target, None), EINVAL);
                0
            }),
            0
        );
        task::sleep(1_000_000);
        assert_eq!(pthread_detach(target), 0);
        assert_eq!(pthread_join(joiner, None), 0);
        assert_eq!(pthread_detach(target), 0);
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn detaching_an_exited_thread_reaps_it() {
    let result = task::boot(|| {
        let mut tid = 0;
        assert_eq!(pthread_create(&mut tid, None, || 5), 0);
        task::sleep(1_000_000);
        assert!(task::exists(tid));
        assert_eq!(pthread_detach(tid), 0);
        assert!(!task::exists(tid));
        assert_eq!(pthread_join(tid, None), Errno::ESRCH.code());
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn mutex_interface_returns_error_codes() {
    let result = task::boot(|| {
        let mut attr = PthreadMutexAttr::default();
        assert_eq!(pthread_mutexattr_init(&mut attr), 0);
        assert_eq!(pthread_mutexattr_settype(&mut attr, 5), EINVAL);
        assert_eq!(pthread_mutexattr_settype(&mut attr, PTHREAD_MUTEX_RECURSIVE), 0);
        let mut kind = -1;
        pthread_mutexattr_gettype(&attr, &mut kind);
        assert_eq!(kind, PTHREAD_MUTEX_RECURSIVE);

        let mut recursive = PTHREAD_MUTEX_INITIALIZER;
        assert_eq!(pthread_mutex_init(&mut recursive, Some(&attr)), 0);
        assert_eq!(pthread_mutex_lock(&recursive), 0);
        assert_eq!(pthread_mutex_trylock(&recursive), 0);
        assert_eq!(pthread_mutex_unlock(&recursive), 0);
        assert_eq!(pthread_mutex_unlock(&recursive), 0);
        assert_eq!(pthread_mutex_unlock(&recursive), Errno::EPERM.code());
        assert_eq!(pthread_mutex_destroy(&recursive), 0);

        let plain = PTHREAD_MUTEX_INITIALIZER;
        assert_eq!(pthread_mutex_lock(&plain), 0);
        assert_eq!(pthread_mutex_trylock(&plain), Errno::EBUSY.code());
        assert_eq!(pthread_mutex_destroy(&plain), Errno::EBUSY.code());
        assert_eq!(pthread_mutex_unlock(&plain), 0);
        assert_eq!(pthread_mutexattr_destroy(&mut attr), 0);
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn cond_timedwait_uses_the_monotonic_clock() {
    let result = task::boot(|| {
        let mut attr = PthreadCondAttr::default();
        assert_eq!(pthread_condattr_init(&mut attr), 0);
        assert_eq!(pthread_condattr_setclock(&mut attr, CLOCK_REALTIME), EINVAL);
        let mut clock = -1;
        pthread_condattr_getclock(&attr, &mut clock);
        assert_eq!(clock, CLOCK_MONOTONIC);

        let mut cond = PTHREAD_COND_INITIALIZER;
        assert_eq!(pthread_cond_init(&mut cond, Some(&attr)), 0);
        let mutex = PTHREAD_MUTEX_INITIALIZER;
        let mut now = Timespec::default();
        assert_eq!(clock_gettime(CLOCK_REALTIME, &mut now), EINVAL);
        assert_eq!(clock_gettime(CLOCK_MONOTONIC, &mut now), 0);
        let abstime = Timespec::from_nanos(now.as_nanos() + 2_000_000);

        assert_eq!(pthread_mutex_lock(&mutex), 0);
        assert_eq!(
            pthread_cond_timedwait(&cond, &mutex, &abstime),
            Errno::ETIMEDOUT.code()
        );
        assert_eq!(clock_gettime(CLOCK_MONOTONIC, &mut now), 0);
        assert!(now.as_nanos() >= abstime.as_nanos());
        assert_eq!(pthread_mutex_unlock(&mutex), 0);

        assert_eq!(pthread_cond_signal(&cond), 0);
        assert_eq!(pthread_cond_broadcast(&cond), 0);
        assert_eq!(pthread_cond_destroy(&cond), 0);
        assert_eq!(pthread_condattr_destroy(&mut attr), 0);
        0
    });
    assert_eq!(result, Ok(0));
}

#[test]
fn timedwait_with_the_largest_deadline_keeps_the_clock_usable() {
    let result = task::boot(|| {
        let cond = PTHREAD_COND_INITIALIZER;
        let mutex = PTHREAD_MUTEX_INITIALIZER;
        let forever = Timespec {
            tv_sec: i64::MAX,
            tv_nsec: 0,
        };
        assert_eq!(pthread_mutex_lock(&mutex), 0);
        assert_eq!(
            pthread_cond_timedwait(&cond, &mutex, &forever),
            Errno::ETIMEDOUT.code()
        );
        assert_eq!(pthread_mutex_unlock(&mutex), 0);
        assert_eq!(sched_yield(), 0);
        let mut now = Timespec::default();
        assert_eq!(clock_gettime(CLOCK_MONOTONIC, &mut now), 0);
        assert_eq!(now.as_nanos(), i64::MAX);
        0
    });
    assert_eq!(result, Ok(0));
}

static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);

fn count_init() {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn pthread_once_runs_its_routine_once() {
    let result = task::boot(|| {
        let control = PTHREAD_ONCE_INIT;
        assert_eq!(pthread_once(None, Some(count_init)), EINVAL);
        assert_eq!(pthread_once(Some(&control), None), EINVAL);
        assert_eq!(pthread_once(Some(&PthreadOnce::zeroed()), Some(count_init)), EINVAL);
        assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 0);

        assert_eq!(pthread_once(Some(&control), Some(count_init)), 0);
        assert_eq!(pthread_once(Some(&control), Some(count_init)), 0);
        assert!(control.is_completed());
        INIT_CALLS.load(Ordering::SeqCst)
    });
    assert_eq!(result, Ok(1));
}

#[test]
fn cancel_state_is_accepted_and_ignored() {
    let mut old = -1;
    assert_eq!(pthread_setcancelstate(PTHREAD_CANCEL_DISABLE, Some(&mut old)), 0);
    assert_eq!(old, PTHREAD_CANCEL_ENABLE);
}
