use super::*;
use parking_lot::RwLock;
use std::sync::Weak;

use crate::game::event::EventKind;
use crate::observer::Observer;
use crate::output::mock::MockObserver;

fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let start_time = Instant::now();
    let poll = Duration::from_millis(20);
    loop {
        if condition() {
            return true;
        }
        if Instant::now().duration_since(start_time) > timeout {
            return false;
        }
        std::thread::sleep(poll);
    }
}

fn fast_timer(duration: Duration) -> Timer {
    let _ = env_logger::builder().is_test(true).try_init();
    Timer::with_intervals(duration, Duration::from_millis(50), DEFAULT_STOP_GRACE).unwrap()
}

#[test]
fn rejects_zero_duration() {
    match Timer::new(Duration::from_secs(0)) {
        Err(QuizError::Configuration(_)) => (),
        _ => panic!("Expected a configuration error"),
    }
}

#[test]
fn idle_timer_reports_full_duration() {
    let timer = Timer::new(Duration::from_secs(30)).unwrap();
    assert_eq!(timer.remaining_time(), Duration::from_secs(30));
    assert_eq!(timer.elapsed_time(), Duration::default());
    assert!(!timer.is_running());
    assert!(!timer.is_time_expired());
}

#[test]
fn remaining_time_starts_at_duration() {
    let duration = Duration::from_secs(30);
    let timer = Timer::new(duration).unwrap();
    timer.start().unwrap();
    let remaining = timer.remaining_time();
    assert!(remaining <= duration);
    assert!(remaining > duration - Duration::from_secs(1));
    assert!(timer.is_running());
    timer.stop();
}

#[test]
fn expires_after_duration() {
    let timer = Timer::new(Duration::from_secs(1)).unwrap();
    let mock = MockObserver::new();
    timer.attach(Arc::new(mock.clone()));
    timer.start().unwrap();

    assert!(wait_until(Duration::from_secs(3), || mock.saw_expiry()));
    assert_eq!(timer.remaining_time(), Duration::default());
    assert!(timer.is_time_expired());
    assert!(timer.is_time_up());
    assert!(!timer.is_running());

    let events = mock.events();
    assert_eq!(mock.count(|k| *k == EventKind::Expired), 1);
    assert_eq!(
        events[events.len() - 2],
        EventKind::Tick {
            remaining: Duration::default(),
            expired: true
        }
    );
    assert_eq!(events.last(), Some(&EventKind::Expired));
}

#[test]
fn remaining_reaches_zero_at_deadline() {
    let timer =
        Timer::with_intervals(Duration::from_millis(200), Duration::from_secs(5), DEFAULT_STOP_GRACE)
            .unwrap();
    timer.start().unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(timer.remaining_time(), Duration::default());
    assert!(timer.is_time_expired());
    timer.stop();
}

#[test]
fn publishes_ticks_while_running() {
    let timer = fast_timer(Duration::from_secs(10));
    let mock = MockObserver::new();
    timer.attach(Arc::new(mock.clone()));
    timer.start().unwrap();

    let is_tick = |k: &EventKind| match k {
        EventKind::Tick { expired, .. } => !expired,
        _ => false,
    };
    assert!(wait_until(Duration::from_secs(2), || mock.count(is_tick) >= 3));
    timer.stop();
    assert!(!mock.saw_expiry());
}

#[test]
fn tick_remaining_never_increases() {
    let timer = fast_timer(Duration::from_millis(500));
    let mock = MockObserver::new();
    timer.attach(Arc::new(mock.clone()));
    timer.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || mock.saw_expiry()));

    let remaining: Vec<Duration> = mock
        .events()
        .iter()
        .filter_map(|k| match k {
            EventKind::Tick { remaining, .. } => Some(*remaining),
            _ => None,
        })
        .collect();
    assert!(remaining.windows(2).all(|w| w[0] >= w[1]));
    assert!(remaining.iter().all(|r| *r <= Duration::from_millis(500)));
}

#[test]
fn double_start_is_rejected() {
    let timer = Timer::new(Duration::from_secs(30)).unwrap();
    timer.start().unwrap();
    match timer.start() {
        Err(QuizError::InvalidState(_)) => (),
        _ => panic!("Expected an invalid state error"),
    }
    assert!(timer.is_running());
    timer.stop();
}

#[test]
fn stop_halts_events() {
    let timer = fast_timer(Duration::from_secs(10));
    let mock = MockObserver::new();
    timer.attach(Arc::new(mock.clone()));
    timer.start().unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let before_stop = Instant::now();
    timer.stop();
    assert!(before_stop.elapsed() < DEFAULT_STOP_GRACE);
    assert!(!timer.is_running());

    mock.flush();
    std::thread::sleep(Duration::from_millis(300));
    assert!(mock.flush().is_empty());
    assert!(!timer.is_time_expired());
}

#[test]
fn stop_is_prompt_with_slow_ticks() {
    let timer = Timer::new(Duration::from_secs(30)).unwrap();
    timer.start().unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let before_stop = Instant::now();
    timer.stop();
    assert!(before_stop.elapsed() < Duration::from_millis(500));
}

#[test]
fn stop_without_start_is_noop() {
    let timer = Timer::new(Duration::from_secs(30)).unwrap();
    timer.stop();
    timer.stop();
    assert!(!timer.is_running());
    assert_eq!(timer.remaining_time(), Duration::from_secs(30));
}

#[test]
fn pause_excludes_paused_interval() {
    let timer = Timer::new(Duration::from_secs(3)).unwrap();
    timer.start().unwrap();
    assert!(timer.pause());
    assert!(timer.is_paused());
    assert!(!timer.is_running());

    let frozen = timer.remaining_time();
    std::thread::sleep(Duration::from_millis(1500));
    assert_eq!(timer.remaining_time(), frozen);

    assert!(timer.resume());
    assert!(timer.is_running());
    let remaining = timer.remaining_time();
    assert!(remaining > Duration::from_secs(2));
    assert!(remaining <= Duration::from_secs(3));
    timer.stop();
}

#[test]
fn paused_timer_does_not_expire() {
    let timer = fast_timer(Duration::from_millis(300));
    let mock = MockObserver::new();
    timer.attach(Arc::new(mock.clone()));
    timer.start().unwrap();
    timer.pause();
    std::thread::sleep(Duration::from_millis(600));
    assert!(!mock.saw_expiry());
    assert!(!timer.is_time_expired());

    timer.resume();
    assert!(wait_until(Duration::from_secs(2), || mock.saw_expiry()));
}

#[test]
fn pause_and_resume_need_matching_state() {
    let timer = fast_timer(Duration::from_millis(100));
    assert!(!timer.pause());
    assert!(!timer.resume());

    timer.start().unwrap();
    assert!(!timer.resume());
    assert!(wait_until(Duration::from_secs(2), || {
        timer.is_time_expired() && !timer.is_running()
    }));
    assert!(!timer.pause());
    assert!(!timer.resume());
}

#[test]
fn reset_restores_initial_state() {
    let timer = fast_timer(Duration::from_millis(100));
    timer.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || timer.is_time_expired()));

    timer.reset(None).unwrap();
    assert!(!timer.is_time_expired());
    assert!(!timer.is_running());
    assert_eq!(timer.remaining_time(), Duration::from_millis(100));
    assert_eq!(timer.elapsed_time(), Duration::default());
}

#[test]
fn reset_replaces_duration() {
    let timer = Timer::new(Duration::from_secs(30)).unwrap();
    timer.start().unwrap();
    timer.reset(Some(Duration::from_secs(60))).unwrap();
    assert!(!timer.is_running());
    assert_eq!(timer.duration(), Duration::from_secs(60));
    assert_eq!(timer.remaining_time(), Duration::from_secs(60));

    timer.start().unwrap();
    assert!(timer.remaining_time() > Duration::from_secs(59));
    timer.stop();
}

#[test]
fn reset_with_zero_duration_is_rejected() {
    let timer = Timer::new(Duration::from_secs(30)).unwrap();
    timer.start().unwrap();
    assert!(timer.reset(Some(Duration::from_secs(0))).is_err());
    assert!(timer.is_running());
    assert_eq!(timer.duration(), Duration::from_secs(30));
    timer.stop();
}

#[test]
fn elapsed_time_freezes_on_stop() {
    let timer = Timer::new(Duration::from_secs(30)).unwrap();
    timer.start().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    timer.stop();
    let elapsed = timer.elapsed_time();
    assert!(elapsed >= Duration::from_millis(200));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(timer.elapsed_time(), elapsed);
}

#[test]
fn observer_can_stop_timer_from_countdown_thread() {
    struct Stopper {
        timer: RwLock<Weak<Timer>>,
        ticks: RwLock<usize>,
    }
    impl Observer for Stopper {
        fn receive(&self, _source: Source, _event: &Event) -> anyhow::Result<()> {
            *self.ticks.write() += 1;
            if let Some(timer) = self.timer.read().upgrade() {
                timer.stop();
            }
            Ok(())
        }
    }

    let timer = Arc::new(fast_timer(Duration::from_secs(10)));
    let stopper = Arc::new(Stopper {
        timer: RwLock::new(Arc::downgrade(&timer)),
        ticks: RwLock::new(0),
    });
    timer.attach(stopper.clone());
    timer.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || !timer.is_running()));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(*stopper.ticks.read(), 1);
}

#[test]
fn restart_after_expiry_counts_down_again() {
    let timer = fast_timer(Duration::from_millis(100));
    let mock = MockObserver::new();
    timer.attach(Arc::new(mock.clone()));
    timer.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || mock.saw_expiry()));
    mock.flush();

    timer.start().unwrap();
    assert!(!timer.is_time_expired());
    assert!(wait_until(Duration::from_secs(2), || mock.saw_expiry()));
}

#[test]
fn displays_status() {
    let timer = Timer::new(Duration::from_secs(30)).unwrap();
    assert_eq!(
        timer.to_string(),
        "Timer(duration=30s, remaining=30s, status=stopped)"
    );
}

#[test]
fn stop_past_deadline_records_expiry() {
    struct Sluggish;
    impl Observer for Sluggish {
        fn receive(&self, _source: Source, _event: &Event) -> anyhow::Result<()> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }
    }

    let timer = fast_timer(Duration::from_millis(100));
    let mock = MockObserver::new();
    timer.attach(Arc::new(Sluggish));
    timer.attach(Arc::new(mock.clone()));
    timer.start().unwrap();

    // The countdown thread is still busy delivering its first tick.
    std::thread::sleep(Duration::from_millis(200));
    assert!(timer.is_time_expired());

    timer.stop();
    assert!(timer.is_time_expired());
    assert_eq!(timer.remaining_time(), Duration::default());
    assert_eq!(mock.count(|k| *k == EventKind::Expired), 1);
    assert!(timer.to_string().ends_with("status=expired)"));
}

#[test]
fn pause_at_deadline_is_refused() {
    let timer =
        Timer::with_intervals(Duration::from_millis(100), Duration::from_secs(5), DEFAULT_STOP_GRACE)
            .unwrap();
    timer.start().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(!timer.pause());
    assert!(timer.is_time_expired());
    timer.stop();
}
