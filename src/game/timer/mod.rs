use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::error::{QuizError, QuizResult};
use crate::game::event::{Event, EventKind};
use crate::observer::{ObserverHandle, Source, Subject};

#[cfg(test)]
mod tests;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(1);

fn validate_duration(duration: Duration) -> QuizResult<()> {
    if duration == Duration::default() {
        return Err(QuizError::configuration("Timer duration must be positive"));
    }
    Ok(())
}

#[derive(Debug)]
struct Clock {
    duration: Duration,
    remaining: Duration,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    deadline: Option<Instant>,
    running: bool,
    paused: bool,
    expired: bool,
    // Bumped on every start and stop. A countdown thread exits as soon as it
    // observes a generation other than its own.
    generation: u64,
    live_worker: Option<u64>,
    worker_thread: Option<ThreadId>,
}

impl Clock {
    fn new(duration: Duration) -> Self {
        Clock {
            duration,
            remaining: duration,
            started_at: None,
            stopped_at: None,
            deadline: None,
            running: false,
            paused: false,
            expired: false,
            generation: 0,
            live_worker: None,
            worker_thread: None,
        }
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        if self.expired {
            return Duration::default();
        }
        match (self.running, self.deadline) {
            (true, Some(deadline)) => deadline.saturating_duration_since(now),
            _ => self.remaining,
        }
    }

    /// Captures the remaining time. Freezing at zero counts as expiry.
    fn freeze(&mut self, now: Instant) {
        self.remaining = self.remaining_at(now);
        if self.remaining == Duration::default() {
            self.expired = true;
        }
    }
}

struct Shared {
    clock: Mutex<Clock>,
    wake: Condvar,
    subject: Subject,
    tick_interval: Duration,
    stop_grace: Duration,
}

impl Shared {
    fn publish(&self, kind: EventKind) {
        self.subject.notify(&Event::new(kind));
    }
}

/// Releases the countdown slot when the background thread exits, including
/// by unwinding.
struct CountdownExit {
    shared: Arc<Shared>,
    generation: u64,
}

impl Drop for CountdownExit {
    fn drop(&mut self) {
        let mut clock = self.shared.clock.lock();
        if thread::panicking() && clock.generation == self.generation {
            error!("Countdown thread crashed, halting timer");
            clock.freeze(Instant::now());
            clock.running = false;
        }
        if clock.live_worker == Some(self.generation) {
            clock.live_worker = None;
            clock.worker_thread = None;
        }
        self.shared.wake.notify_all();
    }
}

fn run_countdown(shared: Arc<Shared>, generation: u64) {
    let _exit = CountdownExit {
        shared: shared.clone(),
        generation,
    };
    let mut clock = shared.clock.lock();
    clock.worker_thread = Some(thread::current().id());

    while clock.generation == generation {
        if clock.paused {
            shared.wake.wait_for(&mut clock, shared.tick_interval);
            continue;
        }

        let now = Instant::now();
        let remaining = clock.remaining_at(now);
        clock.remaining = remaining;

        if remaining == Duration::default() {
            clock.expired = true;
            clock.running = false;
            clock.stopped_at = Some(now);
            info!("Timer expired after {:?}", clock.duration);
            MutexGuard::unlocked(&mut clock, || {
                shared.publish(EventKind::Tick {
                    remaining,
                    expired: true,
                });
                shared.publish(EventKind::Expired);
            });
            break;
        }

        debug!("Timer tick, {:?} remaining", remaining);
        MutexGuard::unlocked(&mut clock, || {
            shared.publish(EventKind::Tick {
                remaining,
                expired: false,
            });
        });
        if clock.generation != generation {
            break;
        }

        let wait = cmp::min(shared.tick_interval, clock.remaining_at(Instant::now()));
        if wait > Duration::default() {
            shared.wake.wait_for(&mut clock, wait);
        }
    }
}

/// Countdown clock that publishes a tick per interval from a background
/// thread, and a final expiry event when it runs out.
pub struct Timer {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    #[cfg(test)]
    pub fn new(duration: Duration) -> QuizResult<Timer> {
        Timer::with_intervals(duration, DEFAULT_TICK_INTERVAL, DEFAULT_STOP_GRACE)
    }

    pub fn with_intervals(
        duration: Duration,
        tick_interval: Duration,
        stop_grace: Duration,
    ) -> QuizResult<Timer> {
        validate_duration(duration)?;
        if tick_interval == Duration::default() {
            return Err(QuizError::configuration("Tick interval must be positive"));
        }
        Ok(Timer {
            shared: Arc::new(Shared {
                clock: Mutex::new(Clock::new(duration)),
                wake: Condvar::new(),
                subject: Subject::new(Source::Timer),
                tick_interval,
                stop_grace,
            }),
            worker: Mutex::new(None),
        })
    }

    pub fn attach(&self, observer: ObserverHandle) {
        self.shared.subject.attach(observer);
    }

    pub fn detach(&self, observer: &ObserverHandle) {
        self.shared.subject.detach(observer);
    }

    #[cfg(test)]
    pub fn duration(&self) -> Duration {
        self.shared.clock.lock().duration
    }

    pub fn start(&self) -> QuizResult<()> {
        let (generation, duration) = {
            let mut clock = self.shared.clock.lock();
            if clock.running {
                warn!("Timer is already running");
                return Err(QuizError::invalid_state("Timer is already running"));
            }
            let now = Instant::now();
            clock.started_at = Some(now);
            clock.stopped_at = None;
            clock.deadline = Some(now + clock.duration);
            clock.remaining = clock.duration;
            clock.running = true;
            clock.paused = false;
            clock.expired = false;
            clock.generation += 1;
            clock.live_worker = Some(clock.generation);
            clock.worker_thread = None;
            // Retires a countdown thread left parked by a previous pause.
            self.shared.wake.notify_all();
            (clock.generation, clock.duration)
        };

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("quiz-timer".to_owned())
            .spawn(move || run_countdown(shared, generation));

        match spawned {
            Ok(handle) => {
                // A replaced handle belongs to a retired thread, let it detach.
                self.worker.lock().replace(handle);
                info!("Timer started for {:?}", duration);
                Ok(())
            }
            Err(e) => {
                let mut clock = self.shared.clock.lock();
                if clock.generation == generation {
                    clock.running = false;
                    clock.live_worker = None;
                    clock.started_at = None;
                    clock.deadline = None;
                }
                error!("Could not spawn countdown thread: {}", e);
                Err(e.into())
            }
        }
    }

    /// Halts the countdown. Once this returns no further events are published,
    /// unless the countdown thread failed to exit within the grace period, which
    /// is logged. Stopping past the deadline before the countdown thread got to
    /// record it publishes the missing `Expired` here.
    pub fn stop(&self) {
        let mut clock = self.shared.clock.lock();
        if clock.live_worker.is_none() && !clock.running && !clock.paused {
            return;
        }

        let now = Instant::now();
        let was_expired = clock.expired;
        clock.freeze(now);
        let expired_on_stop = clock.expired && !was_expired;
        if clock.running || clock.paused {
            clock.stopped_at = Some(now);
        }
        clock.running = false;
        clock.paused = false;
        clock.generation += 1;
        self.shared.wake.notify_all();

        let waiting_for = clock.live_worker;
        let on_worker_thread = clock.worker_thread == Some(thread::current().id());
        if waiting_for.is_some() && !on_worker_thread {
            let give_up = now + self.shared.stop_grace;
            while clock.live_worker.is_some() && clock.live_worker == waiting_for {
                if self.shared.wake.wait_until(&mut clock, give_up).timed_out() {
                    break;
                }
            }
        }
        let exited = waiting_for.is_none() || clock.live_worker != waiting_for;
        drop(clock);

        if on_worker_thread {
            debug!("Timer stopped from its own countdown thread");
        } else if exited {
            if let Some(handle) = self.worker.lock().take() {
                if handle.join().is_err() {
                    warn!("Countdown thread terminated abnormally");
                }
            }
        } else {
            warn!(
                "Countdown thread did not exit within {:?}",
                self.shared.stop_grace
            );
        }

        if expired_on_stop {
            info!("Timer expired while stopping");
            self.shared.publish(EventKind::Expired);
        }
        info!("Timer stopped");
    }

    pub fn pause(&self) -> bool {
        let mut clock = self.shared.clock.lock();
        let now = Instant::now();
        // Expiry at the deadline belongs to the countdown thread.
        if !clock.running || clock.remaining_at(now) == Duration::default() {
            return false;
        }
        clock.freeze(now);
        clock.running = false;
        clock.paused = true;
        info!("Timer paused with {:?} remaining", clock.remaining);
        true
    }

    pub fn resume(&self) -> bool {
        let mut clock = self.shared.clock.lock();
        if !clock.paused || clock.expired {
            return false;
        }
        clock.deadline = Some(Instant::now() + clock.remaining);
        clock.running = true;
        clock.paused = false;
        self.shared.wake.notify_all();
        info!("Timer resumed with {:?} remaining", clock.remaining);
        true
    }

    pub fn remaining_time(&self) -> Duration {
        self.shared.clock.lock().remaining_at(Instant::now())
    }

    pub fn elapsed_time(&self) -> Duration {
        let clock = self.shared.clock.lock();
        match clock.started_at {
            Some(started_at) => clock
                .stopped_at
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(started_at),
            None => Duration::default(),
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.shared.clock.lock().running
    }

    #[cfg(test)]
    pub fn is_paused(&self) -> bool {
        self.shared.clock.lock().paused
    }

    /// True as soon as the remaining time reaches zero, even if the countdown
    /// thread has not recorded the expiry yet.
    pub fn is_time_expired(&self) -> bool {
        let clock = self.shared.clock.lock();
        clock.expired
            || (clock.running && clock.remaining_at(Instant::now()) == Duration::default())
    }

    pub fn is_time_up(&self) -> bool {
        self.is_time_expired()
    }

    pub fn reset(&self, new_duration: Option<Duration>) -> QuizResult<()> {
        if let Some(duration) = new_duration {
            validate_duration(duration)?;
        }
        self.stop();

        let mut clock = self.shared.clock.lock();
        if let Some(duration) = new_duration {
            clock.duration = duration;
        }
        clock.remaining = clock.duration;
        clock.started_at = None;
        clock.stopped_at = None;
        clock.deadline = None;
        clock.running = false;
        clock.paused = false;
        clock.expired = false;
        info!("Timer reset with duration {:?}", clock.duration);
        Ok(())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.shared.clock.lock();
        let status = if clock.expired {
            "expired"
        } else if clock.running {
            "running"
        } else if clock.paused {
            "paused"
        } else {
            "stopped"
        };
        write!(
            f,
            "Timer(duration={}s, remaining={}s, status={})",
            clock.duration.as_secs(),
            clock.remaining_at(Instant::now()).as_secs(),
            status
        )
    }
}
