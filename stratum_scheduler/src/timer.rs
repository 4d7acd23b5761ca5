// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debounce timers.
//!
//! A [`OneShotTimer`] runs its own thread. Every [`reset`](OneShotTimer::reset)
//! re-arms the countdown and fires the reset callback; letting the interval
//! elapse without a reset fires the expired callback once. The scheduler
//! uses three of these (idle, touch, display-power) to debounce activity
//! into feature states.

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

type Callback = Box<dyn Fn() + Send + Sync>;

struct Control {
    /// When the current countdown expires; `None` while disarmed.
    deadline: Option<Instant>,
    reset_pending: bool,
    stop: bool,
}

struct TimerShared {
    interval: Duration,
    control: Mutex<Control>,
    condvar: Condvar,
    on_reset: Callback,
    on_expired: Callback,
}

/// A resettable countdown timer with reset/expired callbacks.
///
/// The countdown is armed on construction. Dropping the timer stops and
/// joins its thread; callbacks never run after drop returns.
pub struct OneShotTimer {
    shared: Arc<TimerShared>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OneShotTimer {
    /// Creates and starts a timer.
    ///
    /// `on_reset` runs after every [`reset`](Self::reset); `on_expired`
    /// runs when `interval` elapses without a reset. Both run on the timer
    /// thread.
    #[must_use]
    pub fn new(
        name: &str,
        interval: Duration,
        on_reset: impl Fn() + Send + Sync + 'static,
        on_expired: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let shared = Arc::new(TimerShared {
            interval,
            control: Mutex::new(Control {
                deadline: Some(Instant::now() + interval),
                reset_pending: false,
                stop: false,
            }),
            condvar: Condvar::new(),
            on_reset: Box::new(on_reset),
            on_expired: Box::new(on_expired),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || timer_loop(&thread_shared))
            .expect("failed to spawn timer thread");

        Self {
            shared,
            thread: Some(thread),
        }
    }

    /// Re-arms the countdown and fires the reset callback.
    pub fn reset(&self) {
        let mut control = self.shared.control.lock();
        control.reset_pending = true;
        self.shared.condvar.notify_all();
    }

    /// Returns the configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        {
            let mut control = self.shared.control.lock();
            control.stop = true;
            self.shared.condvar.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn timer_loop(shared: &TimerShared) {
    let mut control = shared.control.lock();
    loop {
        if control.stop {
            return;
        }

        if control.reset_pending {
            control.reset_pending = false;
            control.deadline = Some(Instant::now() + shared.interval);
            drop(control);
            (shared.on_reset)();
            control = shared.control.lock();
            continue;
        }

        match control.deadline {
            None => {
                shared.condvar.wait(&mut control);
            }
            Some(deadline) => {
                if Instant::now() >= deadline {
                    control.deadline = None;
                    drop(control);
                    (shared.on_expired)();
                    control = shared.control.lock();
                } else {
                    let _ = shared.condvar.wait_until(&mut control, deadline);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counters() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)))
    }

    #[test]
    fn expires_once_without_reset() {
        let (resets, expiries) = counters();
        let (r, e) = (Arc::clone(&resets), Arc::clone(&expiries));
        let _timer = OneShotTimer::new(
            "test-expire",
            Duration::from_millis(20),
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                e.fetch_add(1, Ordering::SeqCst);
            },
        );

        thread::sleep(Duration::from_millis(200));
        assert_eq!(expiries.load(Ordering::SeqCst), 1, "exactly one expiry");
        assert_eq!(resets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reset_fires_reset_callback_and_rearms() {
        let (resets, expiries) = counters();
        let (r, e) = (Arc::clone(&resets), Arc::clone(&expiries));
        let timer = OneShotTimer::new(
            "test-reset",
            Duration::from_millis(50),
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                e.fetch_add(1, Ordering::SeqCst);
            },
        );

        timer.reset();
        thread::sleep(Duration::from_millis(10));
        assert!(resets.load(Ordering::SeqCst) >= 1);

        // After the interval passes with no further resets, it expires.
        thread::sleep(Duration::from_millis(300));
        assert_eq!(expiries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_stops_the_thread() {
        let (resets, expiries) = counters();
        let (r, e) = (Arc::clone(&resets), Arc::clone(&expiries));
        let timer = OneShotTimer::new(
            "test-drop",
            Duration::from_millis(10),
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                e.fetch_add(1, Ordering::SeqCst);
            },
        );
        drop(timer);
        let after_drop = expiries.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(expiries.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn interval_accessor() {
        let timer = OneShotTimer::new("test-interval", Duration::from_millis(123), || {}, || {});
        assert_eq!(timer.interval(), Duration::from_millis(123));
    }
}
