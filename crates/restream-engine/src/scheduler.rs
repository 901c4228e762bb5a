//! One-shot action scheduling on a background timer thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ControlError;

/// Poll interval of the timer loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A deferred callback. Runs on the scheduler's own thread and must not
/// block; errors are logged, never propagated.
pub type Action = Box<dyn FnOnce() -> Result<(), ControlError> + Send>;

struct Scheduled {
    fire_at: Instant,
    action: Action,
}

/// Timer loop driving a controller's pending one-shot actions.
///
/// The pending list lives behind one lock; due actions are removed from the
/// list before they run, so each fires at most once and [`Scheduler::clean`]
/// called from an action (or any other thread) never deadlocks.
pub struct Scheduler {
    pending: Arc<Mutex<Vec<Scheduled>>>,
    should_stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the timer thread.
    pub fn start() -> Self {
        let pending: Arc<Mutex<Vec<Scheduled>>> = Arc::new(Mutex::new(Vec::new()));
        let should_stop = Arc::new(AtomicBool::new(false));

        let pending_clone = Arc::clone(&pending);
        let stop_clone = Arc::clone(&should_stop);
        let thread = thread::spawn(move || {
            timer_loop(pending_clone, stop_clone);
        });

        Self {
            pending,
            should_stop,
            thread: Some(thread),
        }
    }

    /// Schedule `action` to fire once, `delay` from now.
    pub fn schedule(&self, delay: Duration, action: Action) {
        self.pending.lock().push(Scheduled {
            fire_at: Instant::now() + delay,
            action,
        });
    }

    /// Drop every pending action unconditionally.
    pub fn clean(&self) {
        let dropped = {
            let mut pending = self.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        if dropped > 0 {
            debug!(dropped, "Cleared pending scheduled actions");
        }
    }

    /// Number of actions still waiting to fire.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn timer_loop(pending: Arc<Mutex<Vec<Scheduled>>>, should_stop: Arc<AtomicBool>) {
    while !should_stop.load(Ordering::SeqCst) {
        // Pull due actions out under the lock, run them after releasing it:
        // actions are allowed to schedule followups or clean the list.
        let due: Vec<Action> = {
            let mut pending = pending.lock();
            let now = Instant::now();
            let mut due = Vec::new();
            let mut i = 0;
            while i < pending.len() {
                if pending[i].fire_at <= now {
                    due.push(pending.remove(i).action);
                } else {
                    i += 1;
                }
            }
            due
        };

        for action in due {
            if let Err(e) = action() {
                warn!("Scheduled action failed: {}", e);
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}
