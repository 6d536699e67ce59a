#![forbid(unsafe_code)]

//! Single-threaded timer queue for stateful decisions.
//!
//! Timers never run on their own: the host calls [`Timers::fire_due`] at its
//! natural yield points (frame ticks, event loop turns), and due callbacks run
//! synchronously on the calling thread. Tests drive time with a [`LabClock`].
//!
//! # Invariants
//!
//! 1. A callback runs at most once, and never after its handle was cancelled
//!    or dropped.
//! 2. Due callbacks run in deadline order; ties run in scheduling order.
//! 3. No queue borrow is held while a callback runs, so callbacks may
//!    schedule or cancel timers.
//! 4. [`Timers::drain`] cancels everything pending without running it.
//! 5. A delay reaching past the clock's representable range never fires; its
//!    handle is born inert.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::{Duration, Instant};

use crate::logging::trace;

/// A manually advanced clock for deterministic tests.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Rc<Cell<u64>>,
}

impl LabClock {
    /// Create a lab clock starting at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Rc::new(Cell::new(0)),
        }
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = delta.as_micros().min(u64::MAX as u128) as u64;
        self.offset_us.set(self.offset_us.get().saturating_add(us));
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.epoch + Duration::from_micros(self.offset_us.get())
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Time source used by a timer queue.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Wall-clock time.
    #[default]
    Real,
    /// Deterministic lab time.
    Lab(LabClock),
}

impl Clock {
    #[must_use]
    pub fn now(&self) -> Instant {
        match self {
            Self::Real => Instant::now(),
            Self::Lab(clock) => clock.now(),
        }
    }
}

type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
struct TimerQueue {
    next_id: u64,
    /// Keyed by (deadline, id) so iteration order is firing order.
    entries: BTreeMap<(Instant, u64), Callback>,
    deadlines: ahash::AHashMap<u64, Instant>,
}

impl TimerQueue {
    fn remove(&mut self, id: u64) -> Option<Callback> {
        let deadline = self.deadlines.remove(&id)?;
        self.entries.remove(&(deadline, id))
    }
}

/// Shared handle to a timer queue.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Timers {
    queue: Rc<RefCell<TimerQueue>>,
    clock: Clock,
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("pending", &self.pending())
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Timers {
    /// A queue driven by wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::Real)
    }

    /// A queue driven by a lab clock.
    #[must_use]
    pub fn lab(clock: &LabClock) -> Self {
        Self::with_clock(Clock::Lab(clock.clone()))
    }

    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            queue: Rc::new(RefCell::new(TimerQueue::default())),
            clock,
        }
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Schedule `callback` to run once `delay` has elapsed.
    ///
    /// Dropping the returned handle cancels the timer.
    #[must_use = "dropping a TimerHandle cancels the timer"]
    pub fn schedule(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerHandle {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        let Some(deadline) = self.now().checked_add(delay) else {
            trace!(message = "timer.never", id);
            return TimerHandle {
                id,
                queue: Weak::new(),
            };
        };
        queue.entries.insert((deadline, id), Box::new(callback));
        queue.deadlines.insert(id, deadline);
        trace!(message = "timer.schedule", id, delay_us = delay.as_micros() as u64);
        TimerHandle {
            id,
            queue: Rc::downgrade(&self.queue),
        }
    }

    /// Run every callback whose deadline has passed. Returns how many ran.
    pub fn fire_due(&self) -> usize {
        let now = self.now();
        let mut fired = 0;
        loop {
            // Pop one entry at a time: a callback may schedule or cancel others.
            let callback = {
                let mut queue = self.queue.borrow_mut();
                let Some((&(deadline, id), _)) = queue.entries.iter().next() else {
                    break;
                };
                if deadline > now {
                    break;
                }
                queue.deadlines.remove(&id);
                queue.entries.remove(&(deadline, id))
            };
            if let Some(callback) = callback {
                callback();
                fired += 1;
            }
        }
        if fired > 0 {
            trace!(message = "timer.fire_due", fired);
        }
        fired
    }

    /// Cancel every pending timer without running it. Returns how many were
    /// cancelled.
    pub fn drain(&self) -> usize {
        let drained = {
            let mut queue = self.queue.borrow_mut();
            queue.deadlines.clear();
            std::mem::take(&mut queue.entries)
        };
        let count = drained.len();
        // Callbacks are dropped outside the borrow.
        drop(drained);
        count
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().entries.len()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue
            .borrow()
            .entries
            .keys()
            .next()
            .map(|&(deadline, _)| deadline)
    }
}

/// Owner of one scheduled timer. Dropping it cancels the timer.
pub struct TimerHandle {
    id: u64,
    queue: Weak<RefCell<TimerQueue>>,
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl TimerHandle {
    /// Whether the timer has neither fired nor been cancelled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.queue
            .upgrade()
            .is_some_and(|queue| queue.borrow().deadlines.contains_key(&self.id))
    }

    /// Cancel the timer. Returns whether it was still pending.
    pub fn cancel(self) -> bool {
        self.cancel_inner()
    }

    fn cancel_inner(&self) -> bool {
        let Some(queue) = self.queue.upgrade() else {
            return false;
        };
        let removed = match queue.try_borrow_mut() {
            Ok(mut queue) => queue.remove(self.id),
            Err(_) => None,
        };
        removed.is_some()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel_inner();
    }
}
