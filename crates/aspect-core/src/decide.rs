#![forbid(unsafe_code)]

//! The "should notify" contract and deferred wake-ups.
//!
//! Every projection answers one question for a scope: given a new and an old
//! value that the container already knows to differ, should my observer be
//! refreshed? Stateful decisions (debounce) can also answer later, through a
//! [`Waker`] bound by the container at registration time.
//!
//! # Carried State
//!
//! Observers usually rebuild their projections on every build. A stateful
//! decision that must outlive one build (a leading-edge debounce window) hands
//! its state over through [`Decide::carry`] and [`Decide::adopt`]: the scope
//! collects the carried state of the registration being replaced and offers it,
//! in the same traversal order, to the registration replacing it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// State handed from a replaced decision to its successor.
pub type Carried = Rc<dyn Any>;

/// Notification decision over a scope value `V`.
///
/// Implementations are never asked to compare a value with itself; the scope
/// container filters equal replacements first.
pub trait Decide<V> {
    /// Whether a replacement `old -> new` concerns this projection.
    fn should_notify(&self, new: &V, old: &V) -> bool;

    /// Attach a waker for notifications delivered outside a replacement step.
    ///
    /// Stateless decisions ignore it.
    fn bind_waker(&self, _waker: &Waker) {}

    /// Push state worth keeping across a rebuild, in traversal order.
    fn carry(&self, _out: &mut Vec<Carried>) {}

    /// Take over state from the decision this one replaces.
    ///
    /// Implementations consume exactly as many items as their `carry` pushes,
    /// ignoring items of the wrong shape.
    fn adopt(&self, _carried: &mut dyn Iterator<Item = Carried>) {}
}

impl<V, F> Decide<V> for F
where
    F: Fn(&V, &V) -> bool,
{
    fn should_notify(&self, new: &V, old: &V) -> bool {
        self(new, old)
    }
}

/// Decision that notifies on every distinct replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl<V> Decide<V> for Always {
    fn should_notify(&self, _new: &V, _old: &V) -> bool {
        true
    }
}

/// Deferred notification handle.
///
/// The key identifies the (scope, observer) pair the waker belongs to, so a
/// stateful decision bound twice to the same pair keeps a single waker. The
/// callback reports whether its target is still alive; dead wakers may be
/// dropped by whoever holds them.
#[derive(Clone)]
pub struct Waker {
    key: (u64, u64),
    wake: Rc<dyn Fn() -> bool>,
}

impl Waker {
    pub fn new(key: (u64, u64), wake: impl Fn() -> bool + 'static) -> Self {
        Self {
            key,
            wake: Rc::new(wake),
        }
    }

    #[must_use]
    pub fn key(&self) -> (u64, u64) {
        self.key
    }

    /// Wake the target. Returns `false` once the target is gone.
    pub fn wake(&self) -> bool {
        (self.wake)()
    }
}

impl fmt::Debug for Waker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waker").field("key", &self.key).finish()
    }
}
