#![forbid(unsafe_code)]

//! Time-based suppression of notifications.
//!
//! A [`Debouncer`] sits behind a projection's decision and delays or drops
//! the "notify" answer. Reads are never delayed: observers always read the
//! latest value, only the moment they are told to refresh moves.
//!
//! # Modes
//!
//! - **Trailing** (default): every qualifying change (re)starts the window and
//!   is suppressed. When the window elapses and the latest value differs from
//!   the last delivered one, bound wakers fire once.
//! - **Leading**: the first qualifying change after an idle period notifies
//!   immediately and opens the window. Changes inside the window are
//!   suppressed; the window elapsing re-arms the leading edge.
//!
//! # Ownership
//!
//! Inline (`aspect.debounce(..)`) and retained (`aspect.debounce_with(..)`)
//! forms share the same [`Debouncer`] type and own their timer identically:
//! the timer is cancelled when the last handle drops, and [`Debouncer::cancel`]
//! tears it down explicitly.
//!
//! An inline debouncer is created afresh whenever the aspect is rebuilt. When
//! a scope replaces an observer's registration, the new inline debouncer
//! adopts the state of the one at the same position (same config), so an
//! open leading window stays open across rebuilds. Retained debouncers are
//! already shared and never adopt.
//!
//! # Invariants
//!
//! 1. At most one timer is pending per debouncer; restarting cancels the
//!    previous timer before scheduling the next.
//! 2. A trailing delivery happens only if the latest value differs from the
//!    last delivered value under the configured equality.
//! 3. Wakers whose target reports itself gone are dropped on the next
//!    delivery.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::decide::{Carried, Decide, Waker};
use crate::logging::{debug, trace};
use crate::timer::{TimerHandle, Timers};

/// Debounce configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DebounceConfig {
    /// Length of the suppression window.
    pub window: Duration,
    /// Notify on the leading edge instead of the trailing edge.
    pub leading: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(300),
            leading: false,
        }
    }
}

impl DebounceConfig {
    /// Trailing-edge debounce with the given window.
    #[must_use]
    pub fn trailing(window: Duration) -> Self {
        Self {
            window,
            leading: false,
        }
    }

    /// Leading-edge debounce with the given window.
    #[must_use]
    pub fn leading(window: Duration) -> Self {
        Self {
            window,
            leading: true,
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }
}

struct DebounceState<A> {
    latest: Option<A>,
    delivered: Option<A>,
    timer: Option<TimerHandle>,
    wakers: Vec<Waker>,
    notifications: u64,
}

type Equality<A> = Rc<dyn Fn(&A, &A) -> bool>;

/// Shared debounce state plus its timer.
pub struct Debouncer<A> {
    state: Rc<RefCell<DebounceState<A>>>,
    config: DebounceConfig,
    timers: Timers,
    eq: Equality<A>,
}

impl<A> Clone for Debouncer<A> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            config: self.config,
            timers: self.timers.clone(),
            eq: Rc::clone(&self.eq),
        }
    }
}

impl<A: fmt::Debug> fmt::Debug for Debouncer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Debouncer")
            .field("config", &self.config)
            .field("latest", &state.latest)
            .field("delivered", &state.delivered)
            .field("pending", &state.timer.is_some())
            .field("notifications", &state.notifications)
            .finish()
    }
}

impl<A: Clone + PartialEq + 'static> Debouncer<A> {
    /// A debouncer comparing values with `PartialEq`.
    #[must_use]
    pub fn new(config: DebounceConfig, timers: &Timers) -> Self {
        Self::with_equality(config, timers, |a: &A, b: &A| a == b)
    }
}

impl<A: Clone + 'static> Debouncer<A> {
    /// A debouncer comparing values with `eq`.
    #[must_use]
    pub fn with_equality(
        config: DebounceConfig,
        timers: &Timers,
        eq: impl Fn(&A, &A) -> bool + 'static,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(DebounceState {
                latest: None,
                delivered: None,
                timer: None,
                wakers: Vec::new(),
                notifications: 0,
            })),
            config,
            timers: timers.clone(),
            eq: Rc::new(eq),
        }
    }

    #[must_use]
    pub fn config(&self) -> DebounceConfig {
        self.config
    }

    /// Feed a qualifying change. Returns whether to notify right now.
    ///
    /// `old` is consulted only to seed the delivered value on the first
    /// trailing change.
    pub fn offer(&self, latest: A, old: impl FnOnce() -> A) -> bool {
        if self.config.leading {
            self.offer_leading(latest)
        } else {
            self.offer_trailing(latest, old);
            false
        }
    }

    fn offer_leading(&self, latest: A) -> bool {
        let mut state = self.state.borrow_mut();
        state.latest = Some(latest.clone());
        if state.timer.is_some() {
            return false;
        }
        if let Some(delivered) = &state.delivered
            && (self.eq)(delivered, &latest)
        {
            return false;
        }
        state.delivered = Some(latest);
        state.notifications += 1;
        state.timer = Some(self.schedule_elapse());
        debug!(message = "debounce.leading", notifications = state.notifications);
        true
    }

    fn offer_trailing(&self, latest: A, old: impl FnOnce() -> A) {
        let mut state = self.state.borrow_mut();
        if state.delivered.is_none() {
            state.delivered = Some(old());
        }
        state.latest = Some(latest);
        // Cancel before scheduling: never two timers for one debouncer.
        if let Some(previous) = state.timer.take() {
            previous.cancel();
        }
        state.timer = Some(self.schedule_elapse());
    }

    fn schedule_elapse(&self) -> TimerHandle {
        let weak: Weak<RefCell<DebounceState<A>>> = Rc::downgrade(&self.state);
        let eq = Rc::clone(&self.eq);
        let leading = self.config.leading;
        self.timers.schedule(self.config.window, move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let wakers = {
                let mut state = state.borrow_mut();
                state.timer = None;
                if leading {
                    return;
                }
                let changed = match (&state.latest, &state.delivered) {
                    (Some(latest), Some(delivered)) => !eq(latest, delivered),
                    (Some(_), None) => true,
                    _ => false,
                };
                if !changed {
                    return;
                }
                state.delivered = state.latest.clone();
                state.notifications += 1;
                debug!(message = "debounce.trailing", notifications = state.notifications);
                state.wakers.clone()
            };
            let dead: Vec<(u64, u64)> = wakers
                .iter()
                .filter(|waker| !waker.wake())
                .map(Waker::key)
                .collect();
            if !dead.is_empty() {
                state
                    .borrow_mut()
                    .wakers
                    .retain(|waker| !dead.contains(&waker.key()));
                debug!(message = "debounce.prune", pruned = dead.len());
            }
        })
    }

    /// Register a waker; a waker with the same key replaces the old one.
    pub fn bind(&self, waker: &Waker) {
        // leading notifications ride the replacement step, never a waker
        if self.config.leading {
            return;
        }
        let mut state = self.state.borrow_mut();
        state.wakers.retain(|w| w.key() != waker.key());
        state.wakers.push(waker.clone());
    }

    /// Number of wakers currently bound.
    #[must_use]
    pub fn bound(&self) -> usize {
        self.state.borrow().wakers.len()
    }

    fn shares_state(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Cancel the pending window, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let timer = self.state.borrow_mut().timer.take();
        timer.is_some_and(TimerHandle::cancel)
    }

    /// Whether a window is currently open.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.borrow().timer.is_some()
    }

    /// How many notifications were delivered so far (leading or trailing).
    #[must_use]
    pub fn notifications(&self) -> u64 {
        self.state.borrow().notifications
    }

    /// The last delivered value.
    #[must_use]
    pub fn delivered(&self) -> Option<A> {
        self.state.borrow().delivered.clone()
    }

    /// The most recent value offered.
    #[must_use]
    pub fn latest(&self) -> Option<A> {
        self.state.borrow().latest.clone()
    }
}

/// Decision wrapper driving a [`Debouncer`].
pub(crate) struct Debounced<V, A> {
    pub(crate) read: Rc<dyn Fn(&V) -> A>,
    pub(crate) base: Rc<dyn Decide<V>>,
    pub(crate) debouncer: RefCell<Debouncer<A>>,
    /// Created by the aspect itself rather than handed in by the caller.
    pub(crate) inline: bool,
}

impl<V, A: Clone + 'static> Decide<V> for Debounced<V, A> {
    fn should_notify(&self, new: &V, old: &V) -> bool {
        if !self.base.should_notify(new, old) {
            return false;
        }
        let debouncer = self.debouncer.borrow().clone();
        debouncer.offer((self.read)(new), || (self.read)(old))
    }

    fn bind_waker(&self, waker: &Waker) {
        self.base.bind_waker(waker);
        self.debouncer.borrow().bind(waker);
    }

    fn carry(&self, out: &mut Vec<Carried>) {
        self.base.carry(out);
        if self.inline {
            out.push(Rc::new(self.debouncer.borrow().clone()));
        }
    }

    fn adopt(&self, carried: &mut dyn Iterator<Item = Carried>) {
        self.base.adopt(carried);
        if !self.inline {
            return;
        }
        let Some(item) = carried.next() else {
            return;
        };
        let item: &dyn Any = &*item;
        let Some(previous) = item.downcast_ref::<Debouncer<A>>() else {
            return;
        };
        let mut own = self.debouncer.borrow_mut();
        if previous.config == own.config && !own.shares_state(previous) {
            *own = previous.clone();
            trace!(message = "debounce.adopt", pending = own.is_pending());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::Aspect;
    use crate::timer::LabClock;
    use std::cell::Cell;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn counting_waker(hits: &Rc<Cell<u32>>) -> Waker {
        let h = Rc::clone(hits);
        Waker::new((0, 0), move || {
            h.set(h.get() + 1);
            true
        })
    }

    #[test]
    fn trailing_delivers_latest_after_window() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let d = Debouncer::new(DebounceConfig::trailing(ms(100)), &timers);
        let hits = Rc::new(Cell::new(0));
        d.bind(&counting_waker(&hits));

        assert!(!d.offer(2, || 1));
        clock.advance(ms(50));
        timers.fire_due();
        assert_eq!(hits.get(), 0);

        // restart: the intermediate value is never delivered
        assert!(!d.offer(3, || 2));
        clock.advance(ms(60));
        timers.fire_due();
        assert_eq!(hits.get(), 0);
        clock.advance(ms(40));
        timers.fire_due();
        assert_eq!(hits.get(), 1);
        assert_eq!(d.delivered(), Some(3));
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn trailing_skips_when_back_to_delivered() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let d = Debouncer::new(DebounceConfig::trailing(ms(10)), &timers);
        let hits = Rc::new(Cell::new(0));
        d.bind(&counting_waker(&hits));

        d.offer(2, || 1);
        d.offer(1, || 2);
        clock.advance(ms(10));
        timers.fire_due();
        assert_eq!(hits.get(), 0);
        assert_eq!(d.notifications(), 0);
    }

    #[test]
    fn restart_keeps_a_single_timer() {
        let timers = Timers::lab(&LabClock::new());
        let d = Debouncer::new(DebounceConfig::trailing(ms(10)), &timers);
        for i in 0..5 {
            d.offer(i, || -1);
        }
        assert_eq!(timers.pending(), 1);
    }

    #[test]
    fn leading_notifies_then_suppresses_until_elapsed() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let d = Debouncer::new(DebounceConfig::leading(ms(100)), &timers);

        assert!(d.offer(2, || 1));
        assert!(!d.offer(1, || 2));
        assert!(!d.offer(5, || 1));
        clock.advance(ms(100));
        timers.fire_due();
        assert!(!d.is_pending());
        assert_eq!(d.notifications(), 1);

        assert!(d.offer(6, || 5));
        assert_eq!(d.notifications(), 2);
    }

    #[test]
    fn leading_ignores_change_equal_to_delivered() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let d = Debouncer::new(DebounceConfig::leading(ms(10)), &timers);
        assert!(d.offer(2, || 1));
        clock.advance(ms(10));
        timers.fire_due();
        assert!(!d.offer(2, || 3));
        assert!(!d.is_pending());
    }

    #[test]
    fn cancel_and_drop_release_the_timer() {
        let timers = Timers::lab(&LabClock::new());
        let d = Debouncer::new(DebounceConfig::trailing(ms(10)), &timers);
        d.offer(1, || 0);
        assert!(d.cancel());
        assert_eq!(timers.pending(), 0);

        d.offer(2, || 0);
        assert_eq!(timers.pending(), 1);
        drop(d);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn custom_equality() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let d = Debouncer::with_equality(
            DebounceConfig::trailing(ms(10)),
            &timers,
            |a: &f64, b: &f64| (a - b).abs() < 0.5,
        );
        let hits = Rc::new(Cell::new(0));
        d.bind(&counting_waker(&hits));
        d.offer(1.2, || 1.0);
        clock.advance(ms(10));
        timers.fire_due();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn rebinding_same_key_replaces_waker() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let d = Debouncer::new(DebounceConfig::trailing(ms(10)), &timers);
        let hits = Rc::new(Cell::new(0));
        d.bind(&counting_waker(&hits));
        d.bind(&counting_waker(&hits));
        d.offer(1, || 0);
        clock.advance(ms(10));
        timers.fire_due();
        assert_eq!(hits.get(), 1);
    }

    fn leading_dependency(timers: &Timers) -> crate::dependency::Dependency<u32> {
        Aspect::new(|v: &u32| *v)
            .debounce(DebounceConfig::leading(ms(100)), timers)
            .dependency()
    }

    #[test]
    fn rebuilt_inline_leading_keeps_the_open_window() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let first = leading_dependency(&timers);
        assert!(first.should_notify(&1, &0));

        let second = leading_dependency(&timers);
        second.adopt_from(&first);
        drop(first);
        assert_eq!(timers.pending(), 1);
        assert!(!second.should_notify(&2, &1));
        assert!(!second.should_notify(&3, &2));

        clock.advance(ms(100));
        timers.fire_due();
        let third = leading_dependency(&timers);
        third.adopt_from(&second);
        assert!(third.should_notify(&4, &3));
    }

    #[test]
    fn adoption_requires_matching_config() {
        let timers = Timers::lab(&LabClock::new());
        let first = leading_dependency(&timers);
        assert!(first.should_notify(&1, &0));
        let wider = Aspect::new(|v: &u32| *v)
            .debounce(DebounceConfig::leading(ms(500)), &timers)
            .dependency();
        wider.adopt_from(&first);
        assert!(wider.should_notify(&2, &1));
    }

    #[test]
    fn adoption_reaches_through_gates_and_unions() {
        let timers = Timers::lab(&LabClock::new());
        let gated = |timers: &Timers| {
            Aspect::new(|v: &u32| *v)
                .debounce(DebounceConfig::leading(ms(100)), timers)
                .when_changed(|new, _| *new > 0)
        };
        let first = Aspect::some([gated(&timers).dependency()]).dependency();
        assert!(first.should_notify(&1, &0));
        let second = Aspect::some([gated(&timers).dependency()]).dependency();
        second.adopt_from(&first);
        assert!(!second.should_notify(&2, &1));
    }

    #[test]
    fn retained_debouncers_never_adopt() {
        let timers = Timers::lab(&LabClock::new());
        let shared = Debouncer::new(DebounceConfig::leading(ms(100)), &timers);
        let own = Debouncer::new(DebounceConfig::leading(ms(100)), &timers);
        let first = Aspect::new(|v: &u32| *v).debounce_with(&shared).dependency();
        let second = Aspect::new(|v: &u32| *v).debounce_with(&own).dependency();
        assert!(first.should_notify(&1, &0));
        second.adopt_from(&first);
        assert!(!own.is_pending());
        assert!(second.should_notify(&2, &1));
        assert_eq!(shared.notifications(), 1);
        assert_eq!(own.notifications(), 1);
    }

    #[test]
    fn dead_wakers_are_pruned_on_delivery() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let d = Debouncer::new(DebounceConfig::trailing(ms(10)), &timers);
        let hits = Rc::new(Cell::new(0));
        d.bind(&counting_waker(&hits));
        d.bind(&Waker::new((0, 1), || false));
        assert_eq!(d.bound(), 2);

        d.offer(1, || 0);
        clock.advance(ms(10));
        timers.fire_due();
        assert_eq!(hits.get(), 1);
        assert_eq!(d.bound(), 1);
    }

    #[test]
    fn leading_keeps_no_wakers() {
        let timers = Timers::lab(&LabClock::new());
        let d = Debouncer::<u32>::new(DebounceConfig::leading(ms(10)), &timers);
        d.bind(&Waker::new((0, 0), || true));
        assert_eq!(d.bound(), 0);
    }

    #[test]
    fn unbounded_window_suppresses_without_panicking() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let trailing = Aspect::new(|v: &u32| *v)
            .debounce(DebounceConfig::trailing(Duration::MAX), &timers);
        assert!(!trailing.should_notify(&1, &0));
        let leading = Aspect::new(|v: &u32| *v)
            .debounce(DebounceConfig::leading(Duration::MAX), &timers);
        assert!(leading.should_notify(&1, &0));
        assert!(!leading.should_notify(&2, &1));
        clock.advance(ms(1_000));
        assert_eq!(timers.fire_due(), 0);
    }

    #[cfg(feature = "tracing")]
    mod trace_capture {
        use super::*;
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

        #[derive(Default)]
        struct DebounceCapture {
            messages: Arc<Mutex<Vec<String>>>,
        }

        impl<S: tracing::Subscriber> Layer<S> for DebounceCapture {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                struct Msg(Option<String>);
                impl tracing::field::Visit for Msg {
                    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                        if field.name() == "message" {
                            self.0 = Some(value.to_string());
                        }
                    }

                    fn record_debug(
                        &mut self,
                        field: &tracing::field::Field,
                        value: &dyn std::fmt::Debug,
                    ) {
                        if field.name() == "message" {
                            self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
                        }
                    }
                }
                let mut msg = Msg(None);
                event.record(&mut msg);
                if let Some(message) = msg.0.filter(|m| m.starts_with("debounce.")) {
                    self.messages.lock().expect("capture lock").push(message);
                }
            }
        }

        #[test]
        fn deliveries_emit_debounce_events() {
            let capture = DebounceCapture::default();
            let messages = Arc::clone(&capture.messages);
            let subscriber = tracing_subscriber::registry().with(capture);
            let _guard = tracing::subscriber::set_default(subscriber);

            let clock = LabClock::new();
            let timers = Timers::lab(&clock);
            let leading = Debouncer::new(DebounceConfig::leading(ms(10)), &timers);
            assert!(leading.offer(1, || 0));
            let trailing = Debouncer::new(DebounceConfig::trailing(ms(10)), &timers);
            trailing.offer(1, || 0);
            clock.advance(ms(10));
            timers.fire_due();

            assert_eq!(
                messages.lock().expect("capture lock").as_slice(),
                ["debounce.leading", "debounce.trailing"]
            );
        }
    }
}
