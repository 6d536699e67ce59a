#![forbid(unsafe_code)]

//! Projections and the composition algebra.
//!
//! An [`Aspect<V, A>`] reads a derived value `A` out of a scope value `V` and
//! owns the decision whether a replacement of `V` concerns its observer.
//! Combinators consume an aspect and return a new one; nothing is mutated in
//! place, so a registered aspect never changes behind an observer's back.
//!
//! # Capabilities
//!
//! Capabilities are explicit and queried individually:
//!
//! | Capability | Query                 | Attached by                          |
//! |------------|-----------------------|--------------------------------------|
//! | fallback   | [`Aspect::has_default`]| `with_default*`, survives `map`     |
//! | patch      | [`Aspect::is_patchable`]| `with_patch`, dropped by `map`     |
//! | identity   | [`Aspect::token`]     | `with_token`, kept by every combinator|
//!
//! # Invariants
//!
//! 1. Two aspects are the same dependency iff their tokens match or they
//!    share a key. Clones share the key; combinators mint a new one.
//! 2. `map` compares its own output, never the wrapped aspect's.
//! 3. `some` notifies iff any member would, evaluating members in order and
//!    stopping at the first `true`.
//! 4. An aspect without a patch rejects writes with [`AspectError::ReadOnly`].

use std::any::type_name;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ambient::{Ambient, Fallback};
use crate::debounce::{DebounceConfig, Debounced, Debouncer};
use crate::decide::{Always, Carried, Decide, Waker};
use crate::dependency::Dependency;
use crate::diagnostics::{AspectKind, Debuggable, Diagnostics, short_type_name};
use crate::error::{AspectError, Result};
use crate::signal::Signal;
use crate::strategy::{MultiFn, Strategy};
use crate::timer::Timers;
use crate::token::{AspectKey, IdentityToken, same_identity};

type ReadFn<V, A> = Rc<dyn Fn(&V) -> A>;
type PatchFn<V, A> = Rc<dyn Fn(&V, A) -> V>;
type Predicate<A> = Rc<dyn Fn(&A, &A) -> bool>;

/// A pure projection of a scope value plus its notification decision.
pub struct Aspect<V, A> {
    read: ReadFn<V, A>,
    decide: Rc<dyn Decide<V>>,
    key: AspectKey,
    token: Option<IdentityToken>,
    label: Option<Cow<'static, str>>,
    kind: AspectKind,
    fallback: Option<Fallback<A>>,
    patch: Option<PatchFn<V, A>>,
}

impl<V, A> Clone for Aspect<V, A> {
    fn clone(&self) -> Self {
        Self {
            read: Rc::clone(&self.read),
            decide: Rc::clone(&self.decide),
            key: self.key,
            token: self.token.clone(),
            label: self.label.clone(),
            kind: self.kind,
            fallback: self.fallback.clone(),
            patch: self.patch.clone(),
        }
    }
}

impl<V, A> PartialEq for Aspect<V, A> {
    fn eq(&self, other: &Self) -> bool {
        same_identity(
            self.key,
            self.token.as_ref(),
            other.key,
            other.token.as_ref(),
        )
    }
}

impl<V, A> fmt::Debug for Aspect<V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aspect")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("token", &self.token)
            .field("fallback", &self.fallback.is_some())
            .field("patch", &self.patch.is_some())
            .finish()
    }
}

/// Plain inequality of the derived value.
struct Distinct<V, A> {
    read: ReadFn<V, A>,
}

impl<V, A: PartialEq> Decide<V> for Distinct<V, A> {
    fn should_notify(&self, new: &V, old: &V) -> bool {
        (self.read)(new) != (self.read)(old)
    }
}

/// Predicate gate, optionally AND-ed with the wrapped decision.
struct Gate<V, A> {
    read: ReadFn<V, A>,
    base: Option<Rc<dyn Decide<V>>>,
    pred: Predicate<A>,
}

impl<V, A> Decide<V> for Gate<V, A> {
    fn should_notify(&self, new: &V, old: &V) -> bool {
        if let Some(base) = &self.base
            && !base.should_notify(new, old)
        {
            return false;
        }
        (self.pred)(&(self.read)(new), &(self.read)(old))
    }

    fn bind_waker(&self, waker: &Waker) {
        if let Some(base) = &self.base {
            base.bind_waker(waker);
        }
    }

    fn carry(&self, out: &mut Vec<Carried>) {
        if let Some(base) = &self.base {
            base.carry(out);
        }
    }

    fn adopt(&self, carried: &mut dyn Iterator<Item = Carried>) {
        if let Some(base) = &self.base {
            base.adopt(carried);
        }
    }
}

struct Union<V> {
    members: Vec<Dependency<V>>,
}

impl<V> Decide<V> for Union<V> {
    fn should_notify(&self, new: &V, old: &V) -> bool {
        self.members.iter().any(|m| m.should_notify(new, old))
    }

    fn bind_waker(&self, waker: &Waker) {
        for member in &self.members {
            member.bind_waker(waker);
        }
    }

    fn carry(&self, out: &mut Vec<Carried>) {
        for member in &self.members {
            member.carry(out);
        }
    }

    fn adopt(&self, carried: &mut dyn Iterator<Item = Carried>) {
        for member in &self.members {
            member.adopt(carried);
        }
    }
}

// ── Constructors ────────────────────────────────────────────────────────

impl<V: 'static, A: PartialEq + 'static> Aspect<V, A> {
    /// Single-value projection: notifies iff `extract(new) != extract(old)`.
    pub fn new(extract: impl Fn(&V) -> A + 'static) -> Self {
        let read: ReadFn<V, A> = Rc::new(extract);
        let decide = Rc::new(Distinct {
            read: Rc::clone(&read),
        });
        Self::from_parts(read, decide, AspectKind::Single)
    }
}

impl<V: 'static, E: PartialEq + 'static> Aspect<V, Signal<E>> {
    /// Single-position projection that may yield a sentinel.
    pub fn signal(extract: impl Fn(&V) -> Signal<E> + 'static) -> Self {
        let read: ReadFn<V, Signal<E>> = Rc::new(extract);
        let strategy = Strategy::Single(Rc::clone(&read));
        Self::from_parts(read, Rc::new(strategy), AspectKind::Single)
    }
}

impl<V: 'static, E: PartialEq + 'static> Aspect<V, Vec<Signal<E>>> {
    /// Projection over an explicit strategy. Reads materialize the sequence.
    pub fn from_strategy(strategy: Strategy<V, E>) -> Self {
        let kind = match &strategy {
            Strategy::Single(_) => AspectKind::Single,
            Strategy::Multi(_) => AspectKind::Multi,
            Strategy::Indexed(_) => AspectKind::Indexed,
            Strategy::LengthIndexed { .. } => AspectKind::LengthIndexed,
        };
        let extractor = strategy.clone();
        let read: ReadFn<V, Vec<Signal<E>>> = Rc::new(move |v: &V| extractor.extract(v));
        Self::from_parts(read, Rc::new(strategy), kind)
    }

    /// Lazy sequence, compared pairwise with a length check while zipping.
    pub fn multi<I>(extract: impl Fn(&V) -> I + 'static) -> Self
    where
        I: IntoIterator<Item = Signal<E>>,
        I::IntoIter: 'static,
    {
        let f: MultiFn<V, E> = Rc::new(
            move |v: &V| -> Box<dyn Iterator<Item = Signal<E>>> { Box::new(extract(v).into_iter()) },
        );
        Self::from_strategy(Strategy::Multi(f))
    }

    /// Engine-driven positions: `at(v, i)` is called for `i = 0, 1, ..`
    /// until both sides return `None`.
    pub fn indexed(at: impl Fn(&V, usize) -> Option<Signal<E>> + 'static) -> Self {
        Self::from_strategy(Strategy::Indexed(Rc::new(at)))
    }

    /// Length-bearing sequence. A length mismatch notifies without reading
    /// any element, so `len` should be O(1).
    pub fn length_indexed(
        len: impl Fn(&V) -> usize + 'static,
        at: impl Fn(&V, usize) -> Signal<E> + 'static,
    ) -> Self {
        Self::from_strategy(Strategy::LengthIndexed {
            len: Rc::new(len),
            at: Rc::new(at),
        })
    }
}

impl<V: Clone + 'static> Aspect<V, V> {
    /// The whole value, notifying on every distinct replacement.
    ///
    /// Equal (as a dependency) to [`Dependency::unconditional`].
    #[must_use]
    pub fn whole() -> Self {
        let mut aspect = Self::from_parts(
            Rc::new(|v: &V| v.clone()),
            Rc::new(Always),
            AspectKind::Unconditional,
        );
        aspect.key = AspectKey::UNCONDITIONAL;
        aspect
    }

    /// Union of several dependencies on the same scope.
    ///
    /// Members may project different derived types. The union reads the
    /// whole value and is read-only until a patch is attached. An empty
    /// union never notifies.
    pub fn some(members: impl IntoIterator<Item = Dependency<V>>) -> Self {
        let members = members.into_iter().collect();
        Self::from_parts(
            Rc::new(|v: &V| v.clone()),
            Rc::new(Union { members }),
            AspectKind::Union,
        )
    }
}

// ── Accessors and combinators ───────────────────────────────────────────

impl<V: 'static, A: 'static> Aspect<V, A> {
    fn from_parts(read: ReadFn<V, A>, decide: Rc<dyn Decide<V>>, kind: AspectKind) -> Self {
        Self {
            read,
            decide,
            key: AspectKey::next(),
            token: None,
            label: None,
            kind,
            fallback: None,
            patch: None,
        }
    }

    /// Arbitrary decision over the whole value, reading with `extract`.
    pub fn custom(
        extract: impl Fn(&V) -> A + 'static,
        decide: impl Decide<V> + 'static,
    ) -> Self {
        Self::from_parts(Rc::new(extract), Rc::new(decide), AspectKind::Single)
    }

    /// Extract the derived value.
    pub fn read(&self, value: &V) -> A {
        (self.read)(value)
    }

    /// Whether `old -> new` concerns this projection.
    #[must_use]
    pub fn should_notify(&self, new: &V, old: &V) -> bool {
        self.decide.should_notify(new, old)
    }

    #[must_use]
    pub fn key(&self) -> AspectKey {
        self.key
    }

    #[must_use]
    pub fn token(&self) -> Option<&IdentityToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn kind(&self) -> AspectKind {
        self.kind
    }

    /// Explicit label, or `Kind<Target>`.
    #[must_use]
    pub fn label(&self) -> Cow<'static, str> {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}<{}>", self.kind, short_type_name(type_name::<V>())).into(),
        }
    }

    #[must_use]
    pub fn has_default(&self) -> bool {
        self.fallback.is_some()
    }

    /// Resolve the fallback against the scopes visible at the lookup
    /// position. `None` when there is no fallback or it cannot resolve.
    #[must_use]
    pub fn resolve_default(&self, ambient: &dyn Ambient) -> Option<A> {
        self.fallback.as_ref()?.resolve(ambient)
    }

    #[must_use]
    pub fn is_patchable(&self) -> bool {
        self.patch.is_some()
    }

    /// Fold `value` back into `old` through the attached patch.
    ///
    /// # Errors
    ///
    /// [`AspectError::ReadOnly`] when no patch is attached.
    pub fn patch(&self, old: &V, value: A) -> Result<V> {
        match &self.patch {
            Some(patch) => Ok(patch(old, value)),
            None => Err(AspectError::ReadOnly {
                aspect: self.label().into_owned(),
                scope: short_type_name(type_name::<V>()),
            }),
        }
    }

    /// Type-erased view for dependency sets and unions.
    #[must_use]
    pub fn dependency(&self) -> Dependency<V> {
        Dependency::from_parts(
            Rc::clone(&self.decide),
            self.key,
            self.token.clone(),
            self.diagnostics(),
        )
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<IdentityToken>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Fallback derived from another scope of type `S`.
    #[must_use]
    pub fn with_default_for<S: 'static>(mut self, f: impl Fn(&S) -> A + 'static) -> Self {
        self.fallback = Some(Fallback::from_scope(f));
        self
    }

    /// Fallback computed from the ambient scopes.
    #[must_use]
    pub fn with_default_with(
        mut self,
        f: impl Fn(&dyn Ambient) -> Option<A> + 'static,
    ) -> Self {
        self.fallback = Some(Fallback::with(f));
        self
    }

    /// Attach a write-back `(old source, new derived) -> new source`.
    #[must_use]
    pub fn with_patch(mut self, patch: impl Fn(&V, A) -> V + 'static) -> Self {
        self.patch = Some(Rc::new(patch));
        self
    }

    /// Drop the patch, if any.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.patch = None;
        self
    }

    /// Transform the derived value. Equality is decided on `f`'s output.
    ///
    /// The token and the fallback carry over (the fallback goes through `f`);
    /// the patch does not.
    #[must_use]
    pub fn map<B: PartialEq + 'static>(self, f: impl Fn(A) -> B + 'static) -> Aspect<V, B> {
        let f: Rc<dyn Fn(A) -> B> = Rc::new(f);
        let read = Rc::clone(&self.read);
        let g = Rc::clone(&f);
        let mapped: ReadFn<V, B> = Rc::new(move |v: &V| g(read(v)));
        Aspect {
            decide: Rc::new(Distinct {
                read: Rc::clone(&mapped),
            }),
            read: mapped,
            key: AspectKey::next(),
            token: self.token,
            label: None,
            kind: AspectKind::Mapped,
            fallback: self.fallback.map(|fallback| fallback.map(f)),
            patch: None,
        }
    }

    /// Notify iff `pred(new, old)` holds for the derived values. The wrapped
    /// decision is not consulted.
    #[must_use]
    pub fn when(self, pred: impl Fn(&A, &A) -> bool + 'static) -> Self {
        self.gate(None, Rc::new(pred))
    }

    /// Notify iff the wrapped decision notifies and `pred(new, old)` holds.
    #[must_use]
    pub fn when_changed(self, pred: impl Fn(&A, &A) -> bool + 'static) -> Self {
        let base = Some(Rc::clone(&self.decide));
        self.gate(base, Rc::new(pred))
    }

    fn gate(self, base: Option<Rc<dyn Decide<V>>>, pred: Predicate<A>) -> Self {
        let decide: Rc<dyn Decide<V>> = Rc::new(Gate {
            read: Rc::clone(&self.read),
            base,
            pred,
        });
        Self {
            decide,
            key: AspectKey::next(),
            label: None,
            kind: AspectKind::Gated,
            ..self
        }
    }
}

impl<V: 'static, A: Clone + 'static> Aspect<V, A> {
    /// Fixed fallback.
    #[must_use]
    pub fn with_default(mut self, value: A) -> Self {
        self.fallback = Some(Fallback::value(value));
        self
    }

    /// Debounce through a debouncer the caller keeps (retained form).
    ///
    /// Every aspect built over the same debouncer shares its window, wherever
    /// it is registered.
    #[must_use]
    pub fn debounce_with(self, debouncer: &Debouncer<A>) -> Self {
        self.debounced(debouncer.clone(), false)
    }

    /// Debounce with a debouncer owned by this aspect (inline form).
    ///
    /// The timer lives as long as the aspect or its registered dependency.
    /// Rebuilding the aspect on every build is fine: a scope replacing the
    /// observer's registration hands the open window to the new one.
    #[must_use]
    pub fn debounce(self, config: DebounceConfig, timers: &Timers) -> Self
    where
        A: PartialEq,
    {
        self.debounced(Debouncer::new(config, timers), true)
    }

    fn debounced(self, debouncer: Debouncer<A>, inline: bool) -> Self {
        let decide: Rc<dyn Decide<V>> = Rc::new(Debounced {
            read: Rc::clone(&self.read),
            base: Rc::clone(&self.decide),
            debouncer: RefCell::new(debouncer),
            inline,
        });
        Self {
            decide,
            key: AspectKey::next(),
            label: None,
            kind: AspectKind::Debounced,
            ..self
        }
    }
}

impl<V: 'static, A: 'static> Debuggable for Aspect<V, A> {
    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            label: self.label(),
            token: self.token.clone(),
            kind: self.kind,
            target: type_name::<V>(),
            value: type_name::<A>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambient::NoAmbient;
    use crate::timer::LabClock;
    use std::any::{Any, TypeId};
    use std::cell::Cell;
    use web_time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        count: u32,
        name: &'static str,
        tags: Vec<&'static str>,
    }

    fn counter(count: u32, name: &'static str) -> Counter {
        Counter {
            count,
            name,
            tags: Vec::new(),
        }
    }

    #[test]
    fn single_notifies_on_derived_change_only() {
        let count = Aspect::new(|c: &Counter| c.count);
        assert!(count.should_notify(&counter(2, "a"), &counter(1, "a")));
        assert!(!count.should_notify(&counter(1, "b"), &counter(1, "a")));
        assert_eq!(count.read(&counter(7, "a")), 7);
    }

    #[test]
    fn clones_share_identity_but_fresh_aspects_do_not() {
        let a = Aspect::new(|c: &Counter| c.count);
        let b = Aspect::new(|c: &Counter| c.count);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let a = a.with_token("count");
        let b = b.with_token("count");
        assert_eq!(a, b);
        assert_eq!(a.dependency(), b.dependency());
    }

    #[test]
    fn signal_skip_suppresses() {
        let name = Aspect::signal(|c: &Counter| {
            if c.name.is_empty() {
                Signal::Skip
            } else {
                Signal::Value(c.name)
            }
        });
        assert!(!name.should_notify(&counter(0, ""), &counter(0, "a")));
        assert!(name.should_notify(&counter(0, "b"), &counter(0, "a")));
    }

    #[test]
    fn multi_reads_materialize_sequence() {
        let tags = Aspect::multi(|c: &Counter| {
            c.tags
                .clone()
                .into_iter()
                .map(Signal::Value)
                .collect::<Vec<_>>()
        });
        let mut a = counter(0, "a");
        a.tags = vec!["x", "y"];
        let mut b = a.clone();
        assert_eq!(tags.read(&a), vec![Signal::Value("x"), Signal::Value("y")]);
        b.tags.push("z");
        assert!(tags.should_notify(&b, &a));
        assert_eq!(tags.kind(), AspectKind::Multi);
    }

    #[test]
    fn length_indexed_kind_and_decision() {
        let tags = Aspect::length_indexed(
            |c: &Counter| c.tags.len(),
            |c: &Counter, i| Signal::Value(c.tags[i]),
        );
        let mut a = counter(0, "a");
        a.tags = vec!["x"];
        let mut b = a.clone();
        b.tags = vec!["y"];
        assert!(tags.should_notify(&b, &a));
        assert_eq!(tags.kind(), AspectKind::LengthIndexed);
    }

    #[test]
    fn indexed_aspect() {
        let tags = Aspect::indexed(|c: &Counter, i| c.tags.get(i).copied().map(Signal::Value));
        let mut a = counter(0, "a");
        a.tags = vec!["x"];
        let b = a.clone();
        assert!(!tags.should_notify(&b, &a));
        assert_eq!(tags.kind(), AspectKind::Indexed);
    }

    #[test]
    fn whole_equals_unconditional_dependency() {
        let whole = Aspect::<Counter, Counter>::whole();
        assert_eq!(whole.dependency(), Dependency::unconditional());
        assert!(whole.should_notify(&counter(1, "a"), &counter(1, "b")));
    }

    #[test]
    fn union_short_circuits_in_order() {
        let evaluated = Rc::new(Cell::new(0));
        let seen = Rc::clone(&evaluated);
        let count = Aspect::new(|c: &Counter| c.count);
        let name = Aspect::new(move |c: &Counter| {
            seen.set(seen.get() + 1);
            c.name
        });
        let union = Aspect::some([count.dependency(), name.dependency()]);

        assert!(union.should_notify(&counter(2, "a"), &counter(1, "a")));
        assert_eq!(evaluated.get(), 0);

        assert!(union.should_notify(&counter(1, "b"), &counter(1, "a")));
        assert!(!union.should_notify(&counter(1, "a"), &counter(1, "a")));
        assert_eq!(union.kind(), AspectKind::Union);
    }

    #[test]
    fn union_is_read_only() {
        let union = Aspect::some([Aspect::new(|c: &Counter| c.count).dependency()]);
        let err = union
            .patch(&counter(1, "a"), counter(2, "a"))
            .expect_err("union has no patch");
        assert_eq!(
            err.to_string(),
            "Union<Counter> is read-only and cannot drive an update of Counter"
        );
    }

    #[test]
    fn map_compares_mapped_output() {
        let parity = Aspect::new(|c: &Counter| c.count).map(|n| n % 2 == 0);
        assert!(!parity.should_notify(&counter(4, "a"), &counter(2, "a")));
        assert!(parity.should_notify(&counter(3, "a"), &counter(2, "a")));
        assert_eq!(parity.kind(), AspectKind::Mapped);
    }

    #[test]
    fn map_keeps_token_and_fallback_drops_patch() {
        let count = Aspect::new(|c: &Counter| c.count)
            .with_token("count")
            .with_default(21)
            .with_patch(|c: &Counter, count| Counter {
                count,
                ..c.clone()
            });
        assert!(count.is_patchable());

        let doubled = count.clone().map(|n| n * 2);
        assert_eq!(doubled.token(), count.token());
        assert_ne!(doubled.key(), count.key());
        assert_eq!(doubled.resolve_default(&NoAmbient), Some(42));
        assert!(!doubled.is_patchable());
    }

    #[test]
    fn when_ignores_plain_equality() {
        let crossing = Aspect::new(|c: &Counter| c.count).when(|new, old| *new >= 10 && *old < 10);
        assert!(crossing.should_notify(&counter(10, "a"), &counter(9, "a")));
        assert!(!crossing.should_notify(&counter(11, "a"), &counter(10, "a")));
        assert_eq!(crossing.kind(), AspectKind::Gated);
    }

    #[test]
    fn when_changed_requires_both() {
        let name = Aspect::new(|c: &Counter| c.count).when_changed(|_, _| true);
        assert!(!name.should_notify(&counter(1, "b"), &counter(1, "a")));
        assert!(name.should_notify(&counter(2, "b"), &counter(1, "a")));
    }

    #[test]
    fn patch_writes_back() {
        let count = Aspect::new(|c: &Counter| c.count).with_patch(|c: &Counter, count| Counter {
            count,
            ..c.clone()
        });
        let next = count.patch(&counter(1, "a"), 5).expect("patchable");
        assert_eq!(next, counter(5, "a"));
        assert!(count.read_only().patch(&counter(1, "a"), 5).is_err());
    }

    #[test]
    fn scope_fallback_reads_ambient() {
        struct Theme(Rc<dyn Any>);
        impl Ambient for Theme {
            fn lookup(
                &self,
                type_id: TypeId,
                _token: Option<&IdentityToken>,
            ) -> Option<Rc<dyn Any>> {
                (type_id == TypeId::of::<String>()).then(|| Rc::clone(&self.0))
            }
        }
        let name = Aspect::new(|c: &Counter| c.name.len())
            .with_default_for(|theme: &String| theme.len());
        assert!(name.has_default());
        assert_eq!(
            name.resolve_default(&Theme(Rc::new(String::from("dark")))),
            Some(4)
        );
        assert_eq!(name.resolve_default(&NoAmbient), None);
    }

    #[test]
    fn inline_debounce_wakes_bound_observer() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let count = Aspect::new(|c: &Counter| c.count)
            .debounce(DebounceConfig::trailing(Duration::from_millis(50)), &timers);
        let dep = count.dependency();
        let woken = Rc::new(Cell::new(0));
        let w = Rc::clone(&woken);
        dep.bind_waker(&Waker::new((1, 1), move || {
            w.set(w.get() + 1);
            true
        }));

        assert!(!dep.should_notify(&counter(2, "a"), &counter(1, "a")));
        assert!(!dep.should_notify(&counter(3, "a"), &counter(2, "a")));
        clock.advance(Duration::from_millis(50));
        timers.fire_due();
        assert_eq!(woken.get(), 1);
    }

    #[test]
    fn debounce_consults_base_first() {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        let count = Aspect::new(|c: &Counter| c.count)
            .debounce(DebounceConfig::leading(Duration::from_millis(50)), &timers);
        assert!(!count.should_notify(&counter(1, "b"), &counter(1, "a")));
        assert_eq!(timers.pending(), 0);
        assert!(count.should_notify(&counter(2, "a"), &counter(1, "a")));
        assert_eq!(timers.pending(), 1);
    }

    #[test]
    fn diagnostics_report_kind_and_types() {
        let count = Aspect::new(|c: &Counter| c.count).with_token("count");
        let d = count.diagnostics();
        assert_eq!(d.label, "Single<Counter>");
        assert_eq!(d.kind, AspectKind::Single);
        assert_eq!(d.value, "u32");
        assert!(d.target.ends_with("Counter"));
        assert_eq!(d.token, Some(IdentityToken::named("count")));

        let labelled = count.with_label("count");
        assert_eq!(labelled.label(), "count");
        assert_eq!(labelled.dependency().label(), "count");
    }
}
