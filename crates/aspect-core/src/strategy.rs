#![forbid(unsafe_code)]

//! Extraction strategies.
//!
//! A [`Strategy`] is a closed set of ways to produce a sequence of
//! [`Signal`]s from a scope value. All variants share one comparison rule
//! ([`compare`]) and one exit rule: the first `Changed` or `Forced`
//! position settles the decision.
//!
//! | Variant         | Shape of the sequence                 | Length check                   |
//! |-----------------|---------------------------------------|--------------------------------|
//! | `Single`        | exactly one position                  | n/a                            |
//! | `Multi`         | lazy iterator                         | discovered while zipping       |
//! | `Indexed`       | engine-driven `at(v, i)` until `None` | discovered while indexing      |
//! | `LengthIndexed` | `len(v)` plus `at(v, i)`              | compared first, no element read|
//!
//! # Invariants
//!
//! 1. Sequences of different lengths always notify.
//! 2. `LengthIndexed` never calls `at` when the lengths differ.
//! 3. Elements are compared in ascending position order.

use std::fmt;
use std::rc::Rc;

use crate::decide::Decide;
use crate::signal::{Signal, Step, compare};

pub type SingleFn<V, E> = Rc<dyn Fn(&V) -> Signal<E>>;
pub type MultiFn<V, E> = Rc<dyn Fn(&V) -> Box<dyn Iterator<Item = Signal<E>>>>;
pub type IndexedFn<V, E> = Rc<dyn Fn(&V, usize) -> Option<Signal<E>>>;
pub type LenFn<V> = Rc<dyn Fn(&V) -> usize>;
pub type AtFn<V, E> = Rc<dyn Fn(&V, usize) -> Signal<E>>;

/// How a projection produces the signals it compares.
pub enum Strategy<V, E> {
    Single(SingleFn<V, E>),
    Multi(MultiFn<V, E>),
    Indexed(IndexedFn<V, E>),
    LengthIndexed { len: LenFn<V>, at: AtFn<V, E> },
}

impl<V, E> Clone for Strategy<V, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Single(f) => Self::Single(Rc::clone(f)),
            Self::Multi(f) => Self::Multi(Rc::clone(f)),
            Self::Indexed(f) => Self::Indexed(Rc::clone(f)),
            Self::LengthIndexed { len, at } => Self::LengthIndexed {
                len: Rc::clone(len),
                at: Rc::clone(at),
            },
        }
    }
}

impl<V, E> fmt::Debug for Strategy<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<V, E> Strategy<V, E> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Single(_) => "Single",
            Self::Multi(_) => "Multi",
            Self::Indexed(_) => "Indexed",
            Self::LengthIndexed { .. } => "LengthIndexed",
        }
    }

    /// Materialize the sequence for `value`.
    pub fn extract(&self, value: &V) -> Vec<Signal<E>> {
        match self {
            Self::Single(f) => vec![f(value)],
            Self::Multi(f) => f(value).collect(),
            Self::Indexed(at) => (0..).map_while(|i| at(value, i)).collect(),
            Self::LengthIndexed { len, at } => (0..len(value)).map(|i| at(value, i)).collect(),
        }
    }
}

impl<V, E: PartialEq> Strategy<V, E> {
    /// Run the comparison and report the settling step, if any.
    ///
    /// Returns `Step::Same` when no position settled the decision.
    pub fn outcome(&self, new: &V, old: &V) -> Step {
        match self {
            Self::Single(f) => match compare(&f(new), &f(old)) {
                Step::Ignored => Step::Same,
                step => step,
            },
            Self::Multi(f) => {
                let mut new_items = f(new);
                let mut old_items = f(old);
                loop {
                    match (new_items.next(), old_items.next()) {
                        (None, None) => return Step::Same,
                        (Some(a), Some(b)) => {
                            let step = compare(&a, &b);
                            if step.is_decisive() {
                                return step;
                            }
                        }
                        _ => return Step::Changed,
                    }
                }
            }
            Self::Indexed(at) => {
                for i in 0.. {
                    match (at(new, i), at(old, i)) {
                        (None, None) => return Step::Same,
                        (Some(a), Some(b)) => {
                            let step = compare(&a, &b);
                            if step.is_decisive() {
                                return step;
                            }
                        }
                        _ => return Step::Changed,
                    }
                }
                Step::Same
            }
            Self::LengthIndexed { len, at } => {
                let n = len(new);
                if n != len(old) {
                    return Step::Changed;
                }
                (0..n)
                    .map(|i| compare(&at(new, i), &at(old, i)))
                    .find(|step| step.is_decisive())
                    .unwrap_or(Step::Same)
            }
        }
    }
}

impl<V, E: PartialEq> Decide<V> for Strategy<V, E> {
    fn should_notify(&self, new: &V, old: &V) -> bool {
        self.outcome(new, old).is_decisive()
    }
}
