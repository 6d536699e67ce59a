//! Property-based invariant tests for notification decisions.
//!
//! 1. Reads are idempotent.
//! 2. Single-value decisions are exactly "derived values differ".
//! 3. `some` notifies iff any member notifies.
//! 4. Length-indexed decisions on different lengths read no element.
//! 5. `Force` anywhere notifies; all-`Skip` sequences never notify.
//! 6. Multi, indexed, and length-indexed strategies agree.
//! 7. `map` decides on the mapped output.
//! 8. Identical sequences never notify unless they contain `Force`.

use std::cell::Cell;
use std::rc::Rc;

use aspect_core::{Aspect, Signal};
use proptest::prelude::*;

type Seq = Vec<Signal<i8>>;

// ── Strategies ──────────────────────────────────────────────────────────

fn signal_strategy() -> impl Strategy<Value = Signal<i8>> {
    prop_oneof![
        6 => (-4i8..4).prop_map(Signal::Value),
        1 => Just(Signal::Skip),
        1 => Just(Signal::Absent),
        1 => Just(Signal::Force),
    ]
}

fn plain_signal_strategy() -> impl Strategy<Value = Signal<i8>> {
    prop_oneof![
        4 => (-4i8..4).prop_map(Signal::Value),
        1 => Just(Signal::Absent),
    ]
}

fn seq_strategy() -> impl Strategy<Value = Seq> {
    proptest::collection::vec(signal_strategy(), 0..8)
}

fn plain_seq_strategy() -> impl Strategy<Value = Seq> {
    proptest::collection::vec(plain_signal_strategy(), 0..8)
}

fn multi() -> Aspect<Seq, Seq> {
    Aspect::multi(|v: &Seq| v.clone())
}

fn indexed() -> Aspect<Seq, Seq> {
    Aspect::indexed(|v: &Seq, i| v.get(i).copied())
}

fn length_indexed() -> Aspect<Seq, Seq> {
    Aspect::length_indexed(|v: &Seq| v.len(), |v: &Seq, i| v[i])
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Idempotent read
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reads_are_idempotent(v in seq_strategy()) {
        for aspect in [multi(), indexed(), length_indexed()] {
            prop_assert_eq!(aspect.read(&v), aspect.read(&v));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Equality-gated notification
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn single_decision_is_inequality(a in (any::<i16>(), any::<u8>()), b in (any::<i16>(), any::<u8>())) {
        let first = Aspect::new(|v: &(i16, u8)| v.0);
        prop_assert_eq!(first.should_notify(&a, &b), a.0 != b.0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Union semantics
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn union_is_disjunction(a in (any::<i8>(), any::<bool>()), b in (any::<i8>(), any::<bool>())) {
        let p1 = Aspect::new(|v: &(i8, bool)| v.0);
        let p2 = Aspect::new(|v: &(i8, bool)| v.1);
        let union = Aspect::some([p1.dependency(), p2.dependency()]);
        prop_assert_eq!(
            union.should_notify(&a, &b),
            p1.should_notify(&a, &b) || p2.should_notify(&a, &b)
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Length-mismatch fast path
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn length_mismatch_reads_no_element(a in seq_strategy(), b in seq_strategy()) {
        prop_assume!(a.len() != b.len());
        let reads = Rc::new(Cell::new(0usize));
        let r = Rc::clone(&reads);
        let aspect = Aspect::length_indexed(|v: &Seq| v.len(), move |v: &Seq, i| {
            r.set(r.get() + 1);
            v[i]
        });
        prop_assert!(aspect.should_notify(&a, &b));
        prop_assert_eq!(reads.get(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Sentinels
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn force_always_notifies(a in seq_strategy(), pos in 0usize..8) {
        let pos = pos.min(a.len());
        let mut forced = a.clone();
        let mut plain = a;
        forced.insert(pos, Signal::Force);
        plain.insert(pos, Signal::Value(0));
        for aspect in [multi(), indexed(), length_indexed()] {
            prop_assert!(aspect.should_notify(&forced, &plain));
        }
    }

    #[test]
    fn all_skip_never_notifies(len in 0usize..8, other in seq_strategy()) {
        let skips: Seq = vec![Signal::Skip; len];
        let other: Seq = other
            .into_iter()
            .filter(|s| *s != Signal::Force)
            .chain(std::iter::repeat(Signal::Value(1)))
            .take(len)
            .collect();
        prop_assert!(!multi().should_notify(&skips, &other));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Strategy agreement
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn strategies_agree(a in seq_strategy(), b in seq_strategy()) {
        let m = multi().should_notify(&a, &b);
        prop_assert_eq!(indexed().should_notify(&a, &b), m);
        prop_assert_eq!(length_indexed().should_notify(&a, &b), m);
    }

    #[test]
    fn plain_sequences_notify_iff_unequal(a in plain_seq_strategy(), b in plain_seq_strategy()) {
        prop_assert_eq!(multi().should_notify(&a, &b), a != b);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Map decides on mapped output
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn map_is_inequality_of_mapped(a in any::<i32>(), b in any::<i32>()) {
        let sign = Aspect::new(|v: &i32| *v).map(i32::signum);
        prop_assert_eq!(sign.should_notify(&a, &b), a.signum() != b.signum());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Identical inputs
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn identical_sequences_only_notify_on_force(a in seq_strategy()) {
        let forced = a.contains(&Signal::Force);
        prop_assert_eq!(multi().should_notify(&a, &a.clone()), forced);
    }
}
