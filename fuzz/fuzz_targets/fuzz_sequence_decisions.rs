#![no_main]

use arbitrary::Arbitrary;
use aspect_core::{Aspect, Signal};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug, Clone, Copy, PartialEq)]
enum Slot {
    Value(i8),
    Skip,
    Absent,
    Force,
}

impl From<Slot> for Signal<i8> {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Value(v) => Signal::Value(v),
            Slot::Skip => Signal::Skip,
            Slot::Absent => Signal::Absent,
            Slot::Force => Signal::Force,
        }
    }
}

type Seq = Vec<Signal<i8>>;

fuzz_target!(|input: (Vec<Slot>, Vec<Slot>)| {
    let new: Seq = input.0.into_iter().take(64).map(Signal::from).collect();
    let old: Seq = input.1.into_iter().take(64).map(Signal::from).collect();

    let multi = Aspect::multi(|v: &Seq| v.clone());
    let indexed = Aspect::indexed(|v: &Seq, i| v.get(i).copied());
    let length_indexed = Aspect::length_indexed(|v: &Seq| v.len(), |v: &Seq, i| v[i]);

    let expected = multi.should_notify(&new, &old);
    assert_eq!(indexed.should_notify(&new, &old), expected);
    assert_eq!(length_indexed.should_notify(&new, &old), expected);
    if new.contains(&Signal::Force) || old.contains(&Signal::Force) {
        assert!(expected);
    }
    assert!(!multi.should_notify(&new, &new) || new.contains(&Signal::Force));
});
