#![no_main]

use arbitrary::Arbitrary;
use aspect_core::{Aspect, DebounceConfig, LabClock, Timers};
use aspect_runtime::{ObserverId, Scope};
use libfuzzer_sys::fuzz_target;
use web_time::Duration;

#[derive(Arbitrary, Debug)]
enum ScopeOp {
    Replace([u8; 4]),
    Watch { observer: u8, column: u8 },
    WatchDebounced { observer: u8, column: u8, window_ms: u8, leading: bool },
    Unconditional(u8),
    Remove(u8),
    Advance(u8),
    TakeDirty,
}

fn column(i: u8) -> Aspect<[u8; 4], u8> {
    let i = usize::from(i % 4);
    Aspect::new(move |v: &[u8; 4]| v[i])
}

fuzz_target!(|ops: Vec<ScopeOp>| {
    let clock = LabClock::new();
    let timers = Timers::lab(&clock);
    let scope = Scope::new([0u8; 4]);
    let mut version = 0;

    for op in ops.into_iter().take(512) {
        match op {
            ScopeOp::Replace(next) => {
                let changed = *scope.value() != next;
                let notified = scope.replace(next);
                if changed {
                    version += 1;
                } else {
                    assert!(notified.is_empty());
                }
                let dependents = scope.dependents();
                assert!(notified.iter().all(|id| dependents.contains(id)));
            }
            ScopeOp::Watch { observer, column: c } => {
                scope.add_dependency(ObserverId::new(u64::from(observer)), column(c).dependency());
            }
            ScopeOp::WatchDebounced {
                observer,
                column: c,
                window_ms,
                leading,
            } => {
                let config = DebounceConfig::trailing(Duration::from_millis(u64::from(window_ms)))
                    .with_leading(leading);
                let aspect = column(c).debounce(config, &timers);
                scope.add_dependency(ObserverId::new(u64::from(observer)), aspect.dependency());
            }
            ScopeOp::Unconditional(observer) => {
                scope.set_unconditional(ObserverId::new(u64::from(observer)));
            }
            ScopeOp::Remove(observer) => {
                let id = ObserverId::new(u64::from(observer));
                scope.remove_observer(id);
                assert!(!scope.is_dependent(id));
            }
            ScopeOp::Advance(ms) => {
                clock.advance(Duration::from_millis(u64::from(ms)));
                timers.fire_due();
            }
            ScopeOp::TakeDirty => {
                let dirty = scope.take_dirty();
                let mut unique = dirty.clone();
                unique.sort_by_key(|id| id.raw());
                unique.dedup();
                assert_eq!(unique.len(), dirty.len());
            }
        }
        assert_eq!(scope.version(), version);
    }
    timers.drain();
});
