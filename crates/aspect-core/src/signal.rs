#![forbid(unsafe_code)]

//! Extraction signals and the per-position comparison rule.
//!
//! An extractor yields a [`Signal`] for every position it reports. Besides a
//! real [`Signal::Value`], three sentinels steer the comparison without
//! colliding with legitimate values of the element type:
//!
//! | new \ old | `Value(b)`          | `Absent`  | `Skip`  | `Force` |
//! |-----------|---------------------|-----------|---------|---------|
//! | `Value(a)`| changed iff `a != b`| changed   | ignored | forced  |
//! | `Absent`  | changed             | same      | ignored | forced  |
//! | `Skip`    | ignored             | ignored   | ignored | forced  |
//! | `Force`   | forced              | forced    | forced  | forced  |
//!
//! # Invariants
//!
//! 1. `Force` on either side stops the comparison and notifies.
//! 2. `Skip` on either side removes that position from the outcome only.
//! 3. `Absent` is an ordinary value: two `Absent`s are equal.

/// One extracted position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal<T> {
    /// A real derived value.
    Value(T),
    /// Not comparable right now; never triggers a notification.
    Skip,
    /// Meaningfully missing; transitions into and out of it notify.
    Absent,
    /// Notify unconditionally and stop comparing.
    Force,
}

impl<T> Signal<T> {
    /// The wrapped value, if any.
    #[must_use]
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the wrapped value, if any.
    #[must_use]
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Transform the wrapped value, keeping sentinels as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Signal<U> {
        match self {
            Self::Value(v) => Signal::Value(f(v)),
            Self::Skip => Signal::Skip,
            Self::Absent => Signal::Absent,
            Self::Force => Signal::Force,
        }
    }

    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        !self.is_value()
    }
}

impl<T> From<Option<T>> for Signal<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Absent,
        }
    }
}

/// Outcome of comparing a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Both sides agree.
    Same,
    /// The position changed.
    Changed,
    /// The position does not take part in the decision.
    Ignored,
    /// A `Force` sentinel was seen.
    Forced,
}

impl Step {
    /// Whether this step settles the decision as "notify".
    #[must_use]
    pub const fn is_decisive(self) -> bool {
        matches!(self, Self::Changed | Self::Forced)
    }
}

/// Compare the signals of one position.
#[must_use]
pub fn compare<T: PartialEq>(new: &Signal<T>, old: &Signal<T>) -> Step {
    match (new, old) {
        (Signal::Force, _) | (_, Signal::Force) => Step::Forced,
        (Signal::Skip, _) | (_, Signal::Skip) => Step::Ignored,
        (Signal::Absent, Signal::Absent) => Step::Same,
        (Signal::Value(a), Signal::Value(b)) => {
            if a == b {
                Step::Same
            } else {
                Step::Changed
            }
        }
        (Signal::Value(_), Signal::Absent) | (Signal::Absent, Signal::Value(_)) => Step::Changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_compare_by_equality() {
        assert_eq!(compare(&Signal::Value(1), &Signal::Value(1)), Step::Same);
        assert_eq!(compare(&Signal::Value(1), &Signal::Value(2)), Step::Changed);
    }

    #[test]
    fn force_wins_on_either_side() {
        assert_eq!(compare(&Signal::Force, &Signal::Value(1)), Step::Forced);
        assert_eq!(compare(&Signal::Value(1), &Signal::Force), Step::Forced);
        assert_eq!(compare::<i32>(&Signal::Skip, &Signal::Force), Step::Forced);
    }

    #[test]
    fn skip_is_ignored() {
        assert_eq!(compare(&Signal::Skip, &Signal::Value(1)), Step::Ignored);
        assert_eq!(compare(&Signal::Value(1), &Signal::Skip), Step::Ignored);
        assert_eq!(compare::<i32>(&Signal::Skip, &Signal::Absent), Step::Ignored);
    }

    #[test]
    fn absent_is_compared_like_a_value() {
        assert_eq!(compare::<i32>(&Signal::Absent, &Signal::Absent), Step::Same);
        assert_eq!(compare(&Signal::Absent, &Signal::Value(0)), Step::Changed);
        assert_eq!(compare(&Signal::Value(0), &Signal::Absent), Step::Changed);
    }

    #[test]
    fn option_conversion_maps_none_to_absent() {
        assert_eq!(Signal::from(Some(3)), Signal::Value(3));
        assert_eq!(Signal::<i32>::from(None), Signal::Absent);
    }

    #[test]
    fn map_keeps_sentinels() {
        assert_eq!(Signal::Value(2).map(|v| v * 10), Signal::Value(20));
        assert_eq!(Signal::<i32>::Skip.map(|v| v * 10), Signal::Skip);
        assert_eq!(Signal::<i32>::Force.map(|v| v * 10), Signal::Force);
        assert!(Signal::<i32>::Absent.is_sentinel());
    }
}
