//! Daily streak state machine.
//!
//! A streak continues on consecutive calendar days. A freeze token bridges
//! exactly one missed day; anything longer resets the count. Only calendar
//! day identity matters, never time of day.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakState {
    pub current: i64,
    pub longest: i64,
    pub last_active: Option<NaiveDate>,
    pub freeze_count: i64,
}

impl StreakState {
    pub fn new() -> Self {
        Self {
            current: 0,
            longest: 0,
            last_active: None,
            freeze_count: 1,
        }
    }
}

impl Default for StreakState {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one qualifying activity on `today`. Idempotent per calendar day.
pub fn advance(state: StreakState, today: NaiveDate) -> StreakState {
    if state.last_active == Some(today) {
        return state;
    }

    let mut freeze_count = state.freeze_count;
    let current = match state.last_active {
        Some(last) => {
            let gap = (today - last).num_days();
            if gap == 1 {
                state.current + 1
            } else if gap == 2 && state.freeze_count > 0 {
                // A freeze silently bridges exactly one missed day.
                freeze_count -= 1;
                state.current + 1
            } else {
                1
            }
        }
        None => 1,
    };

    StreakState {
        current,
        longest: state.longest.max(current),
        last_active: Some(today),
        freeze_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_first_activity_starts_at_one() {
        let s = advance(StreakState::new(), day(1));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 1);
        assert_eq!(s.last_active, Some(day(1)));
        assert_eq!(s.freeze_count, 1);
    }

    #[test]
    fn test_consecutive_day_increments() {
        let s = advance(StreakState::new(), day(1));
        let s = advance(s, day(2));
        assert_eq!(s.current, 2);
        assert_eq!(s.longest, 2);
    }

    #[test]
    fn test_freeze_bridges_one_missed_day() {
        let s = advance(StreakState::new(), day(1));
        let s = advance(s, day(2));
        // Day 3 skipped; freeze consumed on day 4.
        let s = advance(s, day(4));
        assert_eq!(s.current, 3);
        assert_eq!(s.longest, 3);
        assert_eq!(s.freeze_count, 0);
    }

    #[test]
    fn test_two_missed_days_reset() {
        let s = advance(StreakState::new(), day(1));
        let s = advance(s, day(2));
        // Days 3 and 4 skipped: gap of 3, freeze cannot bridge it.
        let s = advance(s, day(5));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 2);
        assert_eq!(s.freeze_count, 1);
    }

    #[test]
    fn test_missed_day_without_freeze_resets() {
        let s = StreakState {
            current: 5,
            longest: 5,
            last_active: Some(day(10)),
            freeze_count: 0,
        };
        let s = advance(s, day(12));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 5);
    }

    #[test]
    fn test_same_day_touch_is_idempotent() {
        let s = advance(StreakState::new(), day(1));
        let again = advance(s, day(1));
        assert_eq!(s, again);
    }

    #[test]
    fn test_longest_never_decreases() {
        let s = StreakState {
            current: 7,
            longest: 7,
            last_active: Some(day(10)),
            freeze_count: 1,
        };
        let s = advance(s, day(20));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 7);
        assert!(s.longest >= s.current);
    }
}
