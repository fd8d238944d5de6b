//! Achievement catalog and unlock rules.
//!
//! Each catalog entry is a one-time badge tied to a stat threshold. The
//! evaluator recomputes a stats snapshot and checks every not-yet-earned
//! entry; unlocking never awards XP.

use serde::{Deserialize, Serialize};

/// Static catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementDef {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon_name: &'static str,
}

pub const CATALOG: &[AchievementDef] = &[
    AchievementDef {
        key: "first_lesson",
        title: "First Steps",
        description: "Complete your first lesson",
        icon_name: "book-open",
    },
    AchievementDef {
        key: "streak_3",
        title: "On a Roll",
        description: "Maintain a 3-day streak",
        icon_name: "flame",
    },
    AchievementDef {
        key: "streak_7",
        title: "Week Warrior",
        description: "Maintain a 7-day streak",
        icon_name: "calendar",
    },
    AchievementDef {
        key: "xp_100",
        title: "Century Club",
        description: "Earn 100 XP",
        icon_name: "trophy",
    },
    AchievementDef {
        key: "first_project",
        title: "Hands On",
        description: "Submit your first project",
        icon_name: "briefcase",
    },
];

/// Aggregate learner stats the unlock predicates read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LearnerStats {
    pub total_xp: i64,
    pub completed_lessons: i64,
    pub current_streak: i64,
    pub submissions: i64,
}

/// Whether the catalog entry with `key` is satisfied by `stats`.
/// Unknown keys never unlock.
pub fn is_unlocked(key: &str, stats: &LearnerStats) -> bool {
    match key {
        "first_lesson" => stats.completed_lessons >= 1,
        "streak_3" => stats.current_streak >= 3,
        "streak_7" => stats.current_streak >= 7,
        "xp_100" => stats.total_xp >= 100,
        "first_project" => stats.submissions >= 1,
        _ => false,
    }
}

/// Catalog entries satisfied by `stats` but not in `earned`.
pub fn newly_unlocked<'a>(
    earned: &[String],
    stats: &LearnerStats,
) -> Vec<&'static AchievementDef> {
    CATALOG
        .iter()
        .filter(|def| !earned.iter().any(|k| k == def.key))
        .filter(|def| is_unlocked(def.key, stats))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_lesson_unlocks_at_one() {
        let mut stats = LearnerStats::default();
        assert!(!is_unlocked("first_lesson", &stats));
        stats.completed_lessons = 1;
        assert!(is_unlocked("first_lesson", &stats));
    }

    #[test]
    fn test_streak_thresholds() {
        let stats = LearnerStats {
            current_streak: 3,
            ..Default::default()
        };
        assert!(is_unlocked("streak_3", &stats));
        assert!(!is_unlocked("streak_7", &stats));
    }

    #[test]
    fn test_xp_threshold_boundary() {
        let stats = LearnerStats {
            total_xp: 99,
            ..Default::default()
        };
        assert!(!is_unlocked("xp_100", &stats));
        let stats = LearnerStats {
            total_xp: 100,
            ..Default::default()
        };
        assert!(is_unlocked("xp_100", &stats));
    }

    #[test]
    fn test_newly_unlocked_skips_earned() {
        let stats = LearnerStats {
            completed_lessons: 2,
            current_streak: 4,
            ..Default::default()
        };
        let earned = vec!["first_lesson".to_string()];
        let fresh = newly_unlocked(&earned, &stats);
        let keys: Vec<_> = fresh.iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["streak_3"]);
    }

    #[test]
    fn test_unknown_key_never_unlocks() {
        let stats = LearnerStats {
            total_xp: 1_000_000,
            completed_lessons: 1_000,
            current_streak: 1_000,
            submissions: 1_000,
        };
        assert!(!is_unlocked("does_not_exist", &stats));
    }
}
