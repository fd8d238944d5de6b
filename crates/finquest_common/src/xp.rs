//! XP award policy.
//!
//! Amounts are fixed policy values per triggering action, not computed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpKind {
    CorrectAnswer,
    LessonComplete,
    PracticeSession,
    ProjectComplete,
}

impl XpKind {
    pub fn amount(self) -> i64 {
        match self {
            XpKind::CorrectAnswer => 2,
            XpKind::LessonComplete => 5,
            XpKind::PracticeSession => 15,
            XpKind::ProjectComplete => 20,
        }
    }

    /// Type tag recorded on the ledger event.
    pub fn as_str(self) -> &'static str {
        match self {
            XpKind::CorrectAnswer => "correct_answer",
            XpKind::LessonComplete => "lesson_complete",
            XpKind::PracticeSession => "practice_session",
            XpKind::ProjectComplete => "project_complete",
        }
    }
}
