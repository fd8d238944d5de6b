//! Storage engine: all reads and writes against the persistence gateway.
//!
//! Multi-step operations (grading, lesson completion, project submission)
//! run inside one SQLite transaction each, so the XP dual-write and the
//! progress/streak/achievement cascade are atomic.

mod content;
mod engine;
mod learner;
mod practice;

pub use content::{
    ImportSummary, LessonDetail, LessonWithProgress, PathDetail, SkillDetail, SkillWithStatus,
};
pub use engine::{AttemptOutcome, LessonCompletion, PracticeCompletion, SubmissionOutcome};
pub use practice::PracticeQueue;
pub use learner::{MeView, NextLesson, ProfileUpdate};

use rusqlite::Row;
use serde_json::Value;

use crate::config::Config;
use crate::db::Db;
use finquest_common::grading::ExerciseKind;
use finquest_common::models::Exercise;

#[derive(Clone)]
pub struct Store {
    pub(crate) db: Db,
    pub(crate) config: Config,
}

impl Store {
    pub fn new(db: Db, config: Config) -> Self {
        Self { db, config }
    }
}

// ============================================================================
// Row helpers
// ============================================================================

fn bad_column(idx: usize, msg: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())),
    )
}

pub(crate) fn json_col(row: &Row, idx: usize) -> rusqlite::Result<Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

pub(crate) fn opt_json_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

pub(crate) fn kind_col(row: &Row, idx: usize) -> rusqlite::Result<ExerciseKind> {
    let raw: String = row.get(idx)?;
    ExerciseKind::parse(&raw).ok_or_else(|| bad_column(idx, "unknown exercise type"))
}

/// Column order: id, lesson_id, type, prompt, options_json, answer_json,
/// explanation, hint, tags_json, order_index.
pub(crate) const EXERCISE_COLUMNS: &str =
    "id, lesson_id, type, prompt, options_json, answer_json, explanation, hint, tags_json, order_index";

pub(crate) fn exercise_from_row(row: &Row) -> rusqlite::Result<Exercise> {
    Ok(Exercise {
        id: row.get(0)?,
        lesson_id: row.get(1)?,
        kind: kind_col(row, 2)?,
        prompt: row.get(3)?,
        options: opt_json_col(row, 4)?,
        answer: json_col(row, 5)?,
        explanation: row.get(6)?,
        hint: row.get(7)?,
        tags: json_col(row, 8)?,
        order_index: row.get(9)?,
    })
}
