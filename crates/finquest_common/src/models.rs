//! Entity types for the FinQuest data model.
//!
//! Wire shapes use camelCase to match the client contract. Content rows
//! (paths, skills, lessons, exercises, projects) are authored out-of-band
//! and read-only from the engine's perspective.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::grading::ExerciseKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub daily_goal_minutes: i64,
    pub focus_area: Option<String>,
    pub total_xp: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub id: String,
    pub title: String,
    pub description: String,
    pub order_index: i64,
    pub icon_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub path_id: String,
    pub title: String,
    pub description: String,
    pub order_index: i64,
    pub icon_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub skill_id: String,
    pub title: String,
    pub order_index: i64,
    pub content: Value,
    pub is_published: bool,
}

/// Full exercise row, answer key included. Never serialized to clients;
/// see [`ExerciseView`] for the stripped shape.
#[derive(Debug, Clone)]
pub struct Exercise {
    pub id: String,
    pub lesson_id: String,
    pub kind: ExerciseKind,
    pub prompt: String,
    pub options: Option<Value>,
    pub answer: Value,
    pub explanation: String,
    pub hint: Option<String>,
    pub tags: Value,
    pub order_index: i64,
}

/// Client-facing exercise with the answer key stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseView {
    pub id: String,
    pub lesson_id: String,
    #[serde(rename = "type")]
    pub kind: ExerciseKind,
    pub prompt: String,
    pub options: Option<Value>,
    pub tags: Value,
    pub order_index: i64,
}

impl Exercise {
    pub fn view(&self) -> ExerciseView {
        ExerciseView {
            id: self.id.clone(),
            lesson_id: self.lesson_id.clone(),
            kind: self.kind,
            prompt: self.prompt.clone(),
            options: self.options.clone(),
            tags: self.tags.clone(),
            order_index: self.order_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(ProgressStatus::NotStarted),
            "completed" => Some(ProgressStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub id: String,
    pub user_id: String,
    pub skill_id: String,
    pub lesson_id: String,
    pub status: ProgressStatus,
    pub mastery_score: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub id: String,
    pub user_id: String,
    pub current: i64,
    pub longest: i64,
    pub last_active_date: Option<NaiveDate>,
    pub freeze_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpEvent {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub skill_id: String,
    pub title: String,
    pub description: String,
    pub schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSubmission {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub key: String,
    pub title: String,
    pub description: String,
    pub icon_name: String,
}

/// An earned achievement joined with its catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedAchievement {
    pub achievement: Achievement,
    pub unlocked_at: DateTime<Utc>,
}

// ============================================================================
// Content import
// ============================================================================

/// Authored content, imported out-of-band (admin tooling or `--import`).
/// Ids are stable author-chosen strings so re-import is an upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPack {
    #[serde(default)]
    pub paths: Vec<LearningPath>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub exercises: Vec<ExerciseDef>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Exercise as authored: the answer key rides along as raw JSON and is
/// validated against the type tag at import time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDef {
    pub id: String,
    pub lesson_id: String,
    #[serde(rename = "type")]
    pub kind: ExerciseKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Option<Value>,
    pub answer: Value,
    pub explanation: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default = "default_tags")]
    pub tags: Value,
    #[serde(default)]
    pub order_index: i64,
}

fn default_tags() -> Value {
    Value::Array(Vec::new())
}
