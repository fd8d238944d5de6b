//! Progression engine: attempts, lesson completion, practice sessions,
//! project submissions.
//!
//! Every operation here runs in one SQLite transaction. XP is dual-written
//! (ledger event + profile counter) inside that transaction, and the
//! streak/achievement cascade rides along, so a failure rolls the whole
//! step back.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::content::exercise_row;
use super::learner::{earned_keys, learner_stats, streak_row};
use super::Store;
use finquest_common::achievements::newly_unlocked;
use finquest_common::grading::{grade, AnswerKey};
use finquest_common::models::{Achievement, Progress, ProjectSubmission, Streak};
use finquest_common::streak::{advance, StreakState};
use finquest_common::xp::XpKind;
use finquest_common::{FinquestError, Result};

/// Result of grading one submitted answer. The hint and key are revealed
/// only after an incorrect answer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
    pub attempt_id: String,
    pub is_correct: bool,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Value>,
    pub xp_awarded: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletion {
    pub progress: Progress,
    pub xp_awarded: i64,
    pub streak: Streak,
    pub new_achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeCompletion {
    pub xp_awarded: i64,
    pub streak: Streak,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub submission: ProjectSubmission,
    pub xp_awarded: i64,
    pub new_achievements: Vec<Achievement>,
}

impl Store {
    /// Grade a submitted answer, record the attempt, and award the
    /// correct-answer XP. Attempts do not touch the streak; only lesson
    /// and practice completions count as qualifying activity.
    pub async fn grade_attempt(
        &self,
        user_id: String,
        exercise_id: String,
        answer: Value,
    ) -> Result<AttemptOutcome> {
        self.db
            .call(move |conn| grade_attempt_tx(conn, &user_id, &exercise_id, &answer))
            .await
    }

    /// Mark a lesson completed. Re-completion keeps the progress row
    /// idempotent but still awards XP, matching the ledger's append-only
    /// policy.
    pub async fn complete_lesson(&self, user_id: String, lesson_id: String) -> Result<LessonCompletion> {
        self.db
            .call(move |conn| {
                complete_lesson_tx(conn, &user_id, &lesson_id, Utc::now().date_naive())
            })
            .await
    }

    /// Award the flat practice-session bonus and touch the streak.
    /// Achievements are not re-evaluated here; none of them key off
    /// practice sessions.
    pub async fn complete_practice(&self, user_id: String) -> Result<PracticeCompletion> {
        self.db
            .call(move |conn| complete_practice_tx(conn, &user_id, Utc::now().date_naive()))
            .await
    }

    /// Record a project submission. Submissions are append-only; every one
    /// earns the project bonus.
    pub async fn submit_project(
        &self,
        user_id: String,
        project_id: String,
        data: Value,
    ) -> Result<SubmissionOutcome> {
        self.db
            .call(move |conn| submit_project_tx(conn, &user_id, &project_id, &data))
            .await
    }

    pub async fn list_submissions(&self, user_id: String) -> Result<Vec<ProjectSubmission>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, project_id, user_id, data_json, created_at
                     FROM project_submissions
                     WHERE user_id = ?1
                     ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(params![user_id], |row| {
                        Ok(ProjectSubmission {
                            id: row.get(0)?,
                            project_id: row.get(1)?,
                            user_id: row.get(2)?,
                            data: super::json_col(row, 3)?,
                            created_at: row.get(4)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }
}

// ============================================================================
// Transaction bodies. Split from the async wrappers so tests can drive them
// with a plain connection and a fixed calendar day.
// ============================================================================

pub(crate) fn grade_attempt_tx(
    conn: &mut Connection,
    user_id: &str,
    exercise_id: &str,
    answer: &Value,
) -> Result<AttemptOutcome> {
    let tx = conn.transaction()?;

    let exercise = exercise_row(&tx, exercise_id)?;
    let key = AnswerKey::decode(exercise.kind, &exercise.answer)?;
    let is_correct = grade(&key, answer)?;

    let now = Utc::now();
    let attempt_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO attempts (id, user_id, exercise_id, answer_json, is_correct, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attempt_id,
            user_id,
            exercise_id,
            serde_json::to_string(answer)?,
            is_correct,
            now,
        ],
    )?;

    let xp_awarded = if is_correct {
        award_xp(&tx, user_id, XpKind::CorrectAnswer)?
    } else {
        0
    };

    tx.commit()?;

    debug!(exercise_id, is_correct, "Graded attempt");

    Ok(AttemptOutcome {
        attempt_id,
        is_correct,
        explanation: exercise.explanation,
        hint: if is_correct { None } else { exercise.hint },
        correct_answer: (!is_correct).then(|| key.reveal()),
        xp_awarded,
    })
}

pub(crate) fn complete_lesson_tx(
    conn: &mut Connection,
    user_id: &str,
    lesson_id: &str,
    today: NaiveDate,
) -> Result<LessonCompletion> {
    let tx = conn.transaction()?;

    let skill_id: String = tx
        .query_row(
            "SELECT skill_id FROM lessons WHERE id = ?1 AND is_published = 1",
            params![lesson_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(FinquestError::NotFound("lesson"))?;

    let now = Utc::now();
    tx.execute(
        "INSERT INTO progress (id, user_id, skill_id, lesson_id, status, mastery_score, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'completed', 1.0, ?5)
         ON CONFLICT(user_id, lesson_id) DO UPDATE SET
            status = 'completed',
            mastery_score = 1.0,
            updated_at = excluded.updated_at",
        params![Uuid::new_v4().to_string(), user_id, skill_id, lesson_id, now],
    )?;
    let progress = tx.query_row(
        "SELECT id, user_id, skill_id, lesson_id, status, mastery_score, updated_at
         FROM progress WHERE user_id = ?1 AND lesson_id = ?2",
        params![user_id, lesson_id],
        super::learner::progress_from_row,
    )?;

    let xp_awarded = award_xp(&tx, user_id, XpKind::LessonComplete)?;
    let streak = touch_streak(&tx, user_id, today)?;
    let new_achievements = evaluate_achievements(&tx, user_id)?;

    tx.commit()?;

    debug!(lesson_id, "Lesson completed");

    Ok(LessonCompletion {
        progress,
        xp_awarded,
        streak,
        new_achievements,
    })
}

pub(crate) fn complete_practice_tx(
    conn: &mut Connection,
    user_id: &str,
    today: NaiveDate,
) -> Result<PracticeCompletion> {
    let tx = conn.transaction()?;
    let xp_awarded = award_xp(&tx, user_id, XpKind::PracticeSession)?;
    let streak = touch_streak(&tx, user_id, today)?;
    tx.commit()?;
    Ok(PracticeCompletion { xp_awarded, streak })
}

pub(crate) fn submit_project_tx(
    conn: &mut Connection,
    user_id: &str,
    project_id: &str,
    data: &Value,
) -> Result<SubmissionOutcome> {
    let tx = conn.transaction()?;

    let exists: Option<String> = tx
        .query_row(
            "SELECT id FROM projects WHERE id = ?1",
            params![project_id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(FinquestError::NotFound("project"));
    }

    let submission = ProjectSubmission {
        id: Uuid::new_v4().to_string(),
        project_id: project_id.to_string(),
        user_id: user_id.to_string(),
        data: data.clone(),
        created_at: Utc::now(),
    };
    tx.execute(
        "INSERT INTO project_submissions (id, project_id, user_id, data_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            submission.id,
            submission.project_id,
            submission.user_id,
            serde_json::to_string(&submission.data)?,
            submission.created_at,
        ],
    )?;

    // Submissions award XP and can unlock badges, but do not count as
    // streak activity.
    let xp_awarded = award_xp(&tx, user_id, XpKind::ProjectComplete)?;
    let new_achievements = evaluate_achievements(&tx, user_id)?;

    tx.commit()?;

    Ok(SubmissionOutcome {
        submission,
        xp_awarded,
        new_achievements,
    })
}

// ============================================================================
// Cascade helpers. All take `&Connection` so they compose inside a caller's
// transaction via Deref.
// ============================================================================

/// Dual-write one XP award: append the ledger event and bump the profile
/// counter. Returns the amount awarded.
pub(crate) fn award_xp(conn: &Connection, user_id: &str, kind: XpKind) -> Result<i64> {
    let amount = kind.amount();
    let changed = conn.execute(
        "UPDATE user_profiles SET total_xp = total_xp + ?1 WHERE user_id = ?2",
        params![amount, user_id],
    )?;
    if changed == 0 {
        return Err(FinquestError::NotFound("user"));
    }
    conn.execute(
        "INSERT INTO xp_events (id, user_id, type, amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            Uuid::new_v4().to_string(),
            user_id,
            kind.as_str(),
            amount,
            Utc::now(),
        ],
    )?;
    Ok(amount)
}

/// Apply one qualifying activity to the streak row for `today` and persist
/// the transition. Idempotent within a calendar day.
pub(crate) fn touch_streak(conn: &Connection, user_id: &str, today: NaiveDate) -> Result<Streak> {
    let row = streak_row(conn, user_id)?;
    let next = advance(
        StreakState {
            current: row.current,
            longest: row.longest,
            last_active: row.last_active_date,
            freeze_count: row.freeze_count,
        },
        today,
    );
    let now = Utc::now();
    conn.execute(
        "UPDATE streaks SET current = ?1, longest = ?2, last_active_date = ?3,
                freeze_count = ?4, updated_at = ?5
         WHERE user_id = ?6",
        params![next.current, next.longest, next.last_active, next.freeze_count, now, user_id],
    )?;
    Ok(Streak {
        id: row.id,
        user_id: row.user_id,
        current: next.current,
        longest: next.longest,
        last_active_date: next.last_active,
        freeze_count: next.freeze_count,
        updated_at: now,
    })
}

/// Recompute the stats snapshot and persist any catalog entries it now
/// satisfies. Returns only the entries unlocked by this call; the unique
/// index makes a lost race a no-op.
pub(crate) fn evaluate_achievements(conn: &Connection, user_id: &str) -> Result<Vec<Achievement>> {
    let earned = earned_keys(conn, user_id)?;
    let stats = learner_stats(conn, user_id)?;
    let fresh = newly_unlocked(&earned, &stats);

    let now = Utc::now();
    let mut unlocked = Vec::with_capacity(fresh.len());
    for def in fresh {
        conn.execute(
            "INSERT OR IGNORE INTO user_achievements (id, user_id, achievement_id, unlocked_at)
             SELECT ?1, ?2, a.id, ?3 FROM achievements a WHERE a.key = ?4",
            params![Uuid::new_v4().to_string(), user_id, now, def.key],
        )?;
        let achievement = conn.query_row(
            "SELECT id, key, title, description, icon_name FROM achievements WHERE key = ?1",
            params![def.key],
            |row| {
                Ok(Achievement {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    icon_name: row.get(4)?,
                })
            },
        )?;
        debug!(key = achievement.key, "Achievement unlocked");
        unlocked.push(achievement);
    }
    Ok(unlocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use finquest_common::models::ProgressStatus;
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn seed_user(conn: &Connection, user_id: &str) {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (id, email, display_name, role, created_at)
             VALUES (?1, ?2, 'Test', 'user', ?3)",
            params![user_id, format!("{user_id}@example.com"), now],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO user_profiles (id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), user_id, now],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO streaks (id, user_id, updated_at) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), user_id, now],
        )
        .unwrap();
    }

    fn seed_content(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO paths (id, title, description, order_index) VALUES ('p1', 'Basics', 'd', 0);
             INSERT INTO skills (id, path_id, title, description, order_index)
                VALUES ('s1', 'p1', 'Budgeting', 'd', 0);
             INSERT INTO lessons (id, skill_id, title, order_index, content_json)
                VALUES ('l1', 's1', 'What is a budget', 0, '[]');
             INSERT INTO exercises (id, lesson_id, type, prompt, answer_json, explanation, hint, order_index)
                VALUES ('e1', 'l1', 'numeric', 'What is 10% of 200?',
                        '{\"min\": 20, \"max\": 20}', 'Ten percent of 200 is 20.',
                        'Move the decimal one place.', 0);
             INSERT INTO projects (id, skill_id, title, description, schema_json)
                VALUES ('pj1', 's1', 'First Budget', 'd', '{}');",
        )
        .unwrap();
    }

    #[test]
    fn test_correct_attempt_awards_xp_without_streak_touch() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        seed_content(&conn);

        let out = grade_attempt_tx(&mut conn, "u1", "e1", &json!({ "value": 20 })).unwrap();
        assert!(out.is_correct);
        assert!(out.correct_answer.is_none());
        assert!(out.hint.is_none());
        assert_eq!(out.xp_awarded, 2);

        let total: i64 = conn
            .query_row("SELECT total_xp FROM user_profiles WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 2);
        // Attempts are not qualifying streak activity.
        let streak: i64 = conn
            .query_row("SELECT current FROM streaks WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(streak, 0);
    }

    #[test]
    fn test_incorrect_attempt_reveals_key_without_xp() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        seed_content(&conn);

        let out = grade_attempt_tx(&mut conn, "u1", "e1", &json!({ "value": 7 })).unwrap();
        assert!(!out.is_correct);
        assert_eq!(out.correct_answer, Some(json!({ "min": 20.0, "max": 20.0 })));
        assert_eq!(out.hint.as_deref(), Some("Move the decimal one place."));
        assert_eq!(out.xp_awarded, 0);

        let total: i64 = conn
            .query_row("SELECT total_xp FROM user_profiles WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 0);
        // The attempt is still recorded for practice selection.
        let attempts: i64 = conn
            .query_row("SELECT COUNT(*) FROM attempts WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_unknown_exercise_is_not_found() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        let err = grade_attempt_tx(&mut conn, "u1", "nope", &json!({ "value": 1 })).unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_lesson_completion_unlocks_first_lesson_once() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        seed_content(&conn);

        let first = complete_lesson_tx(&mut conn, "u1", "l1", day(1)).unwrap();
        assert_eq!(first.xp_awarded, 5);
        assert_eq!(first.progress.status, ProgressStatus::Completed);
        let keys: Vec<_> = first.new_achievements.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["first_lesson"]);

        // Re-completion: progress stays one row, XP accrues again, no
        // duplicate unlock.
        let second = complete_lesson_tx(&mut conn, "u1", "l1", day(1)).unwrap();
        assert_eq!(second.xp_awarded, 5);
        assert!(second.new_achievements.is_empty());

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM progress WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        let total: i64 = conn
            .query_row("SELECT total_xp FROM user_profiles WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_streak_achievement_unlocks_on_third_day() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        seed_content(&conn);

        let d1 = complete_lesson_tx(&mut conn, "u1", "l1", day(1)).unwrap();
        let d2 = complete_lesson_tx(&mut conn, "u1", "l1", day(2)).unwrap();
        let d3 = complete_lesson_tx(&mut conn, "u1", "l1", day(3)).unwrap();

        assert_eq!(d1.streak.current, 1);
        assert_eq!(d2.streak.current, 2);
        assert_eq!(d3.streak.current, 3);
        let keys: Vec<_> = d3.new_achievements.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["streak_3"]);
    }

    #[test]
    fn test_xp_ledger_reconciles_with_profile_counter() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        seed_content(&conn);

        grade_attempt_tx(&mut conn, "u1", "e1", &json!({ "value": 20 })).unwrap();
        complete_lesson_tx(&mut conn, "u1", "l1", day(1)).unwrap();
        complete_practice_tx(&mut conn, "u1", day(1)).unwrap();
        submit_project_tx(&mut conn, "u1", "pj1", &json!({ "income": 1000 })).unwrap();

        let ledger: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM xp_events WHERE user_id = 'u1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        let counter: i64 = conn
            .query_row("SELECT total_xp FROM user_profiles WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(ledger, 2 + 5 + 15 + 20);
        assert_eq!(ledger, counter);
    }

    #[test]
    fn test_project_submission_unlocks_first_project() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        seed_content(&conn);

        let out = submit_project_tx(&mut conn, "u1", "pj1", &json!({ "ok": true })).unwrap();
        assert_eq!(out.xp_awarded, 20);
        let keys: Vec<_> = out.new_achievements.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["first_project"]);

        let again = submit_project_tx(&mut conn, "u1", "pj1", &json!({ "ok": 2 })).unwrap();
        assert!(again.new_achievements.is_empty());
    }

    #[test]
    fn test_missing_project_rolls_back() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        let err = submit_project_tx(&mut conn, "u1", "nope", &json!({})).unwrap_err();
        assert_eq!(err.status(), 404);
        let total: i64 = conn
            .query_row("SELECT total_xp FROM user_profiles WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_validation_error_records_nothing() {
        let mut conn = test_conn();
        seed_user(&conn, "u1");
        seed_content(&conn);

        let err = grade_attempt_tx(&mut conn, "u1", "e1", &json!({})).unwrap_err();
        assert_eq!(err.status(), 400);
        let attempts: i64 = conn
            .query_row("SELECT COUNT(*) FROM attempts WHERE user_id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(attempts, 0);
    }
}
