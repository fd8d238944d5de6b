//! Learner state: users, profiles, streak rows, progress, and the /me
//! aggregate.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{bad_column, json_col, Store};
use finquest_common::achievements::LearnerStats;
use finquest_common::models::{
    Achievement, EarnedAchievement, LearningPath, Lesson, Profile, Progress, ProgressStatus,
    Skill, Streak, User,
};
use finquest_common::{FinquestError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub daily_goal_minutes: Option<i64>,
    pub focus_area: Option<String>,
}

/// The `/v1/me` aggregate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeView {
    pub user: User,
    pub profile: Profile,
    pub streak: Streak,
    pub total_xp: i64,
    pub today_xp: i64,
    pub completed_lessons: i64,
    pub today_lessons: i64,
    pub achievements: Vec<EarnedAchievement>,
    pub next_lesson: Option<NextLesson>,
    pub progress: Vec<Progress>,
}

/// First uncompleted lesson in path/skill/lesson order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextLesson {
    pub path: LearningPath,
    pub skill: Skill,
    pub lesson: Lesson,
}

impl Store {
    /// Create a user with their profile and streak rows in one transaction.
    pub async fn create_user(&self, email: String, display_name: String) -> Result<User> {
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;

                let exists: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM users WHERE email = ?1",
                    params![email],
                    |row| row.get(0),
                )?;
                if exists > 0 {
                    return Err(FinquestError::Conflict("Email already registered".to_string()));
                }

                let now = Utc::now();
                let user = User {
                    id: Uuid::new_v4().to_string(),
                    email,
                    display_name,
                    role: "user".to_string(),
                    created_at: now,
                };
                tx.execute(
                    "INSERT INTO users (id, email, display_name, role, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![user.id, user.email, user.display_name, user.role, user.created_at],
                )?;
                tx.execute(
                    "INSERT INTO user_profiles (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![Uuid::new_v4().to_string(), user.id, now],
                )?;
                tx.execute(
                    "INSERT INTO streaks (id, user_id, updated_at) VALUES (?1, ?2, ?3)",
                    params![Uuid::new_v4().to_string(), user.id, now],
                )?;

                tx.commit()?;
                Ok(user)
            })
            .await
    }

    pub async fn get_user(&self, user_id: String) -> Result<User> {
        self.db.call(move |conn| user_row(conn, &user_id)).await
    }

    pub async fn update_profile(&self, user_id: String, update: ProfileUpdate) -> Result<Profile> {
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE user_profiles SET
                        daily_goal_minutes = COALESCE(?1, daily_goal_minutes),
                        focus_area = COALESCE(?2, focus_area)
                     WHERE user_id = ?3",
                    params![update.daily_goal_minutes, update.focus_area, user_id],
                )?;
                if changed == 0 {
                    return Err(FinquestError::NotFound("user"));
                }
                profile_row(conn, &user_id)
            })
            .await
    }

    /// Aggregate learner snapshot for the home screen.
    pub async fn me(&self, user_id: String) -> Result<MeView> {
        self.db
            .call(move |conn| {
                let user = user_row(conn, &user_id)?;
                let profile = profile_row(conn, &user_id)?;
                let streak = streak_row(conn, &user_id)?;

                // "Today" is the UTC calendar day, matching streak dates.
                let today_start = Utc::now()
                    .date_naive()
                    .and_time(chrono::NaiveTime::MIN)
                    .and_utc();

                let today_xp: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(amount), 0) FROM xp_events
                     WHERE user_id = ?1 AND created_at >= ?2",
                    params![user_id, today_start],
                    |row| row.get(0),
                )?;
                let completed_lessons: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM progress WHERE user_id = ?1 AND status = 'completed'",
                    params![user_id],
                    |row| row.get(0),
                )?;
                let today_lessons: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM progress
                     WHERE user_id = ?1 AND status = 'completed' AND updated_at >= ?2",
                    params![user_id, today_start],
                    |row| row.get(0),
                )?;

                let achievements = earned_achievements(conn, &user_id)?;
                let next_lesson = next_lesson(conn, &user_id)?;
                let progress = progress_rows(conn, &user_id)?;

                Ok(MeView {
                    total_xp: profile.total_xp,
                    user,
                    profile,
                    streak,
                    today_xp,
                    completed_lessons,
                    today_lessons,
                    achievements,
                    next_lesson,
                    progress,
                })
            })
            .await
    }
}

// ============================================================================
// Row loaders shared with the engine
// ============================================================================

pub(crate) fn user_row(conn: &Connection, user_id: &str) -> Result<User> {
    conn.query_row(
        "SELECT id, email, display_name, role, created_at FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                display_name: row.get(2)?,
                role: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or(FinquestError::NotFound("user"))
}

pub(crate) fn profile_row(conn: &Connection, user_id: &str) -> Result<Profile> {
    conn.query_row(
        "SELECT id, user_id, daily_goal_minutes, focus_area, total_xp, created_at
         FROM user_profiles WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(Profile {
                id: row.get(0)?,
                user_id: row.get(1)?,
                daily_goal_minutes: row.get(2)?,
                focus_area: row.get(3)?,
                total_xp: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or(FinquestError::NotFound("user"))
}

pub(crate) fn streak_row(conn: &Connection, user_id: &str) -> Result<Streak> {
    conn.query_row(
        "SELECT id, user_id, current, longest, last_active_date, freeze_count, updated_at
         FROM streaks WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(Streak {
                id: row.get(0)?,
                user_id: row.get(1)?,
                current: row.get(2)?,
                longest: row.get(3)?,
                last_active_date: row.get(4)?,
                freeze_count: row.get(5)?,
                updated_at: row.get(6)?,
            })
        },
    )
    .optional()?
    .ok_or(FinquestError::NotFound("user"))
}

pub(crate) fn progress_from_row(row: &Row) -> rusqlite::Result<Progress> {
    let status: String = row.get(4)?;
    Ok(Progress {
        id: row.get(0)?,
        user_id: row.get(1)?,
        skill_id: row.get(2)?,
        lesson_id: row.get(3)?,
        status: ProgressStatus::parse(&status)
            .ok_or_else(|| bad_column(4, "unknown progress status"))?,
        mastery_score: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) fn progress_rows(conn: &Connection, user_id: &str) -> Result<Vec<Progress>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, skill_id, lesson_id, status, mastery_score, updated_at
         FROM progress WHERE user_id = ?1",
    )?;
    let rows = stmt
        .query_map(params![user_id], progress_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn earned_achievements(conn: &Connection, user_id: &str) -> Result<Vec<EarnedAchievement>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.key, a.title, a.description, a.icon_name, ua.unlocked_at
         FROM user_achievements ua
         JOIN achievements a ON ua.achievement_id = a.id
         WHERE ua.user_id = ?1
         ORDER BY ua.unlocked_at",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok(EarnedAchievement {
                achievement: Achievement {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    icon_name: row.get(4)?,
                },
                unlocked_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn earned_keys(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT a.key FROM user_achievements ua
         JOIN achievements a ON ua.achievement_id = a.id
         WHERE ua.user_id = ?1",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Aggregate stats the achievement predicates read. Total XP comes from the
/// profile cache, which the ledger keeps reconciled transactionally.
pub(crate) fn learner_stats(conn: &Connection, user_id: &str) -> Result<LearnerStats> {
    let total_xp: i64 = conn.query_row(
        "SELECT total_xp FROM user_profiles WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    let completed_lessons: i64 = conn.query_row(
        "SELECT COUNT(*) FROM progress WHERE user_id = ?1 AND status = 'completed'",
        params![user_id],
        |row| row.get(0),
    )?;
    let current_streak: i64 = conn.query_row(
        "SELECT current FROM streaks WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    let submissions: i64 = conn.query_row(
        "SELECT COUNT(*) FROM project_submissions WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(LearnerStats {
        total_xp,
        completed_lessons,
        current_streak,
        submissions,
    })
}

fn next_lesson(conn: &Connection, user_id: &str) -> Result<Option<NextLesson>> {
    let row = conn
        .query_row(
            "SELECT p.id, p.title, p.description, p.order_index, p.icon_name,
                    s.id, s.path_id, s.title, s.description, s.order_index, s.icon_name,
                    l.id, l.skill_id, l.title, l.order_index, l.content_json, l.is_published
             FROM lessons l
             JOIN skills s ON l.skill_id = s.id
             JOIN paths p ON s.path_id = p.id
             WHERE l.is_published = 1
               AND l.id NOT IN (
                   SELECT lesson_id FROM progress WHERE user_id = ?1 AND status = 'completed'
               )
             ORDER BY p.order_index, s.order_index, l.order_index
             LIMIT 1",
            params![user_id],
            |row| {
                Ok(NextLesson {
                    path: LearningPath {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        order_index: row.get(3)?,
                        icon_name: row.get(4)?,
                    },
                    skill: Skill {
                        id: row.get(5)?,
                        path_id: row.get(6)?,
                        title: row.get(7)?,
                        description: row.get(8)?,
                        order_index: row.get(9)?,
                        icon_name: row.get(10)?,
                    },
                    lesson: Lesson {
                        id: row.get(11)?,
                        skill_id: row.get(12)?,
                        title: row.get(13)?,
                        order_index: row.get(14)?,
                        content: json_col(row, 15)?,
                        is_published: row.get(16)?,
                    },
                })
            },
        )
        .optional()?;
    Ok(row)
}
