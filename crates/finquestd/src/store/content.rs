//! Content catalog: paths, skills, lessons, exercises, projects.
//!
//! Reads decorate authored rows with per-learner unlock state. Writes only
//! happen through [`Store::import_content`], which upserts a whole pack.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use super::{exercise_from_row, json_col, Store, EXERCISE_COLUMNS};
use finquest_common::grading::AnswerKey;
use finquest_common::models::{
    ContentPack, ExerciseView, LearningPath, Lesson, Project, ProgressStatus, Skill,
};
use finquest_common::{FinquestError, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub paths: usize,
    pub skills: usize,
    pub lessons: usize,
    pub exercises: usize,
    pub projects: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDetail {
    #[serde(flatten)]
    pub path: LearningPath,
    pub skills: Vec<SkillWithStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillWithStatus {
    #[serde(flatten)]
    pub skill: Skill,
    pub unlocked: bool,
    pub completed_lessons: i64,
    pub total_lessons: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDetail {
    #[serde(flatten)]
    pub skill: Skill,
    pub lessons: Vec<LessonWithProgress>,
    /// The capstone project attached to this skill, if any.
    pub project: Option<Project>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonWithProgress {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub status: ProgressStatus,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDetail {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub status: ProgressStatus,
    pub exercises: Vec<ExerciseView>,
}

impl Store {
    /// Upsert an authored content pack in one transaction. Answer keys are
    /// validated against their type tag here so the grader never sees a
    /// malformed key at request time.
    pub async fn import_content(&self, pack: ContentPack) -> Result<ImportSummary> {
        self.db
            .call(move |conn| {
                for ex in &pack.exercises {
                    AnswerKey::decode(ex.kind, &ex.answer).map_err(|_| {
                        FinquestError::Validation(format!(
                            "exercise {} has an answer key that does not match type {}",
                            ex.id,
                            ex.kind.as_str()
                        ))
                    })?;
                }

                let tx = conn.transaction()?;

                for p in &pack.paths {
                    tx.execute(
                        "INSERT INTO paths (id, title, description, order_index, icon_name)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT(id) DO UPDATE SET
                            title = excluded.title,
                            description = excluded.description,
                            order_index = excluded.order_index,
                            icon_name = excluded.icon_name",
                        params![p.id, p.title, p.description, p.order_index, p.icon_name],
                    )?;
                }
                for s in &pack.skills {
                    tx.execute(
                        "INSERT INTO skills (id, path_id, title, description, order_index, icon_name)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(id) DO UPDATE SET
                            path_id = excluded.path_id,
                            title = excluded.title,
                            description = excluded.description,
                            order_index = excluded.order_index,
                            icon_name = excluded.icon_name",
                        params![s.id, s.path_id, s.title, s.description, s.order_index, s.icon_name],
                    )?;
                }
                for l in &pack.lessons {
                    tx.execute(
                        "INSERT INTO lessons (id, skill_id, title, order_index, content_json, is_published)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(id) DO UPDATE SET
                            skill_id = excluded.skill_id,
                            title = excluded.title,
                            order_index = excluded.order_index,
                            content_json = excluded.content_json,
                            is_published = excluded.is_published",
                        params![
                            l.id,
                            l.skill_id,
                            l.title,
                            l.order_index,
                            serde_json::to_string(&l.content)?,
                            l.is_published,
                        ],
                    )?;
                }
                for ex in &pack.exercises {
                    tx.execute(
                        "INSERT INTO exercises
                            (id, lesson_id, type, prompt, options_json, answer_json,
                             explanation, hint, tags_json, order_index)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                         ON CONFLICT(id) DO UPDATE SET
                            lesson_id = excluded.lesson_id,
                            type = excluded.type,
                            prompt = excluded.prompt,
                            options_json = excluded.options_json,
                            answer_json = excluded.answer_json,
                            explanation = excluded.explanation,
                            hint = excluded.hint,
                            tags_json = excluded.tags_json,
                            order_index = excluded.order_index",
                        params![
                            ex.id,
                            ex.lesson_id,
                            ex.kind.as_str(),
                            ex.prompt,
                            ex.options.as_ref().map(serde_json::to_string).transpose()?,
                            serde_json::to_string(&ex.answer)?,
                            ex.explanation,
                            ex.hint,
                            serde_json::to_string(&ex.tags)?,
                            ex.order_index,
                        ],
                    )?;
                }
                for pr in &pack.projects {
                    tx.execute(
                        "INSERT INTO projects (id, skill_id, title, description, schema_json)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT(id) DO UPDATE SET
                            skill_id = excluded.skill_id,
                            title = excluded.title,
                            description = excluded.description,
                            schema_json = excluded.schema_json",
                        params![
                            pr.id,
                            pr.skill_id,
                            pr.title,
                            pr.description,
                            serde_json::to_string(&pr.schema)?,
                        ],
                    )?;
                }

                tx.commit()?;

                let summary = ImportSummary {
                    paths: pack.paths.len(),
                    skills: pack.skills.len(),
                    lessons: pack.lessons.len(),
                    exercises: pack.exercises.len(),
                    projects: pack.projects.len(),
                };
                info!(
                    "Imported content pack: {} paths, {} skills, {} lessons, {} exercises, {} projects",
                    summary.paths, summary.skills, summary.lessons, summary.exercises, summary.projects
                );
                Ok(summary)
            })
            .await
    }

    pub async fn list_paths(&self) -> Result<Vec<LearningPath>> {
        self.db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, description, order_index, icon_name
                     FROM paths ORDER BY order_index",
                )?;
                let rows = stmt
                    .query_map([], path_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    /// A path with its skills decorated with the caller's unlock state.
    /// The first skill is always unlocked; each later skill unlocks once
    /// the previous one has enough completed lessons.
    pub async fn path_detail(&self, path_id: String, user_id: String) -> Result<PathDetail> {
        let threshold = self.config.skill_unlock_threshold;
        self.db
            .call(move |conn| {
                let path = conn
                    .query_row(
                        "SELECT id, title, description, order_index, icon_name
                         FROM paths WHERE id = ?1",
                        params![path_id],
                        path_from_row,
                    )
                    .optional()?
                    .ok_or(FinquestError::NotFound("path"))?;

                let mut stmt = conn.prepare(
                    "SELECT s.id, s.path_id, s.title, s.description, s.order_index, s.icon_name,
                            (SELECT COUNT(*) FROM lessons l
                             WHERE l.skill_id = s.id AND l.is_published = 1),
                            (SELECT COUNT(*) FROM progress pr
                             JOIN lessons l ON pr.lesson_id = l.id
                             WHERE pr.user_id = ?2 AND pr.status = 'completed'
                               AND l.skill_id = s.id AND l.is_published = 1)
                     FROM skills s WHERE s.path_id = ?1
                     ORDER BY s.order_index",
                )?;
                let raw = stmt
                    .query_map(params![path.id, user_id], |row| {
                        Ok((skill_from_row(row)?, row.get::<_, i64>(6)?, row.get::<_, i64>(7)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let mut skills = Vec::with_capacity(raw.len());
                let mut previous_cleared = true;
                for (skill, total_lessons, completed_lessons) in raw {
                    let unlocked = previous_cleared;
                    previous_cleared = completed_lessons >= threshold;
                    skills.push(SkillWithStatus {
                        skill,
                        unlocked,
                        completed_lessons,
                        total_lessons,
                    });
                }

                Ok(PathDetail { path, skills })
            })
            .await
    }

    /// A skill with its published lessons in order. Lessons gate
    /// sequentially: a lesson is unlocked once the one before it is
    /// completed.
    pub async fn skill_detail(&self, skill_id: String, user_id: String) -> Result<SkillDetail> {
        self.db
            .call(move |conn| {
                let skill = conn
                    .query_row(
                        "SELECT id, path_id, title, description, order_index, icon_name
                         FROM skills WHERE id = ?1",
                        params![skill_id],
                        skill_from_row,
                    )
                    .optional()?
                    .ok_or(FinquestError::NotFound("skill"))?;

                let mut stmt = conn.prepare(
                    "SELECT l.id, l.skill_id, l.title, l.order_index, l.content_json,
                            l.is_published, pr.status
                     FROM lessons l
                     LEFT JOIN progress pr ON pr.lesson_id = l.id AND pr.user_id = ?2
                     WHERE l.skill_id = ?1 AND l.is_published = 1
                     ORDER BY l.order_index",
                )?;
                let raw = stmt
                    .query_map(params![skill.id, user_id], |row| {
                        let status: Option<String> = row.get(6)?;
                        Ok((lesson_from_row(row)?, status))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let mut lessons = Vec::with_capacity(raw.len());
                let mut previous_completed = true;
                for (lesson, status) in raw {
                    let status = status
                        .as_deref()
                        .and_then(ProgressStatus::parse)
                        .unwrap_or(ProgressStatus::NotStarted);
                    let completed = status == ProgressStatus::Completed;
                    lessons.push(LessonWithProgress {
                        lesson,
                        status,
                        unlocked: previous_completed,
                    });
                    previous_completed = completed;
                }

                let project = conn
                    .query_row(
                        "SELECT id, skill_id, title, description, schema_json
                         FROM projects WHERE skill_id = ?1",
                        params![skill.id],
                        project_from_row,
                    )
                    .optional()?;

                Ok(SkillDetail {
                    skill,
                    lessons,
                    project,
                })
            })
            .await
    }

    /// A lesson with its exercises, answer keys stripped.
    pub async fn lesson_detail(&self, lesson_id: String, user_id: String) -> Result<LessonDetail> {
        self.db
            .call(move |conn| {
                let lesson = conn
                    .query_row(
                        "SELECT id, skill_id, title, order_index, content_json, is_published
                         FROM lessons WHERE id = ?1 AND is_published = 1",
                        params![lesson_id],
                        lesson_from_row,
                    )
                    .optional()?
                    .ok_or(FinquestError::NotFound("lesson"))?;

                let status: Option<String> = conn
                    .query_row(
                        "SELECT status FROM progress WHERE user_id = ?1 AND lesson_id = ?2",
                        params![user_id, lesson.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let status = status
                    .as_deref()
                    .and_then(ProgressStatus::parse)
                    .unwrap_or(ProgressStatus::NotStarted);

                let mut stmt = conn.prepare(&format!(
                    "SELECT {EXERCISE_COLUMNS} FROM exercises
                     WHERE lesson_id = ?1 ORDER BY order_index"
                ))?;
                let exercises = stmt
                    .query_map(params![lesson.id], |row| {
                        Ok(exercise_from_row(row)?.view())
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(LessonDetail {
                    lesson,
                    status,
                    exercises,
                })
            })
            .await
    }

    pub async fn get_project(&self, project_id: String) -> Result<Project> {
        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, skill_id, title, description, schema_json
                     FROM projects WHERE id = ?1",
                    params![project_id],
                    project_from_row,
                )
                .optional()?
                .ok_or(FinquestError::NotFound("project"))
            })
            .await
    }
}

pub(crate) fn path_from_row(row: &rusqlite::Row) -> rusqlite::Result<LearningPath> {
    Ok(LearningPath {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        order_index: row.get(3)?,
        icon_name: row.get(4)?,
    })
}

pub(crate) fn skill_from_row(row: &rusqlite::Row) -> rusqlite::Result<Skill> {
    Ok(Skill {
        id: row.get(0)?,
        path_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        order_index: row.get(4)?,
        icon_name: row.get(5)?,
    })
}

pub(crate) fn lesson_from_row(row: &rusqlite::Row) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        skill_id: row.get(1)?,
        title: row.get(2)?,
        order_index: row.get(3)?,
        content: json_col(row, 4)?,
        is_published: row.get(5)?,
    })
}

pub(crate) fn project_from_row(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        skill_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        schema: json_col(row, 4)?,
    })
}

/// The exercise row with its decoded key, for the grader.
pub(crate) fn exercise_row(
    conn: &Connection,
    exercise_id: &str,
) -> Result<finquest_common::models::Exercise> {
    conn.query_row(
        &format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?1"),
        params![exercise_id],
        exercise_from_row,
    )
    .optional()?
    .ok_or(FinquestError::NotFound("exercise"))
}
