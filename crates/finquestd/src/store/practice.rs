//! Practice queue selection.
//!
//! Review-first: exercises the learner recently missed come first, most
//! recent miss first, then the queue backfills with exercises from lessons
//! the learner has completed, in curriculum order, until it reaches the
//! configured size.

use rusqlite::{params, Connection};
use serde::Serialize;

use super::{exercise_from_row, Store, EXERCISE_COLUMNS};
use finquest_common::models::ExerciseView;
use finquest_common::Result;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQueue {
    pub exercises: Vec<ExerciseView>,
    /// How many of the leading entries are review items (recent misses).
    pub review_count: usize,
}

impl Store {
    pub async fn practice_queue(&self, user_id: String) -> Result<PracticeQueue> {
        let queue_size = self.config.practice_queue_size;
        let miss_window = self.config.practice_miss_window;
        self.db
            .call(move |conn| practice_queue_tx(conn, &user_id, queue_size, miss_window))
            .await
    }
}

pub(crate) fn practice_queue_tx(
    conn: &Connection,
    user_id: &str,
    queue_size: usize,
    miss_window: usize,
) -> Result<PracticeQueue> {
    // Recent misses, newest first. Dedup keeps the first occurrence so an
    // exercise missed twice sorts by its latest miss.
    let mut stmt = conn.prepare(
        "SELECT a.exercise_id FROM attempts a
         JOIN exercises e ON a.exercise_id = e.id
         JOIN lessons l ON e.lesson_id = l.id
         WHERE a.user_id = ?1 AND a.is_correct = 0 AND l.is_published = 1
         ORDER BY a.created_at DESC, a.rowid DESC
         LIMIT ?2",
    )?;
    let recent: Vec<String> = stmt
        .query_map(params![user_id, miss_window as i64], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut missed_ids: Vec<String> = Vec::new();
    for id in recent {
        if !missed_ids.contains(&id) {
            missed_ids.push(id);
        }
    }
    missed_ids.truncate(queue_size);

    let mut exercises = Vec::with_capacity(queue_size);
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?1"
    ))?;
    for id in &missed_ids {
        let exercise = stmt.query_row(params![id], exercise_from_row)?;
        exercises.push(exercise.view());
    }
    let review_count = exercises.len();

    if exercises.len() < queue_size {
        let mut stmt = conn.prepare(
            "SELECT e.id, e.lesson_id, e.type, e.prompt, e.options_json, e.answer_json,
                    e.explanation, e.hint, e.tags_json, e.order_index
             FROM exercises e
             JOIN lessons l ON e.lesson_id = l.id
             JOIN skills s ON l.skill_id = s.id
             JOIN paths p ON s.path_id = p.id
             JOIN progress pr ON pr.lesson_id = l.id
             WHERE pr.user_id = ?1 AND pr.status = 'completed' AND l.is_published = 1
             ORDER BY p.order_index, s.order_index, l.order_index, e.order_index",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        while let Some(row) = rows.next()? {
            if exercises.len() >= queue_size {
                break;
            }
            let exercise = exercise_from_row(row)?;
            if !missed_ids.contains(&exercise.id) {
                exercises.push(exercise.view());
            }
        }
    }

    Ok(PracticeQueue {
        exercises,
        review_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn seed(conn: &Connection, exercise_count: usize) {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (id, email, display_name, role, created_at)
             VALUES ('u1', 'u1@example.com', 'Test', 'user', ?1)",
            params![now],
        )
        .unwrap();
        conn.execute_batch(
            "INSERT INTO paths (id, title, description, order_index) VALUES ('p1', 'P', 'd', 0);
             INSERT INTO skills (id, path_id, title, description, order_index)
                VALUES ('s1', 'p1', 'S', 'd', 0);
             INSERT INTO lessons (id, skill_id, title, order_index, content_json)
                VALUES ('l1', 's1', 'L', 0, '[]');",
        )
        .unwrap();
        for i in 0..exercise_count {
            conn.execute(
                "INSERT INTO exercises (id, lesson_id, type, prompt, answer_json, explanation, order_index)
                 VALUES (?1, 'l1', 'true_false', 'q', '{\"correct\": true}', 'e', ?2)",
                params![format!("e{i}"), i as i64],
            )
            .unwrap();
        }
    }

    fn mark_completed(conn: &Connection, lesson_id: &str) {
        conn.execute(
            "INSERT INTO progress (id, user_id, skill_id, lesson_id, status, mastery_score, updated_at)
             VALUES (?1, 'u1', 's1', ?2, 'completed', 1.0, ?3)",
            params![Uuid::new_v4().to_string(), lesson_id, Utc::now()],
        )
        .unwrap();
    }

    fn record_miss(conn: &Connection, exercise_id: &str, at: &str) {
        conn.execute(
            "INSERT INTO attempts (id, user_id, exercise_id, answer_json, is_correct, created_at)
             VALUES (?1, 'u1', ?2, '{}', 0, ?3)",
            params![Uuid::new_v4().to_string(), exercise_id, at],
        )
        .unwrap();
    }

    #[test]
    fn test_misses_lead_most_recent_first() {
        let conn = test_conn();
        seed(&conn, 15);
        mark_completed(&conn, "l1");
        record_miss(&conn, "e3", "2025-06-01T10:00:00Z");
        record_miss(&conn, "e7", "2025-06-02T10:00:00Z");
        record_miss(&conn, "e5", "2025-06-03T10:00:00Z");

        let queue = practice_queue_tx(&conn, "u1", 10, 20).unwrap();
        assert_eq!(queue.review_count, 3);
        let ids: Vec<_> = queue.exercises.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(&ids[..3], &["e5", "e7", "e3"]);
        // Backfilled to the full queue size in curriculum order, no repeats.
        assert_eq!(ids.len(), 10);
        assert_eq!(&ids[3..5], &["e0", "e1"]);
    }

    #[test]
    fn test_repeat_miss_dedups_to_latest() {
        let conn = test_conn();
        seed(&conn, 5);
        mark_completed(&conn, "l1");
        record_miss(&conn, "e2", "2025-06-01T10:00:00Z");
        record_miss(&conn, "e4", "2025-06-02T10:00:00Z");
        record_miss(&conn, "e2", "2025-06-03T10:00:00Z");

        let queue = practice_queue_tx(&conn, "u1", 10, 20).unwrap();
        assert_eq!(queue.review_count, 2);
        let ids: Vec<_> = queue.exercises.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(&ids[..2], &["e2", "e4"]);
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_no_misses_fills_from_completed_lessons() {
        let conn = test_conn();
        seed(&conn, 3);
        mark_completed(&conn, "l1");
        let queue = practice_queue_tx(&conn, "u1", 10, 20).unwrap();
        assert_eq!(queue.review_count, 0);
        let ids: Vec<_> = queue.exercises.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e0", "e1", "e2"]);
    }

    #[test]
    fn test_nothing_completed_and_no_misses_is_empty() {
        let conn = test_conn();
        seed(&conn, 3);
        let queue = practice_queue_tx(&conn, "u1", 10, 20).unwrap();
        assert!(queue.exercises.is_empty());
        assert_eq!(queue.review_count, 0);
    }

    #[test]
    fn test_queue_caps_at_configured_size() {
        let conn = test_conn();
        seed(&conn, 25);
        for i in 0..12 {
            record_miss(&conn, &format!("e{i}"), &format!("2025-06-01T10:{i:02}:00Z"));
        }
        let queue = practice_queue_tx(&conn, "u1", 10, 20).unwrap();
        assert_eq!(queue.exercises.len(), 10);
        assert_eq!(queue.review_count, 10);
    }

    #[test]
    fn test_miss_window_bounds_review_lookback() {
        let conn = test_conn();
        seed(&conn, 10);
        // Oldest miss falls outside a window of 2.
        record_miss(&conn, "e0", "2025-06-01T10:00:00Z");
        record_miss(&conn, "e1", "2025-06-02T10:00:00Z");
        record_miss(&conn, "e2", "2025-06-03T10:00:00Z");

        let queue = practice_queue_tx(&conn, "u1", 10, 2).unwrap();
        assert_eq!(queue.review_count, 2);
        let ids: Vec<_> = queue.exercises.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(&ids[..2], &["e2", "e1"]);
    }
}
