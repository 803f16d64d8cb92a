//! Classrooms, enrollment and the per-classroom content allowlist

use lingo_common::db::models::{Classroom, ContentType, Student};
use lingo_common::{Error, Result};
use sqlx::SqlitePool;

use super::{is_unique_violation, new_id};

/// Result of a join attempt
#[derive(Debug)]
pub enum JoinOutcome {
    Joined(Student),
    /// The user already belongs to a classroom
    AlreadyEnrolled,
    /// Enrolled students already fill the seat capacity
    Full,
}

pub async fn create_classroom(
    pool: &SqlitePool,
    teacher_id: &str,
    name: &str,
    capacity: i64,
) -> Result<Classroom> {
    if capacity < 0 {
        return Err(Error::InvalidInput(format!(
            "Student count must not be negative, got {}",
            capacity
        )));
    }

    let id = new_id();
    sqlx::query(
        "INSERT INTO classrooms (id, teacher_id, name, student_count) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(teacher_id)
    .bind(name)
    .bind(capacity)
    .execute(pool)
    .await?;

    Ok(Classroom {
        id,
        teacher_id: teacher_id.to_string(),
        name: name.to_string(),
        student_count: capacity,
    })
}

pub async fn get_classroom(pool: &SqlitePool, classroom_id: &str) -> Result<Option<Classroom>> {
    let classroom = sqlx::query_as::<_, Classroom>(
        "SELECT id, teacher_id, name, student_count FROM classrooms WHERE id = ?",
    )
    .bind(classroom_id)
    .fetch_optional(pool)
    .await?;

    Ok(classroom)
}

/// Every classroom of a teacher, oldest first
pub async fn classrooms_for_teacher(pool: &SqlitePool, teacher_id: &str) -> Result<Vec<Classroom>> {
    let classrooms = sqlx::query_as::<_, Classroom>(
        r#"
        SELECT id, teacher_id, name, student_count
        FROM classrooms
        WHERE teacher_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await?;

    Ok(classrooms)
}

/// Rename a classroom owned by `teacher_id`. Returns false when the teacher
/// does not own a classroom with that id.
pub async fn rename_classroom(
    pool: &SqlitePool,
    classroom_id: &str,
    teacher_id: &str,
    name: &str,
) -> Result<bool> {
    let result = sqlx::query("UPDATE classrooms SET name = ? WHERE id = ? AND teacher_id = ?")
        .bind(name)
        .bind(classroom_id)
        .bind(teacher_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn enrolled_count(pool: &SqlitePool, classroom_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE classroom_id = ?")
        .bind(classroom_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Enroll `user_id` in a classroom.
///
/// The capacity check and the insert are a single statement. The unique
/// `students.user_id` column rejects a second enrollment.
pub async fn join_classroom(
    pool: &SqlitePool,
    user_id: &str,
    classroom_id: &str,
) -> Result<JoinOutcome> {
    let id = new_id();
    let inserted = sqlx::query(
        r#"
        INSERT INTO students (id, user_id, classroom_id)
        SELECT ?1, ?2, c.id
        FROM classrooms c
        WHERE c.id = ?3
          AND (SELECT COUNT(*) FROM students s WHERE s.classroom_id = c.id) < c.student_count
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(classroom_id)
    .execute(pool)
    .await;

    match inserted {
        Ok(result) if result.rows_affected() == 1 => Ok(JoinOutcome::Joined(Student {
            id,
            user_id: user_id.to_string(),
            classroom_id: classroom_id.to_string(),
        })),
        Ok(_) => Ok(JoinOutcome::Full),
        Err(e) if is_unique_violation(&e) => Ok(JoinOutcome::AlreadyEnrolled),
        Err(e) => Err(e.into()),
    }
}

// ========================================
// Allowlist
// ========================================

/// Add content to a classroom's allowlist; accepting twice is a no-op
pub async fn accept_content(
    pool: &SqlitePool,
    classroom_id: &str,
    content_type: ContentType,
    content_id: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO accepted_content (classroom_id, content_type, content_id)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(classroom_id)
    .bind(content_type.as_str())
    .bind(content_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn reject_content(
    pool: &SqlitePool,
    classroom_id: &str,
    content_type: ContentType,
    content_id: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM accepted_content
        WHERE classroom_id = ? AND content_type = ? AND content_id = ?
        "#,
    )
    .bind(classroom_id)
    .bind(content_type.as_str())
    .bind(content_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn is_content_accepted(
    pool: &SqlitePool,
    classroom_id: &str,
    content_type: ContentType,
    content_id: i64,
) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1 FROM accepted_content
        WHERE classroom_id = ? AND content_type = ? AND content_id = ?
        "#,
    )
    .bind(classroom_id)
    .bind(content_type.as_str())
    .bind(content_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}
