//! Teacher and student records

use lingo_common::db::models::{Student, Teacher};
use lingo_common::Result;
use sqlx::SqlitePool;

use super::new_id;

pub async fn find_teacher(pool: &SqlitePool, user_id: &str) -> Result<Option<Teacher>> {
    let teacher = sqlx::query_as::<_, Teacher>(
        "SELECT id, user_id, organization_id FROM teachers WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(teacher)
}

pub async fn find_student(pool: &SqlitePool, user_id: &str) -> Result<Option<Student>> {
    let student = sqlx::query_as::<_, Student>(
        "SELECT id, user_id, classroom_id FROM students WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(student)
}

/// Id of the organization this user administers, if any
pub async fn find_admin_organization_id(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<String>> {
    let id: Option<String> =
        sqlx::query_scalar("SELECT id FROM organizations WHERE admin_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(id)
}

/// Create the user's teacher record, or move an existing one into
/// `organization_id` when given. A `None` organization never detaches a
/// teacher from its current organization.
pub async fn upsert_teacher(
    pool: &SqlitePool,
    user_id: &str,
    organization_id: Option<&str>,
) -> Result<Teacher> {
    sqlx::query(
        r#"
        INSERT INTO teachers (id, user_id, organization_id)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            organization_id = COALESCE(excluded.organization_id, teachers.organization_id)
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(organization_id)
    .execute(pool)
    .await?;

    let teacher = sqlx::query_as::<_, Teacher>(
        "SELECT id, user_id, organization_id FROM teachers WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(teacher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        lingo_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_upsert_teacher_is_idempotent() {
        let pool = setup_db().await;

        let first = upsert_teacher(&pool, "u1", None).await.unwrap();
        let second = upsert_teacher(&pool, "u1", None).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.organization_id.is_none());
    }

    #[tokio::test]
    async fn test_upsert_teacher_keeps_organization_when_none_given() {
        let pool = setup_db().await;
        sqlx::query("INSERT INTO organizations (id, admin_id) VALUES ('org-1', 'admin')")
            .execute(&pool)
            .await
            .unwrap();

        upsert_teacher(&pool, "u1", Some("org-1")).await.unwrap();
        let teacher = upsert_teacher(&pool, "u1", None).await.unwrap();

        assert_eq!(teacher.organization_id.as_deref(), Some("org-1"));
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_records() {
        let pool = setup_db().await;

        assert!(find_teacher(&pool, "ghost").await.unwrap().is_none());
        assert!(find_student(&pool, "ghost").await.unwrap().is_none());
        assert!(find_admin_organization_id(&pool, "ghost").await.unwrap().is_none());
    }
}
