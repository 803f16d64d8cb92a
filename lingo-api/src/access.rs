//! Content access gate
//!
//! Students enrolled in a classroom may only read news and stories their
//! teacher has accepted. Everyone else reads without restriction.

use lingo_common::db::models::ContentType;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::classrooms;
use crate::roles::ResolvedRole;
use crate::{ApiError, ApiResult};

pub async fn check_content_access(
    pool: &SqlitePool,
    role: &ResolvedRole,
    content_type: ContentType,
    content_id: i64,
) -> ApiResult<()> {
    let Some(classroom_id) = role.classroom_id.as_deref() else {
        return Ok(());
    };

    if classrooms::is_content_accepted(pool, classroom_id, content_type, content_id).await? {
        return Ok(());
    }

    debug!(
        user_id = %role.user_id,
        classroom_id,
        %content_type,
        content_id,
        "Content not on classroom allowlist"
    );
    Err(ApiError::Forbidden(
        "Content not accepted in classroom".to_string(),
    ))
}

/// Classroom whose allowlist restricts the caller's listings, if any
pub fn listing_restriction(role: &ResolvedRole) -> Option<String> {
    role.classroom_id.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::membership::upsert_teacher;
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

    fn student_in(classroom_id: &str) -> ResolvedRole {
        ResolvedRole {
            user_id: "student".to_string(),
            student_id: Some("st-1".to_string()),
            classroom_id: Some(classroom_id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_non_student_is_unrestricted() {
        let pool = setup_db().await;
        let role = ResolvedRole {
            user_id: "reader".to_string(),
            ..Default::default()
        };

        assert!(check_content_access(&pool, &role, ContentType::News, 42).await.is_ok());
        assert_eq!(listing_restriction(&role), None);
    }

    #[tokio::test]
    async fn test_student_needs_matching_type_on_allowlist() {
        let pool = setup_db().await;
        let teacher = upsert_teacher(&pool, "t", None).await.unwrap();
        let classroom = classrooms::create_classroom(&pool, &teacher.id, "c", 5)
            .await
            .unwrap();
        classrooms::accept_content(&pool, &classroom.id, ContentType::News, 3)
            .await
            .unwrap();
        let role = student_in(&classroom.id);

        assert!(check_content_access(&pool, &role, ContentType::News, 3).await.is_ok());

        // Story 3 is a different item from news 3
        let denied = check_content_access(&pool, &role, ContentType::Story, 3).await;
        assert!(matches!(denied, Err(ApiError::Forbidden(ref m)) if m == "Content not accepted in classroom"));

        assert!(check_content_access(&pool, &role, ContentType::News, 4).await.is_err());
    }
}
