//! Caller role resolution
//!
//! A user may be a teacher, a student, an organization admin, any mix of
//! these, or none. The role is resolved once per request by the [`Caller`]
//! extractor; handlers receive it explicitly and never re-query it.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use lingo_common::Result;
use sqlx::SqlitePool;
use std::fmt;
use std::ops::Deref;
use tracing::debug;

use crate::auth::Subject;
use crate::db::membership;
use crate::{ApiError, ApiResult, AppState};

/// Role predicates a handler can require or forbid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Teacher,
    Student,
    Admin,
}

impl Role {
    fn plural(self) -> &'static str {
        match self {
            Role::Teacher => "teachers",
            Role::Student => "students",
            Role::Admin => "admins",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Teacher => f.write_str("teacher"),
            Role::Student => f.write_str("student"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// Everything known about the caller's memberships
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRole {
    pub user_id: String,
    pub teacher_id: Option<String>,
    /// Organization the caller teaches in
    pub organization_id: Option<String>,
    pub student_id: Option<String>,
    pub classroom_id: Option<String>,
    /// Organization the caller administers
    pub admin_organization_id: Option<String>,
}

impl ResolvedRole {
    pub fn is_teacher(&self) -> bool {
        self.teacher_id.is_some()
    }

    pub fn is_student(&self) -> bool {
        self.student_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.admin_organization_id.is_some()
    }

    /// No teacher, student or admin record
    pub fn is_none(&self) -> bool {
        !self.is_teacher() && !self.is_student() && !self.is_admin()
    }

    pub fn has(&self, role: Role) -> bool {
        match role {
            Role::Teacher => self.is_teacher(),
            Role::Student => self.is_student(),
            Role::Admin => self.is_admin(),
        }
    }

    /// 403 unless the caller holds `role`
    pub fn require(&self, role: Role) -> ApiResult<()> {
        if self.has(role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Only {} can access this endpoint.",
                role.plural()
            )))
        }
    }

    /// 403 when the caller holds `role`
    pub fn forbid(&self, role: Role) -> ApiResult<()> {
        if self.has(role) {
            let plural = role.plural();
            let mut chars = plural.chars();
            let capitalized: String = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            Err(ApiError::Forbidden(format!(
                "{} cannot access this endpoint.",
                capitalized
            )))
        } else {
            Ok(())
        }
    }
}

/// Run the three membership lookups concurrently.
///
/// Any failed lookup fails the whole resolution; an error is never read as
/// "no such role".
pub async fn resolve_role(pool: &SqlitePool, user_id: &str) -> Result<ResolvedRole> {
    let (teacher, student, admin_organization_id) = tokio::try_join!(
        membership::find_teacher(pool, user_id),
        membership::find_student(pool, user_id),
        membership::find_admin_organization_id(pool, user_id),
    )?;

    let (teacher_id, organization_id) = match teacher {
        Some(t) => (Some(t.id), t.organization_id),
        None => (None, None),
    };
    let (student_id, classroom_id) = match student {
        Some(s) => (Some(s.id), Some(s.classroom_id)),
        None => (None, None),
    };

    Ok(ResolvedRole {
        user_id: user_id.to_string(),
        teacher_id,
        organization_id,
        student_id,
        classroom_id,
        admin_organization_id,
    })
}

/// Authenticated caller with its resolved role
#[derive(Debug, Clone)]
pub struct Caller(pub ResolvedRole);

impl Deref for Caller {
    type Target = ResolvedRole;

    fn deref(&self) -> &ResolvedRole {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let subject = Subject::from_request_parts(parts, state).await?;
        let role = resolve_role(&state.db, subject.as_str()).await?;

        debug!(
            user_id = %role.user_id,
            teacher = role.is_teacher(),
            student = role.is_student(),
            admin = role.is_admin(),
            "Resolved caller role"
        );

        Ok(Caller(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{classrooms, membership::upsert_teacher, organizations};
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
    async fn test_user_without_records_is_none() {
        let pool = setup_db().await;

        let role = resolve_role(&pool, "nobody").await.unwrap();

        assert!(role.is_none());
        assert_eq!(role.user_id, "nobody");
    }

    #[tokio::test]
    async fn test_admin_is_also_teacher_of_own_organization() {
        let pool = setup_db().await;
        let (organization, teacher) = organizations::create_organization(&pool, "admin")
            .await
            .unwrap();

        let role = resolve_role(&pool, "admin").await.unwrap();

        assert!(role.is_admin());
        assert!(role.is_teacher());
        assert!(!role.is_student());
        assert_eq!(role.teacher_id.as_deref(), Some(teacher.id.as_str()));
        assert_eq!(role.organization_id.as_deref(), Some(organization.id.as_str()));
        assert_eq!(role.admin_organization_id.as_deref(), Some(organization.id.as_str()));
    }

    #[tokio::test]
    async fn test_student_carries_classroom() {
        let pool = setup_db().await;
        let teacher = upsert_teacher(&pool, "t", None).await.unwrap();
        let classroom = classrooms::create_classroom(&pool, &teacher.id, "c", 3)
            .await
            .unwrap();
        classrooms::join_classroom(&pool, "s", &classroom.id).await.unwrap();

        let role = resolve_role(&pool, "s").await.unwrap();

        assert!(role.is_student());
        assert!(!role.is_teacher());
        assert_eq!(role.classroom_id.as_deref(), Some(classroom.id.as_str()));
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let pool = setup_db().await;
        sqlx::query("DROP TABLE organizations").execute(&pool).await.unwrap();

        assert!(resolve_role(&pool, "anyone").await.is_err());
    }

    #[test]
    fn test_require_and_forbid_messages() {
        let student = ResolvedRole {
            user_id: "s".to_string(),
            student_id: Some("st".to_string()),
            classroom_id: Some("c".to_string()),
            ..Default::default()
        };

        match student.require(Role::Teacher) {
            Err(ApiError::Forbidden(msg)) => assert_eq!(msg, "Only teachers can access this endpoint."),
            other => panic!("unexpected: {:?}", other),
        }
        match student.forbid(Role::Student) {
            Err(ApiError::Forbidden(msg)) => assert_eq!(msg, "Students cannot access this endpoint."),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(student.require(Role::Student).is_ok());
        assert!(student.forbid(Role::Teacher).is_ok());
    }
}
