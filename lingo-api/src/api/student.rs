//! Student endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::db::classrooms::{self, JoinOutcome};
use crate::roles::{Caller, Role};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct JoinClassroomRequest {
    pub classroom_id: String,
}

/// GET /student
pub async fn get_student(caller: Caller) -> Json<Value> {
    Json(json!({
        "student_id": caller.student_id.clone().unwrap_or_default(),
        "classroom_id": caller.classroom_id.clone().unwrap_or_default(),
    }))
}

/// GET /student/classroom
pub async fn get_classroom(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    caller.require(Role::Student)?;
    let classroom_id = caller.classroom_id.as_deref().unwrap_or_default();

    let classroom = classrooms::get_classroom(&state.db, classroom_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Classroom not found".to_string()))?;

    Ok(Json(json!({
        "teacher_id": classroom.teacher_id,
        "students_count": classroom.student_count,
    })))
}

/// POST /student/classroom/join
pub async fn join_classroom(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<JoinClassroomRequest>,
) -> ApiResult<Json<Value>> {
    caller.forbid(Role::Teacher)?;

    let classroom = classrooms::get_classroom(&state.db, request.classroom_id.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("Classroom not found".to_string()))?;

    if caller.is_student() {
        return Err(ApiError::Conflict(
            "User already belongs to a classroom".to_string(),
        ));
    }

    match classrooms::join_classroom(&state.db, &caller.user_id, &classroom.id).await? {
        JoinOutcome::Joined(student) => {
            info!(
                user_id = %caller.user_id,
                student_id = %student.id,
                classroom_id = %classroom.id,
                "Student joined classroom"
            );
            Ok(Json(json!({ "message": "Joined classroom successfully" })))
        }
        JoinOutcome::AlreadyEnrolled => Err(ApiError::Conflict(
            "User already belongs to a classroom".to_string(),
        )),
        JoinOutcome::Full => Err(ApiError::Conflict("Classroom is full".to_string())),
    }
}

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/student", get(get_student))
        .route("/student/classroom", get(get_classroom))
        .route("/student/classroom/join", post(join_classroom))
}
