//! Teacher and classroom endpoints

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use lingo_common::db::models::{Classroom, ContentType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::db::classrooms;
use crate::db::content::{self, AllowlistFilter, QueryParams, ReviewItem};
use crate::db::membership;
use crate::pagination::parse_paging;
use crate::roles::{Caller, ResolvedRole, Role};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateClassroomRequest {
    #[serde(default)]
    pub name: String,
    /// Seat capacity
    pub students_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClassroomRequest {
    pub classroom_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AllowlistRequest {
    pub content_type: String,
    pub content_id: i64,
    /// Defaults to the teacher's first classroom
    #[serde(default)]
    pub classroom_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub language: Option<String>,
    pub cefr: Option<String>,
    pub subject: Option<String>,
    pub page: Option<String>,
    pub pagesize: Option<String>,
    pub whitelist: Option<String>,
    pub content_type: Option<String>,
    pub classroom_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassroomSummary {
    pub classroom_id: String,
    pub name: String,
    pub students_count: i64,
}

impl From<Classroom> for ClassroomSummary {
    fn from(classroom: Classroom) -> Self {
        Self {
            classroom_id: classroom.id,
            name: classroom.name,
            students_count: classroom.student_count,
        }
    }
}

/// The caller's teacher id; 403 for non-teachers
fn teacher_id(role: &ResolvedRole) -> ApiResult<&str> {
    role.require(Role::Teacher)?;
    role.teacher_id
        .as_deref()
        .ok_or_else(|| ApiError::Forbidden("Only teachers can access this endpoint.".to_string()))
}

/// The requested classroom, which must belong to the caller, or the
/// caller's first classroom
async fn owned_classroom(
    state: &AppState,
    role: &ResolvedRole,
    requested: Option<&str>,
) -> ApiResult<Classroom> {
    let teacher_id = teacher_id(role)?;

    match requested.map(str::trim).filter(|id| !id.is_empty()) {
        Some(classroom_id) => {
            let classroom = classrooms::get_classroom(&state.db, classroom_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Classroom not found".to_string()))?;
            if classroom.teacher_id != teacher_id {
                return Err(ApiError::Forbidden(
                    "Classroom does not belong to this teacher".to_string(),
                ));
            }
            Ok(classroom)
        }
        None => classrooms::classrooms_for_teacher(&state.db, teacher_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound("Teacher has no classroom".to_string())),
    }
}

fn parse_content_type(value: &str) -> ApiResult<ContentType> {
    value.parse::<ContentType>().map_err(|_| {
        ApiError::BadRequest("Content type must be News or Story".to_string())
    })
}

/// GET /teacher
pub async fn get_teacher(caller: Caller) -> Json<Value> {
    Json(json!({ "exists": caller.is_teacher() }))
}

/// GET /teacher/classroom
pub async fn get_classroom(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    let classroom = owned_classroom(&state, &caller, None).await?;
    let enrolled = classrooms::enrolled_count(&state.db, &classroom.id).await?;

    Ok(Json(json!({
        "classroom_id": classroom.id,
        "students_count": classroom.student_count,
        "enrolled_count": enrolled,
    })))
}

/// GET /teacher/classroom/list
pub async fn list_classrooms(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    let teacher_id = teacher_id(&caller)?;
    let classrooms: Vec<ClassroomSummary> = classrooms::classrooms_for_teacher(&state.db, teacher_id)
        .await?
        .into_iter()
        .map(ClassroomSummary::from)
        .collect();

    Ok(Json(json!({ "classrooms": classrooms })))
}

/// POST /teacher/classroom/create
///
/// Any non-student may create a classroom; a teacher record is created on
/// first use.
pub async fn create_classroom(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateClassroomRequest>,
) -> ApiResult<Json<Value>> {
    caller.forbid(Role::Student)?;

    if request.students_count < 1 {
        return Err(ApiError::BadRequest(
            "students_count must be at least 1".to_string(),
        ));
    }

    let teacher = membership::upsert_teacher(&state.db, &caller.user_id, None).await?;
    let classroom = classrooms::create_classroom(
        &state.db,
        &teacher.id,
        request.name.trim(),
        request.students_count,
    )
    .await?;

    info!(
        user_id = %caller.user_id,
        classroom_id = %classroom.id,
        capacity = classroom.student_count,
        "Classroom created"
    );

    Ok(Json(json!({ "classroom_id": classroom.id })))
}

/// POST /teacher/classroom/update
pub async fn update_classroom(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<UpdateClassroomRequest>,
) -> ApiResult<Json<Value>> {
    let classroom = owned_classroom(&state, &caller, Some(&request.classroom_id)).await?;

    classrooms::rename_classroom(&state.db, &classroom.id, &classroom.teacher_id, request.name.trim())
        .await?;

    Ok(Json(json!({ "classroom_id": classroom.id, "name": request.name.trim() })))
}

/// GET /teacher/classroom/content
pub async fn review_content(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ReviewQuery>,
) -> ApiResult<Json<Value>> {
    let classroom = owned_classroom(&state, &caller, query.classroom_id.as_deref()).await?;
    let paging = parse_paging(query.page.as_deref(), query.pagesize.as_deref())?;

    let content_type = match query.content_type.as_deref().map(str::trim) {
        None | Some("") => Some(ContentType::News),
        Some(value) if value.eq_ignore_ascii_case("all") => None,
        Some(value) => Some(parse_content_type(value)?),
    };

    let params = QueryParams {
        language: query.language.unwrap_or_default(),
        cefr: query.cefr.unwrap_or_default(),
        subject: query.subject.unwrap_or_default(),
        page: paging.page,
        page_size: paging.page_size,
        classroom_id: None,
    };

    let items: Vec<ReviewItem> = content::review_listing(
        &state.db,
        &classroom.id,
        content_type,
        AllowlistFilter::from_param(query.whitelist.as_deref()),
        &params,
    )
    .await?;

    Ok(Json(json!({ "content": items })))
}

/// POST /teacher/classroom/accept
pub async fn accept_content(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<AllowlistRequest>,
) -> ApiResult<Json<Value>> {
    let content_type = parse_content_type(&request.content_type)?;
    let classroom = owned_classroom(&state, &caller, request.classroom_id.as_deref()).await?;

    classrooms::accept_content(&state.db, &classroom.id, content_type, request.content_id).await?;
    info!(
        classroom_id = %classroom.id,
        %content_type,
        content_id = request.content_id,
        "Content accepted"
    );

    Ok(Json(json!({ "success": true })))
}

/// POST /teacher/classroom/reject
pub async fn reject_content(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<AllowlistRequest>,
) -> ApiResult<Json<Value>> {
    let content_type = parse_content_type(&request.content_type)?;
    let classroom = owned_classroom(&state, &caller, request.classroom_id.as_deref()).await?;

    classrooms::reject_content(&state.db, &classroom.id, content_type, request.content_id).await?;
    info!(
        classroom_id = %classroom.id,
        %content_type,
        content_id = request.content_id,
        "Content rejected"
    );

    Ok(Json(json!({ "success": true })))
}

pub fn teacher_routes() -> Router<AppState> {
    Router::new()
        .route("/teacher", get(get_teacher))
        .route("/teacher/classroom", get(get_classroom))
        .route("/teacher/classroom/list", get(list_classrooms))
        .route("/teacher/classroom/create", post(create_classroom))
        .route("/teacher/classroom/update", post(update_classroom))
        .route("/teacher/classroom/content", get(review_content))
        .route("/teacher/classroom/accept", post(accept_content))
        .route("/teacher/classroom/reject", post(reject_content))
}
