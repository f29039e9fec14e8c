use crate::{
    auth::AuthSession,
    error::AppError,
    models::{Task, TaskInput, TaskQuery, TaskUpdate},
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const TASK_COLUMNS: &str = "id, description, completed, owner_id, created_at, updated_at";

/// Retrieves the authenticated user's tasks.
///
/// Every query is composed with `owner_id = requester`, so other users' tasks
/// never appear in any result.
///
/// ## Query Parameters:
/// - `completed` (optional): filter by completion state.
/// - `limit` / `skip` (optional): pagination, both non-negative.
/// - `sortBy` (optional): `field:asc` or `field:desc`, where field is one of
///   `createdAt`, `updatedAt`, `description`, `completed`.
///
/// ## Responses:
/// - `200 OK`: JSON array of `Task` objects.
/// - `400 Bad Request`: malformed pagination or sort directive.
/// - `401 Unauthorized`: missing or invalid authentication token.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    session: AuthSession,
    query_params: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    query_params.validate_bounds()?;
    let sort = query_params.sort_clause()?;

    // Owner filter is part of the base query; everything else is appended.
    let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = $1");
    let mut param_count = 2;

    if query_params.completed.is_some() {
        sql.push_str(&format!(" AND completed = ${}", param_count));
        param_count += 1;
    }

    match sort {
        Some((column, direction)) => {
            // Column and direction come from a fixed table, never from input.
            sql.push_str(&format!(" ORDER BY {} {}", column, direction));
        }
        None => sql.push_str(" ORDER BY created_at ASC"),
    }

    if query_params.limit.is_some() {
        sql.push_str(&format!(" LIMIT ${}", param_count));
        param_count += 1;
    }
    if query_params.skip.is_some() {
        sql.push_str(&format!(" OFFSET ${}", param_count));
    }

    let mut query_builder = sqlx::query_as::<_, Task>(&sql).bind(session.user.id);

    if let Some(completed) = query_params.completed {
        query_builder = query_builder.bind(completed);
    }
    if let Some(limit) = query_params.limit {
        query_builder = query_builder.bind(limit);
    }
    if let Some(skip) = query_params.skip {
        query_builder = query_builder.bind(skip);
    }

    let tasks = query_builder.fetch_all(&**pool).await?;

    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task owned by the authenticated user.
///
/// ## Responses:
/// - `201 Created`: the new `Task` as JSON.
/// - `400 Bad Request`: description missing, empty, or too long.
/// - `401 Unauthorized`: missing or invalid authentication token.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    session: AuthSession,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = Task::new(task_data.into_inner(), session.user.id);

    let result = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (id, description, completed, owner_id)
         VALUES ($1, $2, $3, $4)
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(task.id)
    .bind(&task.description)
    .bind(task.completed)
    .bind(task.owner_id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(result))
}

/// Retrieves one of the authenticated user's tasks by id.
///
/// A task owned by somebody else yields the same 404 as a task that does not
/// exist.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    session: AuthSession,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND owner_id = $2"
    ))
    .bind(task_id.into_inner())
    .bind(session.user.id)
    .fetch_optional(&**pool)
    .await?;

    match task {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(AppError::NotFound("Task not found".into())),
    }
}

/// Updates allow-listed fields (`description`, `completed`) of an owned task.
///
/// Any other field in the payload fails the whole request with 400 and no
/// partial application. The owner filter is part of the UPDATE itself, so a
/// foreign task is indistinguishable from an absent one.
#[patch("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    session: AuthSession,
    task_id: web::Path<Uuid>,
    payload: web::Json<serde_json::Value>,
) -> Result<impl Responder, AppError> {
    let update = TaskUpdate::from_payload(payload.into_inner())?;

    let task = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks
         SET description = COALESCE($1, description),
             completed = COALESCE($2, completed),
             updated_at = now()
         WHERE id = $3 AND owner_id = $4
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(update.description)
    .bind(update.completed)
    .bind(task_id.into_inner())
    .bind(session.user.id)
    .fetch_optional(&**pool)
    .await?;

    match task {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(AppError::NotFound("Task not found".into())),
    }
}

/// Deletes an owned task by id, returning the deleted task.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    session: AuthSession,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "DELETE FROM tasks WHERE id = $1 AND owner_id = $2 RETURNING {TASK_COLUMNS}"
    ))
    .bind(task_id.into_inner())
    .bind(session.user.id)
    .fetch_optional(&**pool)
    .await?;

    match task {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(AppError::NotFound("Task not found".into())),
    }
}
