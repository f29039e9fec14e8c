use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Fields a PATCH /tasks/{id} payload is allowed to touch.
pub const TASK_UPDATE_FIELDS: [&str; 2] = ["description", "completed"];

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// Free-form description of the task.
    pub description: String,
    /// Whether the task is done. Defaults to false.
    pub completed: bool,
    /// Identifier of the user who owns the task.
    pub owner_id: Uuid,
    /// Timestamp of when the task was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update to the task.
    pub updated_at: DateTime<Utc>,
}

/// Input structure for creating a task.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// Description of the task. Must be between 1 and 1000 characters.
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    /// Completion state; defaults to false when omitted.
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Creates a new `Task` from `TaskInput` and the owning user's id.
    /// Sets `created_at` and `updated_at` to now and `id` to a fresh UUID.
    pub fn new(input: TaskInput, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: input.description,
            completed: input.completed,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Typed view of an allow-listed task update.
#[derive(Debug, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 1000))]
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl TaskUpdate {
    /// Parses a raw JSON payload, rejecting any key outside
    /// `TASK_UPDATE_FIELDS` before looking at values.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, AppError> {
        let map = payload
            .as_object()
            .ok_or_else(|| AppError::Validation("Update payload must be a JSON object".into()))?;

        if map.is_empty() {
            return Err(AppError::Validation("Update payload must not be empty".into()));
        }

        for key in map.keys() {
            if !TASK_UPDATE_FIELDS.contains(&key.as_str()) {
                return Err(AppError::Validation(format!(
                    "Invalid update field: {}",
                    key
                )));
            }
        }

        let update: TaskUpdate = serde_json::from_value(payload)
            .map_err(|e| AppError::Validation(format!("Invalid update payload: {}", e)))?;

        update.validate()?;
        Ok(update)
    }
}

/// Query parameters accepted when listing tasks.
///
/// `sortBy` takes the form `field:asc` or `field:desc`.
#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    /// Filter by completion state.
    pub completed: Option<bool>,
    /// Maximum number of tasks to return.
    pub limit: Option<i64>,
    /// Number of tasks to skip before the first returned one.
    pub skip: Option<i64>,
    /// Sort directive, e.g. `createdAt:desc`.
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

impl TaskQuery {
    /// Resolves the `sortBy` directive to a sortable column and direction.
    ///
    /// Only known columns are accepted; the directive feeds directly into an
    /// ORDER BY clause, so nothing caller-controlled may pass through verbatim.
    pub fn sort_clause(&self) -> Result<Option<(&'static str, &'static str)>, AppError> {
        let directive = match &self.sort_by {
            Some(s) => s,
            None => return Ok(None),
        };

        let (field, direction) = directive.split_once(':').ok_or_else(|| {
            AppError::Validation("sortBy must take the form field:asc or field:desc".into())
        })?;

        let column = match field {
            "createdAt" | "created_at" => "created_at",
            "updatedAt" | "updated_at" => "updated_at",
            "description" => "description",
            "completed" => "completed",
            other => {
                return Err(AppError::Validation(format!(
                    "Cannot sort by field: {}",
                    other
                )))
            }
        };

        let order = match direction {
            "asc" => "ASC",
            "desc" => "DESC",
            other => {
                return Err(AppError::Validation(format!(
                    "Invalid sort direction: {}",
                    other
                )))
            }
        };

        Ok(Some((column, order)))
    }

    /// Validates pagination bounds. Negative values make no sense and are
    /// rejected rather than clamped.
    pub fn validate_bounds(&self) -> Result<(), AppError> {
        if self.limit.is_some_and(|l| l < 0) {
            return Err(AppError::Validation("limit must not be negative".into()));
        }
        if self.skip.is_some_and(|s| s < 0) {
            return Err(AppError::Validation("skip must not be negative".into()));
        }
        Ok(())
    }
}
