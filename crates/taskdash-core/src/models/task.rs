use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Wire schemas (snake_case, exactly as the backend sends them)
// ============================================================================

/// Task row as returned by `GET /api/v1/ml/tasks/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSchema {
    pub id: String,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub created_on: DateTime<Utc>,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub updated_on: DateTime<Utc>,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Uploaded file attached to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFileSchema {
    pub id: String,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub created_on: DateTime<Utc>,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub updated_on: DateTime<Utc>,
    pub url: String,
    pub original_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionSchema {
    pub id: String,
    pub result: String,
    pub probability: f64,
}

/// Task detail as returned by `GET`/`PUT /api/v1/ml/tasks/{id}/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetailSchema {
    pub id: String,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub created_on: DateTime<Utc>,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub updated_on: DateTime<Utc>,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file: Option<TaskFileSchema>,
    #[serde(default)]
    pub predict: Option<PredictionSchema>,
}

// ============================================================================
// Domain types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub status: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFile {
    pub id: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub url: String,
    pub original_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub id: String,
    pub result: String,
    pub probability: f64,
}

impl Prediction {
    /// Probability rendered as a percentage, e.g. "87.5%"
    pub fn probability_display(&self) -> String {
        format!("{:.1}%", self.probability * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDetail {
    pub id: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub status: String,
    pub message: Option<String>,
    pub file: Option<TaskFile>,
    pub predict: Option<Prediction>,
}

// ============================================================================
// Wire -> domain mapping
// ============================================================================

impl From<TaskSchema> for Task {
    fn from(raw: TaskSchema) -> Self {
        Self {
            id: raw.id,
            created_on: raw.created_on,
            updated_on: raw.updated_on,
            status: raw.status,
            message: raw.message,
        }
    }
}

impl From<TaskFileSchema> for TaskFile {
    fn from(raw: TaskFileSchema) -> Self {
        Self {
            id: raw.id,
            created_on: raw.created_on,
            updated_on: raw.updated_on,
            url: raw.url,
            original_name: raw.original_name,
        }
    }
}

impl From<PredictionSchema> for Prediction {
    fn from(raw: PredictionSchema) -> Self {
        Self {
            id: raw.id,
            result: raw.result,
            probability: raw.probability,
        }
    }
}

impl From<TaskDetailSchema> for TaskDetail {
    fn from(raw: TaskDetailSchema) -> Self {
        Self {
            id: raw.id,
            created_on: raw.created_on,
            updated_on: raw.updated_on,
            status: raw.status,
            message: raw.message,
            file: raw.file.map(TaskFile::from),
            predict: raw.predict.map(Prediction::from),
        }
    }
}
