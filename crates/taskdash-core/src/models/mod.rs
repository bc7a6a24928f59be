//! Data models for the ML task backend.
//!
//! Every backend payload has two shapes here:
//!
//! - a `*Schema` type mirroring the snake_case wire format exactly
//! - a domain type used by the rest of the crate
//!
//! Conversion between them is an explicit `From` impl that touches every
//! field, including the nested optional `file` and `predict` objects.

pub mod ml_model;
pub mod page;
pub mod task;
mod timestamp;

pub use ml_model::MlModel;
pub use page::{Page, PageSchema};
pub use task::{
    Prediction, PredictionSchema, Task, TaskDetail, TaskDetailSchema, TaskFile, TaskFileSchema,
    TaskSchema,
};
