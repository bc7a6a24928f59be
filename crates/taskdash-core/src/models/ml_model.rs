use serde::{Deserialize, Serialize};

/// An inference model a task can be created against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlModel {
    pub id: String,
    pub name: String,
}
