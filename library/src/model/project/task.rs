use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pipeline::Pipeline;

/// One independently built unit of work.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub pipeline: Pipeline,
}

impl Task {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            enabled: true,
            pipeline: Pipeline::new(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}
