//! The unit of work handed from a fetcher worker to a parser worker through
//! the coordination store's parse queue.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseJob {
    pub url: String,
    pub domain: String,
    pub depth: u32,
    pub final_url: String,
    pub status_code: u16,
    pub content_type: String,
    pub body: String,
}

impl ParseJob {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ParseJob serialization never fails")
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
