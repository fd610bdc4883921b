use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkItemError};
use crate::roles::Role;

/// One note requirement declared by a tag schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequirement {
    /// Note key that must exist on the item
    pub key: String,
    /// Ladder phase by which the note must have been produced
    pub role: Role,
    /// Whether a missing note blocks role entry
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_required() -> bool {
    true
}

/// Pure mapping from an item's tag set to its note requirements.
///
/// The provider is read-only and shared without synchronization; gate
/// checks call it with the parsed tag set of the item under transition.
pub trait NoteSchemaService: Send + Sync {
    fn requirements_for(&self, tags: &[String]) -> Vec<NoteRequirement>;
}

/// Schema-free mode: no tag carries requirements, no gate ever trips on
/// notes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpNoteSchemaService;

impl NoteSchemaService for NoOpNoteSchemaService {
    fn requirements_for(&self, _tags: &[String]) -> Vec<NoteRequirement> {
        Vec::new()
    }
}

/// Fixed tag → requirements map, deduplicating by key across tags.
///
/// Deployments build one from configuration JSON shaped as
/// `{"<tag>": [{"key": ..., "role": ..., "required"?: ..., "description"?: ...}]}`;
/// tests construct it directly.
#[derive(Debug, Default, Clone)]
pub struct StaticNoteSchemaService {
    by_tag: HashMap<String, Vec<NoteRequirement>>,
}

impl StaticNoteSchemaService {
    pub fn new(by_tag: HashMap<String, Vec<NoteRequirement>>) -> Self {
        Self { by_tag }
    }

    /// Parse the configuration JSON shape.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let by_tag: HashMap<String, Vec<NoteRequirement>> = serde_json::from_value(value)
            .map_err(|e| WorkItemError::Configuration(format!("invalid note schema: {e}")))?;
        Ok(Self::new(by_tag))
    }

    /// Register the requirements of a single tag.
    pub fn with_tag(mut self, tag: &str, requirements: Vec<NoteRequirement>) -> Self {
        self.by_tag.insert(tag.to_ascii_lowercase(), requirements);
        self
    }
}

impl NoteSchemaService for StaticNoteSchemaService {
    fn requirements_for(&self, tags: &[String]) -> Vec<NoteRequirement> {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for tag in tags {
            if let Some(reqs) = self.by_tag.get(tag.as_str()) {
                for req in reqs {
                    if !seen.contains(&req.key) {
                        seen.push(req.key.clone());
                        out.push(req.clone());
                    }
                }
            }
        }
        out
    }
}
