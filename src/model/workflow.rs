//! Workflow definitions (read-only from this client).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Entity;

/// A named definition of inputs, outputs, events and variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Workflow {
    fn key(&self) -> &str {
        &self.id
    }

    fn merge_from(&mut self, incoming: &Self) {
        self.name = incoming.name.clone();
        self.input = incoming.input.clone();
        self.outputs = incoming.outputs.clone();
        self.events = incoming.events.clone();
        self.variables = incoming.variables.clone();
    }
}
