use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input document submitted to a decision provider. Built fresh for each
/// request and discarded once the decision is obtained.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct Input {
    pub action: String,
    pub resource: String,
    pub subject: String,
    #[serde(default)]
    pub context: HashMap<String, Value>,
}
