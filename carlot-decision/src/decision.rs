use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decision document from a provider. The result is provider-defined
/// and left opaque here; only the configured allow path is ever
/// interpreted. Providers disagree on the identifier spelling, so both
/// `ID` and `decision_id` are accepted on the wire.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct Decision {
    #[serde(rename = "decision_id", alias = "ID", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub result: Value,
}
