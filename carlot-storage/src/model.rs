use serde::{Deserialize, Serialize};

/// Identifier envelope returned by create endpoints.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct ID {
    pub id: String,
}
