use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use crate::{Decider, Decision, Input};

/// Decider that always returns the same pre-built decision. Used for the
/// allow-all and deny-all deployment modes and for tests.
#[derive(Debug, Clone)]
pub struct FixedDecider {
    decision: Decision,
}

impl FixedDecider {
    pub fn new(decision: Decision) -> Self {
        Self { decision }
    }

    pub fn allow_all() -> Self {
        Self::new(canned(true))
    }

    pub fn deny_all() -> Self {
        Self::new(canned(false))
    }
}

fn canned(allowed: bool) -> Decision {
    Decision {
        id: "ffffffff-ffff-ffff-ffff-ffffffffffff".to_owned(),
        result: json!({
            "allowed": allowed,
            "outcome": {
                "allow": allowed,
                "decision_type": if allowed { "ALLOWED" } else { "DENIED" },
            },
        }),
    }
}

#[async_trait]
impl Decider for FixedDecider {
    async fn decision(&self, _input: &Input) -> Result<Decision> {
        Ok(self.decision.clone())
    }
}
