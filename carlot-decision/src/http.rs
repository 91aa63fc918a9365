use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::{Decider, Decision, Input};

/// Decider that queries a decision service running as a sidecar over its
/// REST API. The URL should address the rule to evaluate, e.g.
/// `http://localhost:8181/v1/data/main/main`.
#[derive(Debug, Clone)]
pub struct HttpDecider {
    url: String,
    client: reqwest::Client,
}

impl HttpDecider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Decider for HttpDecider {
    async fn decision(&self, input: &Input) -> Result<Decision> {
        debug!("asking {} for a decision on {:?}", self.url, input);

        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "input": input }))
            .send()
            .await
            .context("could not reach decision service")?
            .error_for_status()
            .context("decision service returned an error status")?;

        response
            .json::<Decision>()
            .await
            .context("could not decode decision response")
    }
}
