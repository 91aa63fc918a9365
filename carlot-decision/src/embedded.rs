use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::{
    engine::{self, Regexp, Statement},
    Decider, Decision, Input,
};

/// Decider backed by the in-process policy engine. Statements are read
/// from a JSON file; callers refresh the statement set by invoking
/// [`EmbeddedDecider::reload`], typically from a background interval
/// task, and can observe the refresh heartbeat via
/// [`EmbeddedDecider::refresh_count`].
pub struct EmbeddedDecider {
    path: PathBuf,
    matcher: Regexp,
    statements: RwLock<Vec<Statement>>,
    refreshes: AtomicU64,
}

impl EmbeddedDecider {
    pub fn open(path: impl Into<PathBuf>, cache_size: usize) -> Result<Self> {
        let path = path.into();
        let statements = read_statements(&path)?;
        info!(
            "loaded {} policy statements from {}",
            statements.len(),
            path.display()
        );
        Ok(Self {
            path,
            matcher: Regexp::new(cache_size),
            statements: RwLock::new(statements),
            refreshes: AtomicU64::new(0),
        })
    }

    /// Re-reads the policy file, replacing the statement set. The old
    /// set stays in effect if the read or parse fails.
    pub fn reload(&self) -> Result<()> {
        let statements = read_statements(&self.path)?;
        let mut guard = self
            .statements
            .write()
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        *guard = statements;
        drop(guard);
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

fn read_statements(path: &std::path::Path) -> Result<Vec<Statement>> {
    let raw = fs::read_to_string(path).with_context(|| {
        format!("could not read policy file {}", path.display())
    })?;
    serde_json::from_str(&raw).with_context(|| {
        format!("could not parse policy file {}", path.display())
    })
}

#[async_trait]
impl Decider for EmbeddedDecider {
    async fn decision(&self, input: &Input) -> Result<Decision> {
        let statements = self
            .statements
            .read()
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        let allowed = engine::evaluate(&self.matcher, &statements, input)?;
        Ok(Decision {
            id: uuid::Uuid::new_v4().hyphenated().to_string(),
            result: json!({ "allowed": allowed }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn policy_file(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    const POLICY: &str = r#"[
        {
            "effect": "Allow",
            "subjects": ["alice"],
            "actions": ["GET"],
            "resources": ["/cars", "/cars/<.+>"]
        }
    ]"#;

    #[tokio::test]
    async fn decides_from_file_statements() {
        let f = policy_file(POLICY);
        let decider = EmbeddedDecider::open(f.path(), 16).unwrap();

        let input = Input {
            action: "GET".to_owned(),
            resource: "/cars".to_owned(),
            subject: "alice".to_owned(),
            ..Default::default()
        };
        let decision = decider.decision(&input).await.unwrap();
        assert_eq!(decision.result, json!({"allowed": true}));
        assert!(!decision.id.is_empty());

        let input = Input {
            subject: "mallory".to_owned(),
            ..input
        };
        let decision = decider.decision(&input).await.unwrap();
        assert_eq!(decision.result, json!({"allowed": false}));
    }

    #[tokio::test]
    async fn reload_replaces_statements_and_bumps_counter() {
        let f = policy_file(POLICY);
        let decider = EmbeddedDecider::open(f.path(), 16).unwrap();
        assert_eq!(decider.refresh_count(), 0);

        fs::write(f.path(), "[]").unwrap();
        decider.reload().unwrap();
        assert_eq!(decider.refresh_count(), 1);

        let input = Input {
            action: "GET".to_owned(),
            resource: "/cars".to_owned(),
            subject: "alice".to_owned(),
            ..Default::default()
        };
        let decision = decider.decision(&input).await.unwrap();
        assert_eq!(decision.result, json!({"allowed": false}));
    }

    #[test]
    fn failed_reload_keeps_old_statements() {
        let f = policy_file(POLICY);
        let decider = EmbeddedDecider::open(f.path(), 16).unwrap();

        fs::write(f.path(), "not json").unwrap();
        assert!(decider.reload().is_err());
        assert_eq!(decider.refresh_count(), 0);
        assert_eq!(decider.statements.read().unwrap().len(), 1);
    }

    #[test]
    fn open_rejects_missing_file() {
        assert!(EmbeddedDecider::open("/no/such/policy.json", 16).is_err());
    }
}
