//! In-process policy engine used by the embedded decider.
//!
//! A policy is a list of statements. A statement matches a request when
//! its subjects, actions and resources all match; patterns between `<`
//! and `>` are regular expressions, anything else is compared literally.
//! A matching `Deny` statement wins over any `Allow`; with no match at
//! all the request is denied.

mod reg;

pub use reg::Regexp;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::Input;

pub const DELIMITER_START: char = '<';
pub const DELIMITER_END: char = '>';

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    pub subjects: Vec<String>,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum Effect {
    Allow,
    Deny,
}

pub trait Matcher {
    /// Returns true if any pattern in `haystack` matches `needle`.
    fn matches(&self, haystack: &[String], needle: &str) -> Result<bool>;
}

/// Evaluates `statements` against `input`. Returns false both for an
/// explicit deny and for the absence of any matching statement.
pub fn evaluate<M: Matcher>(
    matcher: &M,
    statements: &[Statement],
    input: &Input,
) -> Result<bool> {
    let mut allowed = false;
    for statement in statements {
        if !matcher.matches(&statement.actions, &input.action)? {
            continue;
        }
        if !matcher.matches(&statement.subjects, &input.subject)? {
            continue;
        }
        if !matcher.matches(&statement.resources, &input.resource)? {
            continue;
        }
        if let Effect::Deny = statement.effect {
            tracing::debug!(
                "request {:?} denied by statement {:?}",
                input,
                statement.sid
            );
            return Ok(false);
        }
        allowed = true;
    }
    Ok(allowed)
}
