use anyhow::Result;
use serde_json::Value;

/// Navigation path used to locate the allow/deny boolean inside an
/// otherwise-opaque decision result, e.g. `"outcome/allow"`.
///
/// Extraction failures indicate that the deployed allow path does not
/// match the shape the provider actually returns. Callers must treat
/// that as a configuration fault, never as an ordinary denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowPath {
    raw: String,
    segments: Vec<String>,
}

impl AllowPath {
    /// Parses a `/`-separated path. Empty segments produced by
    /// duplicated separators are skipped.
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<String> = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        if segments.is_empty() {
            return Err(anyhow::anyhow!("allow path '{}' has no segments", raw));
        }
        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// Walks nested objects in `result` and returns the terminal
    /// boolean.
    pub fn extract(&self, result: &Value) -> Result<bool> {
        let mut current = result;
        for (i, segment) in self.segments.iter().enumerate() {
            let object = current.as_object().ok_or_else(|| {
                anyhow::anyhow!(
                    "allow path '{}': '{}' is not an object in result {}",
                    self.raw,
                    self.segments[..i].join("/"),
                    result
                )
            })?;
            current = object.get(segment).ok_or_else(|| {
                anyhow::anyhow!(
                    "allow path '{}': key '{}' not present in result {}",
                    self.raw,
                    segment,
                    result
                )
            })?;
        }
        current.as_bool().ok_or_else(|| {
            anyhow::anyhow!(
                "allow path '{}' does not terminate at a boolean in result {}",
                self.raw,
                result
            )
        })
    }
}
