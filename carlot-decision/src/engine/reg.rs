use std::num::NonZeroUsize;
use std::{cmp::Ordering, sync::Mutex};

use anyhow::{Context, Result};
use lru::LruCache;
use regex::Regex;

use super::{Matcher, DELIMITER_END, DELIMITER_START};

/// Pattern matcher with an LRU cache of compiled expressions. Patterns
/// without delimiters are compared literally and never hit the cache.
pub struct Regexp {
    lru: Mutex<LruCache<String, Regex>>,
}

impl Regexp {
    /// Panics if `cache_size` is zero.
    pub fn new(cache_size: usize) -> Self {
        Self {
            lru: Mutex::new(LruCache::new(
                NonZeroUsize::new(cache_size).unwrap(),
            )),
        }
    }
}

impl Matcher for Regexp {
    fn matches(&self, haystack: &[String], needle: &str) -> Result<bool> {
        for h in haystack {
            if !h.contains(DELIMITER_START) {
                if h == needle {
                    return Ok(true);
                }
                continue;
            }
            {
                let mut rlru =
                    self.lru.lock().map_err(|err| anyhow::anyhow!("{err}"))?;
                if let Some(reg) = rlru.get(h) {
                    if reg.is_match(needle) {
                        return Ok(true);
                    }
                    continue;
                }
            };

            let pattern = build_regex(h)?;
            let reg =
                Regex::new(pattern.as_str()).context("build regex error")?;
            {
                let mut wlru =
                    self.lru.lock().map_err(|err| anyhow::anyhow!("{err}"))?;
                wlru.put(h.to_owned(), reg.clone());
            };

            if reg.is_match(needle) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Indices of the top-level delimiter pairs in `s`, flattened as
/// start/end pairs. Errors on unbalanced delimiters.
fn delimiter_indices(s: &str) -> Result<Vec<usize>> {
    let (mut level, mut idx) = (0, 0);
    let mut idxs: Vec<usize> = Vec::new();
    for (i, value) in s.chars().enumerate() {
        if value == DELIMITER_START {
            level += 1;
            if level == 1 {
                idx = i;
            }
        } else if value == DELIMITER_END {
            level -= 1;
            match level.cmp(&0) {
                Ordering::Less => {
                    return Err(anyhow::anyhow!("Unbalanced braces in {}", s));
                }
                Ordering::Equal => {
                    idxs.push(idx);
                    idxs.push(i + 1);
                }
                Ordering::Greater => {}
            }
        }
    }
    if level != 0 {
        return Err(anyhow::anyhow!("Unbalanced braces in {}", s));
    }
    Ok(idxs)
}

/// Turns a delimited pattern into an anchored regular expression:
/// literal spans are escaped, delimited spans are kept verbatim as
/// capture groups. Each embedded expression is compiled once up front
/// so malformed patterns fail here rather than at match time.
fn build_regex(tpl: &str) -> Result<String> {
    let idx = delimiter_indices(tpl)?;
    let mut buffer = String::new();
    buffer.push('^');
    let (mut i, mut end) = (0, 0);
    while i < idx.len() {
        let start = idx[i];
        let raw = tpl
            .get(end..start)
            .ok_or_else(|| anyhow::anyhow!("bad span {end}..{start} in {tpl}"))?;
        end = idx[i + 1];
        let patt = tpl.get(start + 1..end - 1).ok_or_else(|| {
            anyhow::anyhow!("bad span {}..{} in {tpl}", start + 1, end - 1)
        })?;
        buffer.push_str(format!("{}({})", regex::escape(raw), patt).as_str());
        Regex::new(format!("^{}$", patt).as_str())
            .context("build regex error")?;
        i += 2;
    }
    let raw = tpl
        .get(end..)
        .ok_or_else(|| anyhow::anyhow!("bad span {end}.. in {tpl}"))?;
    buffer.push_str(regex::escape(raw).as_str());
    buffer.push('$');
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build() {
        assert_eq!(
            build_regex("<create|delete>").unwrap(),
            "^(create|delete)$".to_owned()
        )
    }

    #[test]
    fn mixed_literal_and_pattern() {
        assert_eq!(
            build_regex("/cars/<car[0-9]+>").unwrap(),
            "^/cars/(car[0-9]+)$".to_owned()
        )
    }

    #[test]
    fn unbalanced_delimiters() {
        assert!(build_regex("/cars/<car").is_err());
        assert!(build_regex("/cars/car>").is_err());
    }

    #[test]
    fn literal_patterns_do_not_regex_match() {
        let m = Regexp::new(16);
        assert!(m.matches(&["a.c".to_owned()], "a.c").unwrap());
        assert!(!m.matches(&["a.c".to_owned()], "abc").unwrap());
    }

    #[test]
    fn cached_pattern_still_matches() {
        let m = Regexp::new(16);
        let pats = vec!["/cars/<.+>".to_owned()];
        assert!(m.matches(&pats, "/cars/car1").unwrap());
        assert!(m.matches(&pats, "/cars/car2").unwrap());
        assert!(!m.matches(&pats, "/trucks/t1").unwrap());
    }
}
