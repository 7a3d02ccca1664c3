//! npm-style version ranges on top of [`semver::VersionReq`].
//!
//! Registries publish ranges in npm syntax (`>=1.0.0 <2`, `1.x`, `^2 || ^3`),
//! which `semver` does not accept directly. [`VersionRange`] rewrites each
//! `||` alternative into a comma-separated `VersionReq`.

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};

use bindery_shared::{BinderyError, Result};

/// A parsed version range: matches if any alternative matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// The range matching every version.
    pub fn any() -> Self {
        Self {
            raw: "*".into(),
            alternatives: vec![VersionReq::STAR],
        }
    }

    /// Parse an npm-style range.
    pub fn parse(raw: &str) -> Result<Self> {
        let alternatives = raw
            .split("||")
            .map(|alt| {
                let normalized = normalize(alt)?;
                VersionReq::parse(&normalized).map_err(|e| {
                    BinderyError::validation(format!("invalid version range '{raw}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.trim().to_string(),
            alternatives,
        })
    }

    /// Whether `version` falls inside this range.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The range as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for VersionRange {
    type Err = BinderyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Rewrite one `||` alternative into `semver` syntax.
fn normalize(alt: &str) -> Result<String> {
    let alt = alt.trim();
    if alt.is_empty() || alt == "*" || alt.eq_ignore_ascii_case("x") || alt == "latest" {
        return Ok("*".into());
    }

    // Hyphen ranges: `1.2.3 - 2.3.4`.
    if let Some((low, high)) = alt.split_once(" - ") {
        return Ok(format!(
            ">={}, <={}",
            low.trim().trim_start_matches('v'),
            high.trim().trim_start_matches('v')
        ));
    }

    // Glue detached operators to their version (`>= 1.0` → `>=1.0`).
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in alt.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op = Some(token);
            continue;
        }
        let token = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };
        comparators.push(normalize_comparator(&token));
    }

    if let Some(op) = pending_op {
        return Err(BinderyError::validation(format!(
            "invalid version range '{alt}': dangling operator '{op}'"
        )));
    }

    Ok(comparators.join(", "))
}

/// Apply npm meanings to a single comparator.
///
/// A bare full version is exact (`1.2.3` → `=1.2.3`) and a bare partial
/// version is a wildcard (`1.2` → `1.2.*`).
fn normalize_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| c.is_ascii_digit() || matches!(c, 'x' | 'X' | '*'))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let op = op.trim_end_matches('v');
    let version = version.trim_start_matches('v');

    let mut segments: Vec<String> = version
        .split('.')
        .map(|s| if s == "x" || s == "X" { "*".to_string() } else { s.to_string() })
        .collect();

    if !op.is_empty() {
        return format!("{op}{}", segments.join("."));
    }

    let has_suffix = version.contains('-') || version.contains('+');
    let has_wildcard = segments.iter().any(|s| s == "*");
    if has_suffix || (segments.len() >= 3 && !has_wildcard) {
        return format!("={version}");
    }
    if !has_wildcard {
        segments.push("*".into());
    }
    segments.join(".")
}
