//! Path pattern dialects.
//!
//! # Responsibilities
//! - Compile named-segment patterns (`/items/{id}.{format}`) into anchored regexes
//! - Compile raw regular-expression patterns
//! - Extract path parameters from a match
//!
//! # Design Decisions
//! - Both dialects compile to `regex::Regex` so one resolver can walk them in order
//! - Matching is case-sensitive and anchored at both ends
//! - A single trailing slash on the request path is tolerated

use regex::Regex;

use crate::error::RouteError;

/// Parameters captured from a path, in pattern order.
pub type PathParams = Vec<(String, String)>;

/// Which pattern language a route was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PatternKind {
    Parameterized,
    Regex,
}

/// Trait for matching request paths against a compiled pattern.
pub trait PathMatcher: Send + Sync + std::fmt::Debug {
    /// Returns the captured parameters when `path` matches.
    fn match_path(&self, path: &str) -> Option<PathParams>;

    /// The pattern as declared.
    fn pattern(&self) -> &str;

    fn kind(&self) -> PatternKind;
}

/// Matches `{name}`-style patterns.
#[derive(Debug, Clone)]
pub struct ParameterizedMatcher {
    pattern: String,
    regex: Regex,
    names: Vec<String>,
}

impl ParameterizedMatcher {
    pub fn new(pattern: impl Into<String>) -> Result<Self, RouteError> {
        let pattern = pattern.into();
        let (source, names) = translate(&pattern);
        let regex = Regex::new(&source).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        Ok(Self {
            pattern,
            regex,
            names,
        })
    }

    /// Parameter names in declaration order.
    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }
}

// `{name}` captures one segment lazily so a trailing `.{format}` still binds.
fn translate(pattern: &str) -> (String, Vec<String>) {
    let mut source = String::from("^");
    let mut names = Vec::new();
    let mut rest = pattern.trim_end_matches('/');

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        source.push_str(&regex::escape(&rest[..open]));
        let name = &rest[open + 1..close];
        source.push_str(r"([^/]+?)");
        names.push(name.to_string());
        rest = &rest[close + 1..];
    }
    source.push_str(&regex::escape(rest));
    source.push_str("/?$");
    (source, names)
}

impl PathMatcher for ParameterizedMatcher {
    fn match_path(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    caps.get(i + 1)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn kind(&self) -> PatternKind {
        PatternKind::Parameterized
    }
}

/// Matches raw regular expressions. Named groups become parameters.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    pattern: String,
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: impl Into<String>) -> Result<Self, RouteError> {
        let pattern = pattern.into();
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            RouteError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            }
        })?;
        Ok(Self { pattern, regex })
    }
}

impl PathMatcher for RegexMatcher {
    fn match_path(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        Some(
            self.regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn kind(&self) -> PatternKind {
        PatternKind::Regex
    }
}
