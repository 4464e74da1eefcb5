//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile a declared pattern (`/items/:id`) into a segment matcher
//! - Match an inbound path against it, capturing named parameters
//!
//! # Design Decisions
//! - Whole-path (anchored) matching: every segment must line up
//! - A capture matches exactly one non-empty segment
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Why a pattern could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern must start with '/': {0}")]
    NotAbsolute(String),
    #[error("empty parameter name in pattern: {0}")]
    EmptyName(String),
    #[error("duplicate parameter '{name}' in pattern: {pattern}")]
    DuplicateName { pattern: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    pattern: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl RoutePattern {
    /// Compile `pattern`. Segments starting with `:` are named captures.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        }

        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();

        for raw in pattern[1..].split('/') {
            match raw.strip_prefix(':') {
                Some("") => return Err(PatternError::EmptyName(pattern.to_string())),
                Some(name) => {
                    if param_names.iter().any(|n| n == name) {
                        return Err(PatternError::DuplicateName {
                            pattern: pattern.to_string(),
                            name: name.to_string(),
                        });
                    }
                    param_names.push(name.to_string());
                    segments.push(Segment::Capture(name.to_string()));
                }
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            param_names,
        })
    }

    /// Match `path`, returning captured parameters in declaration order.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let mut actual = rest.split('/');
        let mut params = PathParams::default();

        for segment in &self.segments {
            let value = actual.next()?;
            match segment {
                Segment::Literal(expected) => {
                    if expected != value {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    if value.is_empty() {
                        return None;
                    }
                    params.push(name.clone(), value.to_string());
                }
            }
        }

        // Anchored: leftover segments mean no match
        if actual.next().is_some() {
            return None;
        }

        Some(params)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }
}

/// Captured path parameters, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PathParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_in_declaration_order() {
        let pattern = RoutePattern::compile("/items/:id/sub/:sub").unwrap();
        assert_eq!(pattern.param_names(), ["id", "sub"]);

        let params = pattern.match_path("/items/42/sub/abc").unwrap();
        let collected: Vec<_> = params.iter().collect();
        assert_eq!(collected, vec![("id", "42"), ("sub", "abc")]);
        assert_eq!(params.get("sub"), Some("abc"));
    }

    #[test]
    fn test_no_match() {
        let pattern = RoutePattern::compile("/items/:id/sub/:sub").unwrap();
        assert!(pattern.match_path("/items/42").is_none());
        assert!(pattern.match_path("/items/42/sub/abc/extra").is_none());
        assert!(pattern.match_path("/things/42/sub/abc").is_none());
        assert!(pattern.match_path("/items//sub/abc").is_none());
        assert!(pattern.match_path("items/42/sub/abc").is_none());
    }

    #[test]
    fn test_literal_pattern() {
        let pattern = RoutePattern::compile("/customers").unwrap();
        assert!(pattern.match_path("/customers").unwrap().is_empty());
        assert!(pattern.match_path("/Customers").is_none());
        assert!(pattern.match_path("/customers/").is_none());
    }

    #[test]
    fn test_values_taken_verbatim() {
        let pattern = RoutePattern::compile("/files/:name").unwrap();
        let params = pattern.match_path("/files/report%20q1.csv").unwrap();
        assert_eq!(params.get("name"), Some("report%20q1.csv"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            RoutePattern::compile("items/:id"),
            Err(PatternError::NotAbsolute(_))
        ));
        assert!(matches!(
            RoutePattern::compile("/items/:"),
            Err(PatternError::EmptyName(_))
        ));
        assert!(matches!(
            RoutePattern::compile("/a/:id/b/:id"),
            Err(PatternError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_params_serialize_as_object() {
        let pattern = RoutePattern::compile("/items/:id/sub/:sub").unwrap();
        let params = pattern.match_path("/items/42/sub/abc").unwrap();
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"id":"42","sub":"abc"}"#);
    }
}
