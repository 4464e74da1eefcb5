//! Path security validation.
//!
//! # Responsibilities
//! - Decode percent-encoded candidates (bounded, iterative)
//! - Reject traversal sequences after decoding
//! - Whitelist URI schemes for remote storage locations
//! - Canonicalize local paths and confine them to allowed prefixes
//!
//! # Design Decisions
//! - Layered checks (decode, then scan) instead of a single regex
//! - Candidates that are still encoded after the decode bound fail closed
//! - Pure string canonicalization unless `resolve_symlinks` is enabled
//! - Every failure is a `PathRejection`; nothing panics past this module

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::PathPolicyConfig;

/// Default number of percent-decoding passes.
pub const DEFAULT_MAX_DECODE_ITERATIONS: usize = 3;

/// Schemes recognized as network/object-storage locations.
const REMOTE_SCHEMES: &[&str] = &[
    "s3", "gs", "gcs", "r2", "az", "azure", "abfs", "abfss", // object storage
    "http", "https", //
    "ftp", "ftps", "sftp",
];

/// Why a candidate path was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathRejection {
    #[error("Path cannot be empty")]
    Empty,
    #[error("Path traversal not allowed")]
    Traversal,
    #[error("Invalid percent-encoding in path")]
    InvalidEncoding,
    #[error("URL scheme not allowed: {0}")]
    SchemeNotAllowed(String),
    #[error("Local paths not allowed")]
    LocalPathsNotAllowed,
    #[error("Relative paths not allowed")]
    RelativePathsNotAllowed,
    #[error("Relative path requires a base path")]
    MissingBase,
    #[error("Path not within allowed directory")]
    NotWithinAllowedDirectory,
    #[error("Failed to resolve path: {0}")]
    Resolve(String),
}

/// Where a validated path points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Local,
    Remote,
}

/// A canonical, traversal-free path accepted by the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath {
    canonical: String,
    kind: PathKind,
}

impl ValidatedPath {
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn is_remote(&self) -> bool {
        self.kind == PathKind::Remote
    }

    pub fn into_string(self) -> String {
        self.canonical
    }
}

impl std::fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Validates caller- or configuration-supplied paths against a static policy.
#[derive(Debug, Clone)]
pub struct PathSecurityValidator {
    allow_local_paths: bool,
    allow_relative_paths: bool,
    resolve_symlinks: bool,
    allowed_schemes: BTreeSet<String>,
    allowed_prefixes: Vec<String>,
    max_decode_iterations: usize,
}

impl Default for PathSecurityValidator {
    fn default() -> Self {
        Self::from_config(&PathPolicyConfig::default())
    }
}

impl PathSecurityValidator {
    /// Build a validator from the `[paths]` configuration section.
    pub fn from_config(config: &PathPolicyConfig) -> Self {
        Self {
            allow_local_paths: config.allow_local_paths,
            allow_relative_paths: config.allow_relative_paths,
            resolve_symlinks: config.resolve_symlinks,
            allowed_schemes: config
                .allowed_schemes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            allowed_prefixes: config.allowed_prefixes.clone(),
            max_decode_iterations: config.max_decode_iterations.max(1),
        }
    }

    pub fn allow_scheme(mut self, scheme: &str) -> Self {
        self.allowed_schemes.insert(scheme.to_ascii_lowercase());
        self
    }

    pub fn allow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.allowed_prefixes.push(prefix.into());
        self
    }

    pub fn is_scheme_allowed(&self, scheme: &str) -> bool {
        self.allowed_schemes.contains(&scheme.to_ascii_lowercase())
    }

    /// Validate `candidate`, resolving relative paths against `base`.
    pub fn validate(&self, candidate: &str, base: &str) -> Result<ValidatedPath, PathRejection> {
        if candidate.is_empty() {
            return Err(PathRejection::Empty);
        }

        let decoded = self.decode(candidate)?;

        if contains_traversal(&decoded) {
            tracing::debug!(candidate = %candidate, "Traversal sequence rejected");
            return Err(PathRejection::Traversal);
        }

        match extract_scheme(&decoded) {
            Some(scheme) if scheme == "file" => {
                if !self.is_scheme_allowed("file") {
                    return Err(PathRejection::SchemeNotAllowed(scheme));
                }
                let local = &decoded["file://".len()..];
                if local.is_empty() {
                    return Err(PathRejection::Empty);
                }
                self.validate_local(local, base)
            }
            Some(scheme) => self.validate_remote(&decoded, scheme),
            None => self.validate_local(&decoded, base),
        }
    }

    /// Iteratively decode until a fixpoint or the configured bound.
    ///
    /// A candidate that still changes after the last permitted pass is
    /// treated as a traversal attempt: the scan cannot see through the
    /// remaining layers.
    fn decode(&self, candidate: &str) -> Result<String, PathRejection> {
        let mut current = candidate.to_string();
        for _ in 0..self.max_decode_iterations {
            let next = url_decode_once(&current)?;
            if next == current {
                return Ok(current);
            }
            current = next;
        }

        if url_decode_once(&current)? != current {
            tracing::debug!(
                candidate = %candidate,
                bound = self.max_decode_iterations,
                "Encoding depth exceeds decode bound"
            );
            return Err(PathRejection::Traversal);
        }
        Ok(current)
    }

    fn validate_remote(&self, path: &str, scheme: String) -> Result<ValidatedPath, PathRejection> {
        if !REMOTE_SCHEMES.contains(&scheme.as_str()) || !self.is_scheme_allowed(&scheme) {
            return Err(PathRejection::SchemeNotAllowed(scheme));
        }

        Ok(ValidatedPath {
            canonical: normalize_separators(path),
            kind: PathKind::Remote,
        })
    }

    fn validate_local(&self, path: &str, base: &str) -> Result<ValidatedPath, PathRejection> {
        if !self.allow_local_paths {
            return Err(PathRejection::LocalPathsNotAllowed);
        }

        let mut canonical = if is_absolute(path) {
            collapse_separators(&normalize_separators(path))
        } else {
            if !self.allow_relative_paths {
                return Err(PathRejection::RelativePathsNotAllowed);
            }
            if base.is_empty() {
                return Err(PathRejection::MissingBase);
            }
            join(base, path)
        };

        if self.resolve_symlinks {
            let resolved = weakly_canonical(Path::new(&canonical))
                .map_err(|e| PathRejection::Resolve(e.to_string()))?;
            canonical = normalize_separators(&resolved.to_string_lossy());
        }

        if !self.is_path_allowed(&canonical) {
            return Err(PathRejection::NotWithinAllowedDirectory);
        }

        Ok(ValidatedPath {
            canonical,
            kind: PathKind::Local,
        })
    }

    /// Boundary-aligned prefix check. An empty allow-list admits everything.
    pub fn is_path_allowed(&self, path: &str) -> bool {
        if self.allowed_prefixes.is_empty() {
            return true;
        }

        let path = normalize_separators(path);
        self.allowed_prefixes.iter().any(|prefix| {
            let prefix = normalize_separators(prefix);
            let bare = prefix.trim_end_matches('/');
            if bare.is_empty() {
                // "/" allows every absolute path
                return path.starts_with('/');
            }
            path == bare || path.starts_with(&format!("{bare}/"))
        })
    }
}

/// Decode `%XX` escapes and `+` once. Incomplete or non-hex escapes are kept.
fn url_decode_once(input: &str) -> Result<String, PathRejection> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| PathRejection::InvalidEncoding)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Detect `..` used as a path segment.
pub fn contains_traversal(path: &str) -> bool {
    let normalized = normalize_separators(path);

    if normalized == ".." || normalized.starts_with("../") {
        return true;
    }

    // "/.." followed by "/" or end of string; "/...file" is fine
    normalized.match_indices("/..").any(|(pos, _)| {
        let after = pos + 3;
        after == normalized.len() || normalized.as_bytes()[after] == b'/'
    })
}

/// Lowercased scheme of `scheme://...`, if well formed.
pub fn extract_scheme(path: &str) -> Option<String> {
    let pos = path.find("://")?;
    if pos == 0 {
        return None;
    }

    let scheme = &path[..pos];
    let valid = scheme
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !last_was_slash {
                out.push(c);
            }
            last_was_slash = true;
        } else {
            out.push(c);
            last_was_slash = false;
        }
    }
    out
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    matches!(bytes.first(), Some(b'/') | Some(b'\\'))
        || (bytes.len() > 1 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic())
}

/// Concatenate base and relative. Traversal has already been excluded.
fn join(base: &str, relative: &str) -> String {
    let mut base = normalize_separators(base);
    let mut relative = normalize_separators(relative);

    if !base.ends_with('/') {
        base.push('/');
    }
    while let Some(rest) = relative.strip_prefix("./") {
        relative = rest.to_string();
    }

    collapse_separators(&format!("{base}{relative}"))
}

/// Canonicalize the deepest existing ancestor and re-append the rest.
fn weakly_canonical(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match std::fs::canonicalize(&existing) {
            Ok(resolved) => {
                let mut out = resolved;
                for part in tail.iter().rev() {
                    out.push(part);
                }
                return Ok(out);
            }
            Err(err) => {
                let Some(name) = existing.file_name().map(|n| n.to_os_string()) else {
                    return Err(err);
                };
                tail.push(name);
                if !existing.pop() {
                    return Err(err);
                }
                if existing.as_os_str().is_empty() {
                    existing = PathBuf::from(".");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(prefixes: &[&str]) -> PathSecurityValidator {
        let mut config = PathPolicyConfig::default();
        config.allowed_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        PathSecurityValidator::from_config(&config)
    }

    #[test]
    fn test_traversal_detection() {
        assert!(contains_traversal(".."));
        assert!(contains_traversal("../file.txt"));
        assert!(contains_traversal("path/../file.txt"));
        assert!(contains_traversal("/path/to/.."));
        assert!(contains_traversal("path\\..\\file.txt"));

        assert!(!contains_traversal("path/file..txt"));
        assert!(!contains_traversal("path/...file.txt"));
        assert!(!contains_traversal("path/.hidden/file.txt"));
    }

    #[test]
    fn test_url_decode_once() {
        assert_eq!(url_decode_once("%2e%2E%2f").unwrap(), "../");
        assert_eq!(url_decode_once("hello+world").unwrap(), "hello world");
        assert_eq!(url_decode_once("%2").unwrap(), "%2");
        assert_eq!(url_decode_once("%").unwrap(), "%");
        assert_eq!(url_decode_once("%GG").unwrap(), "%GG");
        assert_eq!(url_decode_once("%ff").unwrap_err(), PathRejection::InvalidEncoding);
    }

    #[test]
    fn test_encoded_traversal_rejected_at_every_depth() {
        let validator = policy(&[]);
        let candidates = [
            "/data/../etc/passwd",
            "/data/%2e%2e/etc/passwd",
            "/data/%252e%252e/etc/passwd",
            "/data/%25252e%25252e/etc/passwd",
            // four layers: beyond the default bound
            "/data/%2525252e%2525252e/etc/passwd",
            "..%2fsecret",
            "%2e%2e%5csecret",
        ];
        for candidate in candidates {
            assert_eq!(
                validator.validate(candidate, "/base"),
                Err(PathRejection::Traversal),
                "{candidate}"
            );
        }
    }

    #[test]
    fn test_prefix_confinement() {
        let validator = policy(&["/srv/data"]);

        let rejected = validator.validate("/etc/passwd", "").unwrap_err();
        assert!(rejected.to_string().contains("not within allowed directory"));

        let accepted = validator.validate("/srv/data/x.csv", "").unwrap();
        assert_eq!(accepted.as_str(), "/srv/data/x.csv");
        assert_eq!(accepted.kind(), PathKind::Local);

        assert!(validator.validate("/srv/data", "").is_ok());
        assert!(validator.validate("/srv/database/x.csv", "").is_err());
    }

    #[test]
    fn test_remote_schemes() {
        let validator = policy(&[]);
        assert!(validator.validate("s3://bucket/key", "").is_err());

        let validator = validator.allow_scheme("s3");
        let accepted = validator.validate("S3://bucket/key", "").unwrap();
        assert!(accepted.is_remote());

        let err = validator.validate("gopher://x", "").unwrap_err();
        assert_eq!(err, PathRejection::SchemeNotAllowed("gopher".into()));

        let validator = validator.allow_scheme("gopher");
        assert!(validator.validate("gopher://x", "").is_err());
    }

    #[test]
    fn test_file_scheme_is_local() {
        let validator = policy(&["/srv"]);
        let accepted = validator.validate("file:///srv/a.parquet", "").unwrap();
        assert_eq!(accepted.as_str(), "/srv/a.parquet");
        assert!(validator.validate("file:///etc/shadow", "").is_err());
    }

    #[test]
    fn test_relative_paths() {
        let validator = policy(&[]);
        assert_eq!(
            validator.validate("./sub//file.txt", "/base/").unwrap().as_str(),
            "/base/sub/file.txt"
        );
        assert_eq!(
            validator.validate("sub\\file.txt", "C:\\base").unwrap().as_str(),
            "C:/base/sub/file.txt"
        );
        assert_eq!(
            validator.validate("file.txt", ""),
            Err(PathRejection::MissingBase)
        );

        let mut config = PathPolicyConfig::default();
        config.allow_relative_paths = false;
        let strict = PathSecurityValidator::from_config(&config);
        assert_eq!(
            strict.validate("file.txt", "/base"),
            Err(PathRejection::RelativePathsNotAllowed)
        );
    }

    #[test]
    fn test_local_paths_disabled() {
        let mut config = PathPolicyConfig::default();
        config.allow_local_paths = false;
        let validator = PathSecurityValidator::from_config(&config);
        assert_eq!(
            validator.validate("/tmp/x", ""),
            Err(PathRejection::LocalPathsNotAllowed)
        );
        assert!(validator.validate("https://example.com/x.csv", "").is_ok());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let validator = policy(&["/srv/data"]);
        let first = validator.validate("/srv/data/reports/q1.csv", "").unwrap();
        let second = validator.validate(first.as_str(), "").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_candidate() {
        assert_eq!(policy(&[]).validate("", "/base"), Err(PathRejection::Empty));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_resolved() {
        let allowed = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let allowed_root = std::fs::canonicalize(allowed.path()).unwrap();
        let link = allowed_root.join("escape");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();

        let mut config = PathPolicyConfig::default();
        config.resolve_symlinks = true;
        config.allowed_prefixes = vec![allowed_root.to_string_lossy().into_owned()];
        let validator = PathSecurityValidator::from_config(&config);

        let inside = allowed_root.join("not-yet-created.csv");
        assert!(validator.validate(&inside.to_string_lossy(), "").is_ok());

        let escaped = link.join("data.csv");
        assert_eq!(
            validator.validate(&escaped.to_string_lossy(), ""),
            Err(PathRejection::NotWithinAllowedDirectory)
        );
    }
}
