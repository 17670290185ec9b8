use thiserror::Error;

// ── Constants ───────────────────────────────────────────────────────────────

pub const SEPARATOR: char = '/';
pub const ROOT: &str = "/";

// ── Malformed input ─────────────────────────────────────────────────────────

/// A path string that does not start with `/`.
///
/// This is a caller defect rather than a filesystem condition, so it is kept
/// out of [`FsError`](crate::error::FsError).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Path {0} is malformed (not starting from '/')")]
pub struct MalformedPath(pub String);

// ── Path functions ──────────────────────────────────────────────────────────

/// Split an absolute path into its segments.
///
/// Consecutive slashes collapse into one and a trailing slash is ignored, so
/// `"//a///b/"` yields `["a", "b"]`. The root `"/"` yields no segments.
pub fn split_path(path: &str) -> Result<Vec<String>, MalformedPath> {
    if !path.starts_with(SEPARATOR) {
        return Err(MalformedPath(path.to_string()));
    }
    Ok(path
        .split(SEPARATOR)
        .filter(|seg| !seg.is_empty())
        .map(str::to_string)
        .collect())
}

/// Like [`split_path`], for callers that have already vetted their input.
///
/// # Panics
///
/// Panics if `path` does not start with `/`.
pub fn segments(path: &str) -> Vec<String> {
    match split_path(path) {
        Ok(segments) => segments,
        Err(e) => panic!("{e}"),
    }
}

/// Rebuild the canonical absolute path for a segment sequence.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::new();
    for seg in segments {
        out.push(SEPARATOR);
        out.push_str(seg.as_ref());
    }
    out
}

/// True when `path` lies strictly below `prefix`, compared segment by segment.
///
/// `/a` is a strict prefix of `/a/b` but not of `/ab` nor of `/a` itself.
pub fn is_strict_prefix<S: AsRef<str>>(prefix: &[S], path: &[S]) -> bool {
    path.len() > prefix.len()
        && prefix
            .iter()
            .zip(path)
            .all(|(a, b)| a.as_ref() == b.as_ref())
}

// ── Tests ───────────────────────────────────────────────────────────────────
