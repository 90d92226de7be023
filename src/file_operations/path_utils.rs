// Path normalization shared by every operation that touches the store.
//
// Normalization is deliberately minimal: leading/trailing slashes are
// stripped, nothing else. Internal `//` is preserved and `.`/`..` segments
// are not resolved, so callers must not treat this as traversal protection.

/// Canonical form of a user-supplied path: no leading or trailing `/`.
pub fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Everything before the last `/`, or `""` for a top-level name.
pub fn folder_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Everything after the last `/`, or the whole string for a top-level name.
pub fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// True when any path segment is `.` or `..`. `normalize` keeps such
/// segments by contract, so every boundary that hands a key to a real
/// filesystem must reject paths where this holds.
pub fn has_dot_segments(path: &str) -> bool {
    path.split('/').any(|seg| seg == "." || seg == "..")
}
