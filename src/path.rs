//! Route path joining for nested groups.

/// Joins a group's base path with a relative path.
///
/// The result always starts with `/`, has no empty, `.` or `..` segments,
/// and ends with `/` only when the relative part did (or, for an empty
/// relative part, when the base did). Static mounts rely on that last rule:
/// `/assets/` and `/assets` are different mount points.
pub fn join(base: &str, rel: &str) -> String {
    let suffix = if rel.is_empty() { base } else { rel };
    let joined = clean(&format!("{base}/{rel}"));
    if suffix.ends_with('/') && !joined.ends_with('/') {
        joined + "/"
    } else {
        joined
    }
}

/// Lexically cleans a rooted path: collapses separators and resolves `.`
/// and `..`. Never climbs above `/`. Trailing separators are dropped.
pub fn clean(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}
