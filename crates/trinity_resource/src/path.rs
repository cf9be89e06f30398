//! Resource path helpers
//!
//! Paths are the cache key of the registry, so every lookup goes through
//! [`normalize`] first. Paths may carry a prefix (`res:/textures/a.png`) which
//! [`resolve_url`] maps to a fetchable location through the configured prefix
//! table.

use std::collections::BTreeMap;

/// Normalize a resource path
///
/// Trims whitespace, converts `\` to `/`, lowercases, and collapses repeated
/// slashes. The slashes directly after a `prefix:` are kept as written.
pub fn normalize(path: &str) -> String {
    let lowered = path.trim().replace('\\', "/").to_lowercase();

    let split = match lowered.find(":/") {
        Some(idx) => {
            let rest = &lowered[idx + 1..];
            idx + 1 + (rest.len() - rest.trim_start_matches('/').len())
        }
        None => 0,
    };
    let (head, tail) = lowered.split_at(split);

    let mut out = String::with_capacity(lowered.len());
    out.push_str(head);
    let mut prev_slash = head.ends_with('/');
    for ch in tail.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    out
}

/// Extension of the last path segment, without the dot
pub fn extension(path: &str) -> Option<&str> {
    let path = path.split('?').next().unwrap_or(path);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Split `prefix:/rest` into `("prefix", "rest")`
pub fn split_prefix(path: &str) -> Option<(&str, &str)> {
    let idx = path.find(":/")?;
    let prefix = &path[..idx];
    if prefix.is_empty() {
        return None;
    }
    Some((prefix, path[idx + 1..].trim_start_matches('/')))
}

/// Build the fetch url for a normalized path
///
/// Paths whose prefix is not in the table are returned unchanged.
pub fn resolve_url(path: &str, prefixes: &BTreeMap<String, String>) -> String {
    match split_prefix(path) {
        Some((prefix, rest)) => match prefixes.get(prefix) {
            Some(root) if root.is_empty() => rest.to_string(),
            Some(root) => format!("{}/{}", root.trim_end_matches('/'), rest),
            None => path.to_string(),
        },
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Res:/Textures\\Ship.PNG "), "res:/textures/ship.png");
        assert_eq!(normalize("res:/a//b///c.dds"), "res:/a/b/c.dds");
        assert_eq!(normalize("http://host//x.png"), "http://host/x.png");
        assert_eq!(normalize("local/path.geo"), "local/path.geo");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("res:/textures/ship.png"), Some("png"));
        assert_eq!(extension("res:/dir.v2/mesh.geo"), Some("geo"));
        assert_eq!(extension("res:/dir.v2/mesh"), None);
        assert_eq!(extension("file.red?v=3"), Some("red"));
        assert_eq!(extension("trailing."), None);
    }

    #[test]
    fn test_resolve_url() {
        let mut prefixes = BTreeMap::new();
        prefixes.insert("res".to_string(), "assets/".to_string());
        prefixes.insert("cdn".to_string(), "https://cdn.example.com/r".to_string());

        assert_eq!(resolve_url("res:/textures/a.png", &prefixes), "assets/textures/a.png");
        assert_eq!(resolve_url("cdn:/a.geo", &prefixes), "https://cdn.example.com/r/a.geo");
        assert_eq!(resolve_url("other:/a.geo", &prefixes), "other:/a.geo");
        assert_eq!(resolve_url("plain/a.geo", &prefixes), "plain/a.geo");
    }
}
