//! URIs: parsing, normalization, relative resolution and prefix mapping

use std::fmt;

/// A parsed URI: `scheme:` prefix, path segments and fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: Option<String>,
    pub absolute: bool,
    pub segments: Vec<String>,
    pub fragment: Option<String>,
}

impl Uri {
    pub fn parse(text: &str) -> Self {
        let (rest, fragment) = match text.split_once('#') {
            Some((r, f)) => (r, Some(f.to_string())),
            None => (text, None),
        };
        let (scheme, path) = match rest.split_once(':') {
            Some((s, p)) if is_scheme(s) => (Some(s.to_string()), p),
            _ => (None, rest),
        };
        let absolute = path.starts_with('/');
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Uri {
            scheme,
            absolute,
            segments,
            fragment,
        }
    }

    /// Extension of the last segment, without the dot
    pub fn extension(&self) -> Option<&str> {
        self.segments
            .last()
            .and_then(|s| s.rsplit_once('.'))
            .map(|(_, ext)| ext)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn without_fragment(&self) -> Uri {
        Uri {
            fragment: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{}:", scheme)?;
            if self.absolute {
                f.write_str("//")?;
            }
        } else if self.absolute {
            f.write_str("/")?;
        }
        f.write_str(&self.segments.join("/"))?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

fn is_scheme(s: &str) -> bool {
    s.len() > 1
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Extension of a URI string
pub fn extension(uri: &str) -> Option<String> {
    Uri::parse(uri).extension().map(str::to_string)
}

/// Collapse `file://`, drop `.` segments and fold `..` segments
pub fn normalize(uri: &str) -> String {
    let (path, fragment) = match uri.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (uri, None),
    };
    let path = path.strip_prefix("file://").unwrap_or(path);
    let (prefix, body) = split_authority(path);
    let absolute = body.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for segment in body.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !absolute {
                    out.push("..");
                }
            }
            s => out.push(s),
        }
    }
    let mut normalized = String::from(prefix);
    if absolute {
        normalized.push('/');
    }
    normalized.push_str(&out.join("/"));
    if let Some(fragment) = fragment {
        normalized.push('#');
        normalized.push_str(fragment);
    }
    normalized
}

/// Split `scheme://authority` (kept verbatim) from the path
fn split_authority(path: &str) -> (&str, &str) {
    if let Some(idx) = path.find("://") {
        let after = idx + 3;
        let end = path[after..].find('/').map(|i| after + i).unwrap_or(path.len());
        return (&path[..end], &path[end..]);
    }
    if let Some((scheme, rest)) = path.split_once(':') {
        if is_scheme(scheme) {
            return (&path[..scheme.len() + 1], rest);
        }
    }
    ("", path)
}

fn has_scheme(uri: &str) -> bool {
    uri.split_once(':').is_some_and(|(s, _)| is_scheme(s))
}

/// Resolve `reference` against the document URI `base`
pub fn resolve(base: &str, reference: &str) -> String {
    if reference.is_empty() {
        return normalize(base);
    }
    if has_scheme(reference) || reference.starts_with('/') {
        return normalize(reference);
    }
    let base = base.split('#').next().unwrap_or(base);
    let dir = match base.rfind('/') {
        Some(idx) => &base[..=idx],
        None => "",
    };
    normalize(&format!("{}{}", dir, reference))
}

/// Express `target` relative to the document URI `base` when they share a
/// directory prefix; otherwise return `target` unchanged
pub fn relativize(base: &str, target: &str) -> String {
    let base = normalize(base);
    let target = normalize(target);
    let (base_prefix, base_path) = split_authority(&base);
    let (target_prefix, target_path) = split_authority(&target);
    if base_prefix != target_prefix || base_path.starts_with('/') != target_path.starts_with('/') {
        return target;
    }
    let base_dirs: Vec<&str> = {
        let mut parts: Vec<&str> = base_path.split('/').filter(|s| !s.is_empty()).collect();
        parts.pop();
        parts
    };
    let target_parts: Vec<&str> = target_path.split('/').filter(|s| !s.is_empty()).collect();
    let common = base_dirs
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 && !base_dirs.is_empty() && base_path.starts_with('/') {
        return target;
    }
    let mut parts: Vec<String> = vec!["..".to_string(); base_dirs.len() - common];
    parts.extend(target_parts[common..].iter().map(|s| s.to_string()));
    parts.join("/")
}

/// Prefix rewriting table applied during URI normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriMapper {
    entries: Vec<(String, String)>,
}

impl UriMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map URIs starting with `from` to start with `to` instead
    pub fn insert(&mut self, from: &str, to: &str) {
        self.entries.retain(|(f, _)| f != from);
        self.entries.push((from.to_string(), to.to_string()));
    }

    pub fn remove(&mut self, from: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(f, _)| f != from);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Rewrite by the longest matching source prefix
    pub fn map(&self, uri: &str) -> String {
        self.entries
            .iter()
            .filter(|(from, _)| uri.starts_with(from.as_str()))
            .max_by_key(|(from, _)| from.len())
            .map(|(from, to)| format!("{}{}", to, &uri[from.len()..]))
            .unwrap_or_else(|| uri.to_string())
    }

    /// Reverse of [`Self::map`]: rewrite by the longest matching target prefix
    pub fn unmap(&self, uri: &str) -> Option<String> {
        self.entries
            .iter()
            .filter(|(_, to)| uri.starts_with(to.as_str()))
            .max_by_key(|(_, to)| to.len())
            .map(|(from, to)| format!("{}{}", from, &uri[to.len()..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parts() {
        let uri = Uri::parse("platform:/resource/lib/model.xmi#//@books.0");
        assert_eq!(uri.scheme.as_deref(), Some("platform"));
        assert_eq!(uri.extension(), Some("xmi"));
        assert_eq!(uri.fragment.as_deref(), Some("//@books.0"));
        assert_eq!(uri.file_name(), Some("model.xmi"));
    }

    #[test]
    fn test_normalize_collapses_file_and_dots() {
        assert_eq!(normalize("file:///tmp/./a/../b.xmi"), "/tmp/b.xmi");
        assert_eq!(normalize("./models/a.xmi"), "models/a.xmi");
        assert_eq!(normalize("../x/y.xmi"), "../x/y.xmi");
        assert_eq!(normalize("http://host/a/./b#frag"), "http://host/a/b#frag");
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve("models/A.xmi", "B.xmi"), "models/B.xmi");
        assert_eq!(resolve("/data/models/A.xmi", "../other/C.xmi"), "/data/other/C.xmi");
        assert_eq!(resolve("A.xmi", "http://x/y.xmi"), "http://x/y.xmi");
        assert_eq!(resolve("A.xmi", "B.xmi"), "B.xmi");
    }

    #[test]
    fn test_relativize_round_trips_with_resolve() {
        let base = "/data/models/A.xmi";
        for target in ["/data/models/B.xmi", "/data/other/C.xmi", "/data/models/sub/D.xmi"] {
            let relative = relativize(base, target);
            assert_eq!(resolve(base, &relative), target);
        }
        assert_eq!(relativize("A.xmi", "B.xmi"), "B.xmi");
    }

    #[test]
    fn test_mapper_longest_prefix() {
        let mut mapper = UriMapper::new();
        mapper.insert("platform:/resource/", "/workspace/");
        mapper.insert("platform:/resource/lib/", "/libs/");

        assert_eq!(mapper.map("platform:/resource/lib/a.ecore"), "/libs/a.ecore");
        assert_eq!(mapper.map("platform:/resource/x.xmi"), "/workspace/x.xmi");
        assert_eq!(mapper.map("other.xmi"), "other.xmi");
        assert_eq!(mapper.unmap("/libs/a.ecore").as_deref(), Some("platform:/resource/lib/a.ecore"));
    }
}
