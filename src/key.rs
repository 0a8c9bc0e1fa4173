//! Datastore keys
//!
//! Keys are slash-delimited paths like `/blocks/ab/cd`. Every key is
//! canonicalized on construction so the string handed to SQL is always in
//! the same form:
//! - exactly one leading `/`
//! - no trailing `/` (except the root key `/`)
//! - repeated separators collapsed, `.` and `..` segments resolved

use std::fmt;

/// Path separator used by keys
pub const SEPARATOR: char = '/';

/// A canonical, slash-delimited datastore key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Build a key from any path-like string, cleaning it
    pub fn new(raw: impl AsRef<str>) -> Self {
        Key(clean(raw.as_ref()))
    }

    /// The root key `/`
    pub fn root() -> Self {
        Key(SEPARATOR.to_string())
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Append a child segment (the result is cleaned again)
    pub fn child(&self, name: impl AsRef<str>) -> Self {
        Key::new(format!("{}/{}", self.0, name.as_ref()))
    }

    /// The parent key; the root is its own parent
    pub fn parent(&self) -> Self {
        match self.0.rfind(SEPARATOR) {
            Some(0) | None => Key::root(),
            Some(idx) => Key(self.0[..idx].to_string()),
        }
    }

    /// Last path segment (empty for the root)
    pub fn name(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// True if `other` lies strictly below this key in the hierarchy
    ///
    /// `/a` is an ancestor of `/a/b` but not of `/ab`.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0[self.0.len()..].starts_with(SEPARATOR)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Lexical path cleaning, rooted at `/`
fn clean(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in raw.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return SEPARATOR.to_string();
    }

    let mut out = String::with_capacity(raw.len() + 1);
    for segment in segments {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    out
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Key::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Key::new(raw)
    }
}
