use std::fmt;

use serde::{Deserialize, Serialize};

/// Name the remote uses for the distinguished inbox folder.
/// It is matched case-insensitively and never goes through
/// namespace matching.
pub const INBOX: &str = "INBOX";

/// A root prefix and its hierarchy delimiter, as advertised by the
/// remote NAMESPACE response (RFC 2342).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
    delimiter: Option<char>,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>, delimiter: Option<char>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn delimiter(&self) -> Option<char> {
        self.delimiter
    }

    /// Path of the toplevel folder of this namespace: the prefix
    /// without its trailing delimiter. `"#shared/"` gives `"#shared"`,
    /// the empty prefix gives the empty (root) path.
    pub fn root_path(&self) -> &str {
        match self.delimiter {
            Some(d) => self.prefix.strip_suffix(d).unwrap_or(&self.prefix),
            None => &self.prefix,
        }
    }

    /// Length of the match of this namespace against `path`, if any.
    ///
    /// A path matches when it starts with the prefix, or when it is
    /// exactly the root path of the namespace.
    pub fn match_len(&self, path: &str) -> Option<usize> {
        if path.starts_with(&self.prefix) {
            Some(self.prefix.len())
        } else if !self.root_path().is_empty() && path == self.root_path() {
            Some(self.root_path().len())
        } else {
            None
        }
    }

    /// The part of `path` that lives below this namespace.
    pub fn subpath<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.prefix.as_str())
            .or_else(|| path.strip_prefix(self.root_path()))
            .unwrap_or(path)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.delimiter {
            Some(d) => write!(f, "\"{}\" '{}'", self.prefix, d),
            None => write!(f, "\"{}\" NIL", self.prefix),
        }
    }
}

/// The three namespace categories. The derived order is the
/// tie-breaking order used by path resolution.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    Personal,
    Shared,
    Other,
}

impl NamespaceKind {
    pub const ALL: [NamespaceKind; 3] = [Self::Personal, Self::Shared, Self::Other];
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Personal => "personal",
            Self::Shared => "shared",
            Self::Other => "other",
        })
    }
}

/// Ordered namespaces of one category. Insertion order matters:
/// among equal-length matches the first one wins.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct NamespaceCollection(Vec<Namespace>);

impl NamespaceCollection {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Namespace> {
        self.0.iter()
    }

    pub fn contains(&self, namespace: &Namespace) -> bool {
        self.0.contains(namespace)
    }
}

impl From<Vec<Namespace>> for NamespaceCollection {
    fn from(v: Vec<Namespace>) -> Self {
        Self(v)
    }
}

impl FromIterator<Namespace> for NamespaceCollection {
    fn from_iter<I: IntoIterator<Item = Namespace>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a NamespaceCollection {
    type Item = &'a Namespace;
    type IntoIter = std::slice::Iter<'a, Namespace>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Everything the remote advertised in its NAMESPACE response.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Namespaces {
    #[serde(default)]
    pub personal: NamespaceCollection,
    #[serde(default)]
    pub shared: NamespaceCollection,
    #[serde(default)]
    pub other: NamespaceCollection,
}

impl Namespaces {
    pub fn collection(&self, kind: NamespaceKind) -> &NamespaceCollection {
        match kind {
            NamespaceKind::Personal => &self.personal,
            NamespaceKind::Shared => &self.shared,
            NamespaceKind::Other => &self.other,
        }
    }

    pub fn is_empty(&self) -> bool {
        NamespaceKind::ALL
            .iter()
            .all(|k| self.collection(*k).is_empty())
    }

    /// Category in which this exact descriptor is currently known.
    pub fn kind_of(&self, namespace: &Namespace) -> Option<NamespaceKind> {
        NamespaceKind::ALL
            .into_iter()
            .find(|k| self.collection(*k).contains(namespace))
    }

    /// Longest namespace prefix matching `path`.
    ///
    /// Only a strictly longer match replaces the current best one, so
    /// equal lengths resolve to the first descriptor in the order
    /// personal, shared, other and then insertion order.
    pub fn longest_match(&self, path: &str) -> Option<(NamespaceKind, &Namespace)> {
        let mut best: Option<(usize, NamespaceKind, &Namespace)> = None;
        for kind in NamespaceKind::ALL {
            for ns in self.collection(kind) {
                if let Some(len) = ns.match_len(path) {
                    if best.map_or(true, |(blen, _, _)| len > blen) {
                        best = Some((len, kind, ns));
                    }
                }
            }
        }
        best.map(|(_, kind, ns)| (kind, ns))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub fn is_inbox(path: &str) -> bool {
    path.eq_ignore_ascii_case(INBOX)
}
