use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::namespace::{is_inbox, Namespace, NamespaceKind, INBOX};
use crate::special::SpecialFolderKind;

/// A folder as the remote describes it in a LIST response.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RemoteFolder {
    pub path: String,
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default = "default_subscribed")]
    pub subscribed: bool,
}

fn default_subscribed() -> bool {
    true
}

impl RemoteFolder {
    pub fn new(path: impl Into<String>, delimiter: Option<char>) -> Self {
        Self {
            path: path.into(),
            delimiter,
            attributes: vec![],
            subscribed: true,
        }
    }

    pub fn with_attribute(mut self, attr: impl Into<String>) -> Self {
        self.attributes.push(attr.into());
        self
    }

    pub fn special_use(&self) -> Option<SpecialFolderKind> {
        if is_inbox(&self.path) {
            return Some(SpecialFolderKind::Inbox);
        }
        self.attributes
            .iter()
            .find_map(|a| SpecialFolderKind::from_attribute(a))
    }

    pub fn is_selectable(&self) -> bool {
        selectable(&self.attributes)
    }
}

fn selectable(attributes: &[String]) -> bool {
    !attributes
        .iter()
        .any(|a| a.eq_ignore_ascii_case("\\Noselect") || a.eq_ignore_ascii_case("\\NonExistent"))
}

/// Where a folder lives: below a namespace, or the distinguished inbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FolderRoot {
    Inbox,
    Namespace(NamespaceKind, Namespace),
}

/// Opaque reference to a remote folder. Two handles are the same
/// folder when they have the same path.
#[derive(Clone, Debug)]
pub struct FolderHandle {
    path: String,
    root: FolderRoot,
    delimiter: Option<char>,
    special: Option<SpecialFolderKind>,
    attributes: Vec<String>,
}

impl FolderHandle {
    pub fn inbox(remote: Option<&RemoteFolder>) -> Self {
        Self {
            path: remote.map_or_else(|| INBOX.to_string(), |r| r.path.clone()),
            root: FolderRoot::Inbox,
            delimiter: remote.and_then(|r| r.delimiter),
            special: Some(SpecialFolderKind::Inbox),
            attributes: remote.map(|r| r.attributes.clone()).unwrap_or_default(),
        }
    }

    /// Handle for a folder below `namespace`. The remote delimiter is
    /// preferred, the namespace one is the fallback.
    pub fn in_namespace(kind: NamespaceKind, namespace: &Namespace, remote: &RemoteFolder) -> Self {
        Self {
            path: remote.path.clone(),
            delimiter: remote.delimiter.or(namespace.delimiter()),
            root: FolderRoot::Namespace(kind, namespace.clone()),
            special: remote.special_use(),
            attributes: remote.attributes.clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(&self) -> &FolderRoot {
        &self.root
    }

    pub fn is_inbox(&self) -> bool {
        matches!(self.root, FolderRoot::Inbox)
    }

    pub fn namespace(&self) -> Option<(NamespaceKind, &Namespace)> {
        match &self.root {
            FolderRoot::Inbox => None,
            FolderRoot::Namespace(kind, ns) => Some((*kind, ns)),
        }
    }

    /// Path relative to the namespace prefix. For the inbox this is
    /// the full path.
    pub fn subpath(&self) -> &str {
        match &self.root {
            FolderRoot::Inbox => &self.path,
            FolderRoot::Namespace(_, ns) => ns.subpath(&self.path),
        }
    }

    pub fn delimiter(&self) -> Option<char> {
        self.delimiter
    }

    /// Last segment of the path.
    pub fn name(&self) -> &str {
        let sub = self.subpath();
        match self.delimiter {
            Some(d) => sub.rsplit(d).next().unwrap_or(sub),
            None => sub,
        }
    }

    pub fn special_use(&self) -> Option<SpecialFolderKind> {
        self.special
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn is_selectable(&self) -> bool {
        selectable(&self.attributes)
    }
}

impl PartialEq for FolderHandle {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FolderHandle {}

impl Hash for FolderHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state)
    }
}

impl fmt::Display for FolderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// How a folder is opened.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FolderAccess {
    ReadOnly,
    ReadWrite,
}

/// What the remote reports when a folder is opened.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FolderStatus {
    pub exists: u32,
    pub uid_validity: u32,
    pub uid_next: u32,
    pub highest_modseq: Option<u64>,
}
