use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Well-known folder roles. `Inbox` is always present once
/// authenticated, the others come from RFC 6154 SPECIAL-USE
/// attributes and may not exist on a given remote.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SpecialFolderKind {
    Inbox,
    All,
    Archive,
    Drafts,
    Flagged,
    Important,
    Junk,
    Sent,
    Trash,
}

impl SpecialFolderKind {
    pub const ALL: [SpecialFolderKind; 9] = [
        Self::Inbox,
        Self::All,
        Self::Archive,
        Self::Drafts,
        Self::Flagged,
        Self::Important,
        Self::Junk,
        Self::Sent,
        Self::Trash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::All => "all",
            Self::Archive => "archive",
            Self::Drafts => "drafts",
            Self::Flagged => "flagged",
            Self::Important => "important",
            Self::Junk => "junk",
            Self::Sent => "sent",
            Self::Trash => "trash",
        }
    }

    /// Maps a LIST attribute such as `\Sent` to its role.
    /// The inbox has no special-use attribute.
    pub fn from_attribute(attr: &str) -> Option<Self> {
        let name = attr.strip_prefix('\\')?;
        match name.to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "archive" => Some(Self::Archive),
            "drafts" => Some(Self::Drafts),
            "flagged" => Some(Self::Flagged),
            "important" => Some(Self::Important),
            "junk" => Some(Self::Junk),
            "sent" => Some(Self::Sent),
            "trash" => Some(Self::Trash),
            _ => None,
        }
    }
}

impl fmt::Display for SpecialFolderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpecialFolderKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::InvalidArgument(format!("unknown special folder {}", s)))
    }
}

impl TryFrom<u8> for SpecialFolderKind {
    type Error = StoreError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(index as usize).copied().ok_or_else(|| {
            StoreError::InvalidArgument(format!("special folder index {} out of range", index))
        })
    }
}
