pub mod error;
pub mod folder;
pub mod namespace;
pub mod special;

// A remote mail store is addressed through 3 things:
// - Namespaces (where folders are rooted and how paths are split)
// - Folder handles (what a path resolved to)
// - Special folders (well-known roles like the inbox or the trash)

pub use error::{Result, StoreError};
pub use folder::{FolderAccess, FolderHandle, FolderRoot, FolderStatus, RemoteFolder};
pub use namespace::{Namespace, NamespaceCollection, NamespaceKind, Namespaces, INBOX};
pub use special::SpecialFolderKind;
