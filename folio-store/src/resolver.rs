use folio_model::namespace::is_inbox;
use folio_model::{
    FolderHandle, Namespace, NamespaceKind, RemoteFolder, Result, SpecialFolderKind, StoreError,
};

use crate::flow::Session;

/// What must be asked to the remote to resolve a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Answered locally, no request needed.
    Inbox(FolderHandle),
    /// LIST the path; it lives below this namespace.
    Remote {
        path: String,
        kind: NamespaceKind,
        namespace: Namespace,
    },
}

pub fn special_folder(session: &Session, kind: SpecialFolderKind) -> Option<FolderHandle> {
    match kind {
        SpecialFolderKind::Inbox => Some(session.inbox.clone()),
        other => session.special.get(&other).cloned(),
    }
}

/// Toplevel folder of a namespace the session knows about.
pub fn namespace_folder(session: &Session, namespace: &Namespace) -> Result<FolderHandle> {
    let kind = session.namespaces.kind_of(namespace).ok_or_else(|| {
        StoreError::NotFound(format!("namespace {} is not known to this session", namespace))
    })?;
    if is_inbox(namespace.root_path()) {
        return Ok(session.inbox.clone());
    }
    let root = RemoteFolder::new(namespace.root_path(), namespace.delimiter());
    Ok(FolderHandle::in_namespace(kind, namespace, &root))
}

/// First half of path resolution: validates the path and picks the
/// namespace through which it is addressed.
pub fn plan(session: &Session, path: &str) -> Result<Lookup> {
    if path.is_empty() {
        return Err(StoreError::InvalidArgument(
            "folder path cannot be empty".into(),
        ));
    }
    if is_inbox(path) {
        return Ok(Lookup::Inbox(session.inbox.clone()));
    }

    let (kind, namespace) = session.namespaces.longest_match(path).ok_or_else(|| {
        StoreError::NotFound(format!("{} is not below any known namespace", path))
    })?;
    Ok(Lookup::Remote {
        path: path.to_string(),
        kind,
        namespace: namespace.clone(),
    })
}

/// Second half: picks the exact folder out of the LIST answer.
pub fn finish(lookup: Lookup, listed: Vec<RemoteFolder>) -> Result<FolderHandle> {
    match lookup {
        Lookup::Inbox(inbox) => Ok(inbox),
        Lookup::Remote {
            path,
            kind,
            namespace,
        } => listed
            .iter()
            .find(|f| f.path == path)
            .map(|remote| FolderHandle::in_namespace(kind, &namespace, remote))
            .ok_or_else(|| StoreError::NotFound(format!("no folder named {}", path))),
    }
}

/// LIST pattern covering every folder below `namespace`.
pub fn listing_pattern(namespace: &Namespace) -> String {
    format!("{}*", namespace.prefix())
}

/// Keeps the listed folders that are addressed through `namespace`
/// (a folder below a longer, nested prefix belongs to that one).
pub fn in_namespace(session: &Session, namespace: &Namespace, listed: Vec<RemoteFolder>) -> Vec<FolderHandle> {
    listed
        .iter()
        .filter_map(|remote| {
            if is_inbox(&remote.path) {
                let personal = session.namespaces.kind_of(namespace) == Some(NamespaceKind::Personal);
                return personal.then(|| session.inbox.clone());
            }
            match session.namespaces.longest_match(&remote.path) {
                Some((kind, ns)) if ns == namespace => {
                    Some(FolderHandle::in_namespace(kind, ns, remote))
                }
                _ => None,
            }
        })
        .collect()
}
