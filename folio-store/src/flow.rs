use std::collections::BTreeMap;

use thiserror::Error;

use folio_model::namespace::is_inbox;
use folio_model::{FolderHandle, Namespaces, SpecialFolderKind, StoreError};

use crate::capability::Capabilities;
use crate::resync::{LifecycleFlags, ResyncController};
use crate::transport::SessionInfo;

/// Everything the store learnt while authenticating. Dropped as a
/// whole on disconnect.
#[derive(Debug)]
pub struct Session {
    pub username: String,
    pub capabilities: Capabilities,
    pub namespaces: Namespaces,
    pub inbox: FolderHandle,
    pub special: BTreeMap<SpecialFolderKind, FolderHandle>,
    pub resync: ResyncController,
    pub folder_opened: bool,
}

impl Session {
    pub fn new(username: String, capabilities: Capabilities, info: SessionInfo) -> Self {
        let namespaces = info.namespaces;
        let inbox = FolderHandle::inbox(info.special_folders.iter().find(|f| is_inbox(&f.path)));

        let mut special = BTreeMap::new();
        special.insert(SpecialFolderKind::Inbox, inbox.clone());
        for remote in info.special_folders.iter().filter(|f| !is_inbox(&f.path)) {
            let kind = match remote.special_use() {
                Some(k) => k,
                None => continue,
            };
            match namespaces.longest_match(&remote.path) {
                Some((ns_kind, ns)) => {
                    special
                        .entry(kind)
                        .or_insert_with(|| FolderHandle::in_namespace(ns_kind, ns, remote));
                }
                None => {
                    tracing::warn!(path=%remote.path, role=%kind, "special folder outside of any namespace, ignored")
                }
            }
        }

        Self {
            username,
            capabilities: info.capabilities.unwrap_or(capabilities),
            namespaces,
            inbox,
            special,
            resync: ResyncController::default(),
            folder_opened: false,
        }
    }
}

pub enum State {
    Disconnected,
    Connected(Capabilities),
    Authenticated(Session),
    Disposed,
}

pub enum Transition {
    Connect(Capabilities),
    Authenticate(Session),
    EnableResync,
    OpenFolder,
    Disconnect,
    Dispose,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("forbidden lifecycle transition")]
    ForbiddenTransition,
}

impl From<Error> for StoreError {
    fn from(e: Error) -> Self {
        StoreError::InvalidOperation(e.to_string())
    }
}

// A connection goes Disconnected -> Connected -> Authenticated and back to
// Disconnected; Disposed is terminal. Resync and folder-open only touch
// the authenticated session.
impl State {
    pub fn apply(&mut self, tr: Transition) -> Result<(), Error> {
        let new_state = match (std::mem::replace(self, State::Disposed), tr) {
            (State::Disposed, _) => return Err(Error::ForbiddenTransition),
            (_, Transition::Dispose) => State::Disposed,
            (_, Transition::Disconnect) => State::Disconnected,
            (State::Disconnected, Transition::Connect(caps)) => State::Connected(caps),
            (State::Connected(_), Transition::Authenticate(session)) => {
                State::Authenticated(session)
            }
            (State::Authenticated(mut session), Transition::EnableResync) => {
                session.resync.commit();
                State::Authenticated(session)
            }
            (State::Authenticated(mut session), Transition::OpenFolder) => {
                session.folder_opened = true;
                State::Authenticated(session)
            }
            (s, _) => {
                *self = s;
                return Err(Error::ForbiddenTransition);
            }
        };
        *self = new_state;
        Ok(())
    }

    pub fn flags(&self) -> LifecycleFlags {
        match self {
            State::Disconnected | State::Disposed => LifecycleFlags::default(),
            State::Connected(_) => LifecycleFlags {
                connected: true,
                ..LifecycleFlags::default()
            },
            State::Authenticated(session) => LifecycleFlags {
                connected: true,
                authenticated: true,
                folder_opened: session.folder_opened,
            },
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            State::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, State::Disposed)
    }
}
