#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Result};

use folio_model::{Namespace, Namespaces, RemoteFolder};
use folio_store::{
    BlockingStore, Credentials, ImapStore, MemoryRemote, MemoryTransport, RemoteDescription,
};

pub type Store = BlockingStore<ImapStore<MemoryTransport>>;

pub const SMALL_DELAY: Duration = Duration::from_millis(20);
pub const SLOW_REMOTE: Duration = Duration::from_millis(500);

pub fn alice() -> Credentials {
    Credentials::new("alice", "hunter2")
}

/// Runs `fx` against a logged-in store talking to the demo remote.
pub fn demo_store(fx: impl FnOnce(&Store, &MemoryRemote) -> Result<()>) -> Result<()> {
    described_store(RemoteDescription::demo(), fx)
}

pub fn described_store(
    description: RemoteDescription,
    fx: impl FnOnce(&Store, &MemoryRemote) -> Result<()>,
) -> Result<()> {
    let remote = MemoryRemote::new(description);
    let store = BlockingStore::new(ImapStore::new(remote.transport()))?;
    store.connect()?;
    store.authenticate(&alice())?;
    if !store.is_authenticated() {
        bail!("store did not reach the authenticated state");
    }

    let res = fx(&store, &remote);
    store.dispose();
    res
}

/// Drives an async scenario on a runtime of its own.
pub fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(fut))
}

/// One personal, shared and other namespace all using `prefix`.
pub fn overlapping(prefix: &str, shared_only: bool) -> RemoteDescription {
    let slash = Some('/');
    let personal = if shared_only {
        vec![]
    } else {
        vec![Namespace::new(prefix, slash)]
    };
    RemoteDescription {
        capabilities: vec!["IMAP4rev1".into(), "NAMESPACE".into()],
        namespaces: Namespaces {
            personal: personal.into(),
            shared: vec![Namespace::new(prefix, slash)].into(),
            other: vec![Namespace::new(prefix, slash)].into(),
        },
        folders: vec![
            RemoteFolder::new("INBOX", slash),
            RemoteFolder::new(format!("{}Reports", prefix), slash),
        ],
        ..RemoteDescription::default()
    }
}
