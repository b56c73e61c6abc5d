use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use folio_model::{
    FolderAccess, FolderHandle, Namespace, NamespaceCollection, Result, SpecialFolderKind,
};

use crate::alert::Alerts;
use crate::capability::Capabilities;
use crate::resync::ResyncState;
use crate::store::{MailStore, OpenFolder};
use crate::transport::Credentials;

/// Synchronous front of a [`MailStore`]: each call runs the async
/// operation to completion on a private current-thread runtime.
///
/// Must not be used from within an async context.
pub struct BlockingStore<S: MailStore> {
    store: S,
    rt: Runtime,
}

impl<S: MailStore> BlockingStore<S> {
    pub fn new(store: S) -> Result<Self> {
        let rt = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { store, rt })
    }

    /// The wrapped async store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn connect(&self) -> Result<()> {
        let cancel = CancellationToken::new();
        self.rt.block_on(self.store.connect(&cancel))
    }

    pub fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        let cancel = CancellationToken::new();
        self.rt.block_on(self.store.authenticate(credentials, &cancel))
    }

    pub fn disconnect(&self) -> Result<()> {
        let cancel = CancellationToken::new();
        self.rt.block_on(self.store.disconnect(&cancel))
    }

    pub fn dispose(&self) {
        self.store.dispose()
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn capabilities(&self) -> Result<Capabilities> {
        self.store.capabilities()
    }

    pub fn supports_quotas(&self) -> Result<bool> {
        self.store.supports_quotas()
    }

    pub fn personal_namespaces(&self) -> Result<NamespaceCollection> {
        self.store.personal_namespaces()
    }

    pub fn shared_namespaces(&self) -> Result<NamespaceCollection> {
        self.store.shared_namespaces()
    }

    pub fn other_namespaces(&self) -> Result<NamespaceCollection> {
        self.store.other_namespaces()
    }

    pub fn inbox(&self) -> Result<FolderHandle> {
        self.store.inbox()
    }

    pub fn get_special_folder(&self, kind: SpecialFolderKind) -> Result<Option<FolderHandle>> {
        self.store.get_special_folder(kind)
    }

    pub fn get_namespace_folder(&self, namespace: &Namespace) -> Result<FolderHandle> {
        self.store.get_namespace_folder(namespace)
    }

    pub fn get_folder(&self, path: &str) -> Result<FolderHandle> {
        let cancel = CancellationToken::new();
        self.rt.block_on(self.store.get_folder(path, &cancel))
    }

    pub fn get_folders(
        &self,
        namespace: &Namespace,
        subscribed_only: bool,
    ) -> Result<Vec<FolderHandle>> {
        let cancel = CancellationToken::new();
        self.rt
            .block_on(self.store.get_folders(namespace, subscribed_only, &cancel))
    }

    pub fn resync_state(&self) -> Result<ResyncState> {
        self.store.resync_state()
    }

    pub fn enable_quick_resync(&self) -> Result<()> {
        let cancel = CancellationToken::new();
        self.rt.block_on(self.store.enable_quick_resync(&cancel))
    }

    pub fn open_folder(&self, folder: &FolderHandle, access: FolderAccess) -> Result<OpenFolder> {
        let cancel = CancellationToken::new();
        self.rt
            .block_on(self.store.open_folder(folder, access, &cancel))
    }

    pub fn alerts(&self) -> Alerts {
        self.store.alerts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ImapStore;
    use crate::transport::memory::{MemoryRemote, RemoteDescription};

    #[test]
    fn test_blocking_session() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = BlockingStore::new(ImapStore::new(remote.transport())).unwrap();

        store.connect().unwrap();
        store
            .authenticate(&Credentials::new("alice", "hunter2"))
            .unwrap();
        assert!(store.supports_quotas().unwrap());

        let sent = store.get_folder("INBOX.Sent").unwrap();
        assert_eq!(sent.subpath(), "Sent");
        assert_eq!(
            store.get_special_folder(SpecialFolderKind::Sent).unwrap(),
            Some(sent)
        );

        store.enable_quick_resync().unwrap();
        assert!(store.resync_state().unwrap().is_enabled());

        store.disconnect().unwrap();
        assert!(store.personal_namespaces().unwrap().is_empty());
        assert!(!store.is_connected());
    }
}
