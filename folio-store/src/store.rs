use std::future::Future;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use folio_model::{
    FolderAccess, FolderHandle, FolderStatus, Namespace, NamespaceCollection, NamespaceKind,
    Result, SpecialFolderKind, StoreError,
};

use crate::alert::{AlertChannel, Alerts, DEFAULT_ALERT_QUEUE};
use crate::capability::{Capabilities, Extension};
use crate::flow::{Session, State, Transition};
use crate::resolver::{self, Lookup};
use crate::resync::{ExpungeReporting, ResyncState};
use crate::transport::{Credentials, Transport};

/// A folder the remote accepted to open, with the expunge reporting
/// strategy it was opened under.
#[derive(Debug, Clone)]
pub struct OpenFolder {
    pub folder: FolderHandle,
    pub access: FolderAccess,
    pub status: FolderStatus,
    pub expunge_reporting: ExpungeReporting,
}

/// Contract of a remote mail store client.
///
/// Accessors answer from what the store learnt at authentication time
/// and never wait on the network. Operations taking a
/// `CancellationToken` are request/response exchanges with the remote;
/// they are serialized and, when canceled, fail with
/// `OperationCanceled` without changing the store.
#[async_trait]
pub trait MailStore: Send + Sync {
    async fn connect(&self, cancel: &CancellationToken) -> Result<()>;
    async fn authenticate(&self, credentials: &Credentials, cancel: &CancellationToken) -> Result<()>;
    async fn disconnect(&self, cancel: &CancellationToken) -> Result<()>;
    /// Tears the store down; every later call fails with `ObjectDisposed`.
    fn dispose(&self);

    fn is_connected(&self) -> bool;
    fn is_authenticated(&self) -> bool;
    fn capabilities(&self) -> Result<Capabilities>;
    fn supports_quotas(&self) -> Result<bool> {
        Ok(self.capabilities()?.quota)
    }

    fn namespaces(&self, kind: NamespaceKind) -> Result<NamespaceCollection>;
    fn personal_namespaces(&self) -> Result<NamespaceCollection> {
        self.namespaces(NamespaceKind::Personal)
    }
    fn shared_namespaces(&self) -> Result<NamespaceCollection> {
        self.namespaces(NamespaceKind::Shared)
    }
    fn other_namespaces(&self) -> Result<NamespaceCollection> {
        self.namespaces(NamespaceKind::Other)
    }

    fn inbox(&self) -> Result<FolderHandle>;
    fn get_special_folder(&self, kind: SpecialFolderKind) -> Result<Option<FolderHandle>>;
    fn get_namespace_folder(&self, namespace: &Namespace) -> Result<FolderHandle>;
    async fn get_folder(&self, path: &str, cancel: &CancellationToken) -> Result<FolderHandle>;
    async fn get_folders(
        &self,
        namespace: &Namespace,
        subscribed_only: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<FolderHandle>>;

    fn resync_state(&self) -> Result<ResyncState>;
    async fn enable_quick_resync(&self, cancel: &CancellationToken) -> Result<()>;
    async fn open_folder(
        &self,
        folder: &FolderHandle,
        access: FolderAccess,
        cancel: &CancellationToken,
    ) -> Result<OpenFolder>;

    fn alerts(&self) -> Alerts;
}

/// Runs `fut` unless `cancel` fires first. The future only commits
/// state after its last suspension point, so dropping it midway
/// leaves the store untouched.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StoreError::OperationCanceled),
        res = fut => res,
    }
}

/// The mail store of an IMAP-like remote reached through `T`.
pub struct ImapStore<T: Transport> {
    conn: Mutex<T>,
    state: RwLock<State>,
    alerts: AlertChannel,
}

impl<T: Transport> ImapStore<T> {
    pub fn new(transport: T) -> Self {
        Self::with_alert_queue(transport, DEFAULT_ALERT_QUEUE)
    }

    pub fn with_alert_queue(mut transport: T, alert_queue: usize) -> Self {
        let alerts = AlertChannel::new(alert_queue);
        transport.attach_alerts(alerts.sender());
        Self {
            conn: Mutex::new(transport),
            state: RwLock::new(State::Disconnected),
            alerts,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> Result<RwLockReadGuard<'_, State>> {
        let state = self.read();
        if state.is_disposed() {
            return Err(StoreError::ObjectDisposed);
        }
        Ok(state)
    }

    /// Runs `f` on the current session.
    fn with_session<R>(&self, f: impl FnOnce(&Session) -> Result<R>) -> Result<R> {
        let state = self.live()?;
        match state.session() {
            Some(session) => f(session),
            None => Err(StoreError::InvalidOperation(
                "the store is not authenticated".into(),
            )),
        }
    }

    fn apply(&self, tr: Transition) -> Result<()> {
        let mut state = self.write();
        if state.is_disposed() {
            return Err(StoreError::ObjectDisposed);
        }
        state.apply(tr)?;
        Ok(())
    }
}

#[async_trait]
impl<T: Transport + 'static> MailStore for ImapStore<T> {
    async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, async {
            let mut conn = self.conn.lock().await;
            if !matches!(*self.live()?, State::Disconnected) {
                return Err(StoreError::InvalidOperation(
                    "the store is already connected".into(),
                ));
            }

            let caps = conn.connect().await?;
            tracing::info!(capabilities=%caps, "store.connected");
            self.apply(Transition::Connect(caps))
        })
        .await
    }

    async fn authenticate(&self, credentials: &Credentials, cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, async {
            let mut conn = self.conn.lock().await;
            let caps = match &*self.live()? {
                State::Connected(caps) => caps.clone(),
                State::Authenticated(_) => {
                    return Err(StoreError::InvalidOperation(
                        "the store is already authenticated".into(),
                    ))
                }
                _ => {
                    return Err(StoreError::InvalidOperation(
                        "the store must be connected before authenticating".into(),
                    ))
                }
            };

            let info = match conn.login(credentials).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::debug!(error=%e, user=%credentials.username, "authentication failed");
                    return Err(e);
                }
            };
            let session = Session::new(credentials.username.clone(), caps, info);
            tracing::info!(
                user=%session.username,
                personal=session.namespaces.personal.len(),
                shared=session.namespaces.shared.len(),
                other=session.namespaces.other.len(),
                "store.authenticated"
            );
            self.apply(Transition::Authenticate(session))
        })
        .await
    }

    async fn disconnect(&self, cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, async {
            let mut conn = self.conn.lock().await;
            if matches!(*self.live()?, State::Disconnected) {
                return Ok(());
            }

            let res = conn.logout().await;
            if let Err(e) = &res {
                tracing::warn!(error=%e, "logout failed, dropping the session anyway");
            }
            self.apply(Transition::Disconnect)?;
            tracing::info!("store.disconnected");
            res
        })
        .await
    }

    fn dispose(&self) {
        let mut state = self.write();
        if !state.is_disposed() {
            // Dispose is accepted from every live state.
            let _ = state.apply(Transition::Dispose);
            tracing::debug!("store.disposed");
        }
    }

    fn is_connected(&self) -> bool {
        self.read().flags().connected
    }

    fn is_authenticated(&self) -> bool {
        self.read().flags().authenticated
    }

    fn capabilities(&self) -> Result<Capabilities> {
        match &*self.live()? {
            State::Connected(caps) => Ok(caps.clone()),
            State::Authenticated(session) => Ok(session.capabilities.clone()),
            _ => Err(StoreError::InvalidOperation(
                "capabilities are only known once connected".into(),
            )),
        }
    }

    fn namespaces(&self, kind: NamespaceKind) -> Result<NamespaceCollection> {
        let state = self.live()?;
        Ok(state
            .session()
            .map(|s| s.namespaces.collection(kind).clone())
            .unwrap_or_default())
    }

    fn inbox(&self) -> Result<FolderHandle> {
        self.with_session(|s| Ok(s.inbox.clone()))
    }

    fn get_special_folder(&self, kind: SpecialFolderKind) -> Result<Option<FolderHandle>> {
        self.with_session(|s| Ok(resolver::special_folder(s, kind)))
    }

    fn get_namespace_folder(&self, namespace: &Namespace) -> Result<FolderHandle> {
        self.with_session(|s| resolver::namespace_folder(s, namespace))
    }

    async fn get_folder(&self, path: &str, cancel: &CancellationToken) -> Result<FolderHandle> {
        cancellable(cancel, async {
            let mut conn = self.conn.lock().await;
            let lookup = self.with_session(|s| resolver::plan(s, path))?;
            let listed = match &lookup {
                Lookup::Inbox(_) => vec![],
                Lookup::Remote { path, .. } => conn.list("", path, false).await?,
            };
            let folder = resolver::finish(lookup, listed)?;
            tracing::debug!(path=%folder.path(), subpath=%folder.subpath(), "folder.resolved");
            Ok(folder)
        })
        .await
    }

    async fn get_folders(
        &self,
        namespace: &Namespace,
        subscribed_only: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<FolderHandle>> {
        cancellable(cancel, async {
            let mut conn = self.conn.lock().await;
            self.with_session(|s| resolver::namespace_folder(s, namespace))?;

            let pattern = resolver::listing_pattern(namespace);
            let listed = conn.list("", &pattern, subscribed_only).await?;
            self.with_session(|s| Ok(resolver::in_namespace(s, namespace, listed)))
        })
        .await
    }

    fn resync_state(&self) -> Result<ResyncState> {
        let state = self.live()?;
        Ok(state
            .session()
            .map(|s| s.resync.state())
            .unwrap_or_default())
    }

    async fn enable_quick_resync(&self, cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, async {
            let mut conn = self.conn.lock().await;
            {
                let state = self.live()?;
                let flags = state.flags();
                match state.session() {
                    Some(session) => session.resync.check(flags, &session.capabilities)?,
                    None => {
                        return Err(StoreError::InvalidOperation(
                            "quick resync can only be enabled once authenticated".into(),
                        ))
                    }
                }
            }

            conn.enable(Extension::QResync).await?;
            self.apply(Transition::EnableResync)?;
            tracing::info!("store.quick_resync_enabled");
            Ok(())
        })
        .await
    }

    async fn open_folder(
        &self,
        folder: &FolderHandle,
        access: FolderAccess,
        cancel: &CancellationToken,
    ) -> Result<OpenFolder> {
        cancellable(cancel, async {
            let mut conn = self.conn.lock().await;
            let resync = self.with_session(|s| {
                if let Some((_, ns)) = folder.namespace() {
                    if s.namespaces.kind_of(ns).is_none() {
                        return Err(StoreError::NotFound(format!(
                            "namespace {} of {} is not known to this session",
                            ns, folder
                        )));
                    }
                }
                Ok(s.resync.state())
            })?;
            if !folder.is_selectable() {
                return Err(StoreError::InvalidOperation(format!(
                    "{} cannot be opened",
                    folder
                )));
            }

            let status = conn.select(folder.path(), access, resync).await?;
            self.apply(Transition::OpenFolder)?;
            tracing::info!(folder=%folder, ?access, ?resync, "folder.opened");
            Ok(OpenFolder {
                folder: folder.clone(),
                access,
                status,
                expunge_reporting: resync.expunge_reporting(),
            })
        })
        .await
    }

    fn alerts(&self) -> Alerts {
        self.alerts.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{Failure, MemoryRemote, MemoryTransport, RemoteDescription};
    use folio_model::RemoteFolder;
    use std::time::{Duration, Instant};

    async fn logged_in(remote: &MemoryRemote) -> ImapStore<MemoryTransport> {
        let store = ImapStore::new(remote.transport());
        let cancel = CancellationToken::new();
        store.connect(&cancel).await.unwrap();
        store
            .authenticate(&Credentials::new("alice", "hunter2"), &cancel)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_accessors_before_authentication() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = ImapStore::new(remote.transport());

        assert!(store.personal_namespaces().unwrap().is_empty());
        assert!(matches!(store.inbox(), Err(StoreError::InvalidOperation(_))));
        assert!(matches!(
            store.get_special_folder(SpecialFolderKind::Sent),
            Err(StoreError::InvalidOperation(_))
        ));
        assert_eq!(store.resync_state().unwrap(), ResyncState::Disabled);
    }

    #[tokio::test]
    async fn test_rejected_credentials_keep_connected_state() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = ImapStore::new(remote.transport());
        let cancel = CancellationToken::new();
        store.connect(&cancel).await.unwrap();

        let res = store
            .authenticate(&Credentials::new("alice", "nope"), &cancel)
            .await;
        assert!(matches!(res, Err(StoreError::Authentication(_))));
        assert!(store.is_connected());
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_get_folder() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;
        let cancel = CancellationToken::new();

        let before = remote.request_count();
        let inbox = store.get_folder("inbox", &cancel).await.unwrap();
        assert!(inbox.is_inbox());
        assert_eq!(remote.request_count(), before);

        let projects = store
            .get_folder("#users.bob.Projects", &cancel)
            .await
            .unwrap();
        assert_eq!(projects.namespace().unwrap().0, NamespaceKind::Other);
        assert_eq!(projects.subpath(), "bob.Projects");

        assert!(matches!(
            store.get_folder("INBOX.Missing", &cancel).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_folder("", &cancel).await,
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_get_folders() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;
        let cancel = CancellationToken::new();

        let shared = store.shared_namespaces().unwrap();
        let ns = shared.iter().next().unwrap();
        let all = store.get_folders(ns, false, &cancel).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(store.get_folders(ns, true, &cancel).await.unwrap().is_empty());

        let stale = Namespace::new("Public/", Some('/'));
        assert!(matches!(
            store.get_folders(&stale, false, &cancel).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_quick_resync_preconditions() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = ImapStore::new(remote.transport());
        let cancel = CancellationToken::new();

        assert!(matches!(
            store.enable_quick_resync(&cancel).await,
            Err(StoreError::InvalidOperation(_))
        ));

        store.connect(&cancel).await.unwrap();
        store
            .authenticate(&Credentials::new("alice", "hunter2"), &cancel)
            .await
            .unwrap();
        store.enable_quick_resync(&cancel).await.unwrap();
        assert!(matches!(
            store.enable_quick_resync(&cancel).await,
            Err(StoreError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_quick_resync_not_advertised() {
        let mut description = RemoteDescription::demo();
        description.capabilities.retain(|c| c != "QRESYNC");
        let remote = MemoryRemote::new(description);
        let store = logged_in(&remote).await;

        let res = store.enable_quick_resync(&CancellationToken::new()).await;
        assert!(matches!(res, Err(StoreError::NotSupported(_))));
        assert_eq!(store.resync_state().unwrap(), ResyncState::Disabled);
    }

    #[tokio::test]
    async fn test_open_folder_locks_resync() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;
        let cancel = CancellationToken::new();

        let inbox = store.inbox().unwrap();
        let open = store
            .open_folder(&inbox, FolderAccess::ReadOnly, &cancel)
            .await
            .unwrap();
        assert_eq!(open.expunge_reporting, ExpungeReporting::PerMessage);
        assert!(matches!(
            store.enable_quick_resync(&cancel).await,
            Err(StoreError::InvalidOperation(_))
        ));

        let shared = store.get_folder("#shared", &cancel).await.unwrap();
        assert!(matches!(
            store.open_folder(&shared, FolderAccess::ReadOnly, &cancel).await,
            Err(StoreError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_quick_resync_transport_failures() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;
        let cancel = CancellationToken::new();

        remote.fail_next(Failure::Protocol);
        assert!(matches!(
            store.enable_quick_resync(&cancel).await,
            Err(StoreError::Protocol(_))
        ));
        assert_eq!(store.resync_state().unwrap(), ResyncState::Disabled);

        remote.fail_next(Failure::Io);
        assert!(matches!(
            store.enable_quick_resync(&cancel).await,
            Err(StoreError::Io(_))
        ));
        assert_eq!(store.resync_state().unwrap(), ResyncState::Disabled);

        store.dispose();
        assert!(matches!(
            store.enable_quick_resync(&cancel).await,
            Err(StoreError::ObjectDisposed)
        ));
    }

    #[tokio::test]
    async fn test_requests_are_serialized() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;
        let cancel = CancellationToken::new();
        let latency = Duration::from_millis(100);
        remote.set_latency(Some(latency));

        let started = Instant::now();
        let (folder, resync) = tokio::join!(
            store.get_folder("INBOX.Sent", &cancel),
            store.enable_quick_resync(&cancel)
        );
        let elapsed = started.elapsed();

        folder.unwrap();
        resync.unwrap();
        assert!(elapsed >= latency * 2, "requests overlapped: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_open_folder_of_unknown_namespace() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;

        let public = Namespace::new("Public/", Some('/'));
        let stale = FolderHandle::in_namespace(
            NamespaceKind::Shared,
            &public,
            &RemoteFolder::new("Public/Team", Some('/')),
        );
        let before = remote.request_count();
        let res = store
            .open_folder(&stale, FolderAccess::ReadOnly, &CancellationToken::new())
            .await;
        assert!(matches!(res, Err(StoreError::NotFound(_))));
        assert_eq!(remote.request_count(), before);
        assert!(!store.read().flags().folder_opened);
    }

    #[tokio::test]
    async fn test_open_folder_with_resync() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;
        let cancel = CancellationToken::new();

        store.enable_quick_resync(&cancel).await.unwrap();
        let sent = store.get_folder("INBOX.Sent", &cancel).await.unwrap();
        let open = store
            .open_folder(&sent, FolderAccess::ReadWrite, &cancel)
            .await
            .unwrap();
        assert_eq!(open.expunge_reporting, ExpungeReporting::Vanished);
        assert_eq!(open.status.highest_modseq, Some(1));
    }

    #[tokio::test]
    async fn test_cancellation_leaves_state() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;
        remote.set_latency(Some(Duration::from_secs(5)));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let (res, _) = tokio::join!(store.enable_quick_resync(&cancel), async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        assert!(matches!(res, Err(StoreError::OperationCanceled)));
        assert_eq!(store.resync_state().unwrap(), ResyncState::Disabled);

        remote.set_latency(None);
        store
            .enable_quick_resync(&CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_survives_logout_failure() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;

        remote.fail_next(Failure::Io);
        let res = store.disconnect(&CancellationToken::new()).await;
        assert!(matches!(res, Err(StoreError::Io(_))));
        assert!(!store.is_connected());
        assert!(store.other_namespaces().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispose() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = logged_in(&remote).await;
        store.dispose();

        assert!(matches!(store.inbox(), Err(StoreError::ObjectDisposed)));
        assert!(matches!(
            store.personal_namespaces(),
            Err(StoreError::ObjectDisposed)
        ));
        assert!(matches!(
            store.connect(&CancellationToken::new()).await,
            Err(StoreError::ObjectDisposed)
        ));
        store.dispose();
    }

    #[tokio::test]
    async fn test_login_alerts() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let store = ImapStore::new(remote.transport());
        let mut alerts = store.alerts();
        let cancel = CancellationToken::new();
        store.connect(&cancel).await.unwrap();
        store
            .authenticate(&Credentials::new("alice", "hunter2"), &cancel)
            .await
            .unwrap();

        let first = alerts.try_recv().unwrap();
        assert!(!first.message.is_empty());
        assert!(alerts.try_recv().is_none());
    }
}
