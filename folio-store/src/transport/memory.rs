//! A remote living in the same process, described by a
//! [`RemoteDescription`]. Used by the test suites and by the
//! command line dev mode.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use folio_model::namespace::is_inbox;
use folio_model::{
    FolderAccess, FolderStatus, Namespace, Namespaces, RemoteFolder, Result, StoreError,
};

use crate::alert::AlertSender;
use crate::capability::{Capabilities, Extension};
use crate::resync::ResyncState;
use crate::transport::{matches_wildcard, Credentials, SessionInfo, Transport};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RemoteDescription {
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub namespaces: Namespaces,
    #[serde(default)]
    pub folders: Vec<RemoteFolder>,
    /// Accepted logins. When empty any login is accepted.
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    /// Alerts sent right after a successful login.
    #[serde(default)]
    pub alerts: Vec<String>,
}

impl RemoteDescription {
    /// A small Courier-like account: personal folders below `INBOX.`,
    /// a shared and an other-users namespace.
    pub fn demo() -> Self {
        let dot = Some('.');
        Self {
            capabilities: [
                "IMAP4rev1",
                "NAMESPACE",
                "ENABLE",
                "CONDSTORE",
                "QRESYNC",
                "SPECIAL-USE",
                "QUOTA",
                "IDLE",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            namespaces: Namespaces {
                personal: vec![Namespace::new("INBOX.", dot)].into(),
                shared: vec![Namespace::new("#shared.", dot)].into(),
                other: vec![Namespace::new("#users.", dot)].into(),
            },
            folders: vec![
                RemoteFolder::new("INBOX", dot),
                RemoteFolder::new("INBOX.Sent", dot).with_attribute("\\Sent"),
                RemoteFolder::new("INBOX.Drafts", dot).with_attribute("\\Drafts"),
                RemoteFolder::new("INBOX.Trash", dot).with_attribute("\\Trash"),
                RemoteFolder::new("INBOX.Archive", dot).with_attribute("\\Archive"),
                RemoteFolder::new("INBOX.Archive.2023", dot),
                RemoteFolder::new("#shared", dot).with_attribute("\\Noselect"),
                RemoteFolder {
                    subscribed: false,
                    ..RemoteFolder::new("#shared.Team", dot)
                },
                RemoteFolder::new("#users.bob", dot).with_attribute("\\Noselect"),
                RemoteFolder::new("#users.bob.Projects", dot),
            ],
            users: BTreeMap::from([("alice".to_string(), "hunter2".to_string())]),
            alerts: vec!["Scheduled maintenance tonight at 23:00 UTC".to_string()],
        }
    }
}

/// Failure injected into the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Io,
    Protocol,
}

struct RemoteInner {
    description: RemoteDescription,
    latency: Mutex<Option<Duration>>,
    failure: Mutex<Option<Failure>>,
    listeners: Mutex<Vec<(u64, AlertSender)>>,
    next_listener: AtomicU64,
    requests: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct MemoryRemote(Arc<RemoteInner>);

impl MemoryRemote {
    pub fn new(description: RemoteDescription) -> Self {
        Self(Arc::new(RemoteInner {
            description,
            latency: Mutex::new(None),
            failure: Mutex::new(None),
            listeners: Mutex::new(vec![]),
            next_listener: AtomicU64::new(0),
            requests: AtomicUsize::new(0),
        }))
    }

    /// A new, not yet connected, connection to this remote.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            remote: self.clone(),
            alerts: None,
            listener: None,
            connected: false,
            authenticated: false,
            enabled: vec![],
        }
    }

    /// Delay applied to every request before it is answered.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.0.latency) = latency;
    }

    pub fn fail_next(&self, failure: Failure) {
        *lock(&self.0.failure) = Some(failure);
    }

    /// Sends an alert on every open connection.
    pub fn push_alert(&self, message: &str) {
        for (_, sender) in lock(&self.0.listeners).iter() {
            sender.push(message);
        }
    }

    /// Number of requests answered or in flight so far.
    pub fn request_count(&self) -> usize {
        self.0.requests.load(Ordering::SeqCst)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::parse(self.0.description.capabilities.iter().map(String::as_str))
    }

    async fn exchange(&self, command: &str) -> Result<()> {
        self.0.requests.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(command, "memory.request");

        let latency = *lock(&self.0.latency);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        let failure = lock(&self.0.failure).take();
        match failure {
            Some(Failure::Io) => Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("connection reset during {}", command),
            ))),
            Some(Failure::Protocol) => Err(StoreError::Protocol(format!(
                "unparsable response to {}",
                command
            ))),
            None => Ok(()),
        }
    }

    fn register(&self, sender: AlertSender) -> u64 {
        let id = self.0.next_listener.fetch_add(1, Ordering::SeqCst);
        lock(&self.0.listeners).push((id, sender));
        id
    }

    fn unregister(&self, id: u64) {
        lock(&self.0.listeners).retain(|(other, _)| *other != id);
    }
}

pub struct MemoryTransport {
    remote: MemoryRemote,
    alerts: Option<AlertSender>,
    listener: Option<u64>,
    connected: bool,
    authenticated: bool,
    enabled: Vec<Extension>,
}

impl MemoryTransport {
    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "not connected",
            )))
        }
    }

    fn ensure_authenticated(&self) -> Result<()> {
        self.ensure_connected()?;
        if self.authenticated {
            Ok(())
        } else {
            Err(StoreError::Protocol("BAD command requires authentication".into()))
        }
    }

    fn close(&mut self) {
        if let Some(id) = self.listener.take() {
            self.remote.unregister(id);
        }
        self.connected = false;
        self.authenticated = false;
        self.enabled.clear();
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn attach_alerts(&mut self, alerts: AlertSender) {
        self.alerts = Some(alerts);
    }

    async fn connect(&mut self) -> Result<Capabilities> {
        self.remote.exchange("CAPABILITY").await?;
        self.close();
        self.connected = true;
        if let Some(sender) = &self.alerts {
            self.listener = Some(self.remote.register(sender.clone()));
        }
        Ok(self.remote.capabilities())
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<SessionInfo> {
        self.ensure_connected()?;
        self.remote.exchange("LOGIN").await?;

        let description = &self.remote.0.description;
        if !description.users.is_empty()
            && description.users.get(&credentials.username) != Some(&credentials.password)
        {
            return Err(StoreError::Authentication(format!(
                "invalid credentials for {}",
                credentials.username
            )));
        }
        self.authenticated = true;

        if let Some(sender) = &self.alerts {
            for alert in description.alerts.iter() {
                sender.push(alert.as_str());
            }
        }

        Ok(SessionInfo {
            namespaces: description.namespaces.clone(),
            special_folders: description
                .folders
                .iter()
                .filter(|f| f.special_use().is_some())
                .cloned()
                .collect(),
            capabilities: None,
        })
    }

    async fn list(
        &mut self,
        reference: &str,
        pattern: &str,
        subscribed_only: bool,
    ) -> Result<Vec<RemoteFolder>> {
        self.ensure_authenticated()?;
        self.remote
            .exchange(if subscribed_only { "LSUB" } else { "LIST" })
            .await?;

        let wildcard = format!("{}{}", reference, pattern);
        Ok(self
            .remote
            .0
            .description
            .folders
            .iter()
            .filter(|f| !subscribed_only || f.subscribed)
            .filter(|f| {
                (is_inbox(&wildcard) && is_inbox(&f.path))
                    || matches_wildcard(&wildcard, &f.path, f.delimiter)
            })
            .cloned()
            .collect())
    }

    async fn enable(&mut self, extension: Extension) -> Result<()> {
        self.ensure_authenticated()?;
        self.remote.exchange("ENABLE").await?;
        if !self.remote.capabilities().supports(extension) {
            return Err(StoreError::Protocol(format!(
                "BAD unknown extension {}",
                extension
            )));
        }
        if extension == Extension::QResync {
            self.enabled.push(Extension::CondStore);
        }
        self.enabled.push(extension);
        Ok(())
    }

    async fn select(
        &mut self,
        path: &str,
        access: FolderAccess,
        resync: ResyncState,
    ) -> Result<FolderStatus> {
        self.ensure_authenticated()?;
        self.remote
            .exchange(match access {
                FolderAccess::ReadOnly => "EXAMINE",
                FolderAccess::ReadWrite => "SELECT",
            })
            .await?;

        if resync.is_enabled() && !self.enabled.contains(&Extension::QResync) {
            return Err(StoreError::Protocol(
                "BAD QRESYNC parameter without ENABLE QRESYNC".into(),
            ));
        }

        let folders = &self.remote.0.description.folders;
        let (index, folder) = folders
            .iter()
            .enumerate()
            .find(|(_, f)| f.path == path || (is_inbox(path) && is_inbox(&f.path)))
            .ok_or_else(|| StoreError::NotFound(format!("no folder named {}", path)))?;
        if !folder.is_selectable() {
            return Err(StoreError::InvalidOperation(format!(
                "{} cannot be opened",
                path
            )));
        }

        Ok(FolderStatus {
            exists: 0,
            uid_validity: index as u32 + 1,
            uid_next: 1,
            highest_modseq: self
                .enabled
                .contains(&Extension::CondStore)
                .then_some(1),
        })
    }

    async fn logout(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let res = self.remote.exchange("LOGOUT").await;
        self.close();
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_checks_users() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let mut transport = remote.transport();
        transport.connect().await.unwrap();

        let res = transport.login(&Credentials::new("alice", "wrong")).await;
        assert!(matches!(res, Err(StoreError::Authentication(_))));

        let info = transport
            .login(&Credentials::new("alice", "hunter2"))
            .await
            .unwrap();
        assert_eq!(info.namespaces.personal.len(), 1);
        assert!(info.special_folders.iter().any(|f| f.path == "INBOX"));
        assert!(info.special_folders.iter().any(|f| f.path == "INBOX.Sent"));
    }

    #[tokio::test]
    async fn test_list_patterns() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let mut transport = remote.transport();
        transport.connect().await.unwrap();
        transport.login(&Credentials::new("alice", "hunter2")).await.unwrap();

        let all = transport.list("", "INBOX.*", false).await.unwrap();
        assert_eq!(all.len(), 5);

        let top = transport.list("INBOX.", "%", false).await.unwrap();
        assert_eq!(top.len(), 4);

        let inbox = transport.list("", "inbox", false).await.unwrap();
        assert_eq!(inbox.len(), 1);

        let shared = transport.list("", "#shared.*", true).await.unwrap();
        assert!(shared.is_empty());
    }

    #[tokio::test]
    async fn test_select_requires_enable_for_qresync() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let mut transport = remote.transport();
        transport.connect().await.unwrap();
        transport.login(&Credentials::new("alice", "hunter2")).await.unwrap();

        let res = transport
            .select("INBOX", FolderAccess::ReadWrite, ResyncState::Enabled)
            .await;
        assert!(matches!(res, Err(StoreError::Protocol(_))));

        transport.enable(Extension::QResync).await.unwrap();
        let status = transport
            .select("INBOX", FolderAccess::ReadWrite, ResyncState::Enabled)
            .await
            .unwrap();
        assert_eq!(status.highest_modseq, Some(1));
    }

    #[tokio::test]
    async fn test_injected_failure_hits_next_request_only() {
        let remote = MemoryRemote::new(RemoteDescription::demo());
        let mut transport = remote.transport();
        remote.fail_next(Failure::Io);

        assert!(matches!(transport.connect().await, Err(StoreError::Io(_))));
        assert!(transport.connect().await.is_ok());
        assert_eq!(remote.request_count(), 2);
    }
}
