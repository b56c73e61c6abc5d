pub mod memory;

use std::fmt;

use async_trait::async_trait;

use folio_model::{FolderAccess, FolderStatus, Namespaces, RemoteFolder, Result};

use crate::alert::AlertSender;
use crate::capability::{Capabilities, Extension};
use crate::resync::ResyncState;

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// What a successful login tells the store about the account.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub namespaces: Namespaces,
    /// The inbox and the folders carrying a special-use attribute.
    pub special_folders: Vec<RemoteFolder>,
    /// Capabilities re-advertised after login, if any.
    pub capabilities: Option<Capabilities>,
}

/// The connection to the remote: one request at a time, each one a
/// full request/response exchange. Implementations own the wire
/// format, the socket and any retry policy.
///
/// Alerts are pushed through the sender given by `attach_alerts`
/// whenever the remote sends one, independently of the request
/// being processed.
#[async_trait]
pub trait Transport: Send {
    fn attach_alerts(&mut self, alerts: AlertSender);

    async fn connect(&mut self) -> Result<Capabilities>;
    async fn login(&mut self, credentials: &Credentials) -> Result<SessionInfo>;

    /// LIST (or LSUB when `subscribed_only`) with IMAP wildcards
    /// `*` and `%` in `pattern`.
    async fn list(
        &mut self,
        reference: &str,
        pattern: &str,
        subscribed_only: bool,
    ) -> Result<Vec<RemoteFolder>>;

    async fn enable(&mut self, extension: Extension) -> Result<()>;

    /// SELECT or EXAMINE. `resync` tells the remote which expunge
    /// notifications the folder expects.
    async fn select(
        &mut self,
        path: &str,
        access: FolderAccess,
        resync: ResyncState,
    ) -> Result<FolderStatus>;

    async fn logout(&mut self) -> Result<()>;
}

/// IMAP LIST wildcard matching: `*` matches anything, `%` anything
/// but the hierarchy delimiter.
pub fn matches_wildcard(wildcard: &str, name: &str, delimiter: Option<char>) -> bool {
    let wildcard = wildcard.chars().collect::<Vec<char>>();
    let name = name.chars().collect::<Vec<char>>();

    let mut matches = vec![vec![false; wildcard.len() + 1]; name.len() + 1];

    for i in 0..=name.len() {
        for j in 0..=wildcard.len() {
            matches[i][j] = (i == 0 && j == 0)
                || (j > 0
                    && matches[i][j - 1]
                    && (wildcard[j - 1] == '%' || wildcard[j - 1] == '*'))
                || (i > 0
                    && j > 0
                    && matches[i - 1][j - 1]
                    && wildcard[j - 1] == name[i - 1]
                    && wildcard[j - 1] != '%'
                    && wildcard[j - 1] != '*')
                || (i > 0
                    && j > 0
                    && matches[i - 1][j]
                    && (wildcard[j - 1] == '*'
                        || (wildcard[j - 1] == '%' && Some(name[i - 1]) != delimiter)));
        }
    }

    matches[name.len()][wildcard.len()]
}
