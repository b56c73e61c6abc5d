//! Client side of a remote mail store.
//!
//! [`ImapStore`] keeps what the remote told it at login time
//! (namespaces, inbox, special-use folders), resolves folder paths
//! against it, drives the one-shot quick resynchronization switch and
//! fans unsolicited alerts out to subscribers. The wire itself lives
//! behind the [`Transport`] trait.

pub mod alert;
pub mod blocking;
pub mod capability;
pub mod flow;
pub mod resolver;
pub mod resync;
pub mod store;
pub mod transport;

pub use alert::{Alert, Alerts};
pub use blocking::BlockingStore;
pub use capability::{Capabilities, Extension};
pub use resync::{ExpungeReporting, ResyncState};
pub use store::{cancellable, ImapStore, MailStore, OpenFolder};
pub use transport::memory::{MemoryRemote, MemoryTransport, RemoteDescription};
pub use transport::{Credentials, SessionInfo, Transport};

pub use tokio_util::sync::CancellationToken;
