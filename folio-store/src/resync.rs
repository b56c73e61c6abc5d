use folio_model::{Result, StoreError};

use crate::capability::Capabilities;

/// Quick resynchronization mode (RFC 7162 QRESYNC) of a session.
///
/// `Disabled` at the start of every connection, `Enabled` is terminal
/// until the store disconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResyncState {
    #[default]
    Disabled,
    Enabled,
}

impl ResyncState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// How a folder opened under this state learns about removed messages.
    pub fn expunge_reporting(&self) -> ExpungeReporting {
        match self {
            Self::Disabled => ExpungeReporting::PerMessage,
            Self::Enabled => ExpungeReporting::Vanished,
        }
    }
}

/// Notification strategy handed to a folder when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpungeReporting {
    /// One `* n EXPUNGE` per removed message.
    PerMessage,
    /// Batched `* VANISHED` responses carrying UID sets.
    Vanished,
}

/// The lifecycle facts the resync toggle depends on, as tracked by
/// the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleFlags {
    pub connected: bool,
    pub authenticated: bool,
    pub folder_opened: bool,
}

/// Guards the `Disabled -> Enabled` transition.
#[derive(Debug, Clone, Default)]
pub struct ResyncController {
    state: ResyncState,
}

impl ResyncController {
    pub fn state(&self) -> ResyncState {
        self.state
    }

    /// Checks every precondition of the transition without applying it.
    pub fn check(&self, flags: LifecycleFlags, caps: &Capabilities) -> Result<()> {
        if !flags.connected || !flags.authenticated {
            return Err(StoreError::InvalidOperation(
                "quick resync can only be enabled once authenticated".into(),
            ));
        }
        if flags.folder_opened {
            return Err(StoreError::InvalidOperation(
                "quick resync must be enabled before any folder is opened".into(),
            ));
        }
        if self.state.is_enabled() {
            return Err(StoreError::InvalidOperation(
                "quick resync is already enabled".into(),
            ));
        }
        if !caps.qresync {
            return Err(StoreError::NotSupported(
                "the remote does not advertise QRESYNC".into(),
            ));
        }
        Ok(())
    }

    /// Applies the transition once the remote accepted it.
    pub fn commit(&mut self) {
        self.state = ResyncState::Enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> LifecycleFlags {
        LifecycleFlags {
            connected: true,
            authenticated: true,
            folder_opened: false,
        }
    }

    fn qresync() -> Capabilities {
        Capabilities::parse(["IMAP4rev1", "ENABLE", "QRESYNC"])
    }

    #[test]
    fn test_enable_once() {
        let mut ctl = ResyncController::default();
        assert_eq!(ctl.state(), ResyncState::Disabled);

        ctl.check(ready(), &qresync()).unwrap();
        ctl.commit();
        assert_eq!(ctl.state(), ResyncState::Enabled);
        assert_eq!(ctl.state().expunge_reporting(), ExpungeReporting::Vanished);

        assert!(matches!(
            ctl.check(ready(), &qresync()),
            Err(StoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_lifecycle_preconditions() {
        let ctl = ResyncController::default();

        let anonymous = LifecycleFlags {
            authenticated: false,
            ..ready()
        };
        assert!(matches!(
            ctl.check(anonymous, &qresync()),
            Err(StoreError::InvalidOperation(_))
        ));

        let opened = LifecycleFlags {
            folder_opened: true,
            ..ready()
        };
        assert!(matches!(
            ctl.check(opened, &qresync()),
            Err(StoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_lifecycle_checked_before_capability() {
        let ctl = ResyncController::default();
        let no_qresync = Capabilities::parse(["IMAP4rev1"]);

        assert!(matches!(
            ctl.check(LifecycleFlags::default(), &no_qresync),
            Err(StoreError::InvalidOperation(_))
        ));
        assert!(matches!(
            ctl.check(ready(), &no_qresync),
            Err(StoreError::NotSupported(_))
        ));
    }

    #[test]
    fn test_disabled_reports_per_message() {
        assert_eq!(
            ResyncState::Disabled.expunge_reporting(),
            ExpungeReporting::PerMessage
        );
    }
}
