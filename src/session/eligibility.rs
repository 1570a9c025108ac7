//! Dispatch eligibility rules
//!
//! A session in the middle of a key exchange must not see anything that
//! could disturb the handshake. Only the commands that finish it (set-key)
//! or abandon it (disconnect) may run; a request to close the session is
//! turned into a disconnect first so teardown happens in order.

use wlan_sme_shared::CommandKind;

use super::SessionEntry;

/// Verdict for the command at the head of the general queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// May be dispatched now
    Eligible,
    /// Must stay queued; retried on the next drain
    Deferred,
    /// Session must be disconnected before this command can run
    TeardownFirst,
}

/// Decide whether a command of `kind` may be dispatched against `session`
///
/// Commands for unregistered sessions are always eligible; their handlers
/// decide whether the missing session is an error.
pub fn check(session: Option<&SessionEntry>, kind: CommandKind) -> Eligibility {
    let Some(session) = session else {
        return Eligibility::Eligible;
    };

    if !session.is_waiting_for_key() {
        return Eligibility::Eligible;
    }

    match kind {
        CommandKind::Disconnect | CommandKind::SetKey => Eligibility::Eligible,
        CommandKind::DeleteSession => Eligibility::TeardownFirst,
        _ => Eligibility::Deferred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlan_sme_shared::{MacAddr, SessionId, SessionMode};

    fn waiting_session() -> SessionEntry {
        let mut registry = crate::session::SessionRegistry::new();
        registry.register(SessionId(2), SessionMode::Station, MacAddr::default());
        registry.apply_event(
            SessionId(2),
            wlan_sme_shared::SessionEvent::Associated { secured: true },
            0,
        );
        registry.get(SessionId(2)).cloned().unwrap()
    }

    #[test]
    fn test_unknown_session_is_eligible() {
        assert_eq!(check(None, CommandKind::Roam), Eligibility::Eligible);
    }

    #[test]
    fn test_idle_session_allows_everything() {
        let session = SessionEntry::new(SessionId(1), SessionMode::Station, MacAddr::default());
        for kind in [
            CommandKind::Connect,
            CommandKind::Roam,
            CommandKind::TdlsOp,
            CommandKind::DeleteSession,
        ] {
            assert_eq!(check(Some(&session), kind), Eligibility::Eligible);
        }
    }

    #[test]
    fn test_key_wait_restricts_kinds() {
        let session = waiting_session();
        assert!(session.is_waiting_for_key());

        assert_eq!(check(Some(&session), CommandKind::SetKey), Eligibility::Eligible);
        assert_eq!(check(Some(&session), CommandKind::Disconnect), Eligibility::Eligible);
        assert_eq!(check(Some(&session), CommandKind::Roam), Eligibility::Deferred);
        assert_eq!(check(Some(&session), CommandKind::HwModeChange), Eligibility::Deferred);
        assert_eq!(
            check(Some(&session), CommandKind::DeleteSession),
            Eligibility::TeardownFirst
        );
    }
}
