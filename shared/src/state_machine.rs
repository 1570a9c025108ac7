//! Session State Machine
//!
//! Tracks the link state of one session as far as command eligibility is
//! concerned. The 802.11 association and key exchange themselves happen in
//! the protocol layer; it reports their progress here as events.

use std::fmt;

/// Link state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not associated
    Idle,
    /// Associated, keys not yet installed
    WaitingForKey,
    /// Associated and usable
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::WaitingForKey => write!(f, "wait-for-key"),
            SessionState::Connected => write!(f, "connected"),
        }
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Association (or reassociation after roam) succeeded
    Associated { secured: bool },
    /// Association attempt failed
    AssociationFailed,
    /// Key exchange finished and keys are installed
    KeysInstalled,
    /// Peer started a new key exchange on a live link
    RekeyStarted,
    /// Link torn down
    Disconnected,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid; carries the new state
    Success(SessionState),
    /// Transition was invalid from current state
    Invalid {
        from: SessionState,
        event: SessionEvent,
    },
}

/// Link state machine for one session
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    current_state: SessionState,
    key_wait_started_ms: Option<u64>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a new state machine in Idle state
    pub fn new() -> Self {
        Self {
            current_state: SessionState::Idle,
            key_wait_started_ms: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.current_state
    }

    pub fn is_waiting_for_key(&self) -> bool {
        self.current_state == SessionState::WaitingForKey
    }

    /// Timestamp at which the current key wait began
    pub fn key_wait_started_ms(&self) -> Option<u64> {
        self.key_wait_started_ms
    }

    /// Check if the key exchange has been pending for longer than `timeout_ms`
    pub fn is_key_wait_timed_out(&self, current_time_ms: u64, timeout_ms: u64) -> bool {
        match self.key_wait_started_ms {
            Some(started) => current_time_ms.saturating_sub(started) > timeout_ms,
            None => false,
        }
    }

    /// Process an event observed at `current_time_ms`
    pub fn process_event(&mut self, event: SessionEvent, current_time_ms: u64) -> TransitionResult {
        let Some(next) = self.get_next_state(&event) else {
            return TransitionResult::Invalid {
                from: self.current_state,
                event,
            };
        };

        if next == SessionState::WaitingForKey {
            // A reassociation while already waiting keeps the original deadline
            if self.key_wait_started_ms.is_none() {
                self.key_wait_started_ms = Some(current_time_ms);
            }
        } else {
            self.key_wait_started_ms = None;
        }

        self.current_state = next;
        TransitionResult::Success(next)
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: &SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self.current_state, event) {
            // Teardown is valid from anywhere
            (_, Disconnected) | (_, AssociationFailed) => Some(Idle),

            // Initial association, reassociation and roam
            (_, Associated { secured: true }) => Some(WaitingForKey),
            (_, Associated { secured: false }) => Some(Connected),

            (WaitingForKey, KeysInstalled) => Some(Connected),
            // Group key refresh on a live link
            (Connected, KeysInstalled) => Some(Connected),

            (Connected, RekeyStarted) => Some(WaitingForKey),
            (WaitingForKey, RekeyStarted) => Some(WaitingForKey),

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fsm = SessionStateMachine::new();
        assert_eq!(fsm.state(), SessionState::Idle);
        assert!(!fsm.is_waiting_for_key());
    }

    #[test]
    fn test_secured_connect_flow() {
        let mut fsm = SessionStateMachine::new();

        let result = fsm.process_event(SessionEvent::Associated { secured: true }, 100);
        assert_eq!(result, TransitionResult::Success(SessionState::WaitingForKey));
        assert_eq!(fsm.key_wait_started_ms(), Some(100));

        let result = fsm.process_event(SessionEvent::KeysInstalled, 180);
        assert_eq!(result, TransitionResult::Success(SessionState::Connected));
        assert_eq!(fsm.key_wait_started_ms(), None);

        let result = fsm.process_event(SessionEvent::Disconnected, 500);
        assert_eq!(result, TransitionResult::Success(SessionState::Idle));
    }

    #[test]
    fn test_open_connect_skips_key_wait() {
        let mut fsm = SessionStateMachine::new();
        let result = fsm.process_event(SessionEvent::Associated { secured: false }, 10);
        assert_eq!(result, TransitionResult::Success(SessionState::Connected));
        assert!(!fsm.is_waiting_for_key());
    }

    #[test]
    fn test_rekey_reenters_key_wait() {
        let mut fsm = SessionStateMachine::new();
        fsm.process_event(SessionEvent::Associated { secured: false }, 0);
        let result = fsm.process_event(SessionEvent::RekeyStarted, 1_000);
        assert_eq!(result, TransitionResult::Success(SessionState::WaitingForKey));
        assert_eq!(fsm.key_wait_started_ms(), Some(1_000));
    }

    #[test]
    fn test_reassociation_keeps_deadline() {
        let mut fsm = SessionStateMachine::new();
        fsm.process_event(SessionEvent::Associated { secured: true }, 100);
        fsm.process_event(SessionEvent::Associated { secured: true }, 900);
        assert_eq!(fsm.key_wait_started_ms(), Some(100));
    }

    #[test]
    fn test_invalid_transition() {
        let mut fsm = SessionStateMachine::new();

        // Keys cannot be installed without an association
        let result = fsm.process_event(SessionEvent::KeysInstalled, 0);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.state(), SessionState::Idle);
    }

    #[test]
    fn test_key_wait_timeout_detection() {
        let mut fsm = SessionStateMachine::new();

        // Not waiting - never times out
        assert!(!fsm.is_key_wait_timed_out(1_000_000, 5_000));

        fsm.process_event(SessionEvent::Associated { secured: true }, 1_000);
        assert!(!fsm.is_key_wait_timed_out(2_000, 5_000));
        assert!(fsm.is_key_wait_timed_out(1_000 + 5_000 + 1, 5_000));
    }
}
