//! Session registry

use std::collections::HashMap;

use tracing::{debug, info, warn};
use wlan_sme_shared::{
    CompletionStatus, MacAddr, SessionEvent, SessionId, SessionMode, SessionState,
    SessionStateMachine, TransitionResult,
};

use crate::command::{Command, CommandPayload};

/// State tracked for one session
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub id: SessionId,
    pub mode: SessionMode,
    pub mac: MacAddr,
    fsm: SessionStateMachine,
}

impl SessionEntry {
    pub fn new(id: SessionId, mode: SessionMode, mac: MacAddr) -> Self {
        Self {
            id,
            mode,
            mac,
            fsm: SessionStateMachine::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.fsm.state()
    }

    pub fn is_waiting_for_key(&self) -> bool {
        self.fsm.is_waiting_for_key()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            mode: self.mode,
            state: self.fsm.state(),
        }
    }
}

/// Copy of a session's state handed to command handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub mode: SessionMode,
    pub state: SessionState,
}

/// What a completion did to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    None,
    Added,
    Removed,
    StateChanged(SessionState),
}

/// Maps session ids to their state
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; returns false if the id is already taken
    pub fn register(&mut self, id: SessionId, mode: SessionMode, mac: MacAddr) -> bool {
        if self.sessions.contains_key(&id) {
            return false;
        }
        info!("[SESSION] {} registered as {} ({})", id, mode, mac);
        self.sessions.insert(id, SessionEntry::new(id, mode, mac));
        true
    }

    pub fn unregister(&mut self, id: SessionId) -> Option<SessionEntry> {
        let removed = self.sessions.remove(&id);
        if removed.is_some() {
            info!("[SESSION] {} removed", id);
        }
        removed
    }

    pub fn get(&self, id: SessionId) -> Option<&SessionEntry> {
        self.sessions.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn state(&self, id: SessionId) -> Option<SessionState> {
        self.sessions.get(&id).map(|s| s.state())
    }

    pub fn snapshot(&self, id: SessionId) -> Option<SessionSnapshot> {
        self.sessions.get(&id).map(|s| s.snapshot())
    }

    /// Feed a protocol-layer event into a session's state machine
    pub fn apply_event(
        &mut self,
        id: SessionId,
        event: SessionEvent,
        now_ms: u64,
    ) -> Option<TransitionResult> {
        let entry = self.sessions.get_mut(&id)?;
        let from = entry.state();
        let result = entry.fsm.process_event(event, now_ms);

        match &result {
            TransitionResult::Success(to) if *to != from => {
                info!("[SESSION] {}: {} -> {}", id, from, to);
            }
            TransitionResult::Success(_) => {}
            TransitionResult::Invalid { from, event } => {
                warn!("[SESSION] {}: ignoring {:?} in state {}", id, event, from);
            }
        }

        Some(result)
    }

    /// Fold a finished command into the registry
    pub fn apply_completion(
        &mut self,
        command: &Command,
        status: &CompletionStatus,
        now_ms: u64,
    ) -> SessionEffect {
        let id = command.session;

        match (&command.payload, status) {
            (CommandPayload::AddSession(req), CompletionStatus::Success) => {
                if self.register(id, req.mode, req.mac) {
                    SessionEffect::Added
                } else {
                    SessionEffect::None
                }
            }
            (CommandPayload::DeleteSession, CompletionStatus::Success) => {
                match self.unregister(id) {
                    Some(_) => SessionEffect::Removed,
                    None => SessionEffect::None,
                }
            }
            (CommandPayload::Connect(req), CompletionStatus::Success) => self.transition(
                id,
                SessionEvent::Associated {
                    secured: req.secured,
                },
                now_ms,
            ),
            (CommandPayload::Roam(req), CompletionStatus::Success) => self.transition(
                id,
                SessionEvent::Associated {
                    secured: req.secured,
                },
                now_ms,
            ),
            (CommandPayload::Connect(_) | CommandPayload::Roam(_), CompletionStatus::Failed { .. }) => {
                self.transition(id, SessionEvent::AssociationFailed, now_ms)
            }
            (
                CommandPayload::Disconnect(_),
                CompletionStatus::Success | CompletionStatus::Failed { .. },
            ) => self.transition(id, SessionEvent::Disconnected, now_ms),
            (CommandPayload::SetKey(req), CompletionStatus::Success) if req.completes_handshake => {
                self.transition(id, SessionEvent::KeysInstalled, now_ms)
            }
            _ => SessionEffect::None,
        }
    }

    fn transition(&mut self, id: SessionId, event: SessionEvent, now_ms: u64) -> SessionEffect {
        match self.apply_event(id, event, now_ms) {
            Some(TransitionResult::Success(state)) => SessionEffect::StateChanged(state),
            Some(TransitionResult::Invalid { .. }) => SessionEffect::None,
            None => {
                debug!("[SESSION] completion for unregistered {}", id);
                SessionEffect::None
            }
        }
    }

    /// Sessions whose key exchange has outlived `timeout_ms`
    pub fn key_wait_expired(&self, now_ms: u64, timeout_ms: u64) -> Vec<SessionId> {
        let mut expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.fsm.is_key_wait_timed_out(now_ms, timeout_ms))
            .map(|s| s.id)
            .collect();
        expired.sort();
        expired
    }
}
