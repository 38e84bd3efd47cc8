//! Session record: the current session plus archived predecessors

use std::collections::VecDeque;

use tracing::debug;

use super::{
    message::SessionMessage,
    state::SessionState,
    structure::SessionRecordStructure,
};
use crate::{config::RatchetConfig, env::Environment, error::RatchetError};

/// All pairwise sessions with one remote device.
///
/// When the handshake runs again (new device install, simultaneous
/// initiation) the old session is archived rather than dropped, so messages
/// the peer sent before switching still decrypt.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    current: Option<SessionState>,
    previous: VecDeque<SessionState>,
    max_archived: usize,
}

impl SessionRecord {
    /// Empty record.
    pub fn new(config: &RatchetConfig) -> Self {
        Self {
            current: None,
            previous: VecDeque::new(),
            max_archived: config.max_archived_sessions,
        }
    }

    /// Whether there is a session to encrypt with.
    pub fn has_current_session(&self) -> bool {
        self.current.is_some()
    }

    /// Current session, if any.
    pub fn current(&self) -> Option<&SessionState> {
        self.current.as_ref()
    }

    /// Number of archived sessions.
    pub fn archived_count(&self) -> usize {
        self.previous.len()
    }

    /// Install a new current session, archiving the old one.
    pub fn promote_state(&mut self, state: SessionState) {
        if let Some(old) = self.current.replace(state) {
            self.previous.push_front(old);
            self.previous.truncate(self.max_archived);
        }
    }

    /// Encrypt with the current session.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<SessionMessage, RatchetError> {
        self.current.as_mut().ok_or(RatchetError::NoCurrentState)?.encrypt(plaintext)
    }

    /// Decrypt with the current session, falling back to archived ones.
    ///
    /// An archived session that succeeds becomes current again: the peer is
    /// evidently still using it. If every session fails, the current
    /// session's error is returned and nothing changes.
    pub fn decrypt(
        &mut self,
        env: &impl Environment,
        message: &SessionMessage,
    ) -> Result<Vec<u8>, RatchetError> {
        let Some(current) = self.current.as_mut() else {
            return Err(RatchetError::NoCurrentState);
        };

        let current_err = match current.decrypt(env, message) {
            Ok(plaintext) => return Ok(plaintext),
            Err(err) => err,
        };

        for index in 0..self.previous.len() {
            let Some(archived) = self.previous.get_mut(index) else { break };
            if let Ok(plaintext) = archived.decrypt(env, message) {
                debug!(index, "archived session decrypted message, promoting");
                if let Some(state) = self.previous.remove(index) {
                    self.promote_state(state);
                }
                return Ok(plaintext);
            }
        }

        Err(current_err)
    }

    /// Snapshot for persistence.
    pub fn to_structure(&self) -> SessionRecordStructure {
        SessionRecordStructure {
            current_session: self.current.as_ref().map(SessionState::to_structure),
            previous_sessions: self.previous.iter().map(SessionState::to_structure).collect(),
        }
    }

    /// Rebuild a record from its persisted structure.
    pub fn from_structure(
        structure: &SessionRecordStructure,
        config: &RatchetConfig,
    ) -> Result<Self, RatchetError> {
        let current = structure
            .current_session
            .as_ref()
            .map(|session| SessionState::from_structure(session, config))
            .transpose()?;

        let previous = structure
            .previous_sessions
            .iter()
            .take(config.max_archived_sessions)
            .map(|session| SessionState::from_structure(session, config))
            .collect::<Result<VecDeque<_>, _>>()?;

        Ok(Self { current, previous, max_archived: config.max_archived_sessions })
    }
}
