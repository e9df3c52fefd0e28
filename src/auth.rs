//! Auth / UserContext adapter (spec §4.C): validates the caller-supplied
//! context and yields a [`RemoteMailClient`] for the session. Every mutating
//! entry point in the core calls [`validate`](Authenticator::validate) first;
//! mutators additionally enforce the resolved user matches `user_context.user_id`.

use crate::remote::RemoteMailClient;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("user id missing from context")]
    UserIdMissing,
    #[error("session id missing from context")]
    SessionIdMissing,
    #[error("session is invalid or expired")]
    SessionInvalid,
    #[error("resolved user does not match session user")]
    SessionUserMismatch,
}

struct Session {
    user_id: String,
}

/// In-memory session table. A real deployment backs this with whatever the
/// collaborator's OAuth/session layer provides; only the validation contract
/// and the remote-client factory are part of this crate.
#[derive(Default)]
pub struct Authenticator {
    sessions: HashMap<String, Session>,
    clients: HashMap<String, Arc<dyn RemoteMailClient>>,
}

impl Authenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_session(&mut self, session_id: impl Into<String>, user_id: impl Into<String>, client: Arc<dyn RemoteMailClient>) {
        let session_id = session_id.into();
        self.sessions.insert(session_id.clone(), Session { user_id: user_id.into() });
        self.clients.insert(session_id, client);
    }

    pub fn validate(&self, ctx: &UserContext) -> Result<(), AuthError> {
        let user_id = ctx.user_id.as_deref().ok_or(AuthError::UserIdMissing)?;
        let session_id = ctx.session_id.as_deref().ok_or(AuthError::SessionIdMissing)?;
        let session = self.sessions.get(session_id).ok_or(AuthError::SessionInvalid)?;
        if session.user_id != user_id {
            return Err(AuthError::SessionUserMismatch);
        }
        Ok(())
    }

    pub fn get_remote_client(&self, session_id: &str) -> Result<Arc<dyn RemoteMailClient>, AuthError> {
        self.clients.get(session_id).cloned().ok_or(AuthError::SessionInvalid)
    }
}
