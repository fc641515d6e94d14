//! Per-chat login sessions: bearer token plus the user it belongs to.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::lifecycle::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
}

#[derive(Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn new(token: String, user: SessionUser, now: OffsetDateTime, ttl: Duration) -> Self {
        Session {
            token,
            user,
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, chat_id: i64) -> Result<Option<Session>, AppError>;
    async fn save(&self, chat_id: i64, session: &Session) -> Result<(), AppError>;
    async fn clear(&self, chat_id: i64) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, chat_id: i64) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.lock().await.get(&chat_id).cloned())
    }

    async fn save(&self, chat_id: i64, session: &Session) -> Result<(), AppError> {
        self.sessions.lock().await.insert(chat_id, session.clone());
        Ok(())
    }

    async fn clear(&self, chat_id: i64) -> Result<(), AppError> {
        self.sessions.lock().await.remove(&chat_id);
        Ok(())
    }
}

/// Session access with the invalidation rules applied: expired sessions are
/// dropped on read, and a rejected token clears the chat's session.
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl Sessions {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Sessions { store, ttl }
    }

    pub async fn current(&self, chat_id: i64) -> Result<Option<Session>, AppError> {
        self.current_at(chat_id, OffsetDateTime::now_utc()).await
    }

    pub async fn current_at(
        &self,
        chat_id: i64,
        now: OffsetDateTime,
    ) -> Result<Option<Session>, AppError> {
        match self.store.load(chat_id).await? {
            Some(session) if session.is_expired(now) => {
                info!("Session for chat {} expired at {}", chat_id, session.expires_at);
                self.store.clear(chat_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub async fn require(&self, chat_id: i64) -> Result<Session, AppError> {
        self.current(chat_id).await?.ok_or(AppError::NotLoggedIn)
    }

    pub async fn start(&self, chat_id: i64, token: String, user: SessionUser) -> Result<Session, AppError> {
        let session = Session::new(token, user, OffsetDateTime::now_utc(), self.ttl);
        self.store.save(chat_id, &session).await?;
        debug!("Saved session for chat {}: {:?}", chat_id, session);
        Ok(session)
    }

    pub async fn end(&self, chat_id: i64) -> Result<(), AppError> {
        self.store.clear(chat_id).await
    }

    /// Clears the session when `error` means the server no longer accepts the token.
    pub async fn invalidate_on(&self, chat_id: i64, error: &AppError) -> Result<bool, AppError> {
        if error.is_unauthorized() {
            info!("Token rejected for chat {}, clearing session", chat_id);
            self.store.clear(chat_id).await?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
pub(crate) fn test_session(role: Role) -> Session {
    Session::new(
        "test-token".to_string(),
        SessionUser {
            id: format!("{role}-1"),
            email: format!("{role}@example.com"),
            full_name: None,
            role,
        },
        OffsetDateTime::now_utc(),
        Duration::hours(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn user() -> SessionUser {
        SessionUser {
            id: "u1".to_string(),
            email: "ann@example.com".to_string(),
            full_name: Some("Ann".to_string()),
            role: Role::User,
        }
    }

    fn sessions() -> Sessions {
        Sessions::new(Arc::new(MemorySessionStore::default()), Duration::hours(24))
    }

    #[tokio::test]
    async fn expired_session_is_cleared_on_read() {
        let sessions = sessions();
        let session = sessions.start(7, "tok".to_string(), user()).await.unwrap();

        let later = session.issued_at + Duration::hours(23);
        assert!(sessions.current_at(7, later).await.unwrap().is_some());

        let expired = session.issued_at + Duration::hours(24);
        assert!(sessions.current_at(7, expired).await.unwrap().is_none());
        assert!(sessions.current_at(7, session.issued_at).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unauthorized_clears_session() {
        let sessions = sessions();
        sessions.start(7, "tok".to_string(), user()).await.unwrap();

        let other = AppError::from(ApiError::Status { status: 500, message: "boom".to_string() });
        assert!(!sessions.invalidate_on(7, &other).await.unwrap());
        assert!(sessions.current(7).await.unwrap().is_some());

        let rejected = AppError::from(ApiError::Unauthorized);
        assert!(sessions.invalidate_on(7, &rejected).await.unwrap());
        assert!(matches!(sessions.require(7).await, Err(AppError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn sessions_are_per_chat() {
        let sessions = sessions();
        sessions.start(1, "a".to_string(), user()).await.unwrap();
        assert!(sessions.current(2).await.unwrap().is_none());
        sessions.end(1).await.unwrap();
        assert!(sessions.current(1).await.unwrap().is_none());
    }

    #[test]
    fn debug_output_hides_token() {
        let session = test_session(Role::Admin);
        assert!(!format!("{session:?}").contains("test-token"));
    }
}
