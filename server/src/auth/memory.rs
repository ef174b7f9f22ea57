use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::{account_email, Auth, Session, SESSION_LIFETIME_DAYS};
use crate::errors::DirectoryError;

struct Account {
    id: Uuid,
    password: String,
}

struct LiveSession {
    account: Uuid,
    expires_at: OffsetDateTime,
}

/// Accounts and sessions kept in memory. Used by tests; passwords are
/// compared as given.
#[derive(Default)]
pub struct MemoryAuth {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<Uuid, LiveSession>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&account_email(email))
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Moves every session's expiry into the past.
    pub fn expire_sessions(&self) {
        let past = OffsetDateTime::now_utc() - Duration::seconds(1);

        for session in self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .values_mut()
        {
            session.expires_at = past;
        }
    }
}

impl Auth for MemoryAuth {
    fn sign_up(&self, email: &str, password: &str) -> BoxFuture<Result<Uuid, DirectoryError>> {
        let email = account_email(email);
        let password = password.to_owned();

        async move {
            let mut accounts = self
                .accounts
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            if accounts.contains_key(&email) {
                return Err(DirectoryError::EmailAlreadyRegistered);
            }

            let id = Uuid::new_v4();
            accounts.insert(email, Account { id, password });

            Ok(id)
        }
        .boxed()
    }

    fn sign_in(&self, email: &str, password: &str) -> BoxFuture<Result<Session, DirectoryError>> {
        let email = account_email(email);
        let password = password.to_owned();

        async move {
            let id = self
                .accounts
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&email)
                .filter(|account| account.password == password)
                .map(|account| account.id)
                .ok_or(DirectoryError::InvalidCredentials)?;

            let now = OffsetDateTime::now_utc();
            let mut sessions = self
                .sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            sessions.retain(|_, session| session.account != id || session.expires_at > now);

            let token = Uuid::new_v4();
            sessions.insert(
                token,
                LiveSession {
                    account: id,
                    expires_at: now + Duration::days(SESSION_LIFETIME_DAYS),
                },
            );

            Ok(Session { token, id })
        }
        .boxed()
    }

    fn identify(&self, token: &Uuid) -> BoxFuture<Result<Option<Uuid>, DirectoryError>> {
        let token = *token;

        async move {
            Ok(self
                .sessions
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&token)
                .filter(|session| session.expires_at > OffsetDateTime::now_utc())
                .map(|session| session.account))
        }
        .boxed()
    }

    fn sign_out(&self, token: &Uuid) -> BoxFuture<Result<(), DirectoryError>> {
        let token = *token;

        async move {
            self.sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&token);

            Ok(())
        }
        .boxed()
    }

    fn delete_account(&self, id: &Uuid) -> BoxFuture<Result<(), DirectoryError>> {
        let id = *id;

        async move {
            self.accounts
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|_, account| account.id != id);
            self.sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|_, session| session.account != id);

            Ok(())
        }
        .boxed()
    }
}
