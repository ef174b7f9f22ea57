use futures::future::BoxFuture;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::errors::DirectoryError;

pub mod memory;
pub mod password;

/// How long a session stays valid after sign-in.
pub const SESSION_LIFETIME_DAYS: i64 = 30;

/// The role stored in an account's profile.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Administrator,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrador",
            Role::Member => "membro",
        }
    }

    /// Anything other than the administrator value, including a missing
    /// profile, is a plain member.
    pub fn from_stored(stored: Option<&str>) -> Self {
        match stored {
            Some("administrador") => Role::Administrator,
            _ => Role::Member,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Member
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The profile row kept for every account that has one.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Profile {
    pub role: Role,
    pub username: Option<String>,
}

/// The account behind an authenticated request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    /// Whether this identity may see or change the given registrant.
    pub fn can_manage(&self, registrant: &Uuid) -> bool {
        self.is_admin() || self.id == *registrant
    }
}

/// The result of a successful sign-in.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub token: Uuid,
    pub id: Uuid,
}

/// Email and password accounts with bearer-token sessions.
pub trait Auth: Send + Sync {
    /// Creates an account and returns its ID.
    fn sign_up(&self, email: &str, password: &str) -> BoxFuture<Result<Uuid, DirectoryError>>;

    fn sign_in(&self, email: &str, password: &str) -> BoxFuture<Result<Session, DirectoryError>>;

    /// Returns the account a live session token belongs to.
    fn identify(&self, token: &Uuid) -> BoxFuture<Result<Option<Uuid>, DirectoryError>>;

    fn sign_out(&self, token: &Uuid) -> BoxFuture<Result<(), DirectoryError>>;

    fn delete_account(&self, id: &Uuid) -> BoxFuture<Result<(), DirectoryError>>;
}

/// Accounts are keyed on the lowercased, trimmed address.
pub fn account_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub use self::postgres::*;

mod postgres {
    use futures::future::{BoxFuture, FutureExt};
    use sqlx::postgres::PgPool;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    use super::password::{hash_password_blocking, verify_password_blocking};
    use super::{account_email, Session, SESSION_LIFETIME_DAYS};
    use crate::errors::DirectoryError;

    const UNIQUE_VIOLATION: &str = "23505";

    pub struct PgAuth {
        pool: PgPool,
    }

    impl PgAuth {
        pub fn new(pool: PgPool) -> Self {
            PgAuth { pool }
        }
    }

    impl super::Auth for PgAuth {
        fn sign_up(&self, email: &str, password: &str) -> BoxFuture<Result<Uuid, DirectoryError>> {
            let email = account_email(email);
            let password = password.to_owned();

            async move {
                let hash = hash_password_blocking(password).await?;

                let query = sqlx::query_as::<_, (Uuid,)>(include_str!("queries/create_account.sql"));

                let (id,) = query
                    .bind(email)
                    .bind(hash)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_account_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn sign_in(&self, email: &str, password: &str) -> BoxFuture<Result<Session, DirectoryError>> {
            let email = account_email(email);
            let password = password.to_owned();

            async move {
                let query =
                    sqlx::query_as::<_, (Uuid, String)>(include_str!("queries/retrieve_account.sql"));

                let (id, hash) = query
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .ok_or(DirectoryError::InvalidCredentials)?;

                verify_password_blocking(password, hash).await?;

                sqlx::query(include_str!("queries/delete_expired_sessions.sql"))
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                let expires_at = OffsetDateTime::now_utc() + Duration::days(SESSION_LIFETIME_DAYS);
                let query = sqlx::query_as::<_, (Uuid,)>(include_str!("queries/create_session.sql"));

                let (token,) = query
                    .bind(id)
                    .bind(expires_at)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Session { token, id })
            }
            .boxed()
        }

        fn identify(&self, token: &Uuid) -> BoxFuture<Result<Option<Uuid>, DirectoryError>> {
            let token = *token;

            async move {
                let query =
                    sqlx::query_as::<_, (Uuid,)>(include_str!("queries/retrieve_session.sql"));

                let account = query
                    .bind(token)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(account.map(|(id,)| id))
            }
            .boxed()
        }

        fn sign_out(&self, token: &Uuid) -> BoxFuture<Result<(), DirectoryError>> {
            let token = *token;

            async move {
                sqlx::query(include_str!("queries/delete_session.sql"))
                    .bind(token)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn delete_account(&self, id: &Uuid) -> BoxFuture<Result<(), DirectoryError>> {
            let id = *id;

            async move {
                sqlx::query(include_str!("queries/delete_account.sql"))
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }
    }

    fn map_account_error(error: sqlx::Error) -> DirectoryError {
        let duplicate = match &error {
            sqlx::Error::Database(e) => e.code().as_deref() == Some(UNIQUE_VIOLATION),
            _ => false,
        };

        if duplicate {
            DirectoryError::EmailAlreadyRegistered
        } else {
            map_sqlx_error(error)
        }
    }

    fn map_sqlx_error(error: sqlx::Error) -> DirectoryError {
        DirectoryError::Sqlx { source: error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_administrator_value_grants_administration() {
        assert_eq!(Role::from_stored(Some("administrador")), Role::Administrator);
        assert_eq!(Role::from_stored(Some("membro")), Role::Member);
        assert_eq!(Role::from_stored(Some("admin")), Role::Member);
        assert_eq!(Role::from_stored(None), Role::Member);
    }

    #[test]
    fn identities_manage_themselves() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();

        let member = Identity {
            id: own,
            role: Role::Member,
        };
        let admin = Identity {
            id: Uuid::new_v4(),
            role: Role::Administrator,
        };

        assert!(member.can_manage(&own));
        assert!(!member.can_manage(&other));
        assert!(admin.can_manage(&other));
    }

    #[test]
    fn account_emails_ignore_case() {
        assert_eq!(account_email(" Padre@Example.COM "), "padre@example.com");
    }
}
