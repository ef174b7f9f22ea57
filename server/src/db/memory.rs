use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{Profile, Role};
use crate::db::Db;
use crate::errors::DirectoryError;
use crate::registrant::{NewRegistrant, Registrant, RegistrantPatch};

/// A database kept in memory. Used by tests.
#[derive(Default)]
pub struct MemoryDb {
    /// Registrants in insertion order.
    registrants: RwLock<Vec<Registrant>>,
    profiles: RwLock<HashMap<Uuid, Profile>>,
    failing: RwLock<bool>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.registrants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_username(&self, id: &Uuid, username: &str) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(*id)
            .or_default()
            .username = Some(username.to_owned());
    }

    /// Makes every later insert fail, to exercise error paths.
    pub fn fail_inserts(&self, failing: bool) {
        *self.failing.write().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    fn unavailable() -> DirectoryError {
        DirectoryError::Sqlx {
            source: sqlx::Error::PoolClosed,
        }
    }
}

impl Db for MemoryDb {
    fn approve(&self, id: &Uuid) -> BoxFuture<Result<(), DirectoryError>> {
        let id = *id;

        async move {
            let mut registrants = self
                .registrants
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            let registrant = registrants
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(DirectoryError::NonExistentId(id))?;

            if !registrant.approved {
                registrant.approved = true;
                registrant.times.updated_at = OffsetDateTime::now_utc();
            }

            Ok(())
        }
        .boxed()
    }

    fn count_all(&self) -> BoxFuture<Result<i64, DirectoryError>> {
        async move { Ok(self.len() as i64) }.boxed()
    }

    fn delete(&self, id: &Uuid) -> BoxFuture<Result<Registrant, DirectoryError>> {
        let id = *id;

        async move {
            let mut registrants = self
                .registrants
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            let position = registrants
                .iter()
                .position(|r| r.id == id)
                .ok_or(DirectoryError::NonExistentId(id))?;

            Ok(registrants.remove(position))
        }
        .boxed()
    }

    fn insert(
        &self,
        id: &Uuid,
        registrant: NewRegistrant,
    ) -> BoxFuture<Result<Registrant, DirectoryError>> {
        let id = *id;

        async move {
            if *self.failing.read().unwrap_or_else(PoisonError::into_inner) {
                return Err(Self::unavailable());
            }

            let mut registrants = self
                .registrants
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            if registrants.iter().any(|r| r.id == id) {
                return Err(DirectoryError::Sqlx {
                    source: sqlx::Error::Protocol(format!("duplicate registrant {}", id)),
                });
            }

            let registrant = Registrant::from_new(id, registrant, OffsetDateTime::now_utc());
            registrants.push(registrant.clone());

            Ok(registrant)
        }
        .boxed()
    }

    fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Registrant>, DirectoryError>> {
        let id = *id;

        async move {
            Ok(self
                .registrants
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .find(|r| r.id == id)
                .cloned())
        }
        .boxed()
    }

    fn retrieve_all(&self) -> BoxFuture<Result<Vec<Registrant>, DirectoryError>> {
        async move {
            Ok(self
                .registrants
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .rev()
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn retrieve_profile(&self, id: &Uuid) -> BoxFuture<Result<Profile, DirectoryError>> {
        let id = *id;

        async move {
            Ok(self
                .profiles
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&id)
                .cloned()
                .unwrap_or_default())
        }
        .boxed()
    }

    fn retrieve_role(&self, id: &Uuid) -> BoxFuture<Result<Role, DirectoryError>> {
        let id = *id;

        async move { Ok(self.retrieve_profile(&id).await?.role) }.boxed()
    }

    fn search_approved(&self, term: &str) -> BoxFuture<Result<Vec<Registrant>, DirectoryError>> {
        let term = term.to_owned();

        async move {
            let mut found = self
                .registrants
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|r| r.approved && r.matches(&term))
                .cloned()
                .collect::<Vec<_>>();

            found.sort_by(|a, b| a.full_name.cmp(&b.full_name));

            Ok(found)
        }
        .boxed()
    }

    fn set_role(&self, id: &Uuid, role: Role) -> BoxFuture<Result<(), DirectoryError>> {
        let id = *id;

        async move {
            self.profiles
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(id)
                .or_default()
                .role = role;

            Ok(())
        }
        .boxed()
    }

    fn update(
        &self,
        id: &Uuid,
        patch: RegistrantPatch,
    ) -> BoxFuture<Result<Registrant, DirectoryError>> {
        let id = *id;

        async move {
            let mut registrants = self
                .registrants
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            let registrant = registrants
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(DirectoryError::NonExistentId(id))?;

            registrant.apply(&patch, OffsetDateTime::now_utc());

            Ok(registrant.clone())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrant::tests::details;

    fn new_registrant(name: &str, parish: &str) -> NewRegistrant {
        NewRegistrant {
            details: details(name, parish),
            photo: None,
            document: None,
        }
    }

    #[tokio::test]
    async fn search_only_returns_approved_matches() {
        let db = MemoryDb::new();
        let jose = Uuid::new_v4();
        let maria = Uuid::new_v4();

        db.insert(&jose, new_registrant("Jose Silva", "Santa Maria"))
            .await
            .unwrap();
        db.insert(&maria, new_registrant("Pedro Souza", "Sao Jose"))
            .await
            .unwrap();

        assert!(db.search_approved("jose").await.unwrap().is_empty());

        db.approve(&jose).await.unwrap();
        db.approve(&maria).await.unwrap();

        let found = db.search_approved("JOSE").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].full_name, "Jose Silva");
    }

    #[tokio::test]
    async fn approving_twice_keeps_the_first_timestamp() {
        let db = MemoryDb::new();
        let id = Uuid::new_v4();

        db.insert(&id, new_registrant("Jose Silva", "Santa Maria"))
            .await
            .unwrap();
        db.approve(&id).await.unwrap();
        let first = db.retrieve(&id).await.unwrap().unwrap();

        db.approve(&id).await.unwrap();
        let second = db.retrieve(&id).await.unwrap().unwrap();

        assert!(second.approved);
        assert_eq!(first.times.updated_at, second.times.updated_at);
    }

    #[tokio::test]
    async fn missing_ids_are_reported() {
        let db = MemoryDb::new();
        let id = Uuid::new_v4();

        assert!(matches!(
            db.approve(&id).await,
            Err(DirectoryError::NonExistentId(_))
        ));
        assert!(matches!(
            db.delete(&id).await,
            Err(DirectoryError::NonExistentId(_))
        ));
        assert!(matches!(
            db.update(&id, RegistrantPatch::default()).await,
            Err(DirectoryError::NonExistentId(_))
        ));
    }

    #[tokio::test]
    async fn roles_default_to_member() {
        let db = MemoryDb::new();
        let id = Uuid::new_v4();

        assert_eq!(db.retrieve_role(&id).await.unwrap(), Role::Member);

        db.set_role(&id, Role::Administrator).await.unwrap();
        assert_eq!(db.retrieve_role(&id).await.unwrap(), Role::Administrator);
    }

    #[tokio::test]
    async fn roles_and_usernames_share_the_profile() {
        let db = MemoryDb::new();
        let id = Uuid::new_v4();

        assert_eq!(db.retrieve_profile(&id).await.unwrap(), Profile::default());

        db.set_username(&id, "padrejose");
        db.set_role(&id, Role::Administrator).await.unwrap();

        assert_eq!(
            db.retrieve_profile(&id).await.unwrap(),
            Profile {
                role: Role::Administrator,
                username: Some("padrejose".to_owned()),
            }
        );
    }
}
