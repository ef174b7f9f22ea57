use futures::future::BoxFuture;
use uuid::Uuid;

use crate::auth::{Profile, Role};
use crate::errors::DirectoryError;
use crate::registrant::{NewRegistrant, Registrant, RegistrantPatch};

pub mod memory;

pub trait Db {
    fn approve(&self, id: &Uuid) -> BoxFuture<Result<(), DirectoryError>>;

    fn count_all(&self) -> BoxFuture<Result<i64, DirectoryError>>;

    /// Deletes a registrant and returns it as it was.
    fn delete(&self, id: &Uuid) -> BoxFuture<Result<Registrant, DirectoryError>>;

    fn insert(
        &self,
        id: &Uuid,
        registrant: NewRegistrant,
    ) -> BoxFuture<Result<Registrant, DirectoryError>>;

    fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Registrant>, DirectoryError>>;

    fn retrieve_all(&self) -> BoxFuture<Result<Vec<Registrant>, DirectoryError>>;

    /// The profile of an account. Accounts without a profile row are
    /// members with no username.
    fn retrieve_profile(&self, id: &Uuid) -> BoxFuture<Result<Profile, DirectoryError>>;

    fn retrieve_role(&self, id: &Uuid) -> BoxFuture<Result<Role, DirectoryError>>;

    /// Approved registrants whose name or parish contains `term`,
    /// ignoring case.
    fn search_approved(&self, term: &str) -> BoxFuture<Result<Vec<Registrant>, DirectoryError>>;

    fn set_role(&self, id: &Uuid, role: Role) -> BoxFuture<Result<(), DirectoryError>>;

    fn update(
        &self,
        id: &Uuid,
        patch: RegistrantPatch,
    ) -> BoxFuture<Result<Registrant, DirectoryError>>;
}

/// Builds an `ILIKE` pattern matching `term` anywhere, with wildcards in
/// the term itself escaped.
///
/// ```
/// use directory::db::like_pattern;
/// assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
/// ```
pub fn like_pattern(term: &str) -> String {
    let term = crate::normalization::normalize_text(term);
    let mut pattern = String::with_capacity(term.len() + 2);

    pattern.push('%');

    for c in term.chars() {
        if c == '%' || c == '_' || c == '\\' {
            pattern.push('\\');
        }

        pattern.push(c);
    }

    pattern.push('%');
    pattern
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
    };
    use time::{Date, OffsetDateTime};
    use uuid::Uuid;

    use crate::auth::{Profile, Role};
    use crate::errors::DirectoryError;
    use crate::normalization::normalize_optional;
    use crate::registrant::{
        NewRegistrant, Occupation, Rank, Registrant, RegistrantPatch, Times,
    };

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn approve(&self, id: &Uuid) -> BoxFuture<Result<(), DirectoryError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/approve.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(DirectoryError::NonExistentId(id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn count_all(&self) -> BoxFuture<Result<i64, DirectoryError>> {
            async move {
                let query = sqlx::query_as::<_, (i64,)>(include_str!("queries/count.sql"));

                let (count,) = query.fetch_one(&self.pool).await.map_err(map_sqlx_error)?;

                Ok(count)
            }
            .boxed()
        }

        fn delete(&self, id: &Uuid) -> BoxFuture<Result<Registrant, DirectoryError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete.sql"));

                let deleted = query
                    .bind(id)
                    .try_map(|row: PgRow| registrant_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                deleted.ok_or(DirectoryError::NonExistentId(id))
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
                let query = sqlx::query(include_str!("queries/create.sql"));
                let NewRegistrant {
                    details,
                    photo,
                    document,
                } = registrant;

                let inserted = query
                    .bind(id)
                    .bind(details.full_name)
                    .bind(details.rank.as_str())
                    .bind(details.diocese)
                    .bind(details.ordination_date)
                    .bind(details.ordaining_bishop)
                    .bind(details.canonical_occupation.as_str())
                    .bind(details.parish)
                    .bind(details.email)
                    .bind(details.phone)
                    .bind(details.facebook)
                    .bind(details.instagram)
                    .bind(details.website)
                    .bind(photo)
                    .bind(document)
                    .try_map(|row: PgRow| registrant_from_row(&row))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(inserted)
            }
            .boxed()
        }

        fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Registrant>, DirectoryError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve.sql"));

                let registrant = query
                    .bind(id)
                    .try_map(|row: PgRow| registrant_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(registrant)
            }
            .boxed()
        }

        fn retrieve_all(&self) -> BoxFuture<Result<Vec<Registrant>, DirectoryError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_all.sql"));

                let registrants = query
                    .try_map(|row: PgRow| registrant_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(registrants)
            }
            .boxed()
        }

        fn retrieve_profile(&self, id: &Uuid) -> BoxFuture<Result<Profile, DirectoryError>> {
            let id = *id;

            async move {
                let query = sqlx::query_as::<_, (String, Option<String>)>(include_str!(
                    "queries/retrieve_profile.sql"
                ));

                let profile = query
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(profile
                    .map(|(role, username)| Profile {
                        role: Role::from_stored(Some(role.as_str())),
                        username: normalize_optional(username),
                    })
                    .unwrap_or_default())
            }
            .boxed()
        }

        fn retrieve_role(&self, id: &Uuid) -> BoxFuture<Result<Role, DirectoryError>> {
            let id = *id;

            async move {
                let query = sqlx::query_as::<_, (String,)>(include_str!("queries/retrieve_role.sql"));

                let role = query
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Role::from_stored(role.as_ref().map(|(role,)| role.as_str())))
            }
            .boxed()
        }

        fn search_approved(&self, term: &str) -> BoxFuture<Result<Vec<Registrant>, DirectoryError>> {
            let pattern = super::like_pattern(term);

            async move {
                let query = sqlx::query(include_str!("queries/search.sql"));

                let registrants = query
                    .bind(pattern)
                    .try_map(|row: PgRow| registrant_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(registrants)
            }
            .boxed()
        }

        fn set_role(&self, id: &Uuid, role: Role) -> BoxFuture<Result<(), DirectoryError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/set_role.sql"));

                query
                    .bind(id)
                    .bind(role.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

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
                let query = sqlx::query(include_str!("queries/update.sql"));

                let (facebook_set, facebook) = split_patch(patch.facebook);
                let (instagram_set, instagram) = split_patch(patch.instagram);
                let (website_set, website) = split_patch(patch.website);
                let (notes_set, notes) = split_patch(patch.notes);

                let updated = query
                    .bind(id)
                    .bind(patch.full_name)
                    .bind(patch.rank.map(|rank| rank.as_str()))
                    .bind(patch.diocese)
                    .bind(patch.ordination_date)
                    .bind(patch.ordaining_bishop)
                    .bind(patch.canonical_occupation.map(|occupation| occupation.as_str()))
                    .bind(patch.parish)
                    .bind(patch.email)
                    .bind(patch.phone)
                    .bind(facebook_set)
                    .bind(facebook)
                    .bind(instagram_set)
                    .bind(instagram)
                    .bind(website_set)
                    .bind(website)
                    .bind(notes_set)
                    .bind(notes)
                    .bind(patch.photo)
                    .bind(patch.document)
                    .try_map(|row: PgRow| registrant_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                updated.ok_or(DirectoryError::NonExistentId(id))
            }
            .boxed()
        }
    }

    /// Splits a clearable patch field into a flag saying whether to write
    /// it and the value to write.
    fn split_patch(field: Option<Option<String>>) -> (bool, Option<String>) {
        match field {
            Some(value) => (true, value),
            None => (false, None),
        }
    }

    fn registrant_from_row(row: &PgRow) -> Result<Registrant, sqlx::Error> {
        let rank: String = try_get(row, "grau_ordem")?;
        let rank: Rank = rank
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let occupation: String = try_get(row, "ocupacao_canonica")?;
        let occupation: Occupation = occupation
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let ordination_date: Date = try_get(row, "data_ordenacao")?;
        let created_at: OffsetDateTime = try_get(row, "created_at")?;
        let updated_at: OffsetDateTime = try_get(row, "updated_at")?;

        Ok(Registrant {
            id: try_get(row, "id")?,
            full_name: try_get(row, "nome_completo")?,
            rank,
            diocese: try_get(row, "diocese")?,
            ordination_date,
            ordaining_bishop: try_get(row, "bispo_ordenante")?,
            canonical_occupation: occupation,
            parish: try_get(row, "nome_paroquia")?,
            email: try_get(row, "email")?,
            phone: try_get(row, "telefone")?,
            facebook: try_get(row, "facebook")?,
            instagram: try_get(row, "instagram")?,
            website: try_get(row, "website")?,
            photo: non_blank(try_get(row, "foto_perfil")?),
            document: non_blank(try_get(row, "documento_ordenacao")?),
            approved: try_get(row, "aprovado")?,
            notes: try_get(row, "outras_informacoes")?,
            times: Times {
                created_at,
                updated_at,
            },
        })
    }

    /// Older rows store missing files as empty strings.
    fn non_blank(path: Option<String>) -> Option<String> {
        path.filter(|p| !p.is_empty())
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> DirectoryError {
        DirectoryError::Sqlx { source: error }
    }
}
