use serde::Deserialize;

use crate::environment::Environment;
use crate::errors::DirectoryError;
use crate::normalization::normalize_optional;
use crate::registrant::{Counts, Registrant};

/// What the moderation panel shows: tallies over every record, and the
/// records matching the panel's filter.
#[derive(Debug)]
pub struct Panel {
    pub counts: Counts,
    pub registrants: Vec<Registrant>,
}

/// Loads every registrant, newest first. The counts ignore `filter`; the
/// listed registrants are those whose name or parish contains it.
pub async fn panel(environment: &Environment, filter: Option<&str>) -> Result<Panel, DirectoryError> {
    let all = environment.db.retrieve_all().await?;
    let counts = Counts::of(&all);

    let registrants = match normalize_optional(filter) {
        Some(term) => all.into_iter().filter(|r| r.matches(&term)).collect(),
        None => all,
    };

    Ok(Panel {
        counts,
        registrants,
    })
}

/// Moderation actions change state only when explicitly confirmed.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub confirm: bool,
}

impl Confirmation {
    pub fn require(self) -> Result<(), DirectoryError> {
        if self.confirm {
            Ok(())
        } else {
            Err(DirectoryError::ConfirmationRequired)
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::db::Db;
    use crate::environment::tests::Fixture;
    use crate::registrant::tests::details;
    use crate::registrant::NewRegistrant;

    async fn insert(fixture: &Fixture, name: &str, parish: &str, approved: bool) {
        let id = Uuid::new_v4();

        fixture
            .db
            .insert(
                &id,
                NewRegistrant {
                    details: details(name, parish),
                    photo: None,
                    document: None,
                },
            )
            .await
            .unwrap();

        if approved {
            fixture.db.approve(&id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn filter_narrows_the_list_but_not_the_counts() {
        let fixture = Fixture::new();
        insert(&fixture, "Jose Silva", "Santa Maria", true).await;
        insert(&fixture, "Pedro Souza", "Sao Jose", false).await;
        insert(&fixture, "Paulo Lima", "Santa Rita", false).await;

        let panel = panel(&fixture.environment, Some(" jose ")).await.unwrap();

        assert_eq!(
            panel.counts,
            Counts {
                total: 3,
                approved: 1,
                pending: 2
            }
        );
        assert_eq!(panel.registrants.len(), 2);

        let everything = super::panel(&fixture.environment, Some("")).await.unwrap();
        assert_eq!(everything.registrants.len(), 3);
        assert_eq!(everything.registrants[0].full_name, "Paulo Lima");
    }

    #[test]
    fn confirmation_must_be_explicit() {
        assert!(matches!(
            Confirmation::default().require(),
            Err(DirectoryError::ConfirmationRequired)
        ));
        assert!(Confirmation { confirm: true }.require().is_ok());
    }
}
