use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use url::Url;
use uuid::Uuid;

use crate::normalization;

/// The grade of holy orders of a registrant.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Diacono,
    Presbitero,
    Bispo,
}

/// The canonical office a registrant holds.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Occupation {
    Vigario,
    Paroco,
    Auxiliar,
    Titular,
}

/// Returned when a stored enumeration value isn’t recognized.
#[derive(Debug)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value {:?}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant(s.to_owned())),
                }
            }
        }
    };
}

text_enum!(Rank {
    Diacono => "diacono",
    Presbitero => "presbitero",
    Bispo => "bispo",
});

text_enum!(Occupation {
    Vigario => "vigario",
    Paroco => "paroco",
    Auxiliar => "auxiliar",
    Titular => "titular",
});

/// A single directory record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Registrant {
    /// The ID of the record, shared with the owner’s account.
    pub id: Uuid,

    pub full_name: String,
    pub rank: Rank,
    pub diocese: String,

    #[serde(with = "iso_date")]
    pub ordination_date: Date,

    pub ordaining_bishop: String,
    pub canonical_occupation: Occupation,
    pub parish: String,

    pub email: String,
    pub phone: String,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub website: Option<String>,

    /// Storage path of the profile photo, if any.
    pub photo: Option<String>,

    /// Storage path of the ordination document, if any.
    pub document: Option<String>,

    /// Whether an administrator has approved the record for public listing.
    pub approved: bool,

    /// Other information the registrant shares on their public profile.
    pub notes: Option<String>,

    /// The times it was created and updated.
    #[serde(flatten)]
    pub times: Times,
}

impl Registrant {
    /// Builds the record inserted after a registration, stamped with the
    /// given time.
    pub fn from_new(id: Uuid, new: NewRegistrant, now: OffsetDateTime) -> Self {
        let NewRegistrant { details, photo, document } = new;

        Registrant {
            id,
            full_name: details.full_name,
            rank: details.rank,
            diocese: details.diocese,
            ordination_date: details.ordination_date,
            ordaining_bishop: details.ordaining_bishop,
            canonical_occupation: details.canonical_occupation,
            parish: details.parish,
            email: details.email,
            phone: details.phone,
            facebook: details.facebook,
            instagram: details.instagram,
            website: details.website,
            photo,
            document,
            approved: false,
            notes: None,
            times: Times {
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Applies a patch in place. Fields the patch leaves out are kept.
    pub fn apply(&mut self, patch: &RegistrantPatch, now: OffsetDateTime) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut self.full_name, &patch.full_name);
        set(&mut self.rank, &patch.rank);
        set(&mut self.diocese, &patch.diocese);
        set(&mut self.ordination_date, &patch.ordination_date);
        set(&mut self.ordaining_bishop, &patch.ordaining_bishop);
        set(&mut self.canonical_occupation, &patch.canonical_occupation);
        set(&mut self.parish, &patch.parish);
        set(&mut self.email, &patch.email);
        set(&mut self.phone, &patch.phone);
        set(&mut self.facebook, &patch.facebook);
        set(&mut self.instagram, &patch.instagram);
        set(&mut self.website, &patch.website);
        set(&mut self.notes, &patch.notes);

        if patch.photo.is_some() {
            self.photo = patch.photo.clone();
        }

        if patch.document.is_some() {
            self.document = patch.document.clone();
        }

        self.times.updated_at = now;
    }

    /// Whether the name or parish contains `term`, ignoring case.
    pub fn matches(&self, term: &str) -> bool {
        let term = normalization::normalize_text(term).to_lowercase();

        self.full_name.to_lowercase().contains(&term) || self.parish.to_lowercase().contains(&term)
    }
}

/// The times a record was created and last modified.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Times {
    /// The date and time it was created.
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,

    /// The date and time it was last modified.
    #[serde(with = "time::serde::timestamp")]
    pub updated_at: OffsetDateTime,
}

/// The identity and contact fields a registrant provides.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Details {
    #[serde(deserialize_with = "normalization::deserialize")]
    pub full_name: String,

    pub rank: Rank,

    #[serde(deserialize_with = "normalization::deserialize")]
    pub diocese: String,

    #[serde(with = "iso_date")]
    pub ordination_date: Date,

    #[serde(deserialize_with = "normalization::deserialize")]
    pub ordaining_bishop: String,

    pub canonical_occupation: Occupation,

    #[serde(deserialize_with = "normalization::deserialize")]
    pub parish: String,

    #[serde(deserialize_with = "normalization::deserialize")]
    pub email: String,

    #[serde(deserialize_with = "normalization::deserialize")]
    pub phone: String,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub facebook: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub instagram: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub website: Option<String>,
}

/// The metadata submitted with a registration.
#[derive(Clone, Deserialize)]
pub struct Registration {
    #[serde(flatten)]
    pub details: Details,

    pub password: String,

    pub password_confirmation: String,

    #[serde(default)]
    pub accepted_terms: bool,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("details", &self.details)
            .field("accepted_terms", &self.accepted_terms)
            .finish()
    }
}

/// A record ready for insertion, with the paths of any uploaded files.
#[derive(Clone, Debug)]
pub struct NewRegistrant {
    pub details: Details,
    pub photo: Option<String>,
    pub document: Option<String>,
}

/// A field-level update. `None` leaves a field unchanged; for optional
/// fields `Some(None)` clears it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegistrantPatch {
    #[serde(default, deserialize_with = "normalized_required")]
    pub full_name: Option<String>,

    #[serde(default)]
    pub rank: Option<Rank>,

    #[serde(default, deserialize_with = "normalized_required")]
    pub diocese: Option<String>,

    #[serde(default, with = "iso_date::option")]
    pub ordination_date: Option<Date>,

    #[serde(default, deserialize_with = "normalized_required")]
    pub ordaining_bishop: Option<String>,

    #[serde(default)]
    pub canonical_occupation: Option<Occupation>,

    #[serde(default, deserialize_with = "normalized_required")]
    pub parish: Option<String>,

    #[serde(default, deserialize_with = "normalized_required")]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "normalized_required")]
    pub phone: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_patch")]
    pub facebook: Option<Option<String>>,

    #[serde(default, deserialize_with = "normalization::deserialize_patch")]
    pub instagram: Option<Option<String>>,

    #[serde(default, deserialize_with = "normalization::deserialize_patch")]
    pub website: Option<Option<String>>,

    #[serde(default, deserialize_with = "normalization::deserialize_patch")]
    pub notes: Option<Option<String>>,

    /// New storage path of the profile photo, set by the server after
    /// uploading a replacement.
    #[serde(skip)]
    pub photo: Option<String>,

    /// New storage path of the ordination document, set by the server
    /// after uploading a replacement.
    #[serde(skip)]
    pub document: Option<String>,
}

fn normalized_required<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: serde::Deserializer<'de> {
    let o: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(o.map(normalization::normalize_text))
}

/// Tallies shown on the moderation panel.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
}

impl Counts {
    pub fn of<'a>(registrants: impl IntoIterator<Item = &'a Registrant>) -> Self {
        let (total, approved) = registrants
            .into_iter()
            .fold((0, 0), |(total, approved), r| {
                (total + 1, approved + r.approved as usize)
            });

        Counts {
            total,
            approved,
            pending: total - approved,
        }
    }
}

/// A registrant as seen by its owner or an administrator.
#[derive(Clone, Debug, Serialize)]
pub struct FullView<'a> {
    #[serde(flatten)]
    pub registrant: &'a Registrant,
    pub photo_url: Option<Url>,
    pub document_url: Option<Url>,
}

/// A registrant as seen by the public. Leaves out the phone number and the
/// ordination document.
#[derive(Clone, Debug, Serialize)]
pub struct PublicView<'a> {
    pub id: &'a Uuid,
    pub full_name: &'a str,
    pub rank: Rank,
    pub diocese: &'a str,
    #[serde(with = "iso_date")]
    pub ordination_date: Date,
    pub ordaining_bishop: &'a str,
    pub canonical_occupation: Occupation,
    pub parish: &'a str,
    pub email: &'a str,
    pub facebook: Option<&'a str>,
    pub instagram: Option<&'a str>,
    pub website: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub photo_url: Option<Url>,
    pub approved: bool,
}

impl<'a> PublicView<'a> {
    pub fn new(registrant: &'a Registrant, photo_url: Option<Url>) -> Self {
        PublicView {
            id: &registrant.id,
            full_name: &registrant.full_name,
            rank: registrant.rank,
            diocese: &registrant.diocese,
            ordination_date: registrant.ordination_date,
            ordaining_bishop: &registrant.ordaining_bishop,
            canonical_occupation: registrant.canonical_occupation,
            parish: &registrant.parish,
            email: &registrant.email,
            facebook: registrant.facebook.as_deref(),
            instagram: registrant.instagram.as_deref(),
            website: registrant.website.as_deref(),
            notes: registrant.notes.as_deref(),
            photo_url,
            approved: registrant.approved,
        }
    }
}

/// (De)serializes dates as `YYYY-MM-DD`.
pub mod iso_date {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub(crate) const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s: String = Deserialize::deserialize(deserializer)?;

        Date::parse(s.trim(), FORMAT).map_err(de::Error::custom)
    }

    pub mod option {
        use serde::{de, Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
            let o: Option<String> = Deserialize::deserialize(deserializer)?;

            o.map(|s| Date::parse(s.trim(), super::FORMAT).map_err(de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use proptest::prelude::*;
    use time::{Date, OffsetDateTime};
    use uuid::Uuid;

    use super::*;

    fn ordination_date() -> Date {
        Date::try_from_ymd(2001, 12, 8).unwrap()
    }

    pub(crate) fn details(full_name: &str, parish: &str) -> Details {
        Details {
            full_name: full_name.to_owned(),
            rank: Rank::Presbitero,
            diocese: "Diocese de Campinas".to_owned(),
            ordination_date: ordination_date(),
            ordaining_bishop: "Dom Bruno".to_owned(),
            canonical_occupation: Occupation::Paroco,
            parish: parish.to_owned(),
            email: "padre@example.com".to_owned(),
            phone: "+55 19 5555-0000".to_owned(),
            facebook: None,
            instagram: None,
            website: None,
        }
    }

    pub(crate) fn registrant(full_name: &str, parish: &str, approved: bool) -> Registrant {
        let new = NewRegistrant {
            details: details(full_name, parish),
            photo: None,
            document: None,
        };

        let mut r = Registrant::from_new(Uuid::new_v4(), new, OffsetDateTime::now_utc());
        r.approved = approved;
        r
    }

    #[test]
    fn registration_parses_and_normalizes() {
        let json = r#"{
            "full_name": "  José Silva ",
            "rank": "presbitero",
            "diocese": "Diocese de Campinas",
            "ordination_date": "2001-12-08",
            "ordaining_bishop": "Dom Bruno",
            "canonical_occupation": "vigario",
            "parish": "Santa Maria",
            "email": "jose@example.com",
            "phone": "123",
            "instagram": "",
            "password": "secret1",
            "password_confirmation": "secret1",
            "accepted_terms": true
        }"#;

        let registration: Registration = serde_json::from_str(json).unwrap();

        assert_eq!(registration.details.full_name, "José Silva");
        assert_eq!(registration.details.rank, Rank::Presbitero);
        assert_eq!(registration.details.canonical_occupation, Occupation::Vigario);
        assert_eq!(registration.details.ordination_date, ordination_date());
        assert_eq!(registration.details.instagram, None);
        assert!(registration.accepted_terms);
    }

    #[test]
    fn registration_rejects_unknown_rank() {
        let json = r#"{"full_name": "x", "rank": "papa", "diocese": "d",
            "ordination_date": "2001-12-08", "ordaining_bishop": "b",
            "canonical_occupation": "vigario", "parish": "p", "email": "e@x",
            "phone": "1", "password": "p", "password_confirmation": "p"}"#;

        assert!(serde_json::from_str::<Registration>(json).is_err());
    }

    #[test]
    fn registration_debug_hides_passwords() {
        let registration = Registration {
            details: details("Jose Silva", "Santa Maria"),
            password: "hunter22".to_owned(),
            password_confirmation: "hunter22".to_owned(),
            accepted_terms: true,
        };

        assert!(!format!("{:?}", registration).contains("hunter22"));
    }

    #[test]
    fn text_enums_round_trip_through_strings() {
        for rank in &[Rank::Diacono, Rank::Presbitero, Rank::Bispo] {
            assert_eq!(rank.as_str().parse::<Rank>().unwrap(), *rank);
        }

        assert!("cardeal".parse::<Rank>().is_err());
        assert_eq!("titular".parse::<Occupation>().unwrap(), Occupation::Titular);
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let mut r = registrant("Jose Silva", "Santa Maria", false);
        r.website = Some("https://old.example.com".to_owned());
        r.photo = Some("fotos_perfil/old.png".to_owned());

        let patch: RegistrantPatch =
            serde_json::from_str(r#"{"parish": " São José ", "website": null}"#).unwrap();
        r.apply(&patch, OffsetDateTime::now_utc());

        assert_eq!(r.full_name, "Jose Silva");
        assert_eq!(r.parish, "São José");
        assert_eq!(r.website, None);
        assert_eq!(r.photo.as_deref(), Some("fotos_perfil/old.png"));
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        assert!(serde_json::from_str::<RegistrantPatch>(r#"{"approved": true}"#).is_err());
    }

    #[test]
    fn public_view_leaves_out_private_fields() {
        let mut r = registrant("Jose Silva", "Santa Maria", true);
        r.notes = Some("Capelao do hospital".to_owned());
        r.document = Some("documentos_ordenacao/x.pdf".to_owned());

        let value = serde_json::to_value(PublicView::new(&r, None)).unwrap();

        assert_eq!(value["ordination_date"], "2001-12-08");
        assert!(value.get("phone").is_none());
        assert_eq!(value["notes"], "Capelao do hospital");
        assert!(value.get("document").is_none());
        assert!(value.get("document_url").is_none());
    }

    #[test]
    fn counts_split_approved_and_pending() {
        let registrants = vec![
            registrant("A", "P", true),
            registrant("B", "P", false),
            registrant("C", "P", false),
        ];

        assert_eq!(
            Counts::of(&registrants),
            Counts {
                total: 3,
                approved: 1,
                pending: 2
            }
        );
    }

    proptest! {
        #[test]
        fn matching_ignores_case(name in "[a-zA-Z ]{1,20}", start in 0usize..20, len in 1usize..5) {
            let r = registrant(&name, "Paroquia", true);
            let start = start.min(name.len() - 1);
            let end = (start + len).min(name.len());
            let term = &name[start..end];

            prop_assert!(r.matches(&term.to_uppercase()));
            prop_assert!(r.matches(&term.to_lowercase()));
        }
    }
}
