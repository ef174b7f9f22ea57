use mime::Mime;

use crate::errors::DirectoryError;
use crate::media::MediaKind;
use crate::registrant::{Details, RegistrantPatch, Registration};

/// The largest file accepted for any upload, in bytes.
pub const MAX_FILE_BYTES: usize = 200 * 1024;

/// The shortest password accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn validate_registration(registration: &Registration) -> Result<(), DirectoryError> {
    validate_details(&registration.details)?;

    if registration.password.is_empty() {
        return Err(DirectoryError::MissingField("password"));
    }

    if registration.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DirectoryError::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }

    if registration.password != registration.password_confirmation {
        return Err(DirectoryError::PasswordMismatch);
    }

    if !registration.accepted_terms {
        return Err(DirectoryError::TermsNotAccepted);
    }

    Ok(())
}

pub fn validate_details(details: &Details) -> Result<(), DirectoryError> {
    require("full_name", &details.full_name)?;
    require("diocese", &details.diocese)?;
    require("ordaining_bishop", &details.ordaining_bishop)?;
    require("parish", &details.parish)?;
    require("email", &details.email)?;
    require("phone", &details.phone)?;

    check_email(&details.email)
}

/// Required fields may be left out of a patch but not blanked.
pub fn validate_patch(patch: &RegistrantPatch) -> Result<(), DirectoryError> {
    let required = [
        ("full_name", &patch.full_name),
        ("diocese", &patch.diocese),
        ("ordaining_bishop", &patch.ordaining_bishop),
        ("parish", &patch.parish),
        ("email", &patch.email),
        ("phone", &patch.phone),
    ];

    for (field, value) in required.iter() {
        if let Some(value) = value {
            require(*field, value)?;
        }
    }

    match &patch.email {
        Some(email) => check_email(email),
        None => Ok(()),
    }
}

pub fn check_email(email: &str) -> Result<(), DirectoryError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DirectoryError::InvalidEmail)
    }
}

pub fn check_file_size(field: &str, size: usize, limit: usize) -> Result<(), DirectoryError> {
    if size > limit {
        Err(DirectoryError::FileTooLarge {
            field: field.to_owned(),
            size,
            limit,
        })
    } else {
        Ok(())
    }
}

pub fn check_file_type(kind: MediaKind, content_type: &Mime) -> Result<(), DirectoryError> {
    if kind.accepts(content_type) {
        Ok(())
    } else {
        Err(DirectoryError::UnsupportedFileType {
            field: kind.part_name().to_owned(),
            content_type: content_type.to_string(),
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), DirectoryError> {
    if value.trim().is_empty() {
        Err(DirectoryError::MissingField(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::registrant::tests::details;

    fn registration() -> Registration {
        Registration {
            details: details("Jose Silva", "Santa Maria"),
            password: "segredo".to_owned(),
            password_confirmation: "segredo".to_owned(),
            accepted_terms: true,
        }
    }

    #[test]
    fn accepts_a_complete_registration() {
        assert!(validate_registration(&registration()).is_ok());
    }

    #[test]
    fn rejects_blank_required_fields() {
        let mut r = registration();
        r.details.parish = "   ".to_owned();

        assert!(matches!(
            validate_registration(&r),
            Err(DirectoryError::MissingField("parish"))
        ));
    }

    #[test]
    fn rejects_mismatched_passwords() {
        let mut r = registration();
        r.password_confirmation = "segredo2".to_owned();

        assert!(matches!(
            validate_registration(&r),
            Err(DirectoryError::PasswordMismatch)
        ));
    }

    #[test]
    fn rejects_short_passwords() {
        let mut r = registration();
        r.password = "abc".to_owned();
        r.password_confirmation = "abc".to_owned();

        assert!(matches!(
            validate_registration(&r),
            Err(DirectoryError::PasswordTooShort(MIN_PASSWORD_LENGTH))
        ));
    }

    #[test]
    fn requires_accepting_the_terms() {
        let mut r = registration();
        r.accepted_terms = false;

        assert!(matches!(
            validate_registration(&r),
            Err(DirectoryError::TermsNotAccepted)
        ));
    }

    #[test]
    fn checks_email_shape() {
        assert!(check_email("padre@example.com").is_ok());
        assert!(check_email("padre.example.com").is_err());
        assert!(check_email("@example.com").is_err());
        assert!(check_email("padre@").is_err());
        assert!(check_email("pa dre@example.com").is_err());
        assert!(check_email("a@b@c").is_err());
    }

    #[test]
    fn patches_may_not_blank_required_fields() {
        let patch = RegistrantPatch {
            full_name: Some(String::new()),
            ..Default::default()
        };

        assert!(matches!(
            validate_patch(&patch),
            Err(DirectoryError::MissingField("full_name"))
        ));
        assert!(validate_patch(&RegistrantPatch::default()).is_ok());
    }

    #[test]
    fn the_limit_itself_is_allowed() {
        assert!(check_file_size("photo", MAX_FILE_BYTES, MAX_FILE_BYTES).is_ok());
        assert!(check_file_size("photo", 250 * 1000, MAX_FILE_BYTES).is_err());
    }

    proptest! {
        #[test]
        fn file_size_check_matches_the_ceiling(size in 0usize..(4 * MAX_FILE_BYTES)) {
            let result = check_file_size("document", size, MAX_FILE_BYTES);

            prop_assert_eq!(result.is_ok(), size <= MAX_FILE_BYTES);
        }
    }
}
