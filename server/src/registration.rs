use std::sync::Arc;

use log::{debug, o};

use crate::environment::Environment;
use crate::errors::DirectoryError;
use crate::io::UploadedFile;
use crate::media::{media_path, MediaKind};
use crate::registrant::{NewRegistrant, Registrant, Registration};
use crate::saga::{Compensation, CompensationLog};
use crate::validation::{check_file_size, check_file_type, validate_registration};

/// The files attached to a registration or profile update.
#[derive(Debug, Default)]
pub struct Attachments {
    pub photo: Option<UploadedFile>,
    pub document: Option<UploadedFile>,
}

impl Attachments {
    pub fn get(&self, kind: MediaKind) -> Option<&UploadedFile> {
        match kind {
            MediaKind::Photo => self.photo.as_ref(),
            MediaKind::Document => self.document.as_ref(),
        }
    }

    /// Checks every attached file against the size ceiling and the types
    /// its field accepts.
    pub fn validate(&self, limit: usize) -> Result<(), DirectoryError> {
        for kind in MediaKind::ALL.iter().copied() {
            if let Some(file) = self.get(kind) {
                check_file_size(kind.part_name(), file.raw.len(), limit)?;
                check_file_type(kind, &file.content_type)?;
            }
        }

        Ok(())
    }
}

/// Registers a new registrant: uploads its files, creates its account
/// and inserts the pending record. Every completed step is undone if a
/// later one fails.
pub async fn register(
    environment: &Environment,
    registration: Registration,
    attachments: Attachments,
) -> Result<Registrant, DirectoryError> {
    validate_registration(&registration)?;
    attachments.validate(environment.config.max_file_bytes)?;

    let mut log = CompensationLog::new(
        environment.logger.clone(),
        environment.auth.clone(),
        environment.media.clone(),
    );

    match run(environment, registration, attachments, &mut log).await {
        Ok(registrant) => {
            log.commit();
            Ok(registrant)
        }
        Err(e) => {
            debug!(environment.logger, "Registration failed, unwinding"; "error" => %e);
            log.unwind().await;
            Err(e)
        }
    }
}

async fn run(
    environment: &Environment,
    registration: Registration,
    attachments: Attachments,
    log: &mut CompensationLog,
) -> Result<Registrant, DirectoryError> {
    let Registration {
        details, password, ..
    } = registration;

    let photo = upload(environment, MediaKind::Photo, attachments.photo, log).await?;
    let document = upload(environment, MediaKind::Document, attachments.document, log).await?;

    debug!(environment.logger, "Creating account...");
    let id = environment.auth.sign_up(&details.email, &password).await?;
    log.record(Compensation::DeleteAccount(id));

    let logger = Arc::new(environment.logger.new(o!("id" => id.to_string())));

    debug!(logger, "Writing registrant to database...");
    let new = NewRegistrant {
        details,
        photo,
        document,
    };

    environment.db.insert(&id, new).await
}

/// Saves one attachment to the media store under a fresh path and
/// returns that path.
pub(crate) async fn upload(
    environment: &Environment,
    kind: MediaKind,
    file: Option<UploadedFile>,
    log: &mut CompensationLog,
) -> Result<Option<String>, DirectoryError> {
    let file = match file {
        Some(file) => file,
        None => return Ok(None),
    };

    let path = media_path(kind, file.filename.as_deref(), &file.content_type);

    debug!(environment.logger, "Saving file to store..."; "path" => &path);
    environment
        .media
        .save(&path, file.content_type.to_string(), file.raw)
        .await?;
    log.record(Compensation::DeleteObject(path.clone()));

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::tests::Fixture;
    use crate::registrant::tests::details;

    fn registration(email: &str) -> Registration {
        let mut details = details("Jose Silva", "Santa Maria");
        details.email = email.to_owned();

        Registration {
            details,
            password: "segredo".to_owned(),
            password_confirmation: "segredo".to_owned(),
            accepted_terms: true,
        }
    }

    fn photo(len: usize) -> UploadedFile {
        UploadedFile {
            filename: Some("retrato.png".to_owned()),
            content_type: mime::IMAGE_PNG,
            raw: vec![7; len],
        }
    }

    #[tokio::test]
    async fn registering_stores_files_and_a_pending_record() {
        let fixture = Fixture::new();
        let attachments = Attachments {
            photo: Some(photo(10)),
            document: None,
        };

        let registrant = register(&fixture.environment, registration("jose@example.com"), attachments)
            .await
            .unwrap();

        assert!(!registrant.approved);
        assert_eq!(fixture.media.paths(), vec![registrant.photo.clone().unwrap()]);
        assert!(fixture.auth.has_account("jose@example.com"));
        assert_eq!(fixture.db.len(), 1);
    }

    #[tokio::test]
    async fn failed_inserts_undo_the_account_and_files() {
        let fixture = Fixture::new();
        fixture.db.fail_inserts(true);

        let attachments = Attachments {
            photo: Some(photo(10)),
            document: None,
        };

        let result = register(&fixture.environment, registration("jose@example.com"), attachments).await;

        assert!(matches!(result, Err(DirectoryError::Sqlx { .. })));
        assert!(fixture.media.is_empty());
        assert_eq!(fixture.auth.account_count(), 0);
        assert!(fixture.db.is_empty());
    }

    #[tokio::test]
    async fn duplicate_emails_keep_the_first_account() {
        let fixture = Fixture::new();

        register(&fixture.environment, registration("jose@example.com"), Attachments::default())
            .await
            .unwrap();

        let attachments = Attachments {
            photo: Some(photo(10)),
            document: None,
        };
        let result = register(&fixture.environment, registration("Jose@example.com"), attachments).await;

        assert!(matches!(result, Err(DirectoryError::EmailAlreadyRegistered)));
        assert!(fixture.auth.has_account("jose@example.com"));
        assert!(fixture.media.is_empty());
        assert_eq!(fixture.db.len(), 1);
    }

    #[tokio::test]
    async fn oversized_files_fail_before_any_write() {
        let fixture = Fixture::new();
        let attachments = Attachments {
            photo: Some(photo(250 * 1000)),
            document: None,
        };

        let result = register(&fixture.environment, registration("jose@example.com"), attachments).await;

        assert!(matches!(result, Err(DirectoryError::FileTooLarge { .. })));
        assert!(fixture.media.is_empty());
        assert_eq!(fixture.auth.account_count(), 0);
    }

    #[tokio::test]
    async fn documents_must_be_pdfs_or_images() {
        let fixture = Fixture::new();
        let attachments = Attachments {
            photo: None,
            document: Some(UploadedFile {
                filename: Some("ordenacao.txt".to_owned()),
                content_type: mime::TEXT_PLAIN,
                raw: vec![1],
            }),
        };

        let result = register(&fixture.environment, registration("jose@example.com"), attachments).await;

        assert!(matches!(result, Err(DirectoryError::UnsupportedFileType { .. })));
    }
}
